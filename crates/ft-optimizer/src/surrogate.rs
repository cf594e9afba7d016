//! Gaussian-process surrogate and expected-improvement acquisition.
//!
//! Inputs are points in the unit hypercube, outputs are expected to be
//! standardized (zero mean, unit variance) by the caller.

use ndarray::{s, Array1, Array2, ArrayView1};

/// Dimensionality of the placer search space.
pub const DIMS: usize = 4;

pub type Point = [f64; DIMS];

/// Standard normal cumulative distribution function (Abramowitz & Stegun 7.1.26).
pub fn norm_cdf(x: f64) -> f64 {
    if x >= 8.0 {
        return 1.0;
    }
    if x <= -8.0 {
        return 0.0;
    }

    let a1 = 0.254829592_f64;
    let a2 = -0.284496736_f64;
    let a3 = 1.421413741_f64;
    let a4 = -1.453152027_f64;
    let a5 = 1.061405429_f64;
    let p = 0.3275911_f64;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x_abs = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * x_abs);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x_abs * x_abs).exp();

    0.5 * (1.0 + sign * y)
}

/// Standard normal probability density function.
pub fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Expected improvement of a prediction over `best` when maximizing.
pub fn expected_improvement(mean: f64, sd: f64, best: f64, xi: f64) -> f64 {
    let gain = mean - best - xi;
    if sd <= 1e-12 {
        return gain.max(0.0);
    }
    let z = gain / sd;
    gain * norm_cdf(z) + sd * norm_pdf(z)
}

/// Hyperparameters of the squared-exponential kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub length_scale: f64,
    pub signal_variance: f64,
    /// Observation noise variance added to the diagonal.
    pub noise_variance: f64,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            length_scale: 0.25,
            signal_variance: 1.0,
            noise_variance: 0.05,
        }
    }
}

impl KernelParams {
    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let diff = &a - &b;
        let d2 = diff.dot(&diff);
        self.signal_variance * (-d2 / (2.0 * self.length_scale * self.length_scale)).exp()
    }
}

/// A fitted GP posterior.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    params: KernelParams,
    /// One observed input per row.
    points: Array2<f64>,
    /// Lower-triangular Cholesky factor of K + noise*I.
    chol: Array2<f64>,
    /// (K + noise*I)^-1 y
    weights: Array1<f64>,
}

impl GaussianProcess {
    /// Fit to observations. Returns `None` for empty input or a kernel matrix
    /// that is not positive definite.
    pub fn fit(points: &[Point], values: &[f64], params: KernelParams) -> Option<Self> {
        if points.is_empty() || points.len() != values.len() {
            return None;
        }
        let n = points.len();
        let points = Array2::from_shape_fn((n, DIMS), |(i, d)| points[i][d]);

        let mut k = Array2::from_shape_fn((n, n), |(i, j)| {
            params.kernel(points.row(i), points.row(j))
        });
        k.diag_mut()
            .mapv_inplace(|v| v + params.noise_variance + 1e-9);

        let chol = cholesky(&k)?;
        let z = forward_substitute(&chol, &Array1::from_vec(values.to_vec()));
        let weights = back_substitute_transposed(&chol, &z);

        Some(Self {
            params,
            points,
            chol,
            weights,
        })
    }

    /// Posterior mean and standard deviation at `x`.
    pub fn predict(&self, x: &Point) -> (f64, f64) {
        let x = ArrayView1::from(&x[..]);
        let k_star: Array1<f64> = self
            .points
            .rows()
            .into_iter()
            .map(|p| self.params.kernel(p, x))
            .collect();
        let mean = k_star.dot(&self.weights);
        let v = forward_substitute(&self.chol, &k_star);
        let var = self.params.signal_variance - v.dot(&v);
        (mean, var.max(1e-12).sqrt())
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }
}

fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum = l.row(i).slice(s![..j]).dot(&l.row(j).slice(s![..j]));
            if i == j {
                let d = a[[i, i]] - sum;
                if d <= 0.0 || !d.is_finite() {
                    return None;
                }
                l[[i, j]] = d.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve L z = b.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum = l.row(i).slice(s![..i]).dot(&z.slice(s![..i]));
        z[i] = (b[i] - sum) / l[[i, i]];
    }
    z
}

/// Solve L^T x = z.
fn back_substitute_transposed(l: &Array2<f64>, z: &Array1<f64>) -> Array1<f64> {
    let n = z.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum = l.column(i).slice(s![i + 1..]).dot(&x.slice(s![i + 1..]));
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_distribution_reference_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((norm_cdf(-1.0) - 0.158_655).abs() < 1e-3);
        assert!((norm_pdf(0.0) - 0.398_942).abs() < 1e-6);
    }

    #[test]
    fn posterior_interpolates_observations() {
        let points = vec![[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, 1.0]];
        let values = vec![-1.0, 1.0];
        let params = KernelParams {
            noise_variance: 1e-6,
            ..Default::default()
        };
        let gp = GaussianProcess::fit(&points, &values, params).unwrap();

        let (m0, s0) = gp.predict(&points[0]);
        let (m1, _) = gp.predict(&points[1]);
        assert!((m0 + 1.0).abs() < 1e-3);
        assert!((m1 - 1.0).abs() < 1e-3);
        assert!(s0 < 0.01);

        let (_, far_sd) = gp.predict(&[0.5, 0.5, 0.5, 0.5]);
        assert!(far_sd > s0);
    }

    #[test]
    fn expected_improvement_prefers_high_mean_and_uncertainty() {
        let best = 0.0;
        assert!(expected_improvement(1.0, 0.1, best, 0.0) > expected_improvement(0.5, 0.1, best, 0.0));
        assert!(expected_improvement(0.0, 1.0, best, 0.0) > expected_improvement(0.0, 0.1, best, 0.0));
        assert_eq!(expected_improvement(-1.0, 0.0, best, 0.0), 0.0);
        assert!(expected_improvement(-1.0, 0.5, best, 0.0) >= 0.0);
    }

    #[test]
    fn cholesky_factor_reconstructs_matrix() {
        let a = ndarray::arr2(&[[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]]);
        let l = cholesky(&a).unwrap();
        assert_eq!(l[[0, 1]], 0.0);
        let rebuilt = l.dot(&l.t());
        for (x, y) in rebuilt.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-12);
        }

        let b = ndarray::arr1(&[1.0, -2.0, 0.5]);
        let x = back_substitute_transposed(&l, &forward_substitute(&l, &b));
        let residual = a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-12));

        let indefinite = ndarray::arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(cholesky(&indefinite).is_none());
    }

    #[test]
    fn fit_rejects_mismatched_input() {
        let params = KernelParams::default();
        assert!(GaussianProcess::fit(&[], &[], params).is_none());
        assert!(GaussianProcess::fit(&[[0.0; DIMS]], &[1.0, 2.0], params).is_none());
    }
}
