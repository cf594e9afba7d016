//! Candidate proposal strategies over the discrete placer grid.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use ft_types::{GridPoint, ParameterSet, SearchSpace};

use crate::surrogate::{expected_improvement, GaussianProcess, KernelParams, Point, DIMS};

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Propose up to `count` parameter sets that have never been proposed or
    /// reported before. Fewer are returned once the space runs out.
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet>;

    /// Feed back the score observed for `params`.
    fn report(&mut self, params: &ParameterSet, score: f64);

    fn name(&self) -> &str;
}

/// Selectable strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Bayesian,
    Random,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bayesian => write!(f, "bayesian"),
            Self::Random => write!(f, "random"),
        }
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draw up to `count` distinct grid points not in `tried`.
fn sample_untried<R: Rng>(
    space: &SearchSpace,
    tried: &HashSet<GridPoint>,
    count: usize,
    rng: &mut R,
) -> Vec<GridPoint> {
    let total = space.len();
    let remaining = total.saturating_sub(tried.len());
    let wanted = count.min(remaining);
    if wanted == 0 {
        return Vec::new();
    }

    if remaining <= wanted.saturating_mul(4) {
        let mut pool: Vec<GridPoint> = (0..total)
            .filter_map(|i| space.point_at_index(i))
            .filter(|p| !tried.contains(p))
            .collect();
        pool.shuffle(rng);
        pool.truncate(wanted);
        return pool;
    }

    // At least three in four draws hit an untried point here.
    let mut picked = HashSet::with_capacity(wanted);
    let mut out = Vec::with_capacity(wanted);
    while out.len() < wanted {
        let Some(point) = space.point_at_index(rng.gen_range(0..total)) else {
            continue;
        };
        if !tried.contains(&point) && picked.insert(point) {
            out.push(point);
        }
    }
    out
}

fn to_parameter_sets(space: &SearchSpace, points: &[GridPoint]) -> Vec<ParameterSet> {
    points.iter().filter_map(|p| space.at(*p)).collect()
}

// ---- Random search ----

/// Uniform sampling of untried grid points.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: StdRng,
    tried: HashSet<GridPoint>,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: Option<u64>) -> Self {
        Self {
            space,
            rng: make_rng(seed),
            tried: HashSet::new(),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let points = sample_untried(&self.space, &self.tried, count, &mut self.rng);
        self.tried.extend(points.iter().copied());
        to_parameter_sets(&self.space, &points)
    }

    fn report(&mut self, params: &ParameterSet, _score: f64) {
        if let Some(point) = self.space.point_of(params) {
            self.tried.insert(point);
        }
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Bayesian search ----

/// Tuning of the surrogate-driven search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BayesianConfig {
    pub length_scale: f64,
    pub noise_variance: f64,
    /// Minimum improvement (in standardized score units) worth exploring for.
    pub exploration: f64,
    /// Upper bound on the untried points scored per proposal.
    pub candidate_pool: usize,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        let kernel = KernelParams::default();
        Self {
            length_scale: kernel.length_scale,
            noise_variance: kernel.noise_variance,
            exploration: 0.01,
            candidate_pool: 2048,
        }
    }
}

impl BayesianConfig {
    fn kernel(&self) -> KernelParams {
        KernelParams {
            length_scale: self.length_scale,
            noise_variance: self.noise_variance,
            ..KernelParams::default()
        }
    }
}

/// Gaussian-process search with expected-improvement acquisition.
///
/// Batches are filled with the constant-liar heuristic: each pick is added to
/// the surrogate with the mean observed score before the next pick is ranked.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    space: SearchSpace,
    config: BayesianConfig,
    rng: StdRng,
    tried: HashSet<GridPoint>,
    observations: Vec<(GridPoint, f64)>,
}

impl BayesianSearch {
    pub fn new(space: SearchSpace, config: BayesianConfig, seed: Option<u64>) -> Self {
        Self {
            space,
            config,
            rng: make_rng(seed),
            tried: HashSet::new(),
            observations: Vec::new(),
        }
    }

    pub fn observations(&self) -> usize {
        self.observations.len()
    }

    /// Domain indices scaled into the unit hypercube.
    fn coords(&self, point: GridPoint) -> Point {
        let dims = self.space.dims();
        let mut x = [0.0; DIMS];
        for axis in 0..DIMS {
            if dims[axis] > 1 {
                x[axis] = point.0[axis] as f64 / (dims[axis] - 1) as f64;
            }
        }
        x
    }

    /// Observed scores, standardized. Non-finite scores (failed candidates)
    /// are pinned just below the worst finite one.
    fn standardized_scores(&self) -> Vec<f64> {
        let finite: Vec<f64> = self
            .observations
            .iter()
            .map(|(_, s)| *s)
            .filter(|s| s.is_finite())
            .collect();
        if finite.is_empty() {
            return vec![0.0; self.observations.len()];
        }

        let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let floor = lo - (hi - lo).max(1.0);
        let raw: Vec<f64> = self
            .observations
            .iter()
            .map(|(_, s)| if s.is_finite() { *s } else { floor })
            .collect();

        let n = raw.len() as f64;
        let mean = raw.iter().sum::<f64>() / n;
        let var = raw.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let sd = if var.sqrt() < 1e-12 { 1.0 } else { var.sqrt() };
        raw.iter().map(|v| (v - mean) / sd).collect()
    }

    fn propose(&mut self, count: usize) -> Vec<GridPoint> {
        let mut candidates = sample_untried(
            &self.space,
            &self.tried,
            self.config.candidate_pool.max(count),
            &mut self.rng,
        );

        let mut points: Vec<Point> = self.observations.iter().map(|(p, _)| self.coords(*p)).collect();
        let mut scores = self.standardized_scores();
        let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lie = scores.iter().sum::<f64>() / scores.len() as f64;
        let kernel = self.config.kernel();

        let mut batch = Vec::with_capacity(count);
        while batch.len() < count && !candidates.is_empty() {
            let Some(gp) = GaussianProcess::fit(&points, &scores, kernel) else {
                warn!(
                    observations = points.len(),
                    "surrogate fit failed, filling batch randomly"
                );
                let missing = count - batch.len();
                batch.extend(candidates.into_iter().take(missing));
                break;
            };

            let mut chosen = 0;
            let mut chosen_ei = f64::NEG_INFINITY;
            for (i, candidate) in candidates.iter().enumerate() {
                let (mean, sd) = gp.predict(&self.coords(*candidate));
                let ei = expected_improvement(mean, sd, best, self.config.exploration);
                if ei > chosen_ei {
                    chosen = i;
                    chosen_ei = ei;
                }
            }

            let point = candidates.swap_remove(chosen);
            debug!(?point, ei = chosen_ei, "selected candidate");
            points.push(self.coords(point));
            scores.push(lie);
            batch.push(point);
        }
        batch
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let points = if self.observations.is_empty() {
            sample_untried(&self.space, &self.tried, count, &mut self.rng)
        } else {
            self.propose(count)
        };
        self.tried.extend(points.iter().copied());
        to_parameter_sets(&self.space, &points)
    }

    fn report(&mut self, params: &ParameterSet, score: f64) {
        let Some(point) = self.space.point_of(params) else {
            warn!(%params, "ignoring score for a point outside the search space");
            return;
        };
        self.tried.insert(point);
        self.observations.push((point, score));
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}
