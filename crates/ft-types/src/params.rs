//! Placer tuning knobs and the discrete domains they are drawn from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{FtError, FtResult};
use crate::validation_error;

pub const ALPHA_FLAG: &str = "--placer-heap-alpha";
pub const BETA_FLAG: &str = "--placer-heap-beta";
pub const CRIT_EXP_FLAG: &str = "--placer-heap-critexp";
pub const TIMING_WEIGHT_FLAG: &str = "--placer-heap-timingweight";

/// One concrete setting of the four heap-placer knobs.
///
/// In code only a [`SearchSpace`] can build one, so every value is a member of
/// its domain. A deserialized set is only known to hold finite values; use
/// [`SearchSpace::point_of`] to check it against a particular space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSetRepr")]
pub struct ParameterSet {
    alpha: f64,
    beta: f64,
    crit_exp: i64,
    timing_weight: i64,
}

#[derive(Deserialize)]
struct ParameterSetRepr {
    alpha: f64,
    beta: f64,
    crit_exp: i64,
    timing_weight: i64,
}

impl TryFrom<ParameterSetRepr> for ParameterSet {
    type Error = FtError;

    fn try_from(repr: ParameterSetRepr) -> FtResult<Self> {
        if !(repr.alpha.is_finite() && repr.beta.is_finite()) {
            return Err(validation_error!(
                "parameter set holds non-finite alpha={} beta={}",
                repr.alpha,
                repr.beta
            ));
        }
        Ok(Self {
            alpha: repr.alpha,
            beta: repr.beta,
            crit_exp: repr.crit_exp,
            timing_weight: repr.timing_weight,
        })
    }
}

impl ParameterSet {
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn crit_exp(&self) -> i64 {
        self.crit_exp
    }

    pub fn timing_weight(&self) -> i64 {
        self.timing_weight
    }

    /// The tool flags selecting this parameter set, in fixed order.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            ALPHA_FLAG.to_string(),
            self.alpha.to_string(),
            BETA_FLAG.to_string(),
            self.beta.to_string(),
            CRIT_EXP_FLAG.to_string(),
            self.crit_exp.to_string(),
            TIMING_WEIGHT_FLAG.to_string(),
            self.timing_weight.to_string(),
        ]
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alpha={} beta={} critexp={} timingweight={}",
            self.alpha, self.beta, self.crit_exp, self.timing_weight
        )
    }
}

/// Position of a parameter set inside a [`SearchSpace`], as one index per
/// domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint(pub [usize; 4]);

/// The four explicit, ordered knob domains.
///
/// Deserialization applies the same domain checks as [`SearchSpace::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SearchSpaceRepr")]
pub struct SearchSpace {
    alpha: Vec<f64>,
    beta: Vec<f64>,
    crit_exp: Vec<i64>,
    timing_weight: Vec<i64>,
}

impl SearchSpace {
    pub fn new(
        alpha: Vec<f64>,
        beta: Vec<f64>,
        crit_exp: Vec<i64>,
        timing_weight: Vec<i64>,
    ) -> FtResult<Self> {
        let space = Self {
            alpha,
            beta,
            crit_exp,
            timing_weight,
        };
        space.validate()?;
        Ok(space)
    }

    /// Every domain is non-empty and free of repeats; float domains are finite.
    pub fn validate(&self) -> FtResult<()> {
        check_float_domain("alpha", &self.alpha)?;
        check_float_domain("beta", &self.beta)?;
        check_int_domain("critexp", &self.crit_exp)?;
        check_int_domain("timingweight", &self.timing_weight)
    }

    pub fn alpha_domain(&self) -> &[f64] {
        &self.alpha
    }

    pub fn beta_domain(&self) -> &[f64] {
        &self.beta
    }

    pub fn crit_exp_domain(&self) -> &[i64] {
        &self.crit_exp
    }

    pub fn timing_weight_domain(&self) -> &[i64] {
        &self.timing_weight
    }

    /// Build a parameter set, rejecting any value outside its domain.
    pub fn parameter_set(
        &self,
        alpha: f64,
        beta: f64,
        crit_exp: i64,
        timing_weight: i64,
    ) -> FtResult<ParameterSet> {
        let set = ParameterSet {
            alpha,
            beta,
            crit_exp,
            timing_weight,
        };
        self.point_of(&set)
            .map(|_| set)
            .ok_or_else(|| validation_error!("{set} is outside the search space"))
    }

    /// Number of values in each domain.
    pub fn dims(&self) -> [usize; 4] {
        [
            self.alpha.len(),
            self.beta.len(),
            self.crit_exp.len(),
            self.timing_weight.len(),
        ]
    }

    /// Total number of distinct parameter sets.
    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The parameter set at `point`, or `None` if any index is out of range.
    pub fn at(&self, point: GridPoint) -> Option<ParameterSet> {
        let [a, b, c, t] = point.0;
        Some(ParameterSet {
            alpha: *self.alpha.get(a)?,
            beta: *self.beta.get(b)?,
            crit_exp: *self.crit_exp.get(c)?,
            timing_weight: *self.timing_weight.get(t)?,
        })
    }

    pub fn point_of(&self, set: &ParameterSet) -> Option<GridPoint> {
        Some(GridPoint([
            self.alpha.iter().position(|v| *v == set.alpha)?,
            self.beta.iter().position(|v| *v == set.beta)?,
            self.crit_exp.iter().position(|v| *v == set.crit_exp)?,
            self.timing_weight
                .iter()
                .position(|v| *v == set.timing_weight)?,
        ]))
    }

    /// Map a linear index in `0..len()` to a grid point (last domain varies
    /// fastest).
    pub fn point_at_index(&self, mut index: usize) -> Option<GridPoint> {
        if index >= self.len() {
            return None;
        }
        let dims = self.dims();
        let mut coords = [0usize; 4];
        for axis in (0..4).rev() {
            coords[axis] = index % dims[axis];
            index /= dims[axis];
        }
        Some(GridPoint(coords))
    }

    /// The tuning the tool flow used before any optimization was run.
    pub fn default_parameters(&self) -> FtResult<ParameterSet> {
        self.parameter_set(0.025, 0.5, 3, 11)
    }
}

#[derive(Deserialize)]
struct SearchSpaceRepr {
    alpha: Vec<f64>,
    beta: Vec<f64>,
    crit_exp: Vec<i64>,
    timing_weight: Vec<i64>,
}

impl TryFrom<SearchSpaceRepr> for SearchSpace {
    type Error = FtError;

    fn try_from(repr: SearchSpaceRepr) -> FtResult<Self> {
        Self::new(repr.alpha, repr.beta, repr.crit_exp, repr.timing_weight)
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            alpha: vec![0.0125, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.25, 0.3],
            beta: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9],
            crit_exp: (1..=8).collect(),
            timing_weight: (1..=20).collect(),
        }
    }
}

fn check_float_domain(name: &str, values: &[f64]) -> FtResult<()> {
    if values.is_empty() {
        return Err(validation_error!("{name} domain is empty"));
    }
    for (i, v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(validation_error!("{name} domain holds non-finite {v}"));
        }
        if values[..i].contains(v) {
            return Err(validation_error!("{name} domain repeats {v}"));
        }
    }
    Ok(())
}

fn check_int_domain(name: &str, values: &[i64]) -> FtResult<()> {
    if values.is_empty() {
        return Err(validation_error!("{name} domain is empty"));
    }
    for (i, v) in values.iter().enumerate() {
        if values[..i].contains(v) {
            return Err(validation_error!("{name} domain repeats {v}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_space() -> SearchSpace {
        SearchSpace::new(vec![0.1, 0.2], vec![0.5], vec![1, 2, 3], vec![10, 11]).unwrap()
    }

    #[test]
    fn rejects_values_outside_domain() {
        let space = small_space();
        assert!(space.parameter_set(0.1, 0.5, 2, 10).is_ok());
        assert!(space.parameter_set(0.15, 0.5, 2, 10).is_err());
        assert!(space.parameter_set(0.1, 0.5, 4, 10).is_err());
    }

    #[test]
    fn rejects_empty_or_repeated_domains() {
        assert!(SearchSpace::new(vec![], vec![0.5], vec![1], vec![1]).is_err());
        assert!(SearchSpace::new(vec![0.1, 0.1], vec![0.5], vec![1], vec![1]).is_err());
        assert!(SearchSpace::new(vec![f64::NAN], vec![0.5], vec![1], vec![1]).is_err());
        assert!(SearchSpace::new(vec![0.1], vec![0.5], vec![2, 2], vec![1]).is_err());
    }

    #[test]
    fn deserialized_space_is_checked_like_a_built_one() {
        let space: SearchSpace = serde_json::from_str(
            r#"{"alpha":[0.1,0.2],"beta":[0.5],"crit_exp":[1,2,3],"timing_weight":[10,11]}"#,
        )
        .unwrap();
        assert_eq!(space, small_space());

        for text in [
            r#"{"alpha":[],"beta":[0.5],"crit_exp":[1],"timing_weight":[1]}"#,
            r#"{"alpha":[0.1,0.1],"beta":[0.5],"crit_exp":[1],"timing_weight":[1]}"#,
            r#"{"alpha":[0.1],"beta":[0.5],"crit_exp":[1],"timing_weight":[4,4]}"#,
        ] {
            let err = serde_json::from_str::<SearchSpace>(text).unwrap_err();
            assert!(err.to_string().contains("domain"), "{text}: {err}");
        }
    }

    #[test]
    fn deserialized_parameter_set_must_be_finite() {
        let set = small_space().parameter_set(0.2, 0.5, 3, 11).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(serde_json::from_str::<ParameterSet>(&json).unwrap(), set);

        let repr = ParameterSetRepr {
            alpha: f64::INFINITY,
            beta: 0.5,
            crit_exp: 3,
            timing_weight: 11,
        };
        assert!(matches!(ParameterSet::try_from(repr), Err(FtError::Validation(_))));
    }

    #[test]
    fn linear_index_covers_every_point_once() {
        let space = small_space();
        assert_eq!(space.len(), 12);

        let mut seen = std::collections::HashSet::new();
        for i in 0..space.len() {
            let point = space.point_at_index(i).unwrap();
            let set = space.at(point).unwrap();
            assert_eq!(space.point_of(&set), Some(point));
            assert!(seen.insert(point));
        }
        assert!(space.point_at_index(12).is_none());
    }

    #[test]
    fn args_follow_fixed_flag_order() {
        let set = SearchSpace::default().default_parameters().unwrap();
        assert_eq!(
            set.to_args(),
            vec![
                "--placer-heap-alpha",
                "0.025",
                "--placer-heap-beta",
                "0.5",
                "--placer-heap-critexp",
                "3",
                "--placer-heap-timingweight",
                "11",
            ]
        );
    }

    #[test]
    fn display_names_every_knob() {
        let set = small_space().parameter_set(0.2, 0.5, 3, 11).unwrap();
        assert_eq!(set.to_string(), "alpha=0.2 beta=0.5 critexp=3 timingweight=11");
    }
}
