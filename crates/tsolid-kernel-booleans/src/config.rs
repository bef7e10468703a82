//! Tolerances and switches for one Boolean operation.

use serde::{Deserialize, Serialize};

use crate::error::{BooleanError, Result};

/// Boolean operation parameters.
///
/// Passed explicitly to every entry point; nothing is read from global
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanConfig {
    /// Solver subdivision (grid resolution) tolerance.
    pub subdiv_tolerance: f64,
    /// Solver numeric refinement tolerance.
    pub numeric_tolerance: f64,
    /// Solver tracing step tolerance.
    pub trace_tolerance: f64,
    /// Base UV end-point matching tolerance.
    pub match_tolerance: f64,
    /// Ceiling for the ×10 widening of the matching tolerance.
    pub match_tolerance_ceiling: f64,
    /// Closure and domain-boundary snapping distance for new curves.
    pub snap_tolerance: f64,
    /// Minimum UV distance between a split and a curve end or another split.
    pub split_tolerance: f64,
    /// Arc distance of the perturbed point used by the side test.
    pub perturb_distance: f64,
    /// Turn angle (radians) above which a polyline vertex is a sharp corner.
    pub corner_angle: f64,
    /// Fraction of the original domain extent kept around the trimming
    /// curves when domains are clipped.
    pub domain_margin: f64,
    /// Model-space coincidence tolerance for stitching merged boundaries.
    pub stitch_tolerance: f64,
    /// Return the intersection curves instead of a model.
    pub intersection_curves_only: bool,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        Self {
            subdiv_tolerance: 1e-2,
            numeric_tolerance: 1e-10,
            trace_tolerance: 1e-2,
            match_tolerance: 1e-6,
            match_tolerance_ceiling: 1e-2,
            snap_tolerance: 1e-5,
            split_tolerance: 1e-6,
            perturb_distance: 1e-3,
            corner_angle: 0.3,
            domain_margin: 0.01,
            stitch_tolerance: 1e-5,
            intersection_curves_only: false,
        }
    }
}

impl BooleanConfig {
    /// Set the solver tolerances.
    pub fn with_tolerances(mut self, subdiv: f64, numeric: f64, trace: f64) -> Self {
        self.subdiv_tolerance = subdiv;
        self.numeric_tolerance = numeric;
        self.trace_tolerance = trace;
        self
    }

    /// Switch the diagnostic intersection-curve mode on or off.
    pub fn with_intersection_curves_only(mut self, on: bool) -> Self {
        self.intersection_curves_only = on;
        self
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("subdiv_tolerance", self.subdiv_tolerance),
            ("numeric_tolerance", self.numeric_tolerance),
            ("trace_tolerance", self.trace_tolerance),
            ("match_tolerance", self.match_tolerance),
            ("match_tolerance_ceiling", self.match_tolerance_ceiling),
            ("snap_tolerance", self.snap_tolerance),
            ("split_tolerance", self.split_tolerance),
            ("perturb_distance", self.perturb_distance),
            ("corner_angle", self.corner_angle),
            ("stitch_tolerance", self.stitch_tolerance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(BooleanError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.match_tolerance_ceiling < self.match_tolerance {
            return Err(BooleanError::InvalidConfig(
                "match_tolerance_ceiling must not be below match_tolerance".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.domain_margin) {
            return Err(BooleanError::InvalidConfig(
                "domain_margin must be in [0, 1)".into(),
            ));
        }
        Ok(())
    }

    /// Parse from TOML; missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| BooleanError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Matching tolerances from the base value up to the ceiling, ×10 each step.
    pub(crate) fn widening_tolerances(&self) -> impl Iterator<Item = f64> {
        let ceiling = self.match_tolerance_ceiling;
        std::iter::successors(Some(self.match_tolerance), |t| Some(t * 10.0))
            .take_while(move |t| *t <= ceiling * (1.0 + 1e-9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        BooleanConfig::default().validate().unwrap();
    }

    #[test]
    fn test_with_tolerances() {
        let config = BooleanConfig::default()
            .with_tolerances(0.05, 1e-8, 0.02)
            .with_intersection_curves_only(true);
        assert_eq!(config.subdiv_tolerance, 0.05);
        assert_eq!(config.numeric_tolerance, 1e-8);
        assert_eq!(config.trace_tolerance, 0.02);
        assert!(config.intersection_curves_only);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = BooleanConfig::default();
        config.match_tolerance = 0.0;
        assert!(matches!(
            config.validate(),
            Err(BooleanError::InvalidConfig(_))
        ));

        let mut config = BooleanConfig::default();
        config.match_tolerance_ceiling = 1e-9;
        assert!(config.validate().is_err());

        let mut config = BooleanConfig::default();
        config.domain_margin = 1.5;
        assert!(config.validate().is_err());

        let mut config = BooleanConfig::default();
        config.perturb_distance = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = BooleanConfig::from_toml_str(
            "match_tolerance = 1e-7\nintersection_curves_only = true\n",
        )
        .unwrap();
        assert_eq!(config.match_tolerance, 1e-7);
        assert!(config.intersection_curves_only);
        assert_eq!(config.snap_tolerance, 1e-5);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(BooleanConfig::from_toml_str("match_tolerance = \"tight\"").is_err());
        assert!(BooleanConfig::from_toml_str("split_tolerance = -1.0").is_err());
    }

    #[test]
    fn test_widening_sequence() {
        let steps: Vec<f64> = BooleanConfig::default().widening_tolerances().collect();
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0], 1e-6);
        assert!((steps[4] - 1e-2).abs() < 1e-15);
    }
}
