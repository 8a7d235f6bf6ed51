//! Tunable constants of the JMLE calibration.
//!
//! Every threshold the estimator uses lives here so a deployment can adjust
//! it without touching the algorithm. The defaults reproduce the reference
//! calibration behaviour.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

pub const DEFAULT_PASS_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MIN_P_VALUE: f64 = 0.05;
pub const DEFAULT_MAX_P_VALUE: f64 = 0.95;
pub const DEFAULT_MIN_RESPONDENTS: usize = 200;
pub const DEFAULT_MIN_ITEMS: usize = 3;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_CONVERGENCE_TOLERANCE: f64 = 0.01;
pub const DEFAULT_NEWTON_MAX_ITERATIONS: usize = 20;
pub const DEFAULT_NEWTON_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_FLATNESS_EPSILON: f64 = 1e-10;
pub const DEFAULT_DAMPING: f64 = 0.5;
pub const DEFAULT_INITIAL_DISCRIMINATION: f64 = 1.0;
pub const DEFAULT_INIT_PROBABILITY_FLOOR: f64 = 0.01;
pub const DEFAULT_INFORMATION_EPSILON: f64 = 1e-10;

/// Closed interval a parameter is clamped into after every update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

pub const THETA_BOUNDS: Bounds = Bounds::new(-4.0, 4.0);
pub const DIFFICULTY_BOUNDS: Bounds = Bounds::new(-4.0, 4.0);
pub const DISCRIMINATION_BOUNDS: Bounds = Bounds::new(0.1, 4.0);

/// Stopping rules shared by every one-dimensional Newton-Raphson solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    /// Stop once the absolute step falls below this.
    pub tolerance: f64,
    /// Stop when the second derivative is flatter than this.
    pub flatness_epsilon: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_NEWTON_MAX_ITERATIONS,
            tolerance: DEFAULT_NEWTON_TOLERANCE,
            flatness_epsilon: DEFAULT_FLATNESS_EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Normalized scores at or above this count as correct.
    pub pass_threshold: f64,
    pub min_p_value: f64,
    pub max_p_value: f64,
    pub min_respondents: usize,
    pub min_items: usize,
    pub max_iterations: usize,
    /// A round whose largest parameter change is below this has converged.
    pub convergence_tolerance: f64,
    pub newton: NewtonConfig,
    /// Fraction of the Newton step applied to item parameters.
    pub damping: f64,
    pub initial_discrimination: f64,
    /// Proportions are clamped into `[floor, 1 - floor]` before the logit.
    pub init_probability_floor: f64,
    pub theta_bounds: Bounds,
    pub difficulty_bounds: Bounds,
    pub discrimination_bounds: Bounds,
    pub information_epsilon: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            min_p_value: DEFAULT_MIN_P_VALUE,
            max_p_value: DEFAULT_MAX_P_VALUE,
            min_respondents: DEFAULT_MIN_RESPONDENTS,
            min_items: DEFAULT_MIN_ITEMS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_tolerance: DEFAULT_CONVERGENCE_TOLERANCE,
            newton: NewtonConfig::default(),
            damping: DEFAULT_DAMPING,
            initial_discrimination: DEFAULT_INITIAL_DISCRIMINATION,
            init_probability_floor: DEFAULT_INIT_PROBABILITY_FLOOR,
            theta_bounds: THETA_BOUNDS,
            difficulty_bounds: DIFFICULTY_BOUNDS,
            discrimination_bounds: DISCRIMINATION_BOUNDS,
            information_epsilon: DEFAULT_INFORMATION_EPSILON,
        }
    }
}

impl CalibrationConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, CalibrationError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        let invalid = |msg: String| Err(CalibrationError::InvalidConfig(msg));

        if !self.pass_threshold.is_finite() {
            return invalid(format!("pass_threshold must be finite, got {}", self.pass_threshold));
        }
        let (min_p, max_p) = (self.min_p_value, self.max_p_value);
        if !(0.0 < min_p && min_p < max_p && max_p < 1.0) {
            return invalid(format!(
                "p-value window must satisfy 0 < min < max < 1, got [{}, {}]",
                self.min_p_value, self.max_p_value
            ));
        }
        if self.min_items == 0 || self.min_respondents == 0 {
            return invalid("minimum respondent and item counts must be positive".to_string());
        }
        if self.max_iterations == 0 || self.newton.max_iterations == 0 {
            return invalid("iteration limits must be positive".to_string());
        }
        for (name, value) in [
            ("convergence_tolerance", self.convergence_tolerance),
            ("newton.tolerance", self.newton.tolerance),
            ("newton.flatness_epsilon", self.newton.flatness_epsilon),
            ("information_epsilon", self.information_epsilon),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be a positive number, got {value}"));
            }
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return invalid(format!("damping must lie in (0, 1], got {}", self.damping));
        }
        if !(self.init_probability_floor > 0.0 && self.init_probability_floor < 0.5) {
            return invalid(format!(
                "init_probability_floor must lie in (0, 0.5), got {}",
                self.init_probability_floor
            ));
        }
        for (name, bounds) in [
            ("theta_bounds", self.theta_bounds),
            ("difficulty_bounds", self.difficulty_bounds),
            ("discrimination_bounds", self.discrimination_bounds),
        ] {
            let finite = bounds.lower.is_finite() && bounds.upper.is_finite();
            if !(finite && bounds.lower < bounds.upper) {
                return invalid(format!(
                    "{name} must be a finite, non-empty interval, got [{}, {}]",
                    bounds.lower, bounds.upper
                ));
            }
        }
        if !self.theta_bounds.contains(0.0) {
            return invalid("theta_bounds must contain 0 for mean-centering".to_string());
        }
        if self.discrimination_bounds.lower <= 0.0 {
            return invalid("discrimination_bounds must be strictly positive".to_string());
        }
        if !self.discrimination_bounds.contains(self.initial_discrimination) {
            return invalid(format!(
                "initial_discrimination {} lies outside discrimination_bounds",
                self.initial_discrimination
            ));
        }
        Ok(())
    }
}
