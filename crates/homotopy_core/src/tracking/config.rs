//! Settings consumed by the tracker.

use serde::{Deserialize, Serialize};

use crate::amp::AmpConfig;
use crate::error::{Error, Result};
use crate::numeric::{DOUBLE_PRECISION, MAX_PRECISION_ALLOWED};

/// Step size control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteppingConfig {
    pub initial_step_size: f64,
    pub max_step_size: f64,
    pub min_step_size: f64,
    pub step_size_success_factor: f64,
    pub step_size_fail_factor: f64,
    pub consecutive_successful_steps_before_stepsize_increase: u32,
    pub min_num_steps: u64,
    pub max_num_steps: u64,
}

impl Default for SteppingConfig {
    fn default() -> Self {
        Self {
            initial_step_size: 0.1,
            max_step_size: 0.1,
            min_step_size: 1e-100,
            step_size_success_factor: 2.0,
            step_size_fail_factor: 0.5,
            consecutive_successful_steps_before_stepsize_increase: 5,
            min_num_steps: 1,
            max_num_steps: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewtonConfig {
    pub min_num_newton_iterations: u32,
    pub max_num_newton_iterations: u32,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            min_num_newton_iterations: 1,
            max_num_newton_iterations: 2,
        }
    }
}

/// Explicit integrator used for the prediction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predictor {
    Constant,
    Euler,
    Heun,
    RK4,
    RKNorsett34,
    RKF45,
    RKCashKarp45,
    RKDormandPrince56,
    RKVerner67,
}

impl Predictor {
    /// Order of the propagated solution.
    pub fn order(&self) -> u32 {
        match self {
            Predictor::Constant => 0,
            Predictor::Euler => 1,
            Predictor::Heun => 2,
            Predictor::RK4 | Predictor::RKNorsett34 => 4,
            Predictor::RKF45 | Predictor::RKCashKarp45 => 5,
            Predictor::RKDormandPrince56 => 6,
            Predictor::RKVerner67 => 7,
        }
    }

    /// Whether the method carries an embedded lower order solution.
    pub fn has_error_estimate(&self) -> bool {
        !matches!(self, Predictor::Constant | Predictor::Euler | Predictor::RK4)
    }
}

/// How the tracker chooses its working precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionMode {
    Double,
    /// A fixed number of digits in multiple precision throughout.
    Multiple(u32),
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub predictor: Predictor,
    pub tracking_tolerance: f64,
    pub path_truncation_threshold: f64,
    /// Distance to the end time under which the path is considered finished.
    pub end_time_tolerance: f64,
    pub precision: PrecisionMode,
    pub stepping: SteppingConfig,
    pub newton: NewtonConfig,
    pub amp: AmpConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            predictor: Predictor::RKF45,
            tracking_tolerance: 1e-5,
            path_truncation_threshold: 1e5,
            end_time_tolerance: 1e-14,
            precision: PrecisionMode::Adaptive,
            stepping: SteppingConfig::default(),
            newton: NewtonConfig::default(),
            amp: AmpConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfiguration(msg));
        if !(self.tracking_tolerance > 0.0) {
            return invalid(format!("tracking tolerance {} must be positive", self.tracking_tolerance));
        }
        if !(self.path_truncation_threshold > 0.0) {
            return invalid("path truncation threshold must be positive".to_string());
        }
        if !(self.end_time_tolerance >= 0.0) {
            return invalid("end time tolerance must be non-negative".to_string());
        }
        let s = &self.stepping;
        if !(s.min_step_size > 0.0 && s.min_step_size <= s.initial_step_size && s.initial_step_size <= s.max_step_size) {
            return invalid(format!(
                "step sizes must satisfy 0 < min ({}) <= initial ({}) <= max ({})",
                s.min_step_size, s.initial_step_size, s.max_step_size
            ));
        }
        if !(s.step_size_success_factor >= 1.0) {
            return invalid("step size success factor must be at least 1".to_string());
        }
        if !(s.step_size_fail_factor > 0.0 && s.step_size_fail_factor < 1.0) {
            return invalid("step size fail factor must lie in (0, 1)".to_string());
        }
        if s.min_num_steps > s.max_num_steps {
            return invalid("min_num_steps exceeds max_num_steps".to_string());
        }
        let n = &self.newton;
        if n.max_num_newton_iterations == 0 || n.min_num_newton_iterations > n.max_num_newton_iterations {
            return invalid(format!(
                "Newton iterations must satisfy min ({}) <= max ({}), max > 0",
                n.min_num_newton_iterations, n.max_num_newton_iterations
            ));
        }
        if let PrecisionMode::Multiple(digits) = self.precision {
            if digits <= DOUBLE_PRECISION || digits > MAX_PRECISION_ALLOWED {
                return invalid(format!(
                    "fixed multiple precision {} outside ({}, {}]",
                    digits, DOUBLE_PRECISION, MAX_PRECISION_ALLOWED
                ));
            }
        }
        self.amp.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let mut config = TrackerConfig::default();
        config.stepping.min_step_size = 1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let mut config = TrackerConfig::default();
        config.newton.min_num_newton_iterations = 5;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.precision = PrecisionMode::Multiple(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn predictor_orders() {
        assert_eq!(Predictor::Constant.order(), 0);
        assert_eq!(Predictor::RKF45.order(), 5);
        assert!(Predictor::RKCashKarp45.has_error_estimate());
        assert!(!Predictor::RK4.has_error_estimate());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TrackerConfig {
            precision: PrecisionMode::Multiple(50),
            ..TrackerConfig::default()
        };
        let text = serde_json::to_string(&config).expect("serialize");
        let back: TrackerConfig = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, config);
    }
}
