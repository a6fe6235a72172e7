//! Adaptive multiple precision: the precision criteria checked while
//! predicting and correcting, and the joint choice of precision and step
//! size after each step.
//!
//! Every quantity is handled as a `log10` in `f64`, so magnitudes produced
//! at high precision never overflow.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numeric::{DOUBLE_PRECISION, LOWEST_MULTIPLE_PRECISION, MAX_PRECISION_ALLOWED, PRECISION_INCREMENT};
use crate::system::System;

/// Bounds describing a system, and the safety margins applied on top of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmpConfig {
    /// Bound on the magnitude of the system's coefficients.
    pub coefficient_bound: f64,
    /// Bound on the total degree of the system's functions.
    pub degree_bound: f64,
    /// Relative error factor of a single arithmetic operation, in units of the machine epsilon.
    pub epsilon: f64,
    /// Error growth bound of evaluating the Jacobian, `D(D-1)B`.
    pub phi: f64,
    /// Error growth bound of evaluating the functions, `D·B`.
    pub psi: f64,
    pub safety_digits_1: i32,
    pub safety_digits_2: i32,
    pub maximum_precision: u32,
    pub consecutive_successful_steps_before_precision_decrease: u32,
    pub max_num_precision_decreases: u32,
}

impl Default for AmpConfig {
    fn default() -> Self {
        Self::with_bounds(1000.0, 5.0)
    }
}

impl AmpConfig {
    /// Default margins, with `phi` and `psi` derived from the two bounds.
    pub fn with_bounds(coefficient_bound: f64, degree_bound: f64) -> Self {
        Self {
            coefficient_bound,
            degree_bound,
            epsilon: 1.0,
            phi: degree_bound * (degree_bound - 1.0) * coefficient_bound,
            psi: degree_bound * coefficient_bound,
            safety_digits_1: 1,
            safety_digits_2: 1,
            maximum_precision: 300,
            consecutive_successful_steps_before_precision_decrease: 10,
            max_num_precision_decreases: 10,
        }
    }

    /// Bounds measured from `system`: its largest function degree and the
    /// largest Jacobian entry seen at a few random points.
    pub fn from_system<R: Rng + ?Sized>(system: &System, rng: &mut R) -> Result<Self> {
        let degree_bound = system.degree_bound().max(1) as f64;
        let coefficient_bound = system.coefficient_bound(10, rng)?;
        Ok(Self::with_bounds(coefficient_bound, degree_bound))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.coefficient_bound > 0.0 && self.degree_bound > 0.0) {
            return Err(Error::InvalidConfiguration(
                "AMP bounds must be positive".to_string(),
            ));
        }
        if !(self.epsilon > 0.0 && self.phi >= 0.0 && self.psi >= 0.0) {
            return Err(Error::InvalidConfiguration(
                "AMP error factors must be non-negative".to_string(),
            ));
        }
        if self.maximum_precision < DOUBLE_PRECISION || self.maximum_precision > MAX_PRECISION_ALLOWED {
            return Err(Error::InvalidConfiguration(format!(
                "maximum precision {} outside [{}, {}]",
                self.maximum_precision, DOUBLE_PRECISION, MAX_PRECISION_ALLOWED
            )));
        }
        Ok(())
    }

    /// The precision ceiling actually enforced.
    pub fn precision_ceiling(&self) -> u32 {
        self.maximum_precision.min(MAX_PRECISION_ALLOWED)
    }
}

/// `log10(10^a + 10^b)`.
fn log10_sum(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return hi;
    }
    hi + (1.0 + 10f64.powf(lo - hi)).log10()
}

/// `log10(‖J⁻¹‖·((2+ε)‖J‖ + εΦ) + 1)`: the digits lost to conditioning
/// when solving with the Jacobian.
pub fn conditioning_digits(norm_j_log10: f64, norm_j_inverse_log10: f64, config: &AmpConfig) -> f64 {
    let scaled_j = (2.0 + config.epsilon).log10() + norm_j_log10;
    let inner = log10_sum(scaled_j, (config.epsilon * config.phi).log10());
    log10_sum(norm_j_inverse_log10 + inner, 0.0)
}

/// Precision check applied to the linear solve of a predictor stage.
pub fn predictor_criterion(digits: u32, norm_j_log10: f64, norm_j_inverse_log10: f64, config: &AmpConfig) -> bool {
    digits as f64 > config.safety_digits_1 as f64 + conditioning_digits(norm_j_log10, norm_j_inverse_log10, config)
}

/// Criterion B: the remaining Newton iterations can still reach the
/// tracking tolerance at this precision.
pub fn criterion_b(
    digits: u32,
    norm_j_log10: f64,
    norm_j_inverse_log10: f64,
    iterations_remaining: u32,
    tracking_tolerance: f64,
    norm_of_step_log10: f64,
    config: &AmpConfig,
) -> bool {
    let tau = -tracking_tolerance.log10();
    let remaining = iterations_remaining.max(1) as f64;
    let rhs = config.safety_digits_1 as f64
        + conditioning_digits(norm_j_log10, norm_j_inverse_log10, config)
        + (tau + norm_of_step_log10) / remaining;
    digits as f64 > rhs
}

/// Criterion C: the precision carries enough digits to represent a
/// correction at the tracking tolerance relative to the point.
pub fn criterion_c(
    digits: u32,
    norm_j_inverse_log10: f64,
    norm_z_log10: f64,
    tracking_tolerance: f64,
    config: &AmpConfig,
) -> bool {
    digits as f64 > criterion_c_digits(norm_j_inverse_log10, norm_z_log10, tracking_tolerance, config)
}

fn criterion_c_digits(norm_j_inverse_log10: f64, norm_z_log10: f64, tracking_tolerance: f64, config: &AmpConfig) -> f64 {
    let tau = -tracking_tolerance.log10();
    config.safety_digits_2 as f64
        + tau
        + log10_sum(norm_j_inverse_log10 + config.psi.log10(), norm_z_log10)
}

/// Relative cost of one arithmetic operation at `digits`.
pub fn precision_cost(digits: u32) -> f64 {
    if digits <= DOUBLE_PRECISION {
        1.0
    } else {
        10.35 + 0.13 * digits as f64
    }
}

/// Smallest allowed precision level at or above `digits`.
pub fn quantize_precision(digits: u32) -> u32 {
    if digits <= DOUBLE_PRECISION {
        DOUBLE_PRECISION
    } else if digits <= LOWEST_MULTIPLE_PRECISION {
        LOWEST_MULTIPLE_PRECISION
    } else {
        let steps = (digits - LOWEST_MULTIPLE_PRECISION).div_ceil(PRECISION_INCREMENT);
        LOWEST_MULTIPLE_PRECISION + steps * PRECISION_INCREMENT
    }
}

/// The precision level above `digits`.
pub fn next_precision_up(digits: u32) -> u32 {
    if digits < LOWEST_MULTIPLE_PRECISION {
        LOWEST_MULTIPLE_PRECISION
    } else {
        quantize_precision(digits) + PRECISION_INCREMENT
    }
}

/// Measurements taken at the end of a step, feeding the next choice.
#[derive(Debug, Clone, Copy)]
pub struct StepMeasurements {
    pub norm_j_log10: f64,
    pub norm_j_inverse_log10: f64,
    pub norm_z_log10: f64,
    /// `log10 a` where the local error behaves as `a·|Δt|^(p+1)`.
    pub size_proportion_log10: f64,
    pub predictor_order: u32,
    pub num_newton_iterations: u32,
    pub tracking_tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionAndStep {
    pub digits: u32,
    pub step_size: f64,
}

/// Estimates `log10 a` from the error estimate of the last step.
pub fn size_proportion_log10(error_estimate_log10: f64, step_size: f64, predictor_order: u32) -> f64 {
    error_estimate_log10 - (predictor_order as f64 + 1.0) * step_size.log10()
}

/// Chooses the precision level and step size with the least cost per unit
/// of path length. For each level the largest step allowed by
/// `(p+1)·log10|Δt| ≤ (P - σ₁ - D)·N - τ - log10 a` is taken, capped at
/// `max_step_size`; levels failing criterion C are skipped. Returns `None`
/// when no level up to the ceiling admits a positive step.
pub fn choose_precision_and_step(
    measurements: &StepMeasurements,
    max_step_size: f64,
    min_digits: u32,
    config: &AmpConfig,
) -> Option<PrecisionAndStep> {
    let conditioning = conditioning_digits(measurements.norm_j_log10, measurements.norm_j_inverse_log10, config);
    let tau = -measurements.tracking_tolerance.log10();
    let n = measurements.num_newton_iterations.max(1) as f64;
    let order = measurements.predictor_order as f64;
    let c_digits = criterion_c_digits(
        measurements.norm_j_inverse_log10,
        measurements.norm_z_log10,
        measurements.tracking_tolerance,
        config,
    );

    let ceiling = config.precision_ceiling();
    let mut best: Option<(f64, PrecisionAndStep)> = None;
    let mut digits = quantize_precision(min_digits);
    while digits <= ceiling {
        if digits as f64 > c_digits {
            let log_step = ((digits as f64 - config.safety_digits_1 as f64 - conditioning) * n
                - tau
                - measurements.size_proportion_log10)
                / (order + 1.0);
            let step_size = 10f64.powf(log_step).min(max_step_size);
            if step_size > 0.0 && step_size.is_finite() {
                let rate = precision_cost(digits) / step_size;
                if best.map_or(true, |(r, _)| rate < r) {
                    best = Some((rate, PrecisionAndStep { digits, step_size }));
                }
            }
        }
        digits = next_precision_up(digits);
    }
    best.map(|(_, choice)| choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_derive_phi_and_psi() {
        let config = AmpConfig::default();
        assert_eq!(config.phi, 5.0 * 4.0 * 1000.0);
        assert_eq!(config.psi, 5.0 * 1000.0);
        assert_eq!(config.maximum_precision, 300);
        assert!(config.validate().is_ok());

        let mut bad = config;
        bad.maximum_precision = 5000;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn precision_levels() {
        assert_eq!(quantize_precision(10), 16);
        assert_eq!(quantize_precision(17), 30);
        assert_eq!(quantize_precision(31), 40);
        assert_eq!(quantize_precision(40), 40);
        assert_eq!(next_precision_up(16), 30);
        assert_eq!(next_precision_up(30), 40);
        assert!(precision_cost(16) < precision_cost(30));
    }

    #[test]
    fn criterion_b_fails_on_ill_conditioned_jacobian() {
        let config = AmpConfig::with_bounds(1.0, 2.0);
        assert!(criterion_b(16, 0.0, 1.0, 2, 1e-5, -6.0, &config));
        assert!(!criterion_b(16, 0.0, 15.0, 2, 1e-5, -6.0, &config));
        assert!(criterion_b(40, 0.0, 15.0, 2, 1e-5, -6.0, &config));
    }

    #[test]
    fn criterion_c_depends_on_tolerance_and_inverse_norm() {
        let config = AmpConfig::with_bounds(1.0, 2.0);
        assert!(criterion_c(16, 0.0, 0.0, 1e-5, &config));
        assert!(!criterion_c(16, 12.0, 0.0, 1e-5, &config));
        assert!(!criterion_c(16, 0.0, 0.0, 1e-15, &config));
    }

    #[test]
    fn well_conditioned_step_stays_in_double() {
        let config = AmpConfig::with_bounds(1.0, 2.0);
        let measurements = StepMeasurements {
            norm_j_log10: 0.0,
            norm_j_inverse_log10: 0.0,
            norm_z_log10: 0.0,
            size_proportion_log10: 0.0,
            predictor_order: 4,
            num_newton_iterations: 2,
            tracking_tolerance: 1e-6,
        };
        let choice = choose_precision_and_step(&measurements, 0.1, 16, &config).expect("feasible");
        assert_eq!(choice.digits, 16);
        assert!(choice.step_size > 0.0 && choice.step_size <= 0.1);
    }

    #[test]
    fn ill_conditioned_step_requires_multiple_precision() {
        let config = AmpConfig::with_bounds(1.0, 2.0);
        let measurements = StepMeasurements {
            norm_j_log10: 0.0,
            norm_j_inverse_log10: 14.0,
            norm_z_log10: 0.0,
            size_proportion_log10: 0.0,
            predictor_order: 4,
            num_newton_iterations: 2,
            tracking_tolerance: 1e-6,
        };
        let choice = choose_precision_and_step(&measurements, 0.1, 16, &config).expect("feasible");
        assert!(choice.digits >= 30);

        let mut capped = config;
        capped.maximum_precision = 16;
        assert!(choose_precision_and_step(&measurements, 0.1, 16, &capped).is_none());
    }
}
