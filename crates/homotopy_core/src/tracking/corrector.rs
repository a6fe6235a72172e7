//! Newton correction back onto the path at a fixed time.

use nalgebra::DVector;
use rand::Rng;

use super::config::NewtonConfig;
use super::SuccessCode;
use crate::amp::{criterion_b, criterion_c, AmpConfig};
use crate::error::Result;
use crate::linalg::{matrix_norm_log10, norm_log10, Lu, MatrixSuccessCode};
use crate::numeric::Scalar;
use crate::system::System;

/// Outcome of a correction. `point` holds the last iterate, which on
/// `Success` is the corrected point.
#[derive(Debug, Clone)]
pub struct Correction<T: Scalar> {
    pub code: SuccessCode,
    pub point: DVector<T>,
    pub num_iterations: u32,
    /// `log10 ‖Δx‖` of the last Newton update.
    pub norm_delta_log10: f64,
    /// Norms of the Jacobian and its inverse at the last iterate; only
    /// measured when running adaptively.
    pub norm_j_log10: f64,
    pub norm_j_inverse_log10: f64,
}

/// Runs Newton's method on `system` at `time` from `start`.
///
/// Stops with `Success` once `‖Δx‖ < tolerance` after at least the minimum
/// number of iterations, with `GoingToInfinity` when an iterate leaves the
/// ball of radius `truncation_threshold`, and with `MatrixSolveFailure` when
/// the Jacobian fails the pivot check. With `amp` set, criteria B and C are
/// checked after each update and a violation returns
/// `HigherPrecisionNecessary` without retrying.
#[allow(clippy::too_many_arguments)]
pub fn correct<T: Scalar, R: Rng + ?Sized>(
    system: &System,
    start: &DVector<T>,
    time: Option<&T>,
    tolerance: f64,
    truncation_threshold: f64,
    newton: &NewtonConfig,
    digits: u32,
    amp: Option<&AmpConfig>,
    rng: &mut R,
) -> Result<Correction<T>> {
    let mut result = Correction {
        code: SuccessCode::FailedToConverge,
        point: start.clone(),
        num_iterations: 0,
        norm_delta_log10: f64::INFINITY,
        norm_j_log10: f64::NAN,
        norm_j_inverse_log10: f64::NAN,
    };
    let tolerance_log10 = tolerance.log10();
    let truncation_log10 = truncation_threshold.log10();
    let max = newton.max_num_newton_iterations;

    for ii in 0..max {
        result.num_iterations = ii + 1;
        let values = system.eval(&result.point, time)?;
        let jacobian = system.jacobian(&result.point, time)?;
        let norm_j_log10 = amp.map(|_| matrix_norm_log10(&jacobian));
        let lu = Lu::decompose(jacobian)?;
        if lu.check() != MatrixSuccessCode::Success {
            result.code = SuccessCode::MatrixSolveFailure;
            return Ok(result);
        }
        let delta = -lu.solve(&values)?;
        result.point += &delta;
        result.norm_delta_log10 = norm_log10(&delta);

        if norm_log10(&result.point) > truncation_log10 {
            result.code = SuccessCode::GoingToInfinity;
            return Ok(result);
        }
        if result.norm_delta_log10 < tolerance_log10 && ii + 1 >= newton.min_num_newton_iterations {
            result.code = SuccessCode::Success;
            return Ok(result);
        }

        if let (Some(config), Some(norm_j_log10)) = (amp, norm_j_log10) {
            let norm_j_inverse_log10 = lu.inverse_norm_estimate_log10(rng)?;
            result.norm_j_log10 = norm_j_log10;
            result.norm_j_inverse_log10 = norm_j_inverse_log10;
            let b = criterion_b(
                digits,
                norm_j_log10,
                norm_j_inverse_log10,
                max - ii,
                tolerance,
                result.norm_delta_log10,
                config,
            );
            let c = criterion_c(
                digits,
                norm_j_inverse_log10,
                norm_log10(&result.point),
                tolerance,
                config,
            );
            if !(b && c) {
                result.code = SuccessCode::HigherPrecisionNecessary;
                return Ok(result);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_tree::Node;
    use crate::numeric::{mp_from_str, MpComplex};
    use crate::parser::{parse_expression, SymbolTable};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn homotopy(digits: u32) -> (System, Node) {
        let mut symbols = SymbolTable::new();
        let x = symbols.variable("x");
        let y = symbols.variable("y");
        let t = symbols.variable("t");
        let mut sys = System::new();
        sys.add_variable_group(&[x, y]).expect("variables");
        sys.add_function(parse_expression("t*(x^2-1) + (1-t)*(x^2+y^2-4)", &symbols).expect("Failed to parse"));
        sys.add_function(parse_expression("t*(y-1) + (1-t)*(2*x+5*y)", &symbols).expect("Failed to parse"));
        sys.add_path_variable(&t).expect("path variable");
        sys.set_precision(digits);
        (sys, t)
    }

    fn newton(min: u32, max: u32) -> NewtonConfig {
        NewtonConfig {
            min_num_newton_iterations: min,
            max_num_newton_iterations: max,
        }
    }

    #[test]
    fn one_step_in_double() {
        let (sys, _) = homotopy(16);
        let start = DVector::from_vec(vec![Complex64::new(2.3, 0.2), Complex64::new(1.1, 1.87)]);
        let mut rng = StdRng::seed_from_u64(2);
        let corrected = correct(
            &sys,
            &start,
            Some(&Complex64::new(0.9, 0.0)),
            10.0,
            1e4,
            &newton(1, 1),
            16,
            None,
            &mut rng,
        )
        .expect("correct");
        assert_eq!(corrected.code, SuccessCode::Success);
        assert_eq!(corrected.num_iterations, 1);
        let x = Complex64::new(1.36296628875178620892887063382866, 0.135404746200380445814213878747082);
        let y = Complex64::new(0.448147673035459113010161338024478, -0.0193435351714829208306019826781546);
        assert!((corrected.point[0] - x).norm() < 1e-15);
        assert!((corrected.point[1] - y).norm() < 1e-15);
    }

    #[test]
    fn two_steps_in_multiple_precision() {
        let digits = 40;
        let (sys, _) = homotopy(digits);
        let start = DVector::from_vec(vec![
            mp_from_str("2.3", "0.2", digits).expect("literal"),
            mp_from_str("1.1", "1.87", digits).expect("literal"),
        ]);
        let time = mp_from_str("0.9", "0", digits).expect("literal");
        let mut rng = StdRng::seed_from_u64(2);
        let corrected = correct(
            &sys,
            &start,
            Some(&time),
            10.0,
            1e4,
            &newton(2, 2),
            digits,
            None,
            &mut rng,
        )
        .expect("correct");
        assert_eq!(corrected.code, SuccessCode::Success);
        assert_eq!(corrected.num_iterations, 2);
        let x = mp_from_str(
            "1.14542104415948767661671388923986",
            "0.0217584797792294631577151109622764",
            digits,
        )
        .expect("literal");
        let y = mp_from_str(
            "0.47922556512007318905475515868002",
            "-0.00310835425417563759395930156603948",
            digits,
        )
        .expect("literal");
        let dx: MpComplex = corrected.point[0].clone() - x;
        let dy: MpComplex = corrected.point[1].clone() - y;
        assert!(Scalar::log10_abs(&dx) < -30.0);
        assert!(Scalar::log10_abs(&dy) < -30.0);
    }

    #[test]
    fn reports_failure_to_converge_and_divergence() {
        let (sys, _) = homotopy(16);
        let start = DVector::from_vec(vec![Complex64::new(2.3, 0.2), Complex64::new(1.1, 1.87)]);
        let time = Complex64::new(0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        let stuck = correct(&sys, &start, Some(&time), 1e-12, 1e4, &newton(1, 2), 16, None, &mut rng)
            .expect("correct");
        assert_eq!(stuck.code, SuccessCode::FailedToConverge);
        assert_eq!(stuck.num_iterations, 2);

        let escaped = correct(&sys, &start, Some(&time), 1e-12, 1.0, &newton(1, 2), 16, None, &mut rng)
            .expect("correct");
        assert_eq!(escaped.code, SuccessCode::GoingToInfinity);
    }

    #[test]
    fn adaptive_mode_asks_for_more_precision() {
        let (sys, _) = homotopy(16);
        let start = DVector::from_vec(vec![Complex64::new(2.3, 0.2), Complex64::new(1.1, 1.87)]);
        let time = Complex64::new(0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        let mut amp = AmpConfig::with_bounds(10.0, 2.0);
        let relaxed = correct(&sys, &start, Some(&time), 1e-5, 1e4, &newton(1, 3), 16, Some(&amp), &mut rng)
            .expect("correct");
        assert_ne!(relaxed.code, SuccessCode::HigherPrecisionNecessary);

        amp.safety_digits_2 = 20;
        let strict = correct(&sys, &start, Some(&time), 1e-5, 1e4, &newton(1, 3), 16, Some(&amp), &mut rng)
            .expect("correct");
        assert_eq!(strict.code, SuccessCode::HigherPrecisionNecessary);
        assert_eq!(strict.num_iterations, 1);
    }
}
