//! Explicit Runge-Kutta steps along the path ODE `J·dx/dt = -∂H/∂t`.
//!
//! Every method is described by a Butcher tableau with exact rational
//! entries, rendered at the working precision on use. Embedded pairs
//! propagate the higher order solution.

use nalgebra::DVector;
use rand::Rng;
use rug::Rational;

use super::config::Predictor;
use super::SuccessCode;
use crate::amp::{predictor_criterion, AmpConfig};
use crate::error::Result;
use crate::linalg::{matrix_norm_log10, norm_log10, Lu, MatrixSuccessCode};
use crate::numeric::Scalar;
use crate::system::System;

fn r(numerator: i64, denominator: i64) -> Rational {
    Rational::from((numerator, denominator))
}

fn row(entries: &[(i64, i64)]) -> Vec<Rational> {
    entries.iter().map(|&(n, d)| r(n, d)).collect()
}

/// Coefficients of an explicit Runge-Kutta method with optional embedded pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    pub c: Vec<Rational>,
    /// Strictly lower triangular; row `i` has `i` entries.
    pub a: Vec<Vec<Rational>>,
    /// Weights of the propagated solution.
    pub b: Vec<Rational>,
    /// Weights of the embedded solution used for the error estimate.
    pub b_hat: Option<Vec<Rational>>,
    pub order: u32,
}

impl ButcherTableau {
    pub fn new(predictor: Predictor) -> Self {
        match predictor {
            Predictor::Constant => Self {
                c: row(&[(0, 1)]),
                a: vec![vec![]],
                b: row(&[(0, 1)]),
                b_hat: None,
                order: 0,
            },
            Predictor::Euler => Self {
                c: row(&[(0, 1)]),
                a: vec![vec![]],
                b: row(&[(1, 1)]),
                b_hat: None,
                order: 1,
            },
            Predictor::Heun => Self {
                c: row(&[(0, 1), (1, 1)]),
                a: vec![vec![], row(&[(1, 1)])],
                b: row(&[(1, 2), (1, 2)]),
                b_hat: Some(row(&[(1, 1), (0, 1)])),
                order: 2,
            },
            Predictor::RK4 => Self {
                c: row(&[(0, 1), (1, 2), (1, 2), (1, 1)]),
                a: vec![
                    vec![],
                    row(&[(1, 2)]),
                    row(&[(0, 1), (1, 2)]),
                    row(&[(0, 1), (0, 1), (1, 1)]),
                ],
                b: row(&[(1, 6), (1, 3), (1, 3), (1, 6)]),
                b_hat: None,
                order: 4,
            },
            Predictor::RKNorsett34 => Self {
                c: row(&[(0, 1), (1, 2), (1, 2), (1, 1), (1, 1)]),
                a: vec![
                    vec![],
                    row(&[(1, 2)]),
                    row(&[(0, 1), (1, 2)]),
                    row(&[(0, 1), (0, 1), (1, 1)]),
                    row(&[(1, 6), (1, 3), (1, 3), (1, 6)]),
                ],
                b: row(&[(1, 6), (1, 3), (1, 3), (1, 6), (0, 1)]),
                b_hat: Some(row(&[(1, 6), (1, 3), (1, 3), (0, 1), (1, 6)])),
                order: 4,
            },
            Predictor::RKF45 => Self {
                c: row(&[(0, 1), (1, 4), (3, 8), (12, 13), (1, 1), (1, 2)]),
                a: vec![
                    vec![],
                    row(&[(1, 4)]),
                    row(&[(3, 32), (9, 32)]),
                    row(&[(1932, 2197), (-7200, 2197), (7296, 2197)]),
                    row(&[(439, 216), (-8, 1), (3680, 513), (-845, 4104)]),
                    row(&[(-8, 27), (2, 1), (-3544, 2565), (1859, 4104), (-11, 40)]),
                ],
                b: row(&[(16, 135), (0, 1), (6656, 12825), (28561, 56430), (-9, 50), (2, 55)]),
                b_hat: Some(row(&[(25, 216), (0, 1), (1408, 2565), (2197, 4104), (-1, 5), (0, 1)])),
                order: 5,
            },
            Predictor::RKCashKarp45 => Self {
                c: row(&[(0, 1), (1, 5), (3, 10), (3, 5), (1, 1), (7, 8)]),
                a: vec![
                    vec![],
                    row(&[(1, 5)]),
                    row(&[(3, 40), (9, 40)]),
                    row(&[(3, 10), (-9, 10), (6, 5)]),
                    row(&[(-11, 54), (5, 2), (-70, 27), (35, 27)]),
                    row(&[(1631, 55296), (175, 512), (575, 13824), (44275, 110592), (253, 4096)]),
                ],
                b: row(&[(37, 378), (0, 1), (250, 621), (125, 594), (0, 1), (512, 1771)]),
                b_hat: Some(row(&[
                    (2825, 27648),
                    (0, 1),
                    (18575, 48384),
                    (13525, 55296),
                    (277, 14336),
                    (1, 4),
                ])),
                order: 5,
            },
            // Prince and Dormand, RK6(5)8M.
            Predictor::RKDormandPrince56 => Self {
                c: row(&[(0, 1), (1, 10), (2, 9), (3, 7), (3, 5), (4, 5), (1, 1), (1, 1)]),
                a: vec![
                    vec![],
                    row(&[(1, 10)]),
                    row(&[(-2, 81), (20, 81)]),
                    row(&[(615, 1372), (-270, 343), (1053, 1372)]),
                    row(&[(3243, 5500), (-54, 55), (50949, 71500), (4998, 17875)]),
                    row(&[(-26492, 37125), (72, 55), (2808, 23375), (-24206, 37125), (338, 459)]),
                    row(&[
                        (5561, 2376),
                        (-35, 11),
                        (-24117, 31603),
                        (899983, 200772),
                        (-5225, 1836),
                        (3925, 4056),
                    ]),
                    row(&[
                        (465467, 266112),
                        (-2945, 1232),
                        (-5610201, 14158144),
                        (10513573, 3212352),
                        (-424325, 205632),
                        (376225, 454272),
                        (0, 1),
                    ]),
                ],
                b: row(&[
                    (61, 864),
                    (0, 1),
                    (98415, 321776),
                    (16807, 146016),
                    (1375, 7344),
                    (1375, 5408),
                    (-37, 1120),
                    (1, 10),
                ]),
                b_hat: Some(row(&[
                    (821, 10800),
                    (0, 1),
                    (19683, 71825),
                    (175273, 912600),
                    (395, 3672),
                    (785, 2704),
                    (3, 50),
                    (0, 1),
                ])),
                order: 6,
            },
            // Verner's ten stage 6(7) pair; the sixth order weights are Boole's rule.
            Predictor::RKVerner67 => Self {
                c: row(&[
                    (0, 1),
                    (1, 12),
                    (1, 6),
                    (1, 4),
                    (3, 4),
                    (16, 17),
                    (1, 2),
                    (1, 1),
                    (2, 3),
                    (1, 1),
                ]),
                a: vec![
                    vec![],
                    row(&[(1, 12)]),
                    row(&[(0, 1), (1, 6)]),
                    row(&[(1, 16), (0, 1), (3, 16)]),
                    row(&[(21, 16), (0, 1), (-81, 16), (9, 2)]),
                    row(&[
                        (1344688, 250563),
                        (0, 1),
                        (-1709184, 83521),
                        (1365632, 83521),
                        (-78208, 250563),
                    ]),
                    row(&[(-559, 384), (0, 1), (6, 1), (-204, 47), (14, 39), (-4913, 78208)]),
                    row(&[
                        (-625, 224),
                        (0, 1),
                        (12, 1),
                        (-456, 47),
                        (48, 91),
                        (14739, 136864),
                        (6, 7),
                    ]),
                    row(&[
                        (-12253, 99144),
                        (0, 1),
                        (16, 27),
                        (16, 459),
                        (29072, 161109),
                        (-2023, 75816),
                        (112, 12393),
                        (0, 1),
                    ]),
                    row(&[
                        (30517, 2512),
                        (0, 1),
                        (-7296, 157),
                        (268728, 7379),
                        (2472, 2041),
                        (-3522621, 10743824),
                        (132, 157),
                        (0, 1),
                        (-12393, 4396),
                    ]),
                ],
                b: row(&[
                    (2881, 40320),
                    (0, 1),
                    (0, 1),
                    (1216, 2961),
                    (-2624, 4095),
                    (24137569, 57482880),
                    (-4, 21),
                    (0, 1),
                    (4131, 3920),
                    (-157, 1260),
                ]),
                b_hat: Some(row(&[
                    (7, 90),
                    (0, 1),
                    (0, 1),
                    (16, 45),
                    (16, 45),
                    (0, 1),
                    (2, 15),
                    (7, 90),
                    (0, 1),
                    (0, 1),
                ])),
                order: 7,
            },
        }
    }

    pub fn num_stages(&self) -> usize {
        self.c.len()
    }
}

/// Result of one prediction. On failure `point` is the unchanged start point.
#[derive(Debug, Clone)]
pub struct Prediction<T: Scalar> {
    pub code: SuccessCode,
    pub point: DVector<T>,
    /// `log10` of the difference between the propagated and embedded solutions.
    pub error_estimate_log10: Option<f64>,
    /// Norms of the Jacobian and its inverse at the start point.
    pub norm_j_log10: f64,
    pub norm_j_inverse_log10: f64,
}

enum StageSolve<T: Scalar> {
    Solved { slope: DVector<T>, lu: Lu<T>, norm_j_log10: f64 },
    Degenerate,
}

/// `dx/dt` at `(point, time)`.
fn solve_stage<T: Scalar>(system: &System, point: &DVector<T>, time: &T) -> Result<StageSolve<T>> {
    let jacobian = system.jacobian(point, Some(time))?;
    let norm_j_log10 = matrix_norm_log10(&jacobian);
    let dh_dt = system.time_derivative(point, time)?;
    let lu = Lu::decompose(jacobian)?;
    if lu.check() != MatrixSuccessCode::Success {
        return Ok(StageSolve::Degenerate);
    }
    let slope = -lu.solve(&dh_dt)?;
    Ok(StageSolve::Solved { slope, lu, norm_j_log10 })
}

/// Advances `point` from `time` by `delta_t`.
///
/// With `amp` set, the linear solve at the start point must also pass the
/// predictor precision check; failing it yields `HigherPrecisionNecessary`.
#[allow(clippy::too_many_arguments)]
pub fn predict<T: Scalar, R: Rng + ?Sized>(
    tableau: &ButcherTableau,
    system: &System,
    point: &DVector<T>,
    time: &T,
    delta_t: &T,
    digits: u32,
    amp: Option<&AmpConfig>,
    rng: &mut R,
) -> Result<Prediction<T>> {
    let failed = |code: SuccessCode| Prediction {
        code,
        point: point.clone(),
        error_estimate_log10: None,
        norm_j_log10: f64::NAN,
        norm_j_inverse_log10: f64::NAN,
    };
    let coefficient = |q: &Rational| -> T { T::from_rational(q, &Rational::new(), digits) };

    let mut slopes: Vec<DVector<T>> = Vec::with_capacity(tableau.num_stages());
    let mut norm_j_log10 = f64::NAN;
    let mut norm_j_inverse_log10 = f64::NAN;

    for (stage, (c, row)) in tableau.c.iter().zip(&tableau.a).enumerate() {
        let mut stage_point = point.clone();
        for (a, k) in row.iter().zip(&slopes) {
            if *a != 0 {
                let scale = delta_t.clone() * coefficient(a);
                stage_point += k.map(|v| v * scale.clone());
            }
        }
        let stage_time = time.clone() + delta_t.clone() * coefficient(c);

        match solve_stage(system, &stage_point, &stage_time)? {
            StageSolve::Degenerate => return Ok(failed(SuccessCode::MatrixSolveFailure)),
            StageSolve::Solved { slope, lu, norm_j_log10: norm } => {
                if stage == 0 {
                    norm_j_log10 = norm;
                    norm_j_inverse_log10 = lu.inverse_norm_estimate_log10(rng)?;
                    if let Some(config) = amp {
                        if !predictor_criterion(digits, norm_j_log10, norm_j_inverse_log10, config) {
                            return Ok(failed(SuccessCode::HigherPrecisionNecessary));
                        }
                    }
                }
                slopes.push(slope);
            }
        }
    }

    let combine = |weights: &[Rational]| -> DVector<T> {
        let mut sum = DVector::from_element(point.len(), T::zero(digits));
        for (w, k) in weights.iter().zip(&slopes) {
            if *w != 0 {
                let scale = delta_t.clone() * coefficient(w);
                sum += k.map(|v| v * scale.clone());
            }
        }
        sum
    };

    let increment = combine(&tableau.b);
    let error_estimate_log10 = tableau.b_hat.as_ref().map(|b_hat| {
        let difference: Vec<Rational> = tableau
            .b
            .iter()
            .zip(b_hat)
            .map(|(b, e)| Rational::from(b - e))
            .collect();
        norm_log10(&combine(&difference))
    });

    Ok(Prediction {
        code: SuccessCode::Success,
        point: point + increment,
        error_estimate_log10,
        norm_j_log10,
        norm_j_inverse_log10,
    })
}
