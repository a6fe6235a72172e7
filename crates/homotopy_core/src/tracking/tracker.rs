//! The stepping loop: predict, correct, then accept or reject the step and
//! adjust step size and precision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DVector;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::{PrecisionMode, TrackerConfig};
use super::corrector::correct;
use super::events::{StepSnapshot, TrackingEvent};
use super::observers::Observer;
use super::predictor::{predict, ButcherTableau};
use super::SuccessCode;
use crate::amp::{
    choose_precision_and_step, next_precision_up, quantize_precision, size_proportion_log10, StepMeasurements,
};
use crate::error::{Error, Result};
use crate::linalg::norm_log10;
use crate::numeric::{
    convert_vector, digits_to_bits, set_vector_precision, MpComplex, Scalar, DOUBLE_PRECISION,
    LOWEST_MULTIPLE_PRECISION,
};
use crate::system::System;

/// A point in either numeric type.
#[derive(Debug, Clone, PartialEq)]
pub enum PathPoint {
    Double(DVector<Complex64>),
    Multiple(DVector<MpComplex>),
}

impl PathPoint {
    pub fn len(&self) -> usize {
        match self {
            PathPoint::Double(p) => p.len(),
            PathPoint::Multiple(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn precision(&self) -> u32 {
        match self {
            PathPoint::Double(_) => DOUBLE_PRECISION,
            PathPoint::Multiple(p) => p.iter().next().map_or(LOWEST_MULTIPLE_PRECISION, Scalar::precision),
        }
    }

    pub fn to_double(&self) -> DVector<Complex64> {
        match self {
            PathPoint::Double(p) => p.clone(),
            PathPoint::Multiple(p) => p.map(|v| v.to_complex64()),
        }
    }

    pub fn to_multiple(&self, digits: u32) -> DVector<MpComplex> {
        match self {
            PathPoint::Double(p) => convert_vector(p, digits),
            PathPoint::Multiple(p) => {
                let mut p = p.clone();
                set_vector_precision(&mut p, digits);
                p
            }
        }
    }

    /// The same point in the numeric type used at `digits`.
    pub fn at_precision(&self, digits: u32) -> PathPoint {
        if digits <= DOUBLE_PRECISION {
            PathPoint::Double(self.to_double())
        } else {
            PathPoint::Multiple(self.to_multiple(digits))
        }
    }

    pub fn norm_log10(&self) -> f64 {
        match self {
            PathPoint::Double(p) => norm_log10(p),
            PathPoint::Multiple(p) => norm_log10(p),
        }
    }
}

/// Final state of a tracked path.
#[derive(Debug, Clone)]
pub struct TrackingResult {
    pub code: SuccessCode,
    pub point: PathPoint,
    pub time: Complex64,
    /// Accepted steps.
    pub num_steps: u64,
    /// Accepted and rejected steps; this is what `max_num_steps` limits.
    pub num_attempted_steps: u64,
    pub precision: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Predict,
    Correct,
}

struct StepAttempt<P> {
    code: SuccessCode,
    phase: Phase,
    point: P,
    measurements: Option<StepMeasurements>,
}

impl<P> StepAttempt<P> {
    fn map<Q>(self, f: impl FnOnce(P) -> Q) -> StepAttempt<Q> {
        StepAttempt {
            code: self.code,
            phase: self.phase,
            point: f(self.point),
            measurements: self.measurements,
        }
    }
}

struct PathState {
    point: PathPoint,
    time: MpComplex,
    step_size: f64,
    digits: u32,
    num_steps: u64,
    num_attempted_steps: u64,
    consecutive_successes: u32,
    successes_at_precision: u32,
    num_precision_decreases: u32,
}

/// Tracks paths of a homotopy whose path variable runs from a start time to
/// an end time.
pub struct Tracker<'a> {
    system: &'a mut System,
    config: TrackerConfig,
    tableau: ButcherTableau,
    observers: Vec<Box<dyn Observer + 'a>>,
    cancelled: Option<Arc<AtomicBool>>,
    rng: StdRng,
}

impl<'a> Tracker<'a> {
    pub fn new(system: &'a mut System, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        if !system.has_path_variable() {
            return Err(Error::MissingPathVariable);
        }
        if system.num_total_functions() != system.num_variables() {
            return Err(Error::NotSquare {
                functions: system.num_total_functions(),
                variables: system.num_variables(),
            });
        }
        Ok(Self {
            system,
            tableau: ButcherTableau::new(config.predictor),
            config,
            observers: Vec::new(),
            cancelled: None,
            rng: StdRng::seed_from_u64(0),
        })
    }

    /// Reseeds the generator used for norm estimates.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn add_observer(&mut self, observer: impl Observer + 'a) {
        self.observers.push(Box::new(observer));
    }

    /// Tracking stops with `ExternallyTerminated` at the next step boundary
    /// once `flag` is set.
    pub fn set_cancellation_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancelled = Some(flag);
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn adaptive(&self) -> bool {
        self.config.precision == PrecisionMode::Adaptive
    }

    fn emit(&mut self, event: TrackingEvent) {
        for observer in &mut self.observers {
            observer.observe(&event);
        }
    }

    fn snapshot(state: &PathState) -> StepSnapshot {
        StepSnapshot {
            time: state.time.to_complex64(),
            step_size: state.step_size,
            precision: state.digits,
            num_steps: state.num_steps,
            point: state.point.to_double().iter().copied().collect(),
        }
    }

    fn initial_precision(&self, start: &PathPoint) -> u32 {
        match self.config.precision {
            PrecisionMode::Double => DOUBLE_PRECISION,
            PrecisionMode::Multiple(digits) => digits,
            PrecisionMode::Adaptive => quantize_precision(start.precision()),
        }
    }

    fn set_precision(&mut self, state: &mut PathState, digits: u32) {
        let previous = state.digits;
        if previous == digits {
            return;
        }
        state.point = state.point.at_precision(digits);
        state.digits = digits;
        state.time.set_prec(digits_to_bits(digits.max(LOWEST_MULTIPLE_PRECISION)));
        state.successes_at_precision = 0;
        self.system.set_precision(digits);
        self.emit(TrackingEvent::PrecisionChanged {
            snapshot: Self::snapshot(state),
            previous,
            next: digits,
        });
    }

    /// Raises precision one level. False once the ceiling is passed.
    fn raise_precision(&mut self, state: &mut PathState) -> bool {
        let next = next_precision_up(state.digits);
        if next > self.config.amp.precision_ceiling() {
            return false;
        }
        self.set_precision(state, next);
        true
    }

    fn correct_at<T: Scalar>(&mut self, point: &DVector<T>, time: &T, digits: u32) -> Result<(SuccessCode, DVector<T>)> {
        let amp = if self.adaptive() { Some(self.config.amp) } else { None };
        let correction = correct(
            &*self.system,
            point,
            Some(time),
            self.config.tracking_tolerance,
            self.config.path_truncation_threshold,
            &self.config.newton,
            digits,
            amp.as_ref(),
            &mut self.rng,
        )?;
        Ok((correction.code, correction.point))
    }

    /// Newton's method at `time`, in whichever numeric type `point` holds.
    pub fn refine(&mut self, point: &PathPoint, time: Complex64) -> Result<(SuccessCode, PathPoint)> {
        match point {
            PathPoint::Double(p) => {
                let (code, p) = self.correct_at(p, &time, DOUBLE_PRECISION)?;
                Ok((code, PathPoint::Double(p)))
            }
            PathPoint::Multiple(p) => {
                let digits = point.precision();
                let t = MpComplex::from_f64(time.re, time.im, digits);
                let (code, p) = self.correct_at(p, &t, digits)?;
                Ok((code, PathPoint::Multiple(p)))
            }
        }
    }

    fn attempt<T: Scalar>(
        &mut self,
        point: &DVector<T>,
        time: &T,
        delta_t: &T,
        digits: u32,
    ) -> Result<StepAttempt<DVector<T>>> {
        let amp = if self.adaptive() { Some(self.config.amp) } else { None };
        let prediction = predict(
            &self.tableau,
            &*self.system,
            point,
            time,
            delta_t,
            digits,
            amp.as_ref(),
            &mut self.rng,
        )?;
        if prediction.code != SuccessCode::Success {
            return Ok(StepAttempt {
                code: prediction.code,
                phase: Phase::Predict,
                point: prediction.point,
                measurements: None,
            });
        }

        let next_time = time.clone() + delta_t.clone();
        let correction = correct(
            &*self.system,
            &prediction.point,
            Some(&next_time),
            self.config.tracking_tolerance,
            self.config.path_truncation_threshold,
            &self.config.newton,
            digits,
            amp.as_ref(),
            &mut self.rng,
        )?;

        let measurements = amp.map(|_| {
            let pick = |corrector: f64, predictor: f64| if corrector.is_nan() { predictor } else { corrector };
            let moved = norm_log10(&(&correction.point - &prediction.point));
            let error_log10 = prediction
                .error_estimate_log10
                .map_or(moved, |estimate| estimate.max(moved));
            StepMeasurements {
                norm_j_log10: pick(correction.norm_j_log10, prediction.norm_j_log10),
                norm_j_inverse_log10: pick(correction.norm_j_inverse_log10, prediction.norm_j_inverse_log10),
                norm_z_log10: norm_log10(&correction.point),
                size_proportion_log10: size_proportion_log10(
                    error_log10,
                    Scalar::abs(delta_t),
                    self.tableau.order,
                ),
                predictor_order: self.tableau.order,
                num_newton_iterations: self.config.newton.max_num_newton_iterations,
                tracking_tolerance: self.config.tracking_tolerance,
            }
        });
        Ok(StepAttempt {
            code: correction.code,
            phase: Phase::Correct,
            point: correction.point,
            measurements,
        })
    }

    fn attempt_step(&mut self, state: &PathState, delta_t: &MpComplex) -> Result<StepAttempt<PathPoint>> {
        Ok(match &state.point {
            PathPoint::Double(p) => {
                let t = Complex64::from_multiple(&state.time, DOUBLE_PRECISION);
                let dt = Complex64::from_multiple(delta_t, DOUBLE_PRECISION);
                self.attempt(p, &t, &dt, DOUBLE_PRECISION)?.map(PathPoint::Double)
            }
            PathPoint::Multiple(p) => {
                let t = MpComplex::from_multiple(&state.time, state.digits);
                let dt = MpComplex::from_multiple(delta_t, state.digits);
                self.attempt(p, &t, &dt, state.digits)?.map(PathPoint::Multiple)
            }
        })
    }

    fn shrink_step(&self, state: &mut PathState) {
        state.step_size *= self.config.stepping.step_size_fail_factor;
        state.consecutive_successes = 0;
    }

    /// Step size and precision after an accepted step.
    fn after_success(&mut self, state: &mut PathState, measurements: Option<StepMeasurements>) -> bool {
        let stepping = self.config.stepping;
        state.consecutive_successes += 1;
        state.successes_at_precision += 1;
        let mut step_size = state.step_size;
        if state.consecutive_successes >= stepping.consecutive_successful_steps_before_stepsize_increase {
            step_size = (step_size * stepping.step_size_success_factor).min(stepping.max_step_size);
            state.consecutive_successes = 0;
        }

        if let Some(measurements) = measurements {
            let amp = self.config.amp;
            let Some(choice) =
                choose_precision_and_step(&measurements, stepping.max_step_size, DOUBLE_PRECISION, &amp)
            else {
                return false;
            };
            if choice.digits > state.digits {
                self.set_precision(state, choice.digits);
            } else if choice.digits < state.digits
                && state.successes_at_precision >= amp.consecutive_successful_steps_before_precision_decrease
                && state.num_precision_decreases < amp.max_num_precision_decreases
            {
                state.num_precision_decreases += 1;
                self.set_precision(state, choice.digits);
            }
            step_size = step_size.min(choice.step_size);
        }
        state.step_size = step_size;
        true
    }

    /// Tracks `start_point` from `start_time` to `end_time`.
    pub fn track_path(
        &mut self,
        start_point: &PathPoint,
        start_time: Complex64,
        end_time: Complex64,
    ) -> Result<TrackingResult> {
        if start_point.len() != self.system.num_variables() {
            return Err(Error::SizeMismatch {
                expected: self.system.num_variables(),
                found: start_point.len(),
            });
        }
        let stepping = self.config.stepping;
        let digits = self.initial_precision(start_point);
        let time_digits = digits.max(LOWEST_MULTIPLE_PRECISION);
        self.system.set_precision(digits);
        let mut state = PathState {
            point: start_point.at_precision(digits),
            time: MpComplex::from_f64(start_time.re, start_time.im, time_digits),
            step_size: stepping.initial_step_size,
            digits,
            num_steps: 0,
            num_attempted_steps: 0,
            consecutive_successes: 0,
            successes_at_precision: 0,
            num_precision_decreases: 0,
        };
        let path_length = (end_time - start_time).norm();
        let max_step_size = stepping
            .max_step_size
            .min(path_length / stepping.min_num_steps.max(1) as f64);
        state.step_size = state.step_size.min(max_step_size);
        self.emit(TrackingEvent::Initializing(Self::snapshot(&state)));

        let code = self.refine_start(&mut state, start_time)?;
        let code = match code {
            SuccessCode::Success => self.run(&mut state, end_time, max_step_size)?,
            other => other,
        };

        self.emit(TrackingEvent::TrackingEnded(Self::snapshot(&state)));
        tracing::debug!(?code, steps = state.num_steps, precision = state.digits, "path finished");
        Ok(TrackingResult {
            code,
            point: state.point,
            time: state.time.to_complex64(),
            num_steps: state.num_steps,
            num_attempted_steps: state.num_attempted_steps,
            precision: state.digits,
        })
    }

    /// Corrects the start point in place; a singular Jacobian there ends the path.
    fn refine_start(&mut self, state: &mut PathState, start_time: Complex64) -> Result<SuccessCode> {
        loop {
            let (code, point) = self.refine(&state.point, start_time)?;
            match code {
                SuccessCode::Success => {
                    state.point = point;
                    return Ok(SuccessCode::Success);
                }
                SuccessCode::HigherPrecisionNecessary => {
                    if !self.raise_precision(state) {
                        return Ok(SuccessCode::PrecisionBoundExceeded);
                    }
                }
                SuccessCode::MatrixSolveFailure => {
                    self.emit(TrackingEvent::SingularStartPoint(Self::snapshot(state)));
                    return Ok(SuccessCode::SingularStartPoint);
                }
                SuccessCode::GoingToInfinity => {
                    self.emit(TrackingEvent::InfinitePathTruncation(Self::snapshot(state)));
                    return Ok(SuccessCode::GoingToInfinity);
                }
                // A start point off the path is left for the stepping loop to pull back.
                _ => return Ok(SuccessCode::Success),
            }
        }
    }

    fn run(&mut self, state: &mut PathState, end_time: Complex64, max_step_size: f64) -> Result<SuccessCode> {
        let stepping = self.config.stepping;
        loop {
            if self.cancelled.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Ok(SuccessCode::ExternallyTerminated);
            }
            let end = MpComplex::from_f64(end_time.re, end_time.im, state.digits.max(LOWEST_MULTIPLE_PRECISION));
            let remaining = end - state.time.clone();
            let distance = Scalar::abs(&remaining);
            if distance <= self.config.end_time_tolerance {
                return Ok(SuccessCode::Success);
            }
            if state.num_attempted_steps >= stepping.max_num_steps {
                return Ok(SuccessCode::MaxNumStepsTaken);
            }
            if state.step_size < stepping.min_step_size {
                return Ok(SuccessCode::MinStepSizeReached);
            }

            self.emit(TrackingEvent::NewStep(Self::snapshot(state)));
            let delta_t = if state.step_size >= distance {
                remaining
            } else {
                let digits = Scalar::precision(&remaining);
                remaining * MpComplex::from_f64(state.step_size / distance, 0.0, digits)
            };

            let attempt = self.attempt_step(state, &delta_t)?;
            state.num_attempted_steps += 1;
            match attempt.code {
                SuccessCode::Success => {
                    state.time += delta_t;
                    state.point = attempt.point;
                    state.num_steps += 1;
                    self.emit(TrackingEvent::SuccessfulPredict(Self::snapshot(state)));
                    self.emit(TrackingEvent::SuccessfulCorrect(Self::snapshot(state)));
                    self.emit(TrackingEvent::SuccessfulStep(Self::snapshot(state)));
                    if !self.after_success(state, attempt.measurements) {
                        return Ok(SuccessCode::PrecisionBoundExceeded);
                    }
                    state.step_size = state.step_size.min(max_step_size);
                }
                SuccessCode::GoingToInfinity => {
                    self.emit(TrackingEvent::InfinitePathTruncation(Self::snapshot(state)));
                    return Ok(SuccessCode::GoingToInfinity);
                }
                SuccessCode::HigherPrecisionNecessary => {
                    self.emit(match attempt.phase {
                        Phase::Predict => TrackingEvent::PredictorHigherPrecisionNecessary(Self::snapshot(state)),
                        Phase::Correct => TrackingEvent::CorrectorHigherPrecisionNecessary(Self::snapshot(state)),
                    });
                    self.emit(TrackingEvent::FailedStep(Self::snapshot(state)));
                    state.consecutive_successes = 0;
                    if !self.raise_precision(state) {
                        return Ok(SuccessCode::PrecisionBoundExceeded);
                    }
                }
                SuccessCode::MatrixSolveFailure => {
                    self.emit(match (attempt.phase, state.num_steps) {
                        (Phase::Predict, 0) => TrackingEvent::FirstStepPredictorMatrixSolveFailure(Self::snapshot(state)),
                        (Phase::Predict, _) => TrackingEvent::PredictorMatrixSolveFailure(Self::snapshot(state)),
                        (Phase::Correct, _) => TrackingEvent::CorrectorMatrixSolveFailure(Self::snapshot(state)),
                    });
                    self.emit(TrackingEvent::FailedStep(Self::snapshot(state)));
                    self.shrink_step(state);
                    if self.adaptive() && !self.raise_precision(state) {
                        return Ok(SuccessCode::PrecisionBoundExceeded);
                    }
                }
                _ => {
                    self.emit(TrackingEvent::FailedStep(Self::snapshot(state)));
                    self.shrink_step(state);
                }
            }
        }
    }
}
