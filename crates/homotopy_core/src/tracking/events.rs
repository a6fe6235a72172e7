//! Notifications emitted while tracking a path.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Read-only view of the tracker at the moment an event fires. The point
/// is rounded to double precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub time: Complex64,
    pub step_size: f64,
    pub precision: u32,
    pub num_steps: u64,
    pub point: Vec<Complex64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackingEvent {
    Initializing(StepSnapshot),
    NewStep(StepSnapshot),
    SuccessfulStep(StepSnapshot),
    FailedStep(StepSnapshot),
    SuccessfulPredict(StepSnapshot),
    SuccessfulCorrect(StepSnapshot),
    PredictorHigherPrecisionNecessary(StepSnapshot),
    CorrectorHigherPrecisionNecessary(StepSnapshot),
    PredictorMatrixSolveFailure(StepSnapshot),
    CorrectorMatrixSolveFailure(StepSnapshot),
    FirstStepPredictorMatrixSolveFailure(StepSnapshot),
    PrecisionChanged {
        snapshot: StepSnapshot,
        previous: u32,
        next: u32,
    },
    SingularStartPoint(StepSnapshot),
    InfinitePathTruncation(StepSnapshot),
    TrackingEnded(StepSnapshot),
}

impl TrackingEvent {
    pub fn snapshot(&self) -> &StepSnapshot {
        match self {
            TrackingEvent::Initializing(s)
            | TrackingEvent::NewStep(s)
            | TrackingEvent::SuccessfulStep(s)
            | TrackingEvent::FailedStep(s)
            | TrackingEvent::SuccessfulPredict(s)
            | TrackingEvent::SuccessfulCorrect(s)
            | TrackingEvent::PredictorHigherPrecisionNecessary(s)
            | TrackingEvent::CorrectorHigherPrecisionNecessary(s)
            | TrackingEvent::PredictorMatrixSolveFailure(s)
            | TrackingEvent::CorrectorMatrixSolveFailure(s)
            | TrackingEvent::FirstStepPredictorMatrixSolveFailure(s)
            | TrackingEvent::SingularStartPoint(s)
            | TrackingEvent::InfinitePathTruncation(s)
            | TrackingEvent::TrackingEnded(s) => s,
            TrackingEvent::PrecisionChanged { snapshot, .. } => snapshot,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackingEvent::Initializing(_) => "Initializing",
            TrackingEvent::NewStep(_) => "NewStep",
            TrackingEvent::SuccessfulStep(_) => "SuccessfulStep",
            TrackingEvent::FailedStep(_) => "FailedStep",
            TrackingEvent::SuccessfulPredict(_) => "SuccessfulPredict",
            TrackingEvent::SuccessfulCorrect(_) => "SuccessfulCorrect",
            TrackingEvent::PredictorHigherPrecisionNecessary(_) => "PredictorHigherPrecisionNecessary",
            TrackingEvent::CorrectorHigherPrecisionNecessary(_) => "CorrectorHigherPrecisionNecessary",
            TrackingEvent::PredictorMatrixSolveFailure(_) => "PredictorMatrixSolveFailure",
            TrackingEvent::CorrectorMatrixSolveFailure(_) => "CorrectorMatrixSolveFailure",
            TrackingEvent::FirstStepPredictorMatrixSolveFailure(_) => "FirstStepPredictorMatrixSolveFailure",
            TrackingEvent::PrecisionChanged { .. } => "PrecisionChanged",
            TrackingEvent::SingularStartPoint(_) => "SingularStartPoint",
            TrackingEvent::InfinitePathTruncation(_) => "InfinitePathTruncation",
            TrackingEvent::TrackingEnded(_) => "TrackingEnded",
        }
    }
}
