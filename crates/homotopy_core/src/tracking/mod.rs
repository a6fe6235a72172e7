//! Path tracking: predictor, corrector and the stepping loop around them.

pub mod config;
pub mod corrector;
pub mod events;
pub mod observers;
pub mod predictor;
pub mod tracker;

use serde::{Deserialize, Serialize};

pub use config::{NewtonConfig, PrecisionMode, Predictor, SteppingConfig, TrackerConfig};
pub use events::{StepSnapshot, TrackingEvent};
pub use observers::{GoryDetailLogger, Observer, PathAccumulator, PrecisionAccumulator, StepFailCounter};
pub use tracker::{PathPoint, Tracker, TrackingResult};

/// Numerical outcome of a step, a correction or a whole path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuccessCode {
    Success,
    HigherPrecisionNecessary,
    MatrixSolveFailure,
    FailedToConverge,
    GoingToInfinity,
    PrecisionBoundExceeded,
    MaxNumStepsTaken,
    MinStepSizeReached,
    SingularStartPoint,
    ExternallyTerminated,
}
