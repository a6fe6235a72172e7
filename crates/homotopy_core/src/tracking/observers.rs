//! Listeners attached to a tracker. They see every event but cannot
//! influence the tracking.

use num_complex::Complex64;

use super::events::TrackingEvent;

pub trait Observer {
    fn observe(&mut self, event: &TrackingEvent);
}

/// Working precision after every successful step.
#[derive(Debug, Default, Clone)]
pub struct PrecisionAccumulator {
    pub precisions: Vec<u32>,
}

impl Observer for PrecisionAccumulator {
    fn observe(&mut self, event: &TrackingEvent) {
        if let TrackingEvent::SuccessfulStep(s) = event {
            self.precisions.push(s.precision);
        }
    }
}

/// Times and points of the path after every successful step.
#[derive(Debug, Default, Clone)]
pub struct PathAccumulator {
    pub times: Vec<Complex64>,
    pub points: Vec<Vec<Complex64>>,
}

impl Observer for PathAccumulator {
    fn observe(&mut self, event: &TrackingEvent) {
        if let TrackingEvent::SuccessfulStep(s) = event {
            self.times.push(s.time);
            self.points.push(s.point.clone());
        }
    }
}

/// Writes every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoryDetailLogger;

impl Observer for GoryDetailLogger {
    fn observe(&mut self, event: &TrackingEvent) {
        let s = event.snapshot();
        match event {
            TrackingEvent::PrecisionChanged { previous, next, .. } => {
                tracing::debug!(previous, next, step = s.num_steps, "precision changed");
            }
            TrackingEvent::Initializing(_) | TrackingEvent::TrackingEnded(_) => {
                tracing::debug!(
                    event = event.name(),
                    time = %s.time,
                    precision = s.precision,
                    steps = s.num_steps,
                );
            }
            _ => {
                tracing::trace!(
                    event = event.name(),
                    time = %s.time,
                    step_size = s.step_size,
                    precision = s.precision,
                    step = s.num_steps,
                    point = ?s.point,
                );
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StepFailCounter {
    pub num_failed_steps: u64,
    pub num_successful_steps: u64,
}

impl Observer for StepFailCounter {
    fn observe(&mut self, event: &TrackingEvent) {
        match event {
            TrackingEvent::FailedStep(_) => self.num_failed_steps += 1,
            TrackingEvent::SuccessfulStep(_) => self.num_successful_steps += 1,
            _ => {}
        }
    }
}
