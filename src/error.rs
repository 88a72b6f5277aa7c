use thiserror::Error;

/// Errors reported by the trajectory generator
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TrajectoryError {
    /// Transition durations must be positive and finite
    #[error("Duration must be a positive, finite number of seconds, got {0}")]
    InvalidDuration(f32),
    /// Completion tolerance must be non-negative and finite
    #[error("Completion tolerance must be non-negative, finite and shorter than the transition time, got {0}")]
    InvalidTolerance(f32),
    /// Numeric mode code that does not map to an interpolation mode
    #[error("Unknown interpolation mode code {0}")]
    InvalidMode(u8),
    /// A new goal was requested while the current segment is still in flight
    #[error("A goal is already in flight")]
    GoalInFlight,
    /// Positions must not contain infinities or NaN
    #[error("Position must be finite")]
    NonFinitePosition,
    #[error("End time {end} must be after start time {start}")]
    InvalidRange { start: f32, end: f32 },
    #[error("Sampling step must be positive, got {0}")]
    InvalidStep(f32),
    #[error("Sampling {start}..{end} every {step} needs more than {max} samples")]
    TooManySamples { start: f32, end: f32, step: f32, max: usize },
}

pub type Result<T> = std::result::Result<T, TrajectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!("Duration must be a positive, finite number of seconds, got -1",
                   TrajectoryError::InvalidDuration(-1.).to_string());
        assert_eq!("Unknown interpolation mode code 7", TrajectoryError::InvalidMode(7).to_string());
        assert_eq!("End time 1 must be after start time 2",
                   TrajectoryError::InvalidRange { start: 2., end: 1. }.to_string());
    }
}
