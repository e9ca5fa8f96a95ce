use thiserror::Error;

use crate::models::ride::RideStatus;

/// Failure of a coordination operation. A rejected operation never leaves
/// partial state behind.
#[derive(Debug, Error)]
pub enum RideError {
    /// Malformed input: coordinates, radius, non-monotonic sample timestamp.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Operation attempted outside the required ride status.
    #[error("{operation} requires ride status {required}, current status is {actual}")]
    State {
        operation: &'static str,
        required: &'static str,
        actual: RideStatus,
    },
    /// Status is right but the ride is not ready, e.g. activating without
    /// checkpoints.
    #[error("{operation} rejected: {reason}")]
    Precondition {
        operation: &'static str,
        reason: &'static str,
    },
    /// Caller lacks the role or admin capability.
    #[error("permission denied: {0}")]
    Permission(String),
    /// Unknown ride, participant or checkpoint.
    #[error("{0} not found")]
    NotFound(String),
    /// A request that cannot be absorbed as a no-op.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Storage or collaborator failure.
    #[error("storage failure")]
    Storage(#[from] anyhow::Error),
}

impl RideError {
    pub fn validation(message: impl Into<String>) -> Self {
        RideError::Validation(message.into())
    }

    pub fn permission(message: impl Into<String>) -> Self {
        RideError::Permission(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        RideError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        RideError::Conflict(message.into())
    }

    /// Fails unless the ride is in `required`.
    pub(crate) fn ensure_status(
        operation: &'static str,
        actual: RideStatus,
        required: RideStatus,
    ) -> RideResult<()> {
        if actual == required {
            Ok(())
        } else {
            Err(RideError::State {
                operation,
                required: required.as_str(),
                actual,
            })
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(
            self,
            RideError::State { .. } | RideError::Precondition { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RideError::Validation(_))
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, RideError::Permission(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RideError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RideError::Conflict(_))
    }
}

impl From<validator::ValidationError> for RideError {
    fn from(err: validator::ValidationError) -> Self {
        RideError::Validation(err.code.to_string())
    }
}

pub type RideResult<T> = Result<T, RideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_error_names_the_failing_precondition() {
        let err = RideError::State {
            operation: "submit location",
            required: "active",
            actual: RideStatus::Planned,
        };
        assert_eq!(
            err.to_string(),
            "submit location requires ride status active, current status is planned"
        );
        assert!(err.is_state());
    }

    #[test]
    fn precondition_counts_as_state_error() {
        let err = RideError::Precondition {
            operation: "activate",
            reason: "no checkpoints defined",
        };
        assert!(err.is_state());
        assert_eq!(err.to_string(), "activate rejected: no checkpoints defined");
        assert!(RideError::ensure_status("complete", RideStatus::Active, RideStatus::Active).is_ok());
        assert!(
            RideError::ensure_status("complete", RideStatus::Planned, RideStatus::Active)
                .unwrap_err()
                .is_state()
        );
    }

    #[test]
    fn validation_rule_errors_convert() {
        let err: RideError = validator::ValidationError::new("radius_not_positive").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "validation failed: radius_not_positive");
    }
}
