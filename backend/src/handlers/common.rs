use crate::error::AppError;
use validator::Validate;

/// Runs derive-based validation on a request body.
pub fn validated<T: Validate>(payload: T) -> Result<T, AppError> {
    payload.validate()?;
    Ok(payload)
}
