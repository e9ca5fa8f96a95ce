//! Common validation rules shared by request payloads and the coordination
//! core.

use validator::ValidationError;

use crate::utils::geo::GeoPoint;

/// Validates a latitude/longitude pair.
///
/// Requirements:
/// - Finite values
/// - Latitude within -90..=90, longitude within -180..=180
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !GeoPoint::new(latitude, longitude).is_valid() {
        return Err(ValidationError::new("coordinates_out_of_range"));
    }
    Ok(())
}

/// Validates a checkpoint trigger radius in meters. Must be strictly positive.
pub fn validate_radius(radius_m: f64) -> Result<(), ValidationError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(ValidationError::new("radius_not_positive"));
    }
    Ok(())
}

/// Validates heading in degrees (0..=360).
pub fn validate_heading(heading: f64) -> Result<(), ValidationError> {
    if !heading.is_finite() || !(0.0..=360.0).contains(&heading) {
        return Err(ValidationError::new("heading_out_of_range"));
    }
    Ok(())
}

/// Validates non-negative measurements such as speed and accuracy.
pub fn validate_non_negative(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new("negative_value"));
    }
    Ok(())
}

/// Validates a ride name.
///
/// Requirements:
/// - 1-100 characters after trimming
pub fn validate_ride_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 100 {
        return Err(ValidationError::new("ride_name_invalid_length"));
    }
    Ok(())
}
