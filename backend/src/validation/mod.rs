//! Input validation for ride payloads.
//!
//! Request bodies derive [`Validate`]; the coordination core reuses the same
//! rules for callers that bypass the HTTP layer.

pub mod rules;

pub use validator::Validate;
