//! Data model of a live ride: sessions, checkpoints, participants, samples,
//! attendance, feed entries and intercom grants.

pub mod activity;
pub mod alert;
pub mod attendance;
pub mod checkpoint;
pub mod intercom;
pub mod location;
pub mod participant;
pub mod ride;

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
