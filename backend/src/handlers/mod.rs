pub mod activities;
pub mod common;
pub mod intercom;
pub mod participants;
pub mod rides;
pub mod tracking;
