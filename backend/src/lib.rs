//! Live ride coordination backend.
//!
//! The [`coordination`] module is the core; everything else wires it to
//! storage, identity and HTTP.

pub mod config;
pub mod coordination;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod router;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;
