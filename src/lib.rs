//! HedgeBot Backend Library
//!
//! Exposes the hedge engine and its collaborators for the server binary,
//! the CLI and integration tests.

pub mod api;
pub mod config;
pub mod grouping;
pub mod hedge;
pub mod models;
pub mod store;
