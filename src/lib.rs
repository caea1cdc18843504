//! ballotbot command line front end.
//!
//! Wires configuration, logging and the status server around the workspace crates. Exposed as
//! a library so the integration tests can reach the config model and the status router.

pub mod app_settings;
pub mod cli;
pub mod metrics;

pub use app_settings::Config;
