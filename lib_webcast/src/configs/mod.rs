//! # Configuration Modules
//!
//! Runtime knobs for a webcast session. Loading them from files, environment
//! or CLI is left to the binaries.

/// Session tuning and the explicit error-handling policies.
pub mod session_config;
