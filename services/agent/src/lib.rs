//! Scholar Agent Service
//!
//! Configuration and startup wiring for the `agent` binary, which serves the
//! line protocol on stdin/stdout.

pub mod config;
pub mod state;
