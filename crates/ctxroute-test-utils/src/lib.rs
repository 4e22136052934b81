#![deny(unsafe_code)]

//! Shared test utilities for the ctxroute workspace.
//!
//! Provides config builders, temporary config files, scripted collaborators,
//! and tracing helpers so that individual crate tests stay concise and
//! consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! ctxroute-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fixtures;
pub mod tracing_setup;
