//! Common utilities for input-bridge
//!
//! This crate provides shared functionality between the backend core and the
//! bridge binary: the common error type and tracing setup. The `test-utils`
//! feature adds helpers used by tests across crates.

pub mod error;
pub mod logging;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
