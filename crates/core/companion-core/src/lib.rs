//! Companion Core
//!
//! Shared infrastructure for the companion personality engine:
//!
//! - [`CompanionError`] and the crate-wide [`Result`] alias
//! - Environment loading helpers used to override engine tunables
//! - Tracing subscriber setup for binaries and tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{get_env_float, get_env_int, get_env_or, load_env, load_env_from_path};
pub use error::{CompanionError, Result};
pub use logging::{init_tracing, try_init_tracing};
