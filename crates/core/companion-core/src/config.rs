//! Environment variable loading for engine tunables

use crate::{CompanionError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Load environment variables from a .env file
///
/// Looks in the current directory and its parents and returns the file that
/// was loaded. A missing file is not an error; the process environment is
/// used as-is.
///
/// # Example
///
/// ```no_run
/// use companion_core::load_env;
///
/// load_env().ok();
/// let rate = companion_core::get_env_float("COMPANION_DIRECT_RATE", 0.1);
/// ```
pub fn load_env() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from: {}", path.display());
            Ok(Some(path))
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(CompanionError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::debug!("No .env file found - using process environment only");
            Ok(None)
        }
        Err(e) => Err(CompanionError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Load environment variables from a specific file
///
/// Unlike [`load_env`], a missing file is an error.
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::debug!("Loaded environment from: {}", path.as_ref().display());
            Ok(())
        }
        Err(e) => Err(CompanionError::config(format!(
            "Failed to load {} environment file: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Get environment variable as float
///
/// Non-finite values are rejected in favour of the default.
pub fn get_env_float(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_int() {
        env::set_var("COMPANION_TEST_INT", "42");
        assert_eq!(get_env_int("COMPANION_TEST_INT", 0usize), 42);
        assert_eq!(get_env_int("COMPANION_TEST_NONEXISTENT", 99usize), 99);
        env::remove_var("COMPANION_TEST_INT");
    }

    #[test]
    fn test_get_env_float() {
        env::set_var("COMPANION_TEST_FLOAT", "0.25");
        env::set_var("COMPANION_TEST_NAN", "NaN");
        assert_eq!(get_env_float("COMPANION_TEST_FLOAT", 0.0), 0.25);
        assert_eq!(get_env_float("COMPANION_TEST_NAN", 1.5), 1.5);
        assert_eq!(get_env_float("COMPANION_TEST_MISSING", 1.5), 1.5);
        env::remove_var("COMPANION_TEST_FLOAT");
        env::remove_var("COMPANION_TEST_NAN");
    }

    #[test]
    fn test_load_env_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.env");
        std::fs::write(&path, "COMPANION_TEST_FROM_FILE=0.75\n").unwrap();

        load_env_from_path(&path).unwrap();
        assert_eq!(get_env_float("COMPANION_TEST_FROM_FILE", 0.0), 0.75);
        env::remove_var("COMPANION_TEST_FROM_FILE");

        assert!(load_env_from_path(dir.path().join("missing.env")).is_err());
    }

    #[test]
    fn test_get_env_or() {
        env::set_var("COMPANION_TEST_STRING", "hello");
        assert_eq!(get_env_or("COMPANION_TEST_STRING", "default"), "hello");
        assert_eq!(get_env_or("COMPANION_TEST_ABSENT", "default"), "default");
        env::remove_var("COMPANION_TEST_STRING");
    }
}
