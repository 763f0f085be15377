//! Types for the companion evolution system

pub mod attention;
pub mod behavior;
pub mod config;
pub mod event;
pub mod memory;
pub mod traits;

pub use attention::*;
pub use behavior::*;
pub use config::*;
pub use event::*;
pub use memory::*;
pub use traits::*;

/// Clamp into [0, 1]; NaN becomes 0
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Non-finite values become 0
pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Negative or NaN elapsed time counts as none; infinity saturates
pub(crate) fn sanitize_elapsed(hours: f64) -> f64 {
    if hours.is_nan() || hours <= 0.0 {
        0.0
    } else {
        hours.min(f64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_sanitize_elapsed() {
        assert_eq!(sanitize_elapsed(-3.0), 0.0);
        assert_eq!(sanitize_elapsed(f64::NAN), 0.0);
        assert_eq!(sanitize_elapsed(2.5), 2.5);
        assert_eq!(sanitize_elapsed(f64::INFINITY), f64::MAX);
    }
}
