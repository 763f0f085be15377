//! Error types for the companion engine

use thiserror::Error;

/// Main error type for companion operations
///
/// Only construction, snapshot restoration and environment loading can fail.
/// Per-event processing never returns an error.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// Configuration is internally inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A configuration entry names a trait that does not exist
    #[error("Unknown trait '{name}' referenced by {context}")]
    UnknownTrait {
        /// Trait name that failed to resolve
        name: String,
        /// Where the reference was found
        context: String,
    },

    /// Seeding asked for an archetype preset that is not registered
    #[error("Unknown archetype: {0}")]
    UnknownArchetype(String),

    /// Snapshot does not match the configuration it is restored against
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Environment configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenient Result type using CompanionError
pub type Result<T> = std::result::Result<T, CompanionError>;

impl CompanionError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        CompanionError::InvalidConfiguration(msg.into())
    }

    /// Create an unknown trait error
    pub fn unknown_trait(name: impl Into<String>, context: impl Into<String>) -> Self {
        CompanionError::UnknownTrait {
            name: name.into(),
            context: context.into(),
        }
    }

    /// Create an unknown archetype error
    pub fn unknown_archetype(name: impl Into<String>) -> Self {
        CompanionError::UnknownArchetype(name.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        CompanionError::Snapshot(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        CompanionError::Config(msg.into())
    }

    /// Whether this error can only arise while building an entity
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            CompanionError::InvalidConfiguration(_)
                | CompanionError::UnknownTrait { .. }
                | CompanionError::UnknownArchetype(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CompanionError::invalid_configuration("self-weight is negative");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: self-weight is negative"
        );

        let err = CompanionError::unknown_trait("grumpiness", "behavior 'sulk'");
        assert_eq!(
            err.to_string(),
            "Unknown trait 'grumpiness' referenced by behavior 'sulk'"
        );
    }

    #[test]
    fn test_construction_errors() {
        assert!(CompanionError::unknown_archetype("pirate").is_construction_error());
        assert!(!CompanionError::snapshot("trait set differs").is_construction_error());
    }

    #[test]
    fn test_serialization_from() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: CompanionError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
