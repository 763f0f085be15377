//! Companion Evolution
//!
//! Personality evolution for simulated companions. A companion carries a set
//! of bounded traits that change through direct reinforcement from
//! interactions and slow drift across a fixed influence network.
//!
//! # Overview
//!
//! - **TraitGraph**: independent trait values in [0, 1], a weighted directed
//!   influence graph between them, and emergent tags derived from trait
//!   combinations.
//!
//! - **AttentionTracker**: a decaying attention level, classified into bands
//!   and turned into a pressure signal.
//!
//! - **MemoryStore**: a bounded episodic log with per-source profiles and
//!   temporal / source-preference patterns.
//!
//! - **BehaviorSelector**: a trait-gated behavior catalog with success
//!   tracking, cooldowns and named runtime overrides.
//!
//! - **EvolutionEngine**: runs one event through all of the above and
//!   returns a single result record. Persisted through [`EngineSnapshot`].
//!
//! The engine is synchronous and performs no I/O. One engine instance is one
//! entity; separate instances share nothing but an `Arc<EvolutionConfig>`.
//!
//! # Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use companion_evolution::{EvolutionConfig, EvolutionEngine, InteractionEvent, SeedStrategy};
//! use std::sync::Arc;
//!
//! let config = Arc::new(EvolutionConfig::default());
//! let mut pet = EvolutionEngine::new(config, &SeedStrategy::archetype("curious")).unwrap();
//!
//! let result = pet.process(&InteractionEvent::new("alice", "teach", 1.0, Utc::now()));
//! assert!(result.trait_deltas["curiosity"] > 0.0);
//!
//! let saved = pet.serialize().unwrap();
//! let restored = EvolutionEngine::deserialize(&saved, pet.config().clone()).unwrap();
//! assert_eq!(restored.snapshot(), pet.snapshot());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use companion_core::Result;
use std::sync::Arc;

/// Component types, configuration and result records
pub mod types;
/// Engine orchestration and persistence
pub mod services;

pub use services::*;
pub use types::*;

/// Create a companion from a named archetype with the default configuration
pub fn companion_from_archetype(archetype: &str) -> Result<EvolutionEngine> {
    EvolutionEngine::new(
        Arc::new(EvolutionConfig::default()),
        &SeedStrategy::archetype(archetype),
    )
}

/// Create a companion with the default configuration and random traits
pub fn random_companion() -> Result<EvolutionEngine> {
    EvolutionEngine::new(Arc::new(EvolutionConfig::default()), &SeedStrategy::random())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_from_archetype() {
        let companion = companion_from_archetype("stoic").unwrap();
        assert_eq!(companion.traits().get("calmness"), Some(0.8));
        assert!(companion_from_archetype("pirate").is_err());
    }

    #[test]
    fn test_random_companion() {
        let companion = random_companion().unwrap();
        assert_eq!(companion.traits().values().len(), DEFAULT_TRAITS.len());
        assert_eq!(companion.processed_events(), 0);
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EvolutionEngine>();
        assert_send_sync::<Arc<EvolutionConfig>>();
    }
}
