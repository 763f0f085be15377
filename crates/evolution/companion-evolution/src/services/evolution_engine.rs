//! Evolution Engine Service
//!
//! The orchestrator of one companion entity. Owns:
//! - Trait graph and its influence network
//! - Attention tracker
//! - Episodic memory, source profiles and patterns
//! - Behavior selector
//! - Energy bookkeeping
//!
//! Sub-components know nothing about each other; every cross-component
//! rule (signal scaling, pattern feedback, runtime state) lives here.

use crate::types::*;
use chrono::{DateTime, Utc};
use companion_core::{CompanionError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Version written into every snapshot
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Complete persisted state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Snapshot layout version
    pub format_version: u32,
    /// Entity identifier
    pub entity_id: Uuid,
    /// Trait values, influence weights and reinforcement telemetry
    pub traits: TraitGraphState,
    /// Attention level, clock and history
    pub attention: AttentionState,
    /// Episodes, profiles and patterns
    pub memory: MemoryState,
    /// Behavior outcome statistics and cooldowns
    pub behaviors: BehaviorState,
    /// Energy in [0, 1]
    pub energy: f64,
    /// Events processed so far
    pub processed_events: u64,
}

/// One simulated companion
#[derive(Debug, Clone)]
pub struct EvolutionEngine {
    entity_id: Uuid,
    config: Arc<EvolutionConfig>,
    traits: TraitGraph,
    attention: AttentionTracker,
    memory: MemoryStore,
    behaviors: BehaviorSelector,
    energy: f64,
    processed_events: u64,
}

impl EvolutionEngine {
    /// Create an entity with entropy-seeded randomness
    pub fn new(config: Arc<EvolutionConfig>, seed: &SeedStrategy) -> Result<Self> {
        Self::with_rng(config, seed, &mut StdRng::from_entropy())
    }

    /// Create an entity whose random draws are reproducible
    pub fn with_rng_seed(config: Arc<EvolutionConfig>, seed: &SeedStrategy, rng_seed: u64) -> Result<Self> {
        Self::with_rng(config, seed, &mut StdRng::seed_from_u64(rng_seed))
    }

    /// Create an entity drawing from the given generator
    pub fn with_rng<R: Rng>(config: Arc<EvolutionConfig>, seed: &SeedStrategy, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let traits = TraitGraph::new(config.traits.clone(), seed, rng)?;
        let attention = AttentionTracker::new(config.attention.clone())?;
        let memory = MemoryStore::new(config.memory.clone())?;
        let behaviors = BehaviorSelector::new(config.behaviors.clone())?;

        let engine = Self {
            entity_id: Uuid::new_v4(),
            energy: config.energy.initial,
            config,
            traits,
            attention,
            memory,
            behaviors,
            processed_events: 0,
        };

        tracing::info!(
            entity_id = %engine.entity_id,
            personality = %engine.traits.describe(),
            "companion created"
        );
        Ok(engine)
    }

    /// Feed one event through every component
    ///
    /// Never fails. Unknown event types carry no signal and no attention
    /// weight; they are still remembered and flagged in the result.
    pub fn process(&mut self, event: &InteractionEvent) -> EvolutionResult {
        let intensity = clamp_intensity(event.intensity);
        let unknown_event = !self.config.recognizes(&event.event_type);

        let attention = self
            .attention
            .apply(&event.event_type, intensity, event.timestamp);
        self.pass_time(attention.elapsed_hours);

        if let Some(change) = self.config.event_energy.get(&event.event_type) {
            self.energy = clamp_unit(self.energy + change * intensity);
        }

        let signals = self.signals_for(event, intensity, attention.applied_delta);
        let evolution = self.traits.evolve(&signals);

        self.memory.record(EpisodicEntry {
            source: event.source.clone(),
            event_type: event.event_type.clone(),
            intensity,
            timestamp: event.timestamp,
            context: event.context.clone(),
        });
        self.memory.detect_patterns();

        let runtime = self.runtime_state();
        let active_behaviors = self.behaviors.select(self.traits.values(), &runtime);
        self.processed_events += 1;

        tracing::debug!(
            entity_id = %self.entity_id,
            event_type = %event.event_type,
            attention_delta = attention.applied_delta,
            active = active_behaviors.len(),
            "event processed"
        );

        EvolutionResult {
            trait_deltas: evolution.deltas,
            emergent_tags: evolution.emergent,
            attention: AttentionSummary {
                level: attention.new_level,
                band: attention.band,
                pressure: runtime.attention_pressure,
                applied_delta: attention.applied_delta,
            },
            active_behaviors,
            memory_summary: MemorySummary {
                pattern_count: self.memory.pattern_count(),
                episode_count: self.memory.episodes().len(),
            },
            energy: self.energy,
            unknown_event,
        }
    }

    /// Mapped signals scaled by intensity, attention change and pattern feedback
    fn signals_for(&self, event: &InteractionEvent, intensity: f64, attention_delta: f64) -> TraitMap {
        let Some(mapping) = self.config.event_signals.get(&event.event_type) else {
            return TraitMap::new();
        };

        let confidence = self
            .memory
            .pattern(&preference_key(&event.source, &event.event_type))
            .map_or(0.0, |p| p.confidence);
        let scale = intensity
            * (1.0 + attention_delta)
            * (1.0 + self.config.pattern_feedback_gain * confidence);

        mapping
            .iter()
            .map(|(name, signal)| (name.clone(), signal * scale))
            .collect()
    }

    /// Let time pass without an event
    ///
    /// Decays attention, advances cooldowns and regenerates energy. Negative
    /// or NaN spans count as zero.
    pub fn tick(&mut self, elapsed_hours: f64) {
        self.attention.tick(elapsed_hours);
        self.pass_time(elapsed_hours);
    }

    fn pass_time(&mut self, elapsed_hours: f64) {
        let elapsed = sanitize_elapsed(elapsed_hours);
        if elapsed == 0.0 {
            return;
        }
        self.behaviors.advance(elapsed);
        self.energy = clamp_unit(self.energy + self.config.energy.recovery_per_hour * elapsed);
    }

    /// Report that a behavior was performed
    ///
    /// Starts its cooldown and spends its energy cost. Returns `false` for
    /// behaviors that are not in the catalog.
    pub fn record_outcome(&mut self, behavior: &str, success: bool) -> bool {
        match self
            .behaviors
            .record_outcome(behavior, success)
            .map(|def| def.energy_cost)
        {
            Some(cost) => {
                self.energy = clamp_unit(self.energy - cost);
                true
            }
            None => false,
        }
    }

    /// Most relevant remembered episodes
    pub fn retrieve(&self, filter: &ContextFilter, limit: usize, now: DateTime<Utc>) -> Vec<ScoredEpisode<'_>> {
        self.memory.retrieve(filter, limit, now)
    }

    /// Behaviors that would be selected right now
    pub fn active_behaviors(&self) -> Vec<String> {
        self.behaviors.select(self.traits.values(), &self.runtime_state())
    }

    /// Energy and attention as seen by the behavior selector
    pub fn runtime_state(&self) -> RuntimeState {
        RuntimeState {
            energy: self.energy,
            attention_level: self.attention.level(),
            attention_pressure: self.attention.pressure(),
        }
    }

    /// Entity identifier
    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    /// Shared configuration
    pub fn config(&self) -> &Arc<EvolutionConfig> {
        &self.config
    }

    /// Trait graph
    pub fn traits(&self) -> &TraitGraph {
        &self.traits
    }

    /// Attention tracker
    pub fn attention(&self) -> &AttentionTracker {
        &self.attention
    }

    /// Memory store
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Behavior selector
    pub fn behaviors(&self) -> &BehaviorSelector {
        &self.behaviors
    }

    /// Current energy
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Events processed so far
    pub fn processed_events(&self) -> u64 {
        self.processed_events
    }

    /// Capture the full state
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            entity_id: self.entity_id,
            traits: self.traits.state().clone(),
            attention: self.attention.state().clone(),
            memory: self.memory.state().clone(),
            behaviors: self.behaviors.state().clone(),
            energy: self.energy,
            processed_events: self.processed_events,
        }
    }

    /// Rebuild an entity from a snapshot taken under `config`
    pub fn restore(config: Arc<EvolutionConfig>, snapshot: EngineSnapshot) -> Result<Self> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CompanionError::snapshot(format!(
                "unsupported format version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if !(0.0..=1.0).contains(&snapshot.energy) {
            return Err(CompanionError::snapshot(format!(
                "energy {} is outside [0, 1]",
                snapshot.energy
            )));
        }
        config.validate()?;

        let traits = TraitGraph::from_state(config.traits.clone(), snapshot.traits)?;
        let attention = AttentionTracker::from_state(config.attention.clone(), snapshot.attention)?;
        let memory = MemoryStore::from_state(config.memory.clone(), snapshot.memory)?;
        let behaviors = BehaviorSelector::from_state(config.behaviors.clone(), snapshot.behaviors)?;

        tracing::info!(
            entity_id = %snapshot.entity_id,
            processed_events = snapshot.processed_events,
            "companion restored"
        );

        Ok(Self {
            entity_id: snapshot.entity_id,
            config,
            traits,
            attention,
            memory,
            behaviors,
            energy: snapshot.energy,
            processed_events: snapshot.processed_events,
        })
    }

    /// Snapshot as a JSON string
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Rebuild from [`EvolutionEngine::serialize`] output
    pub fn deserialize(json: &str, config: Arc<EvolutionConfig>) -> Result<Self> {
        let snapshot: EngineSnapshot = serde_json::from_str(json)?;
        Self::restore(config, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn engine() -> EvolutionEngine {
        let config = Arc::new(EvolutionConfig::default());
        EvolutionEngine::with_rng_seed(config, &SeedStrategy::archetype("balanced"), 42).unwrap()
    }

    #[test]
    fn test_invalid_config_prevents_creation() {
        let mut config = EvolutionConfig::default();
        config.traits.self_weight = -1.0;
        let result = EvolutionEngine::new(Arc::new(config), &SeedStrategy::random());
        assert!(matches!(result, Err(CompanionError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_process_known_event() {
        let mut engine = engine();
        let result = engine.process(&InteractionEvent::new("alice", "teach", 1.0, start()));

        assert!(!result.unknown_event);
        assert!(result.trait_deltas["curiosity"] > 0.04);
        assert!(result.attention.applied_delta > 0.0);
        assert_eq!(result.memory_summary.episode_count, 1);
        assert!(!result.active_behaviors.is_empty());
        assert_eq!(engine.processed_events(), 1);
    }

    #[test]
    fn test_unknown_event_is_flagged() {
        let mut engine = engine();
        let before = engine.attention().level();
        let result = engine.process(&InteractionEvent::new("alice", "juggle", 1.0, start()));

        assert!(result.unknown_event);
        assert_eq!(result.attention.applied_delta, 0.0);
        assert_eq!(engine.attention().level(), before);
        assert!(engine.traits().reinforcement_ema().is_empty());
        assert_eq!(engine.memory().episodes().len(), 1);
    }

    #[test]
    fn test_attention_delta_scales_signals() {
        let engine = engine();
        let event = InteractionEvent::new("alice", "ignore", 2.0, start());

        let neutral = engine.signals_for(&event, 2.0, 0.0);
        let dampened = engine.signals_for(&event, 2.0, -0.2);
        let amplified = engine.signals_for(&event, 2.0, 0.1);

        assert!((neutral["independence"] - 0.6).abs() < 1e-12);
        assert!(dampened["independence"] < neutral["independence"]);
        assert!(amplified["independence"] > neutral["independence"]);
        assert!(engine.signals_for(&InteractionEvent::new("alice", "juggle", 1.0, start()), 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_pattern_feedback_amplifies() {
        let mut engine = engine();
        let event = |i: i64| InteractionEvent::new("alice", "teach", 1.0, start() + Duration::minutes(i));
        for i in 0..3 {
            engine.process(&event(i));
        }
        let key = preference_key("alice", "teach");
        assert!(engine.memory().pattern(&key).is_some());

        let signals = engine.signals_for(&event(3), 1.0, 0.0);
        let mapped = engine.config().event_signals["teach"]["curiosity"];
        assert!(signals["curiosity"] > mapped);
    }

    #[test]
    fn test_energy_bookkeeping() {
        let mut engine = engine();
        let initial = engine.energy();

        assert!(engine.record_outcome("play", true));
        assert!((engine.energy() - (initial - 0.25)).abs() < 1e-12);
        assert!(!engine.record_outcome("fly", true));

        engine.tick(2.0);
        assert!((engine.energy() - (initial - 0.15)).abs() < 1e-12);

        let result = engine.process(&InteractionEvent::new("alice", "feed", 1.0, start()));
        assert!(engine.energy() > initial);
        assert_eq!(result.energy, engine.energy());
    }

    #[test]
    fn test_tick_advances_cooldowns() {
        let mut engine = engine();
        engine.record_outcome("rest", true);
        assert!(engine.behaviors().is_on_cooldown("rest"));
        engine.tick(0.0);
        assert!(engine.behaviors().is_on_cooldown("rest"));
        engine.tick(1.0);
        assert!(!engine.behaviors().is_on_cooldown("rest"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut engine = engine();
        engine.process(&InteractionEvent::new("alice", "play", 1.2, start()));
        engine.record_outcome("play", false);

        let json = engine.serialize().unwrap();
        let restored = EvolutionEngine::deserialize(&json, engine.config().clone()).unwrap();

        assert_eq!(restored.snapshot(), engine.snapshot());
        assert_eq!(restored.entity_id(), engine.entity_id());
    }

    #[test]
    fn test_restore_rejects_mismatched_traits() {
        let engine = engine();
        let mut snapshot = engine.snapshot();
        snapshot.traits.values.remove("calmness");
        let err = EvolutionEngine::restore(engine.config().clone(), snapshot).unwrap_err();
        assert!(matches!(err, CompanionError::Snapshot(_)));
    }

    #[test]
    fn test_restore_rejects_out_of_range_state() {
        let mut engine = engine();
        engine.process(&InteractionEvent::new("alice", "play", 1.0, start()));
        engine.record_outcome("explore", true);
        let config = engine.config().clone();

        let mut snapshot = engine.snapshot();
        snapshot.traits.values.insert("curiosity".to_string(), 7.5);
        let err = EvolutionEngine::restore(config.clone(), snapshot).unwrap_err();
        assert!(matches!(err, CompanionError::Snapshot(_)));

        let mut snapshot = engine.snapshot();
        if let Some(stats) = snapshot.behaviors.stats.get_mut("explore") {
            stats.success_rate = 40.0;
        }
        assert!(EvolutionEngine::restore(config.clone(), snapshot).is_err());

        let mut snapshot = engine.snapshot();
        if let Some(stats) = snapshot.behaviors.stats.get_mut("explore") {
            stats.cooldown_remaining = -3.0;
        }
        assert!(EvolutionEngine::restore(config.clone(), snapshot).is_err());

        let mut snapshot = engine.snapshot();
        if let Some(stats) = snapshot.behaviors.stats.get_mut("explore") {
            stats.successes = stats.attempts + 1;
        }
        assert!(EvolutionEngine::restore(config.clone(), snapshot).is_err());

        assert!(EvolutionEngine::restore(config, engine.snapshot()).is_ok());
    }

    #[test]
    fn test_unrelated_traffic_keeps_preference_feedback() {
        let mut engine = engine();
        for i in 0..3 {
            engine.process(&InteractionEvent::new("alice", "teach", 1.0, start() + Duration::minutes(i)));
        }
        let alice = InteractionEvent::new("alice", "teach", 1.0, start() + Duration::hours(6));
        let before = engine.signals_for(&alice, 1.0, 0.0);

        for i in 0..9 {
            engine.process(&InteractionEvent::new("bob", "play", 1.0, start() + Duration::hours(5) + Duration::minutes(i)));
        }

        let key = preference_key("alice", "teach");
        assert!((engine.memory().pattern(&key).unwrap().confidence - 0.1).abs() < 1e-12);
        assert_eq!(engine.signals_for(&alice, 1.0, 0.0), before);
    }

    #[test]
    fn test_restore_rejects_unknown_version() {
        let engine = engine();
        let mut snapshot = engine.snapshot();
        snapshot.format_version = 99;
        assert!(EvolutionEngine::restore(engine.config().clone(), snapshot).is_err());
    }

    #[test]
    fn test_deserialize_garbage() {
        let config = Arc::new(EvolutionConfig::default());
        let err = EvolutionEngine::deserialize("{\"format_version\": 1}", config).unwrap_err();
        assert!(matches!(err, CompanionError::Serialization(_)));
    }
}
