//! Evolution Config - Complete immutable configuration of one companion kind
//!
//! Built once at process start, validated, then shared between entities as
//! `Arc<EvolutionConfig>`.

use super::{AttentionConfig, BehaviorConfig, MemoryConfig, TraitGraphConfig, TraitMap};
use companion_core::{get_env_float, get_env_int, CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Energy bookkeeping tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Energy of a freshly created entity
    pub initial: f64,
    /// Energy regained per elapsed hour
    pub recovery_per_hour: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial: 0.8,
            recovery_per_hour: 0.05,
        }
    }
}

/// Configuration for the whole evolution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Trait graph tunables
    pub traits: TraitGraphConfig,

    /// Attention tracker tunables
    pub attention: AttentionConfig,

    /// Memory store tunables
    pub memory: MemoryConfig,

    /// Behavior selector tunables
    pub behaviors: BehaviorConfig,

    /// Energy bookkeeping tunables
    pub energy: EnergyConfig,

    /// Event type -> trait signals (before intensity scaling)
    pub event_signals: BTreeMap<String, TraitMap>,

    /// Event type -> energy change (before intensity scaling)
    pub event_energy: BTreeMap<String, f64>,

    /// Signal amplification per unit of source-preference confidence
    pub pattern_feedback_gain: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        let signals = |pairs: &[(&str, f64)]| -> TraitMap {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };

        let mut event_signals = BTreeMap::new();
        event_signals.insert(
            "feed".to_string(),
            signals(&[("affection", 0.3), ("calmness", 0.2)]),
        );
        event_signals.insert(
            "play".to_string(),
            signals(&[("playfulness", 0.5), ("confidence", 0.2), ("affection", 0.1)]),
        );
        event_signals.insert(
            "chat".to_string(),
            signals(&[("curiosity", 0.2), ("affection", 0.2), ("empathy", 0.1)]),
        );
        event_signals.insert(
            "teach".to_string(),
            signals(&[("curiosity", 0.5), ("creativity", 0.2), ("confidence", 0.1)]),
        );
        event_signals.insert(
            "puzzle".to_string(),
            signals(&[("curiosity", 0.4), ("creativity", 0.3), ("independence", 0.1)]),
        );
        event_signals.insert(
            "praise".to_string(),
            signals(&[("confidence", 0.4), ("affection", 0.2)]),
        );
        event_signals.insert(
            "pet".to_string(),
            signals(&[("affection", 0.4), ("calmness", 0.3)]),
        );
        event_signals.insert(
            "comfort".to_string(),
            signals(&[("empathy", 0.4), ("calmness", 0.2)]),
        );
        event_signals.insert("rest".to_string(), signals(&[("calmness", 0.2)]));
        event_signals.insert(
            "ignore".to_string(),
            signals(&[("affection", -0.3), ("independence", 0.3), ("playfulness", -0.1)]),
        );
        event_signals.insert(
            "scold".to_string(),
            signals(&[("confidence", -0.3), ("calmness", -0.2), ("affection", -0.1)]),
        );
        event_signals.insert(
            "coherence_refresh".to_string(),
            signals(&[("calmness", 0.2)]),
        );

        let event_energy = [
            ("feed", 0.35),
            ("rest", 0.3),
            ("pet", 0.05),
            ("play", -0.1),
            ("teach", -0.05),
            ("puzzle", -0.05),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            traits: TraitGraphConfig::default(),
            attention: AttentionConfig::default(),
            memory: MemoryConfig::default(),
            behaviors: BehaviorConfig::default(),
            energy: EnergyConfig::default(),
            event_signals,
            event_energy,
            pattern_feedback_gain: 0.5,
        }
    }
}

impl EvolutionConfig {
    /// Defaults with scalar tunables overridden from `COMPANION_*` variables
    ///
    /// Call [`companion_core::load_env`] first to pick up a `.env` file.
    /// The result is not validated; engine constructors do that.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let traits = &mut config.traits;
        traits.direct_rate = get_env_float("COMPANION_DIRECT_RATE", traits.direct_rate);
        traits.network_rate = get_env_float("COMPANION_NETWORK_RATE", traits.network_rate);
        traits.self_weight = get_env_float("COMPANION_SELF_WEIGHT", traits.self_weight);
        traits.jitter = get_env_float("COMPANION_WEIGHT_JITTER", traits.jitter);
        traits.random_variance = get_env_float("COMPANION_SEED_VARIANCE", traits.random_variance);

        let attention = &mut config.attention;
        attention.initial_level =
            get_env_float("COMPANION_ATTENTION_INITIAL", attention.initial_level);
        attention.decay_per_hour =
            get_env_float("COMPANION_ATTENTION_DECAY_PER_HOUR", attention.decay_per_hour);
        attention.max_history = get_env_int("COMPANION_ATTENTION_HISTORY", attention.max_history);
        attention.refresh_level =
            get_env_float("COMPANION_ATTENTION_REFRESH_LEVEL", attention.refresh_level);

        let memory = &mut config.memory;
        memory.capacity = get_env_int("COMPANION_MEMORY_CAPACITY", memory.capacity);
        memory.pattern_window = get_env_int("COMPANION_PATTERN_WINDOW", memory.pattern_window);
        memory.familiarity_threshold =
            get_env_int("COMPANION_FAMILIARITY_THRESHOLD", memory.familiarity_threshold);
        memory.pattern_threshold =
            get_env_int("COMPANION_PATTERN_THRESHOLD", memory.pattern_threshold);
        memory.confidence_step =
            get_env_float("COMPANION_PATTERN_CONFIDENCE_STEP", memory.confidence_step);

        config.behaviors.top_k = get_env_int("COMPANION_BEHAVIOR_TOP_K", config.behaviors.top_k);

        config.energy.initial = get_env_float("COMPANION_ENERGY_INITIAL", config.energy.initial);
        config.energy.recovery_per_hour = get_env_float(
            "COMPANION_ENERGY_RECOVERY_PER_HOUR",
            config.energy.recovery_per_hour,
        );

        config.pattern_feedback_gain =
            get_env_float("COMPANION_PATTERN_FEEDBACK_GAIN", config.pattern_feedback_gain);

        config
    }

    /// Validate every section and every cross-reference between them
    pub fn validate(&self) -> Result<()> {
        self.traits.validate()?;
        self.attention.validate()?;
        self.memory.validate()?;
        self.behaviors.validate()?;
        self.behaviors.validate_traits(&self.traits.traits)?;

        for (event_type, mapping) in &self.event_signals {
            let context = format!("signal mapping for '{}'", event_type);
            for (name, signal) in mapping {
                self.traits.require_trait(name, &context)?;
                if !signal.is_finite() {
                    return Err(CompanionError::invalid_configuration(format!(
                        "{} has a non-finite signal for '{}'",
                        context, name
                    )));
                }
            }
        }

        if let Some((event_type, _)) = self.event_energy.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CompanionError::invalid_configuration(format!(
                "energy change for '{}' is not finite",
                event_type
            )));
        }

        if !(0.0..=1.0).contains(&self.energy.initial) {
            return Err(CompanionError::invalid_configuration(format!(
                "initial energy must be within [0, 1], got {}",
                self.energy.initial
            )));
        }
        for (label, value) in [
            ("energy recovery_per_hour", self.energy.recovery_per_hour),
            ("pattern_feedback_gain", self.pattern_feedback_gain),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CompanionError::invalid_configuration(format!(
                    "{} must be >= 0, got {}",
                    label, value
                )));
            }
        }

        Ok(())
    }

    /// Whether any table reacts to this event type
    pub fn recognizes(&self, event_type: &str) -> bool {
        self.event_signals.contains_key(event_type)
            || self.event_energy.contains_key(event_type)
            || self.attention.recognizes(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_signal_trait_fails() {
        let mut config = EvolutionConfig::default();
        config
            .event_signals
            .entry("play".to_string())
            .or_default()
            .insert("zest".to_string(), 0.2);
        let err = config.validate().unwrap_err();
        assert!(err.is_construction_error());
        assert!(err.to_string().contains("zest"));
    }

    #[test]
    fn test_behavior_trait_is_checked() {
        let mut config = EvolutionConfig::default();
        config.behaviors.catalog[0]
            .requirements
            .insert("sleepiness".to_string(), 0.2);
        assert!(matches!(
            config.validate(),
            Err(CompanionError::UnknownTrait { .. })
        ));
    }

    #[test]
    fn test_recognizes() {
        let config = EvolutionConfig::default();
        assert!(config.recognizes("play"));
        assert!(config.recognizes("coherence_refresh"));
        assert!(!config.recognizes("juggle"));
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("COMPANION_MEMORY_CAPACITY", "64");
        std::env::set_var("COMPANION_DIRECT_RATE", "0.2");
        let config = EvolutionConfig::from_env();
        std::env::remove_var("COMPANION_MEMORY_CAPACITY");
        std::env::remove_var("COMPANION_DIRECT_RATE");

        assert_eq!(config.memory.capacity, 64);
        assert_eq!(config.traits.direct_rate, 0.2);
        assert_eq!(config.attention.max_history, AttentionConfig::default().max_history);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: EvolutionConfig =
            serde_json::from_str(r#"{"memory": {"capacity": 10}, "pattern_feedback_gain": 0.0}"#)
                .unwrap();
        assert_eq!(config.memory.capacity, 10);
        assert_eq!(config.memory.pattern_window, 50);
        assert!(config.event_signals.contains_key("feed"));
        assert!(config.validate().is_ok());
    }
}
