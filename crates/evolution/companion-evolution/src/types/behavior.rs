//! Behavior - Trait-gated catalog and selection of active behaviors
//!
//! The catalog is static configuration. Only the per-behavior outcome
//! statistics and cooldown timers change at runtime.

use super::{sanitize_elapsed, TraitMap};
use companion_core::{CompanionError, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Retention factor of the success-rate EMA
pub const SUCCESS_EMA_RETAIN: f64 = 0.9;

/// Success rate assumed for behaviors that were never attempted
pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;

/// Static catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDefinition {
    /// Unique behavior name
    pub name: String,
    /// Trait -> minimum value; all must be met
    #[serde(default)]
    pub requirements: TraitMap,
    /// Hours the behavior is unavailable after it was performed
    #[serde(default)]
    pub cooldown_hours: f64,
    /// Energy spent each time the behavior is performed
    #[serde(default)]
    pub energy_cost: f64,
}

impl BehaviorDefinition {
    /// Create a definition with no requirements
    pub fn new(name: impl Into<String>, cooldown_hours: f64, energy_cost: f64) -> Self {
        Self {
            name: name.into(),
            requirements: TraitMap::new(),
            cooldown_hours,
            energy_cost,
        }
    }

    /// Add a trait requirement
    pub fn requires(mut self, trait_name: impl Into<String>, minimum: f64) -> Self {
        self.requirements.insert(trait_name.into(), minimum);
        self
    }

    /// Mean of the required traits, or `default_activation` without requirements
    ///
    /// `None` when any requirement is unmet or the trait is missing.
    fn activation(&self, traits: &TraitMap, default_activation: f64) -> Option<f64> {
        if self.requirements.is_empty() {
            return Some(default_activation);
        }

        let mut sum = 0.0;
        for (name, minimum) in &self.requirements {
            let value = *traits.get(name)?;
            if value < *minimum {
                return None;
            }
            sum += value;
        }
        Some(sum / self.requirements.len() as f64)
    }
}

/// Named runtime adjustments applied on top of trait activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeOverride {
    /// Multiply a behavior's activation while energy is below `threshold`
    LowEnergy {
        /// Boosted behavior
        behavior: String,
        /// Energy level under which the boost applies
        threshold: f64,
        /// Activation multiplier
        multiplier: f64,
    },
    /// Multiply a behavior's activation by `1 + gain * pressure`
    LowAttention {
        /// Boosted behavior
        behavior: String,
        /// Scale of the attention pressure
        gain: f64,
    },
}

impl RuntimeOverride {
    /// Behavior the override targets
    pub fn behavior(&self) -> &str {
        match self {
            RuntimeOverride::LowEnergy { behavior, .. } => behavior,
            RuntimeOverride::LowAttention { behavior, .. } => behavior,
        }
    }

    fn multiplier(&self, runtime: &RuntimeState) -> f64 {
        match self {
            RuntimeOverride::LowEnergy {
                threshold,
                multiplier,
                ..
            } => {
                if runtime.energy < *threshold {
                    *multiplier
                } else {
                    1.0
                }
            }
            RuntimeOverride::LowAttention { gain, .. } => 1.0 + gain * runtime.attention_pressure,
        }
    }
}

/// Entity state the selector consults besides traits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Energy in [0, 1]
    pub energy: f64,
    /// Attention level in [0, 1]
    pub attention_level: f64,
    /// Attention pressure in [0, 1]
    pub attention_pressure: f64,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            energy: 1.0,
            attention_level: 1.0,
            attention_pressure: 0.0,
        }
    }
}

/// Tunables for behavior selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Static catalog
    pub catalog: Vec<BehaviorDefinition>,
    /// Runtime-state multipliers
    pub overrides: Vec<RuntimeOverride>,
    /// Number of behaviors returned by a selection
    pub top_k: usize,
    /// Activation of behaviors that have no trait requirements
    pub default_activation: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            catalog: vec![
                BehaviorDefinition::new("rest", 0.5, 0.0),
                BehaviorDefinition::new("explore", 1.0, 0.2).requires("curiosity", 0.55),
                BehaviorDefinition::new("play", 0.75, 0.25).requires("playfulness", 0.55),
                BehaviorDefinition::new("cuddle", 1.0, 0.05).requires("affection", 0.55),
                BehaviorDefinition::new("create", 2.0, 0.2)
                    .requires("creativity", 0.6)
                    .requires("confidence", 0.45),
                BehaviorDefinition::new("comfort", 1.0, 0.1).requires("empathy", 0.6),
                BehaviorDefinition::new("seek_attention", 0.5, 0.1).requires("affection", 0.3),
                BehaviorDefinition::new("wander", 1.5, 0.15).requires("independence", 0.6),
                BehaviorDefinition::new("meditate", 2.0, 0.0).requires("calmness", 0.6),
            ],
            overrides: vec![
                RuntimeOverride::LowEnergy {
                    behavior: "rest".to_string(),
                    threshold: 0.25,
                    multiplier: 3.0,
                },
                RuntimeOverride::LowAttention {
                    behavior: "seek_attention".to_string(),
                    gain: 2.0,
                },
            ],
            top_k: 3,
            default_activation: 0.5,
        }
    }
}

impl BehaviorConfig {
    /// Check names, numbers and override targets
    ///
    /// Trait names are checked by [`BehaviorConfig::validate_traits`].
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(CompanionError::invalid_configuration(
                "behavior top_k must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.default_activation) {
            return Err(CompanionError::invalid_configuration(format!(
                "behavior default_activation must be in [0, 1], got {}",
                self.default_activation
            )));
        }

        let mut names = BTreeSet::new();
        for def in &self.catalog {
            if !names.insert(def.name.as_str()) {
                return Err(CompanionError::invalid_configuration(format!(
                    "behavior '{}' is declared twice",
                    def.name
                )));
            }
            let numbers_ok = def.cooldown_hours.is_finite()
                && def.cooldown_hours >= 0.0
                && def.energy_cost.is_finite()
                && def.energy_cost >= 0.0;
            if !numbers_ok {
                return Err(CompanionError::invalid_configuration(format!(
                    "behavior '{}' needs a non-negative cooldown and energy cost",
                    def.name
                )));
            }
            if let Some((name, threshold)) = def
                .requirements
                .iter()
                .find(|(_, threshold)| !(0.0..=1.0).contains(*threshold))
            {
                return Err(CompanionError::invalid_configuration(format!(
                    "behavior '{}' requires {} >= {}, threshold must be in [0, 1]",
                    def.name, name, threshold
                )));
            }
        }

        for rule in &self.overrides {
            if !names.contains(rule.behavior()) {
                return Err(CompanionError::invalid_configuration(format!(
                    "override targets unknown behavior '{}'",
                    rule.behavior()
                )));
            }
            let factor = match rule {
                RuntimeOverride::LowEnergy {
                    threshold,
                    multiplier,
                    ..
                } => {
                    if !(0.0..=1.0).contains(threshold) {
                        return Err(CompanionError::invalid_configuration(format!(
                            "low-energy threshold for '{}' must be in [0, 1]",
                            rule.behavior()
                        )));
                    }
                    *multiplier
                }
                RuntimeOverride::LowAttention { gain, .. } => *gain,
            };
            if !factor.is_finite() || factor < 0.0 {
                return Err(CompanionError::invalid_configuration(format!(
                    "override for '{}' needs a non-negative factor",
                    rule.behavior()
                )));
            }
        }

        Ok(())
    }

    /// Check every requirement names a declared trait
    pub fn validate_traits(&self, traits: &[String]) -> Result<()> {
        for def in &self.catalog {
            for name in def.requirements.keys() {
                if !traits.contains(name) {
                    return Err(CompanionError::unknown_trait(
                        name,
                        format!("behavior '{}'", def.name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Catalog entry by name
    pub fn definition(&self, name: &str) -> Option<&BehaviorDefinition> {
        self.catalog.iter().find(|d| d.name == name)
    }
}

/// Outcome history of one behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorStats {
    /// Times the behavior was performed
    pub attempts: u64,
    /// Times it succeeded
    pub successes: u64,
    /// EMA of outcomes
    pub success_rate: f64,
    /// Hours left until the behavior is selectable again
    pub cooldown_remaining: f64,
}

impl BehaviorStats {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.successes > self.attempts {
            return Err(format!(
                "{} successes out of {} attempts",
                self.successes, self.attempts
            ));
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(format!("success rate {} outside [0, 1]", self.success_rate));
        }
        if !self.cooldown_remaining.is_finite() || self.cooldown_remaining < 0.0 {
            return Err(format!(
                "cooldown {} is not a non-negative number of hours",
                self.cooldown_remaining
            ));
        }
        Ok(())
    }
}

impl Default for BehaviorStats {
    fn default() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            success_rate: DEFAULT_SUCCESS_RATE,
            cooldown_remaining: 0.0,
        }
    }
}

/// Persisted part of the selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Stats of every behavior that has been performed
    pub stats: BTreeMap<String, BehaviorStats>,
}

/// A candidate with its final activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBehavior {
    /// Behavior name
    pub name: String,
    /// Activation after success and runtime multipliers
    pub activation: f64,
}

/// Picks the active behavior set
#[derive(Debug, Clone)]
pub struct BehaviorSelector {
    config: BehaviorConfig,
    state: BehaviorState,
}

impl BehaviorSelector {
    /// Create a selector with no outcome history
    pub fn new(config: BehaviorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: BehaviorState::default(),
        })
    }

    /// Rebuild from persisted state
    pub fn from_state(config: BehaviorConfig, state: BehaviorState) -> Result<Self> {
        config.validate()?;
        if let Some(name) = state
            .stats
            .keys()
            .find(|name| config.definition(name).is_none())
        {
            return Err(CompanionError::snapshot(format!(
                "stats stored for unknown behavior '{}'",
                name
            )));
        }
        for (name, stats) in &state.stats {
            stats.validate().map_err(|reason| {
                CompanionError::snapshot(format!("stats of behavior '{}': {}", name, reason))
            })?;
        }
        Ok(Self { config, state })
    }

    /// Every eligible behavior with its activation, highest first
    ///
    /// Ties keep catalog order.
    pub fn rank(&self, traits: &TraitMap, runtime: &RuntimeState) -> Vec<RankedBehavior> {
        let mut ranked: Vec<RankedBehavior> = self
            .config
            .catalog
            .iter()
            .filter(|def| !self.is_on_cooldown(&def.name))
            .filter_map(|def| {
                let base = def.activation(traits, self.config.default_activation)?;
                let success = self.success_rate(&def.name);
                let boost: f64 = self
                    .config
                    .overrides
                    .iter()
                    .filter(|o| o.behavior() == def.name)
                    .map(|o| o.multiplier(runtime))
                    .product();
                Some(RankedBehavior {
                    name: def.name.clone(),
                    activation: base * (0.5 + success) * boost,
                })
            })
            .collect();

        ranked.sort_by_key(|r| Reverse(OrderedFloat(r.activation)));
        ranked
    }

    /// Names of the top-K behaviors; empty when nothing qualifies
    pub fn select(&self, traits: &TraitMap, runtime: &RuntimeState) -> Vec<String> {
        self.rank(traits, runtime)
            .into_iter()
            .take(self.config.top_k)
            .map(|r| r.name)
            .collect()
    }

    /// Record that a behavior was performed and start its cooldown
    ///
    /// Returns the definition, or `None` for names not in the catalog.
    pub fn record_outcome(&mut self, name: &str, success: bool) -> Option<&BehaviorDefinition> {
        let def = self.config.catalog.iter().find(|d| d.name == name)?;
        let stats = self.state.stats.entry(name.to_string()).or_default();

        stats.attempts += 1;
        if success {
            stats.successes += 1;
        }
        let outcome = if success { 1.0 } else { 0.0 };
        stats.success_rate =
            SUCCESS_EMA_RETAIN * stats.success_rate + (1.0 - SUCCESS_EMA_RETAIN) * outcome;
        stats.cooldown_remaining = def.cooldown_hours;

        tracing::debug!(
            behavior = name,
            success,
            success_rate = stats.success_rate,
            "behavior outcome recorded"
        );
        Some(def)
    }

    /// Let `elapsed_hours` pass for every cooldown
    pub fn advance(&mut self, elapsed_hours: f64) {
        let elapsed = sanitize_elapsed(elapsed_hours);
        if elapsed == 0.0 {
            return;
        }
        for stats in self.state.stats.values_mut() {
            stats.cooldown_remaining = (stats.cooldown_remaining - elapsed).max(0.0);
        }
    }

    /// Whether a behavior is still cooling down
    pub fn is_on_cooldown(&self, name: &str) -> bool {
        self.state
            .stats
            .get(name)
            .is_some_and(|s| s.cooldown_remaining > 0.0)
    }

    /// Current success rate (default for unseen behaviors)
    pub fn success_rate(&self, name: &str) -> f64 {
        self.state
            .stats
            .get(name)
            .map_or(DEFAULT_SUCCESS_RATE, |s| s.success_rate)
    }

    /// Outcome history of a behavior
    pub fn stats(&self, name: &str) -> Option<&BehaviorStats> {
        self.state.stats.get(name)
    }

    /// Selector configuration
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Persisted state
    pub fn state(&self) -> &BehaviorState {
        &self.state
    }
}
