//! Trait Graph - Personality values and the influence network between them
//!
//! Each trait is an independent scalar in [0, 1]. A static, weighted,
//! directed graph describes how strongly one trait pulls on another. Every
//! call to [`TraitGraph::evolve`] applies direct reinforcement for the
//! signalled traits, then a single propagation pass across the whole graph.
//!
//! Known asymmetry: the self-weight diagonal keeps pushing a trait that is
//! already at 1.0 upwards. Clamping is the only thing holding it there; no
//! decay term counteracts it.

use super::{clamp_unit, sanitize};
use companion_core::{CompanionError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Trait name to value (or delta). Ordered so that summation order is stable.
pub type TraitMap = BTreeMap<String, f64>;

/// Retention factor of the reinforcement EMA (`ema = 0.8*prev + 0.2*signal`)
pub const EMA_RETAIN: f64 = 0.8;

/// Trait set used by the default configuration
pub const DEFAULT_TRAITS: [&str; 8] = [
    "curiosity",
    "playfulness",
    "affection",
    "empathy",
    "creativity",
    "confidence",
    "independence",
    "calmness",
];

/// A listed edge of the influence graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Influencing trait
    pub from: String,
    /// Influenced trait
    pub to: String,
    /// Signed weight, roughly in [-1, 1]
    pub weight: f64,
}

impl Relationship {
    /// Create a relationship
    pub fn new(from: impl Into<String>, to: impl Into<String>, weight: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            weight,
        }
    }
}

/// "If `first` > θ1 and `second` > θ2 then `name` = mean(first, second)"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergentRule {
    /// Name of the derived tag
    pub name: String,
    /// First source trait
    pub first: String,
    /// Threshold the first trait must exceed
    pub first_threshold: f64,
    /// Second source trait
    pub second: String,
    /// Threshold the second trait must exceed
    pub second_threshold: f64,
}

impl EmergentRule {
    /// Create a rule
    pub fn new(
        name: impl Into<String>,
        first: impl Into<String>,
        first_threshold: f64,
        second: impl Into<String>,
        second_threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            first: first.into(),
            first_threshold,
            second: second.into(),
            second_threshold,
        }
    }

    fn evaluate(&self, values: &TraitMap) -> Option<f64> {
        let a = *values.get(&self.first)?;
        let b = *values.get(&self.second)?;
        (a > self.first_threshold && b > self.second_threshold).then(|| (a + b) / 2.0)
    }
}

/// Tunables for the trait graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitGraphConfig {
    /// Names of every trait the entity carries
    pub traits: Vec<String>,

    /// Multiplier applied to direct signals
    pub direct_rate: f64,

    /// Multiplier applied to the network propagation sum
    pub network_rate: f64,

    /// Diagonal weight for traits without an explicit self relationship
    pub self_weight: f64,

    /// Half-width of the random weight given to unlisted off-diagonal pairs
    pub jitter: f64,

    /// Half-width of the band around 0.5 used by fully random seeding
    pub random_variance: f64,

    /// Fixed relationship table
    pub relationships: Vec<Relationship>,

    /// Emergent-trait rules checked after every evolution step
    pub emergent_rules: Vec<EmergentRule>,

    /// Named seeding presets; traits missing from a preset start at 0.5
    pub archetypes: BTreeMap<String, TraitMap>,
}

impl Default for TraitGraphConfig {
    fn default() -> Self {
        let preset = |pairs: &[(&str, f64)]| -> TraitMap {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        };

        let mut archetypes = BTreeMap::new();
        archetypes.insert("balanced".to_string(), TraitMap::new());
        archetypes.insert(
            "curious".to_string(),
            preset(&[("curiosity", 0.8), ("creativity", 0.7), ("independence", 0.6)]),
        );
        archetypes.insert(
            "affectionate".to_string(),
            preset(&[("affection", 0.8), ("empathy", 0.75), ("playfulness", 0.6)]),
        );
        archetypes.insert(
            "playful".to_string(),
            preset(&[("playfulness", 0.85), ("confidence", 0.6), ("calmness", 0.3)]),
        );
        archetypes.insert(
            "stoic".to_string(),
            preset(&[
                ("calmness", 0.8),
                ("independence", 0.75),
                ("playfulness", 0.3),
                ("affection", 0.4),
            ]),
        );

        Self {
            traits: DEFAULT_TRAITS.iter().map(|t| t.to_string()).collect(),
            direct_rate: 0.1,
            network_rate: 0.01,
            self_weight: 0.05,
            jitter: 0.02,
            random_variance: 0.15,
            relationships: vec![
                Relationship::new("curiosity", "creativity", 0.3),
                Relationship::new("creativity", "curiosity", 0.2),
                Relationship::new("curiosity", "playfulness", 0.15),
                Relationship::new("affection", "empathy", 0.4),
                Relationship::new("empathy", "affection", 0.3),
                Relationship::new("empathy", "calmness", 0.1),
                Relationship::new("playfulness", "affection", 0.2),
                Relationship::new("playfulness", "calmness", -0.2),
                Relationship::new("calmness", "playfulness", -0.15),
                Relationship::new("confidence", "independence", 0.3),
                Relationship::new("confidence", "playfulness", 0.1),
                Relationship::new("independence", "affection", -0.2),
                Relationship::new("creativity", "confidence", 0.15),
            ],
            emergent_rules: vec![
                EmergentRule::new("inventiveness", "curiosity", 0.7, "creativity", 0.7),
                EmergentRule::new("devotion", "affection", 0.7, "empathy", 0.7),
                EmergentRule::new("mischief", "playfulness", 0.7, "confidence", 0.7),
                EmergentRule::new("serenity", "calmness", 0.7, "independence", 0.7),
            ],
            archetypes,
        }
    }
}

impl TraitGraphConfig {
    /// Check every name and rate; fails on the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.traits.is_empty() {
            return Err(CompanionError::invalid_configuration(
                "trait set must not be empty",
            ));
        }

        let mut seen = BTreeSet::new();
        for name in &self.traits {
            if !seen.insert(name.as_str()) {
                return Err(CompanionError::invalid_configuration(format!(
                    "trait '{}' is declared twice",
                    name
                )));
            }
        }

        for (label, rate) in [
            ("direct_rate", self.direct_rate),
            ("network_rate", self.network_rate),
            ("jitter", self.jitter),
            ("random_variance", self.random_variance),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(CompanionError::invalid_configuration(format!(
                    "{} must be a non-negative number, got {}",
                    label, rate
                )));
            }
        }

        if !self.self_weight.is_finite() || self.self_weight < 0.0 {
            return Err(CompanionError::invalid_configuration(format!(
                "self_weight must be >= 0, got {}",
                self.self_weight
            )));
        }

        for rel in &self.relationships {
            self.require_trait(&rel.from, "influence relationship")?;
            self.require_trait(&rel.to, "influence relationship")?;
            if !rel.weight.is_finite() {
                return Err(CompanionError::invalid_configuration(format!(
                    "weight {} -> {} is not finite",
                    rel.from, rel.to
                )));
            }
            if rel.from == rel.to && rel.weight < 0.0 {
                return Err(CompanionError::invalid_configuration(format!(
                    "self-weight of '{}' must be >= 0, got {}",
                    rel.from, rel.weight
                )));
            }
        }

        for rule in &self.emergent_rules {
            let context = format!("emergent rule '{}'", rule.name);
            self.require_trait(&rule.first, &context)?;
            self.require_trait(&rule.second, &context)?;
        }

        for (archetype, preset) in &self.archetypes {
            let context = format!("archetype '{}'", archetype);
            for name in preset.keys() {
                self.require_trait(name, &context)?;
            }
        }

        Ok(())
    }

    /// Whether `name` is a declared trait
    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.iter().any(|t| t == name)
    }

    /// Fail with [`CompanionError::UnknownTrait`] if `name` is not declared
    pub fn require_trait(&self, name: &str, context: &str) -> Result<()> {
        if self.has_trait(name) {
            Ok(())
        } else {
            Err(CompanionError::unknown_trait(name, context))
        }
    }
}

/// How initial trait values are chosen at entity creation
///
/// The archetype (or, without one, a random draw around 0.5) provides the
/// base; any explicit `initial` values are laid over it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedStrategy {
    /// Named preset from [`TraitGraphConfig::archetypes`]
    pub archetype: Option<String>,
    /// Explicit starting values
    pub initial: Option<TraitMap>,
}

impl SeedStrategy {
    /// Fully random within the configured variance band
    pub fn random() -> Self {
        Self::default()
    }

    /// Start from a named preset
    pub fn archetype(name: impl Into<String>) -> Self {
        Self {
            archetype: Some(name.into()),
            initial: None,
        }
    }

    /// Start from explicit values (unlisted traits are drawn randomly)
    pub fn explicit(initial: TraitMap) -> Self {
        Self {
            archetype: None,
            initial: Some(initial),
        }
    }

    /// Every trait at the same value
    pub fn uniform(traits: &[String], value: f64) -> Self {
        Self::explicit(traits.iter().map(|t| (t.clone(), value)).collect())
    }

    /// Overlay explicit values on top of the current strategy
    pub fn with_initial(mut self, initial: TraitMap) -> Self {
        self.initial = Some(initial);
        self
    }

    fn resolve<R: Rng>(&self, config: &TraitGraphConfig, rng: &mut R) -> Result<TraitMap> {
        let mut values = match &self.archetype {
            Some(name) => {
                let preset = config
                    .archetypes
                    .get(name)
                    .ok_or_else(|| CompanionError::unknown_archetype(name.clone()))?;
                config
                    .traits
                    .iter()
                    .map(|t| (t.clone(), clamp_unit(preset.get(t).copied().unwrap_or(0.5))))
                    .collect::<TraitMap>()
            }
            None => {
                let variance = config.random_variance;
                config
                    .traits
                    .iter()
                    .map(|t| {
                        let offset = if variance > 0.0 {
                            rng.gen_range(-variance..=variance)
                        } else {
                            0.0
                        };
                        (t.clone(), clamp_unit(0.5 + offset))
                    })
                    .collect()
            }
        };

        if let Some(initial) = &self.initial {
            for (name, value) in initial {
                config.require_trait(name, "initial trait map")?;
                values.insert(name.clone(), clamp_unit(*value));
            }
        }

        Ok(values)
    }
}

/// Static weighted directed graph between traits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceGraph {
    /// target -> source -> weight
    incoming: BTreeMap<String, TraitMap>,
}

impl InfluenceGraph {
    /// Build from the relationship table, filling unlisted pairs with jitter
    pub fn build<R: Rng>(config: &TraitGraphConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let listed: BTreeMap<(&str, &str), f64> = config
            .relationships
            .iter()
            .map(|r| ((r.from.as_str(), r.to.as_str()), r.weight))
            .collect();

        let mut incoming = BTreeMap::new();
        for to in &config.traits {
            let mut sources = TraitMap::new();
            for from in &config.traits {
                let weight = match listed.get(&(from.as_str(), to.as_str())) {
                    Some(w) => *w,
                    None if from == to => config.self_weight,
                    None if config.jitter > 0.0 => rng.gen_range(-config.jitter..=config.jitter),
                    None => 0.0,
                };
                sources.insert(from.clone(), weight);
            }
            incoming.insert(to.clone(), sources);
        }

        Ok(Self { incoming })
    }

    /// Weight of the edge `from -> to` (0 when absent)
    pub fn weight(&self, from: &str, to: &str) -> f64 {
        self.incoming
            .get(to)
            .and_then(|sources| sources.get(from))
            .copied()
            .unwrap_or(0.0)
    }

    /// All edges pointing at `to`
    pub fn incoming(&self, to: &str) -> impl Iterator<Item = (&str, f64)> {
        self.incoming
            .get(to)
            .into_iter()
            .flat_map(|sources| sources.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Check the graph only mentions `traits` and keeps a non-negative diagonal
    pub fn validate_against(&self, traits: &[String]) -> Result<()> {
        let known: BTreeSet<&str> = traits.iter().map(String::as_str).collect();
        for (to, sources) in &self.incoming {
            if !known.contains(to.as_str()) {
                return Err(CompanionError::unknown_trait(to, "influence graph"));
            }
            for (from, weight) in sources {
                if !known.contains(from.as_str()) {
                    return Err(CompanionError::unknown_trait(from, "influence graph"));
                }
                if !weight.is_finite() {
                    return Err(CompanionError::invalid_configuration(format!(
                        "weight {} -> {} is not finite",
                        from, to
                    )));
                }
                if from == to && *weight < 0.0 {
                    return Err(CompanionError::invalid_configuration(format!(
                        "self-weight of '{}' must be >= 0",
                        from
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Output of one evolution step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitEvolution {
    /// Total change per trait (direct + network)
    pub deltas: TraitMap,
    /// Emergent tags that fired after the step
    pub emergent: TraitMap,
}

/// Persisted part of a trait graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitGraphState {
    /// Current trait values
    pub values: TraitMap,
    /// Influence weights
    pub graph: InfluenceGraph,
    /// Reinforcement EMA per trait that has ever been signalled
    pub reinforcement_ema: TraitMap,
}

/// Trait values plus the network that propagates between them
#[derive(Debug, Clone)]
pub struct TraitGraph {
    config: TraitGraphConfig,
    state: TraitGraphState,
}

impl TraitGraph {
    /// Create a trait graph using the given seeding strategy
    pub fn new<R: Rng>(
        config: TraitGraphConfig,
        seed: &SeedStrategy,
        rng: &mut R,
    ) -> Result<Self> {
        let graph = InfluenceGraph::build(&config, rng)?;
        let values = seed.resolve(&config, rng)?;
        Ok(Self {
            config,
            state: TraitGraphState {
                values,
                graph,
                reinforcement_ema: TraitMap::new(),
            },
        })
    }

    /// Rebuild from persisted state
    pub fn from_state(config: TraitGraphConfig, state: TraitGraphState) -> Result<Self> {
        config.validate()?;

        let declared: BTreeSet<&String> = config.traits.iter().collect();
        let stored: BTreeSet<&String> = state.values.keys().collect();
        if declared != stored {
            return Err(CompanionError::snapshot(
                "stored trait set differs from the configured trait set",
            ));
        }
        if let Some((name, value)) = state
            .values
            .iter()
            .find(|(_, value)| !(0.0..=1.0).contains(*value))
        {
            return Err(CompanionError::snapshot(format!(
                "trait '{}' is {}, outside [0, 1]",
                name, value
            )));
        }
        state.graph.validate_against(&config.traits)?;
        for (name, ema) in &state.reinforcement_ema {
            config.require_trait(name, "reinforcement telemetry")?;
            if !ema.is_finite() {
                return Err(CompanionError::snapshot(format!(
                    "reinforcement telemetry of '{}' is not finite",
                    name
                )));
            }
        }

        Ok(Self { config, state })
    }

    /// Apply signals and one propagation pass; returns per-trait deltas
    ///
    /// Propagation reads the values *after* direct reinforcement. An empty
    /// signal map still runs the network step.
    pub fn evolve(&mut self, signals: &TraitMap) -> TraitEvolution {
        let before = self.state.values.clone();

        for (name, raw) in signals {
            let Some(value) = self.state.values.get_mut(name) else {
                continue;
            };
            let signal = sanitize(*raw);
            *value = clamp_unit(*value + signal * self.config.direct_rate);

            let ema = self.state.reinforcement_ema.entry(name.clone()).or_insert(0.0);
            *ema = EMA_RETAIN * *ema + (1.0 - EMA_RETAIN) * signal;
        }

        let network: TraitMap = self
            .state
            .values
            .keys()
            .map(|target| {
                let pull: f64 = self
                    .state
                    .graph
                    .incoming(target)
                    .map(|(source, weight)| {
                        self.state.values.get(source).copied().unwrap_or(0.0) * weight
                    })
                    .sum();
                (target.clone(), pull * self.config.network_rate)
            })
            .collect();

        for (name, push) in &network {
            if let Some(value) = self.state.values.get_mut(name) {
                *value = clamp_unit(*value + push);
            }
        }

        let deltas: TraitMap = self
            .state
            .values
            .iter()
            .map(|(name, after)| (name.clone(), after - before.get(name).copied().unwrap_or(*after)))
            .collect();

        for (name, delta) in &deltas {
            tracing::trace!(trait_name = %name, delta, "trait evolved");
        }

        TraitEvolution {
            deltas,
            emergent: self.emergent_traits(),
        }
    }

    /// Evaluate the emergent rule table against current values
    pub fn emergent_traits(&self) -> TraitMap {
        self.config
            .emergent_rules
            .iter()
            .filter_map(|rule| {
                rule.evaluate(&self.state.values)
                    .map(|value| (rule.name.clone(), value))
            })
            .collect()
    }

    /// Current trait values
    pub fn values(&self) -> &TraitMap {
        &self.state.values
    }

    /// Value of a single trait
    pub fn get(&self, name: &str) -> Option<f64> {
        self.state.values.get(name).copied()
    }

    /// The influence network
    pub fn graph(&self) -> &InfluenceGraph {
        &self.state.graph
    }

    /// Reinforcement EMA telemetry
    pub fn reinforcement_ema(&self) -> &TraitMap {
        &self.state.reinforcement_ema
    }

    /// Persisted state
    pub fn state(&self) -> &TraitGraphState {
        &self.state
    }

    /// Short description of the dominant traits
    pub fn describe(&self) -> String {
        let mut high: Vec<(&String, f64)> = self
            .state
            .values
            .iter()
            .filter(|(_, v)| **v > 0.7)
            .map(|(k, v)| (k, *v))
            .collect();
        high.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let low: Vec<&str> = self
            .state
            .values
            .iter()
            .filter(|(_, v)| **v < 0.3)
            .map(|(k, _)| k.as_str())
            .collect();

        let mut parts = Vec::new();
        if !high.is_empty() {
            let names: Vec<&str> = high.iter().map(|(k, _)| k.as_str()).collect();
            parts.push(format!("strong {}", names.join(", ")));
        }
        if !low.is_empty() {
            parts.push(format!("little {}", low.join(", ")));
        }

        if parts.is_empty() {
            "balanced".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_config() -> TraitGraphConfig {
        TraitGraphConfig {
            relationships: Vec::new(),
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn half(config: &TraitGraphConfig) -> SeedStrategy {
        SeedStrategy::uniform(&config.traits, 0.5)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TraitGraphConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unknown_relationship_trait_fails() {
        let mut config = TraitGraphConfig::default();
        config
            .relationships
            .push(Relationship::new("curiosity", "grumpiness", 0.2));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CompanionError::UnknownTrait { ref name, .. } if name == "grumpiness"));
    }

    #[test]
    fn test_negative_self_weight_fails() {
        let mut config = TraitGraphConfig::default();
        config
            .relationships
            .push(Relationship::new("calmness", "calmness", -0.1));
        assert!(config.validate().is_err());

        let config = TraitGraphConfig {
            self_weight: -0.01,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_direct_reinforcement() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(7);
        let seed = half(&config);
        let mut graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let mut signals = TraitMap::new();
        signals.insert("curiosity".to_string(), 0.5);
        let out = graph.evolve(&signals);

        // direct term alone is 0.05; the self-weight adds a little more
        assert!(out.deltas["curiosity"] >= 0.05);
        assert!(graph.get("curiosity").unwrap() <= 1.0);
    }

    #[test]
    fn test_empty_signals_still_drift() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(1);
        let seed = half(&config);
        let mut graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let out = graph.evolve(&TraitMap::new());
        assert!(out.deltas.values().any(|d| *d != 0.0));
        assert!(graph.reinforcement_ema().is_empty());
    }

    #[test]
    fn test_saturated_trait_stays_clamped() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(3);
        let seed = SeedStrategy::uniform(&config.traits, 1.0);
        let mut graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let mut signals = TraitMap::new();
        signals.insert("affection".to_string(), 5.0);
        for _ in 0..20 {
            graph.evolve(&signals);
        }
        assert_eq!(graph.get("affection"), Some(1.0));
    }

    #[test]
    fn test_non_finite_signal_is_ignored() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(3);
        let seed = half(&config);
        let mut graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let mut signals = TraitMap::new();
        signals.insert("empathy".to_string(), f64::NAN);
        signals.insert("not_a_trait".to_string(), 1.0);
        graph.evolve(&signals);

        assert!(graph.values().values().all(|v| v.is_finite()));
        assert_eq!(graph.reinforcement_ema()["empathy"], 0.0);
    }

    #[test]
    fn test_reinforcement_ema() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(3);
        let seed = half(&config);
        let mut graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let mut signals = TraitMap::new();
        signals.insert("creativity".to_string(), 1.0);
        graph.evolve(&signals);
        graph.evolve(&signals);

        let ema = graph.reinforcement_ema()["creativity"];
        assert!((ema - 0.36).abs() < 1e-12);
    }

    #[test]
    fn test_emergent_rule_fires() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(3);
        let mut initial = TraitMap::new();
        initial.insert("curiosity".to_string(), 0.9);
        initial.insert("creativity".to_string(), 0.8);
        let seed = SeedStrategy::archetype("balanced").with_initial(initial);
        let graph = TraitGraph::new(config, &seed, &mut rng).unwrap();

        let emergent = graph.emergent_traits();
        assert!((emergent["inventiveness"] - 0.85).abs() < 1e-12);
        assert!(!emergent.contains_key("devotion"));
        // derived tags never enter the trait map
        assert!(graph.get("inventiveness").is_none());
    }

    #[test]
    fn test_archetype_seeding() {
        let config = TraitGraphConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let graph = TraitGraph::new(config, &SeedStrategy::archetype("curious"), &mut rng).unwrap();
        assert_eq!(graph.get("curiosity"), Some(0.8));
        assert_eq!(graph.get("calmness"), Some(0.5));
    }

    #[test]
    fn test_unknown_archetype_fails() {
        let config = TraitGraphConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        let err = TraitGraph::new(config, &SeedStrategy::archetype("pirate"), &mut rng).unwrap_err();
        assert!(matches!(err, CompanionError::UnknownArchetype(_)));
    }

    #[test]
    fn test_random_seeding_within_variance() {
        let config = TraitGraphConfig::default();
        let variance = config.random_variance;
        let mut rng = StdRng::seed_from_u64(99);
        let graph = TraitGraph::new(config, &SeedStrategy::random(), &mut rng).unwrap();
        for value in graph.values().values() {
            assert!((value - 0.5).abs() <= variance + 1e-12);
        }
    }

    #[test]
    fn test_graph_weights() {
        let config = TraitGraphConfig::default();
        let jitter = config.jitter;
        let mut rng = StdRng::seed_from_u64(5);
        let graph = InfluenceGraph::build(&config, &mut rng).unwrap();

        assert_eq!(graph.weight("affection", "empathy"), 0.4);
        assert_eq!(graph.weight("calmness", "calmness"), 0.05);
        assert!(graph.weight("calmness", "creativity").abs() <= jitter);
        assert_eq!(graph.incoming("curiosity").count(), DEFAULT_TRAITS.len());
    }

    #[test]
    fn test_describe() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(3);
        let graph = TraitGraph::new(config.clone(), &half(&config), &mut rng).unwrap();
        assert_eq!(graph.describe(), "balanced");

        let graph = TraitGraph::new(config, &SeedStrategy::archetype("playful"), &mut rng).unwrap();
        assert!(graph.describe().contains("playfulness"));
    }

    #[test]
    fn test_from_state_rejects_out_of_range_values() {
        let config = quiet_config();
        let mut rng = StdRng::seed_from_u64(5);
        let graph = TraitGraph::new(config.clone(), &half(&config), &mut rng).unwrap();
        assert!(TraitGraph::from_state(config.clone(), graph.state().clone()).is_ok());

        let mut state = graph.state().clone();
        state.values.insert("curiosity".to_string(), 7.5);
        assert!(matches!(
            TraitGraph::from_state(config.clone(), state),
            Err(CompanionError::Snapshot(_))
        ));

        let mut state = graph.state().clone();
        state.values.insert("calmness".to_string(), f64::NAN);
        assert!(TraitGraph::from_state(config.clone(), state).is_err());

        let mut state = graph.state().clone();
        state.reinforcement_ema.insert("curiosity".to_string(), f64::INFINITY);
        assert!(TraitGraph::from_state(config, state).is_err());
    }
}
