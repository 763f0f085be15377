//! Inbound interaction events and outbound evolution results

use super::{AttentionBand, TraitMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound of accepted event intensity
pub const MAX_INTENSITY: f64 = 2.0;

/// Clamp an intensity into `[0, MAX_INTENSITY]`; NaN becomes 0
pub fn clamp_intensity(intensity: f64) -> f64 {
    if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, MAX_INTENSITY)
    }
}

/// Something that happened to the companion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Who caused the event
    pub source: String,

    /// Kind of interaction (`feed`, `play`, ...)
    #[serde(rename = "type")]
    pub event_type: String,

    /// Strength of the interaction, nominally 0..2
    #[serde(default = "default_intensity")]
    pub intensity: f64,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Caller-defined payload, stored and returned untouched
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

fn default_intensity() -> f64 {
    1.0
}

impl InteractionEvent {
    /// Create an event with an empty context
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        intensity: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
            intensity,
            timestamp,
            context: HashMap::new(),
        }
    }

    /// Attach a context value
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Attention part of a result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionSummary {
    /// Level after the event
    pub level: f64,
    /// Band of that level
    pub band: AttentionBand,
    /// Urgency in [0, 1]
    pub pressure: f64,
    /// Change caused by the event itself
    pub applied_delta: f64,
}

/// Memory part of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySummary {
    /// Known patterns
    pub pattern_count: usize,
    /// Retained episodes
    pub episode_count: usize,
}

/// Everything one processed event produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Per-trait change (direct reinforcement plus network drift)
    pub trait_deltas: TraitMap,
    /// Emergent tags active after the step
    pub emergent_tags: TraitMap,
    /// Attention after the event
    pub attention: AttentionSummary,
    /// Top behaviors, best first
    pub active_behaviors: Vec<String>,
    /// Memory counters
    pub memory_summary: MemorySummary,
    /// Energy after the event
    pub energy: f64,
    /// The event type had no signal mapping and no attention weight
    pub unknown_event: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clamp_intensity() {
        assert_eq!(clamp_intensity(-1.0), 0.0);
        assert_eq!(clamp_intensity(1.3), 1.3);
        assert_eq!(clamp_intensity(50.0), MAX_INTENSITY);
        assert_eq!(clamp_intensity(f64::NAN), 0.0);
        assert_eq!(clamp_intensity(f64::INFINITY), MAX_INTENSITY);
    }

    #[test]
    fn test_event_json_shape() {
        let json = r#"{
            "source": "alice",
            "type": "play",
            "timestamp": "2024-03-01T09:00:00Z",
            "context": {"toy": "ball"}
        }"#;
        let event: InteractionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "play");
        assert_eq!(event.intensity, 1.0);
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        assert_eq!(event.context["toy"], serde_json::json!("ball"));
    }

    #[test]
    fn test_with_context() {
        let event = InteractionEvent::new("bob", "chat", 0.5, Utc::now())
            .with_context("topic", serde_json::json!("weather"));
        assert_eq!(event.context.len(), 1);
    }
}
