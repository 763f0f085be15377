//! Attention - A scalar that decays over time and is fed by interactions
//!
//! The tracker keeps a clock cursor at the last time decay was applied.
//! Explicit ticks advance the cursor, so time that has already decayed is
//! never decayed again when the next event arrives.

use super::{clamp_unit, sanitize, sanitize_elapsed};
use chrono::{DateTime, Duration, Utc};
use companion_core::{CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Largest elapsed span (hours) the clock cursor is moved by in one step
const MAX_CLOCK_STEP_HOURS: f64 = 1.0e7;

/// Ordered severity bands of the attention level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionBand {
    /// Below the neglected threshold
    Critical,
    /// Noticeably neglected
    Neglected,
    /// Would like more attention
    Wanting,
    /// Satisfied
    Content,
    /// Doing very well
    Thriving,
}

impl AttentionBand {
    /// Human-readable description of the band
    pub fn description(&self) -> &'static str {
        match self {
            AttentionBand::Critical => "critically neglected and withdrawn",
            AttentionBand::Neglected => "neglected and lonely",
            AttentionBand::Wanting => "wanting some attention",
            AttentionBand::Content => "content",
            AttentionBand::Thriving => "thriving and engaged",
        }
    }
}

impl std::fmt::Display for AttentionBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttentionBand::Critical => "critical",
            AttentionBand::Neglected => "neglected",
            AttentionBand::Wanting => "wanting",
            AttentionBand::Content => "content",
            AttentionBand::Thriving => "thriving",
        };
        f.write_str(name)
    }
}

/// Tunables for the attention tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// Level of a freshly created entity
    pub initial_level: f64,

    /// Level lost per elapsed hour
    pub decay_per_hour: f64,

    /// Maximum retained history records
    pub max_history: usize,

    /// Lower bound of the neglected band
    pub neglected_threshold: f64,

    /// Lower bound of the wanting band
    pub wanting_threshold: f64,

    /// Lower bound of the content band
    pub content_threshold: f64,

    /// Lower bound of the thriving band
    pub thriving_threshold: f64,

    /// Event type that resets the level instead of nudging it
    pub refresh_event: String,

    /// Level the refresh event resets to
    pub refresh_level: f64,

    /// Per-event-type weight, multiplied by intensity
    pub event_weights: BTreeMap<String, f64>,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        let event_weights = [
            ("feed", 0.10),
            ("play", 0.15),
            ("chat", 0.10),
            ("praise", 0.12),
            ("teach", 0.08),
            ("pet", 0.10),
            ("comfort", 0.12),
            ("puzzle", 0.06),
            ("rest", 0.0),
            ("ignore", -0.10),
            ("scold", -0.08),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            initial_level: 0.7,
            decay_per_hour: 0.02,
            max_history: 100,
            neglected_threshold: 0.15,
            wanting_threshold: 0.35,
            content_threshold: 0.55,
            thriving_threshold: 0.80,
            refresh_event: "coherence_refresh".to_string(),
            refresh_level: 0.75,
            event_weights,
        }
    }
}

impl AttentionConfig {
    /// Check rates and band ordering
    pub fn validate(&self) -> Result<()> {
        if !self.decay_per_hour.is_finite() || self.decay_per_hour < 0.0 {
            return Err(CompanionError::invalid_configuration(format!(
                "attention decay_per_hour must be >= 0, got {}",
                self.decay_per_hour
            )));
        }
        if self.max_history == 0 {
            return Err(CompanionError::invalid_configuration(
                "attention max_history must be at least 1",
            ));
        }

        let bounds = [
            self.neglected_threshold,
            self.wanting_threshold,
            self.content_threshold,
            self.thriving_threshold,
        ];
        let in_range = bounds.iter().all(|b| (0.0..=1.0).contains(b));
        let ordered = bounds.windows(2).all(|w| w[0] < w[1]);
        if !in_range || !ordered {
            return Err(CompanionError::invalid_configuration(format!(
                "attention band thresholds must be strictly increasing within [0, 1], got {:?}",
                bounds
            )));
        }

        for (label, level) in [
            ("initial_level", self.initial_level),
            ("refresh_level", self.refresh_level),
        ] {
            if !(0.0..=1.0).contains(&level) {
                return Err(CompanionError::invalid_configuration(format!(
                    "attention {} must be within [0, 1], got {}",
                    label, level
                )));
            }
        }

        if let Some((event, weight)) = self.event_weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(CompanionError::invalid_configuration(format!(
                "attention weight for '{}' is not finite: {}",
                event, weight
            )));
        }

        Ok(())
    }

    /// Classify a level into its band
    pub fn band_for(&self, level: f64) -> AttentionBand {
        if level >= self.thriving_threshold {
            AttentionBand::Thriving
        } else if level >= self.content_threshold {
            AttentionBand::Content
        } else if level >= self.wanting_threshold {
            AttentionBand::Wanting
        } else if level >= self.neglected_threshold {
            AttentionBand::Neglected
        } else {
            AttentionBand::Critical
        }
    }

    /// Urgency in [0, 1]: 1 at or below the neglected bound, 0 at or above
    /// the content bound, linear between
    pub fn pressure_for(&self, level: f64) -> f64 {
        let low = self.neglected_threshold;
        let high = self.content_threshold;
        if level <= low {
            1.0
        } else if level >= high {
            0.0
        } else {
            (high - level) / (high - low)
        }
    }

    /// Whether the tracker reacts to this event type at all
    pub fn recognizes(&self, event_type: &str) -> bool {
        event_type == self.refresh_event || self.event_weights.contains_key(event_type)
    }
}

/// One entry of the attention history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionRecord {
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Event type that produced this record
    pub event_type: String,
    /// Level after the event was applied
    pub level: f64,
}

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionResult {
    /// Change caused by the event itself (decay excluded)
    pub applied_delta: f64,
    /// Level after decay and the event
    pub new_level: f64,
    /// Band of the new level
    pub band: AttentionBand,
    /// Hours of decay applied before the event
    pub elapsed_hours: f64,
}

/// Persisted part of the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionState {
    /// Current level in [0, 1]
    pub level: f64,
    /// Time up to which decay has been applied
    pub clock: Option<DateTime<Utc>>,
    /// Bounded history, oldest first
    pub history: VecDeque<AttentionRecord>,
}

/// Tracks the attention level and its history
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    config: AttentionConfig,
    state: AttentionState,
}

impl AttentionTracker {
    /// Create a tracker at the configured initial level
    pub fn new(config: AttentionConfig) -> Result<Self> {
        config.validate()?;
        let level = clamp_unit(config.initial_level);
        Ok(Self {
            config,
            state: AttentionState {
                level,
                clock: None,
                history: VecDeque::new(),
            },
        })
    }

    /// Rebuild from persisted state
    pub fn from_state(config: AttentionConfig, state: AttentionState) -> Result<Self> {
        config.validate()?;
        if !(0.0..=1.0).contains(&state.level) {
            return Err(CompanionError::snapshot(format!(
                "attention level {} is outside [0, 1]",
                state.level
            )));
        }
        if state.history.len() > config.max_history {
            return Err(CompanionError::snapshot(format!(
                "attention history holds {} records, limit is {}",
                state.history.len(),
                config.max_history
            )));
        }
        Ok(Self { config, state })
    }

    /// Decay by `elapsed_hours`; negative or non-finite spans decay by zero
    pub fn tick(&mut self, elapsed_hours: f64) {
        let elapsed = sanitize_elapsed(elapsed_hours);
        self.decay(elapsed);

        if let Some(clock) = self.state.clock {
            let millis = (elapsed.min(MAX_CLOCK_STEP_HOURS) * 3_600_000.0) as i64;
            if let Some(advanced) = clock.checked_add_signed(Duration::milliseconds(millis)) {
                self.state.clock = Some(advanced);
            }
        }
    }

    /// Decay up to `at`, then apply the event's effect
    ///
    /// Timestamps earlier than the clock cursor decay by zero and leave the
    /// cursor where it is.
    pub fn apply(&mut self, event_type: &str, intensity: f64, at: DateTime<Utc>) -> AttentionResult {
        let elapsed = match self.state.clock {
            Some(clock) if at > clock => {
                let hours = (at - clock).num_milliseconds() as f64 / 3_600_000.0;
                self.state.clock = Some(at);
                hours
            }
            Some(_) => 0.0,
            None => {
                self.state.clock = Some(at);
                0.0
            }
        };
        self.decay(elapsed);

        let before = self.state.level;
        let after = if event_type == self.config.refresh_event {
            clamp_unit(self.config.refresh_level)
        } else {
            let weight = self.config.event_weights.get(event_type).copied().unwrap_or(0.0);
            clamp_unit(before + weight * sanitize(intensity))
        };
        self.state.level = after;

        self.state.history.push_back(AttentionRecord {
            timestamp: at,
            event_type: event_type.to_string(),
            level: after,
        });
        while self.state.history.len() > self.config.max_history {
            self.state.history.pop_front();
        }

        let band = self.band();
        tracing::debug!(
            event_type,
            level = after,
            delta = after - before,
            %band,
            "attention updated"
        );

        AttentionResult {
            applied_delta: after - before,
            new_level: after,
            band,
            elapsed_hours: elapsed,
        }
    }

    fn decay(&mut self, elapsed_hours: f64) {
        if elapsed_hours > 0.0 {
            let decayed = self.state.level - self.config.decay_per_hour * elapsed_hours;
            self.state.level = clamp_unit(decayed);
        }
    }

    /// Current level
    pub fn level(&self) -> f64 {
        self.state.level
    }

    /// Current band
    pub fn band(&self) -> AttentionBand {
        self.config.band_for(self.state.level)
    }

    /// Current pressure
    pub fn pressure(&self) -> f64 {
        self.config.pressure_for(self.state.level)
    }

    /// History, oldest first
    pub fn history(&self) -> &VecDeque<AttentionRecord> {
        &self.state.history
    }

    /// Time up to which decay has been applied
    pub fn clock(&self) -> Option<DateTime<Utc>> {
        self.state.clock
    }

    /// Tracker configuration
    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Persisted state
    pub fn state(&self) -> &AttentionState {
        &self.state
    }
}
