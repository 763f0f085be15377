//! Memory - Bounded episodic log, per-source profiles and detected patterns
//!
//! Episodes live in a FIFO buffer. An entry pushed out of the buffer is
//! folded into its source's profile first, so interaction counts never go
//! down. Patterns are derived from a sliding window over the most recent
//! episodes and only ever grow in confidence. A scan strengthens a pattern
//! only when an episode recorded since the previous scan falls in its bucket,
//! so unrelated traffic and repeated scans leave it untouched.

use super::event::MAX_INTENSITY;
use chrono::{DateTime, Timelike, Utc};
use companion_core::{CompanionError, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Hours over which the recency bonus fades out
const RECENCY_HORIZON_HOURS: f64 = 24.0;

/// Tunables for the memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of retained episodes
    pub capacity: usize,

    /// Number of most recent episodes scanned for patterns
    pub pattern_window: usize,

    /// Interactions needed for full familiarity
    pub familiarity_threshold: u64,

    /// Occurrences within the window needed to detect a pattern
    pub pattern_threshold: usize,

    /// Confidence gained per detection
    pub confidence_step: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            pattern_window: 50,
            familiarity_threshold: 10,
            pattern_threshold: 3,
            confidence_step: 0.1,
        }
    }
}

impl MemoryConfig {
    /// Check capacities and steps
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CompanionError::invalid_configuration(
                "memory capacity must be at least 1",
            ));
        }
        if self.pattern_window == 0 {
            return Err(CompanionError::invalid_configuration(
                "memory pattern_window must be at least 1",
            ));
        }
        if self.familiarity_threshold == 0 {
            return Err(CompanionError::invalid_configuration(
                "memory familiarity_threshold must be at least 1",
            ));
        }
        if self.pattern_threshold == 0 {
            return Err(CompanionError::invalid_configuration(
                "memory pattern_threshold must be at least 1",
            ));
        }
        if !self.confidence_step.is_finite() || self.confidence_step <= 0.0 {
            return Err(CompanionError::invalid_configuration(format!(
                "memory confidence_step must be > 0, got {}",
                self.confidence_step
            )));
        }
        Ok(())
    }
}

/// One remembered interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicEntry {
    /// Who interacted
    pub source: String,
    /// What kind of interaction it was
    pub event_type: String,
    /// Clamped intensity
    pub intensity: f64,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Opaque payload carried along from the event
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Aggregated knowledge about one interaction source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Total interactions ever recorded from this source
    pub interaction_count: u64,
    /// Interactions per event type
    pub type_counts: BTreeMap<String, u64>,
    /// First interaction
    pub first_seen: DateTime<Utc>,
    /// Most recent interaction
    pub last_seen: DateTime<Utc>,
    /// min(1, interaction_count / familiarity_threshold)
    pub familiarity: f64,
    /// Running mean of interaction intensity
    pub mean_intensity: f64,
    /// Episodes from this source that were pushed out of the buffer
    pub consolidated: u64,
}

impl SourceProfile {
    fn first(entry: &EpisodicEntry) -> Self {
        Self {
            interaction_count: 0,
            type_counts: BTreeMap::new(),
            first_seen: entry.timestamp,
            last_seen: entry.timestamp,
            familiarity: 0.0,
            mean_intensity: 0.0,
            consolidated: 0,
        }
    }

    fn observe(&mut self, entry: &EpisodicEntry, familiarity_threshold: u64) {
        self.interaction_count += 1;
        *self.type_counts.entry(entry.event_type.clone()).or_insert(0) += 1;
        if entry.timestamp < self.first_seen {
            self.first_seen = entry.timestamp;
        }
        if entry.timestamp > self.last_seen {
            self.last_seen = entry.timestamp;
        }
        let n = self.interaction_count as f64;
        self.mean_intensity += (entry.intensity - self.mean_intensity) / n;
        self.familiarity = (n / familiarity_threshold as f64).min(1.0);
    }

    /// Most frequent event type (ties resolved alphabetically)
    pub fn favorite_type(&self) -> Option<&str> {
        modal(self.type_counts.iter().map(|(k, v)| (k.as_str(), *v as usize)))
    }
}

/// What a pattern describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternKind {
    /// Interactions cluster around an hour of the day (UTC)
    Temporal {
        /// Hour 0-23
        hour: u32,
    },
    /// A source keeps choosing the same kind of interaction
    SourcePreference {
        /// Source the preference belongs to
        source: String,
        /// Preferred event type
        event_type: String,
    },
}

impl PatternKind {
    /// Whether `entry` is an occurrence of this pattern
    pub fn matches(&self, entry: &EpisodicEntry) -> bool {
        match self {
            PatternKind::Temporal { hour } => entry.timestamp.hour() == *hour,
            PatternKind::SourcePreference { source, event_type } => {
                entry.source == *source && entry.event_type == *event_type
            }
        }
    }

    /// Stable identity key of the pattern
    pub fn key(&self) -> String {
        match self {
            PatternKind::Temporal { hour } => temporal_key(*hour),
            PatternKind::SourcePreference { source, event_type } => {
                preference_key(source, event_type)
            }
        }
    }
}

/// Key of the temporal pattern for `hour`
pub fn temporal_key(hour: u32) -> String {
    format!("temporal:{:02}", hour)
}

/// Key of the source-preference pattern for `(source, event_type)`
pub fn preference_key(source: &str, event_type: &str) -> String {
    format!("preference:{}:{}", source, event_type)
}

/// A detected regularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// What was detected
    pub kind: PatternKind,
    /// Confidence in (0, 1]; never decreases
    pub confidence: f64,
    /// Occurrences counted in the window at the latest detection
    pub occurrences: usize,
    /// Number of detections so far
    pub detections: u64,
    /// Timestamp of the newest episode at the latest detection
    pub last_detected: DateTime<Utc>,
}

/// Restricts which episodes [`MemoryStore::retrieve`] considers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextFilter {
    /// Only episodes from this source
    pub source: Option<String>,
    /// Only episodes of this type
    pub event_type: Option<String>,
}

impl ContextFilter {
    /// Filter by source
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            event_type: None,
        }
    }

    /// Also filter by event type
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    fn score(&self, entry: &EpisodicEntry, now: DateTime<Utc>) -> f64 {
        let mut score = 0.0;
        if self.source.as_ref() == Some(&entry.source) {
            score += 1.0;
        }
        if self.event_type.as_ref() == Some(&entry.event_type) {
            score += 0.5;
        }

        let age_hours = (now - entry.timestamp).num_milliseconds() as f64 / 3_600_000.0;
        let recency = if age_hours <= 0.0 {
            0.5
        } else if age_hours < RECENCY_HORIZON_HOURS {
            0.5 * (1.0 - age_hours / RECENCY_HORIZON_HOURS)
        } else {
            0.0
        };
        score + recency
    }
}

/// An episode together with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEpisode<'a> {
    /// The stored episode
    pub entry: &'a EpisodicEntry,
    /// Relevance score used for ordering
    pub score: f64,
}

/// Persisted part of the memory store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Episodes, oldest first
    pub episodes: VecDeque<EpisodicEntry>,
    /// Profile per source
    pub profiles: BTreeMap<String, SourceProfile>,
    /// Patterns by key
    pub patterns: BTreeMap<String, Pattern>,
    /// Episodes ever recorded
    #[serde(default)]
    pub recorded: u64,
    /// Value of `recorded` at the latest pattern scan
    #[serde(default)]
    pub scanned: u64,
}

/// Episodic memory with profiles and pattern detection
#[derive(Debug, Clone)]
pub struct MemoryStore {
    config: MemoryConfig,
    state: MemoryState,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: MemoryState::default(),
        })
    }

    /// Rebuild from persisted state
    pub fn from_state(config: MemoryConfig, state: MemoryState) -> Result<Self> {
        config.validate()?;
        if state.episodes.len() > config.capacity {
            return Err(CompanionError::snapshot(format!(
                "memory holds {} episodes, capacity is {}",
                state.episodes.len(),
                config.capacity
            )));
        }
        if let Some(entry) = state
            .episodes
            .iter()
            .find(|e| !state.profiles.contains_key(&e.source))
        {
            return Err(CompanionError::snapshot(format!(
                "episode from '{}' has no source profile",
                entry.source
            )));
        }
        if state.scanned > state.recorded {
            return Err(CompanionError::snapshot(format!(
                "memory scanned {} episodes but recorded only {}",
                state.scanned, state.recorded
            )));
        }
        if let Some(entry) = state
            .episodes
            .iter()
            .find(|e| !(0.0..=MAX_INTENSITY).contains(&e.intensity))
        {
            return Err(CompanionError::snapshot(format!(
                "episode from '{}' has intensity {} outside [0, {}]",
                entry.source, entry.intensity, MAX_INTENSITY
            )));
        }
        for (source, profile) in &state.profiles {
            if !(0.0..=1.0).contains(&profile.familiarity) {
                return Err(CompanionError::snapshot(format!(
                    "familiarity of '{}' is {}, outside [0, 1]",
                    source, profile.familiarity
                )));
            }
        }
        for (key, pattern) in &state.patterns {
            if !(0.0..=1.0).contains(&pattern.confidence) {
                return Err(CompanionError::snapshot(format!(
                    "confidence of pattern '{}' is {}, outside [0, 1]",
                    key, pattern.confidence
                )));
            }
        }
        Ok(Self { config, state })
    }

    /// Store an episode, evicting the oldest when full
    pub fn record(&mut self, entry: EpisodicEntry) {
        let threshold = self.config.familiarity_threshold;
        self.state
            .profiles
            .entry(entry.source.clone())
            .or_insert_with(|| SourceProfile::first(&entry))
            .observe(&entry, threshold);
        self.state.recorded += 1;

        while self.state.episodes.len() >= self.config.capacity {
            match self.state.episodes.pop_front() {
                Some(evicted) => self.consolidate(evicted),
                None => break,
            }
        }
        self.state.episodes.push_back(entry);
    }

    fn consolidate(&mut self, evicted: EpisodicEntry) {
        let threshold = self.config.familiarity_threshold;
        let profile = self
            .state
            .profiles
            .entry(evicted.source.clone())
            .or_insert_with(|| {
                let mut profile = SourceProfile::first(&evicted);
                profile.observe(&evicted, threshold);
                profile
            });
        profile.consolidated += 1;
        tracing::trace!(source = %evicted.source, "episode consolidated into profile");
    }

    /// Re-scan the window, strengthen what is found, return all patterns
    pub fn patterns(&mut self) -> Vec<Pattern> {
        self.detect_patterns();
        self.state.patterns.values().cloned().collect()
    }

    /// Re-scan the window; returns how many patterns were strengthened
    ///
    /// A pattern above the threshold is strengthened once per scan, and only
    /// if an episode recorded since the previous scan is one of its
    /// occurrences.
    pub fn detect_patterns(&mut self) -> usize {
        let unscanned = self.state.recorded.saturating_sub(self.state.scanned);
        self.state.scanned = self.state.recorded;

        let skip = self
            .state
            .episodes
            .len()
            .saturating_sub(self.config.pattern_window);
        let window: Vec<&EpisodicEntry> = self.state.episodes.iter().skip(skip).collect();
        let fresh_count = usize::try_from(unscanned).map_or(window.len(), |n| n.min(window.len()));
        if fresh_count == 0 {
            return 0;
        }
        let fresh = &window[window.len() - fresh_count..];
        let Some(latest) = window.iter().map(|e| e.timestamp).max() else {
            return 0;
        };

        let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();
        let mut by_source: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for entry in &window {
            *by_hour.entry(entry.timestamp.hour()).or_insert(0) += 1;
            *by_source
                .entry(entry.source.as_str())
                .or_default()
                .entry(entry.event_type.as_str())
                .or_insert(0) += 1;
        }

        let threshold = self.config.pattern_threshold;
        let mut found: Vec<(PatternKind, usize)> = by_hour
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(hour, count)| (PatternKind::Temporal { hour }, count))
            .collect();

        for (source, types) in by_source {
            let total: usize = types.values().sum();
            if total < threshold {
                continue;
            }
            if let Some(event_type) = modal(types.iter().map(|(k, v)| (*k, *v))) {
                found.push((
                    PatternKind::SourcePreference {
                        source: source.to_string(),
                        event_type: event_type.to_string(),
                    },
                    total,
                ));
            }
        }

        found.retain(|(kind, _)| fresh.iter().any(|entry| kind.matches(entry)));
        let strengthened = found.len();
        for (kind, occurrences) in found {
            self.strengthen(kind, occurrences, latest);
        }
        strengthened
    }

    fn strengthen(&mut self, kind: PatternKind, occurrences: usize, at: DateTime<Utc>) {
        let step = self.config.confidence_step;
        let key = kind.key();
        let pattern = self.state.patterns.entry(key.clone()).or_insert_with(|| Pattern {
            kind,
            confidence: 0.0,
            occurrences: 0,
            detections: 0,
            last_detected: at,
        });
        pattern.confidence = (pattern.confidence + step).min(1.0);
        pattern.occurrences = occurrences;
        pattern.detections += 1;
        pattern.last_detected = at;

        tracing::trace!(pattern = %key, confidence = pattern.confidence, "pattern strengthened");
    }

    /// The `limit` most relevant episodes for `filter`
    ///
    /// Every retained episode is scored: +1 when the source matches, +0.5
    /// when the event type matches, plus a recency bonus of up to 0.5 that
    /// fades linearly over 24 hours. Episodes stamped after `now` get the full
    /// bonus. Equal scores keep newer episodes first.
    pub fn retrieve(
        &self,
        filter: &ContextFilter,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<ScoredEpisode<'_>> {
        if limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<ScoredEpisode<'_>> = self
            .state
            .episodes
            .iter()
            .rev()
            .map(|entry| ScoredEpisode {
                entry,
                score: filter.score(entry, now),
            })
            .collect();

        scored.sort_by_key(|s| Reverse(OrderedFloat(s.score)));
        scored.truncate(limit);
        scored
    }

    /// Profile of a source, if it has ever interacted
    pub fn profile(&self, source: &str) -> Option<&SourceProfile> {
        self.state.profiles.get(source)
    }

    /// All source profiles
    pub fn profiles(&self) -> &BTreeMap<String, SourceProfile> {
        &self.state.profiles
    }

    /// Known pattern by key, without re-scanning
    pub fn pattern(&self, key: &str) -> Option<&Pattern> {
        self.state.patterns.get(key)
    }

    /// Number of known patterns
    pub fn pattern_count(&self) -> usize {
        self.state.patterns.len()
    }

    /// Retained episodes, oldest first
    pub fn episodes(&self) -> &VecDeque<EpisodicEntry> {
        &self.state.episodes
    }

    /// Persisted state
    pub fn state(&self) -> &MemoryState {
        &self.state
    }
}

/// Key with the highest count; ties go to the alphabetically first key
fn modal<'a>(counts: impl Iterator<Item = (&'a str, usize)>) -> Option<&'a str> {
    counts
        .fold(None::<(&'a str, usize)>, |best, (key, count)| match best {
            Some((best_key, best_count))
                if best_count > count || (best_count == count && best_key <= key) =>
            {
                Some((best_key, best_count))
            }
            _ => Some((key, count)),
        })
        .map(|(key, _)| key)
}
