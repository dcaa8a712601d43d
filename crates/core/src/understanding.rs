//! Learner Understanding State
//!
//! This module holds the data the tutoring engine keeps about a learner during
//! a single conversation: the inferred comprehension tier and the log of
//! misconceptions detected so far. Updates never mutate in place; each user
//! turn produces a new state by merging an [`Analysis`] into the previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse three-tier comprehension level inferred from the learner's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnderstandingLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for UnderstandingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnderstandingLevel::Low => write!(f, "low"),
            UnderstandingLevel::Medium => write!(f, "medium"),
            UnderstandingLevel::High => write!(f, "high"),
        }
    }
}

impl FromStr for UnderstandingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(UnderstandingLevel::Low),
            "medium" => Ok(UnderstandingLevel::Medium),
            "high" => Ok(UnderstandingLevel::High),
            other => Err(format!("unknown understanding level: '{}'", other)),
        }
    }
}

/// The learner's emotional read of the latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Confused,
    #[default]
    Neutral,
    Confident,
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confused" => Ok(Sentiment::Confused),
            "neutral" => Ok(Sentiment::Neutral),
            "confident" => Ok(Sentiment::Confident),
            other => Err(format!("unknown sentiment: '{}'", other)),
        }
    }
}

/// An explicit misconception the learner expressed about a specific topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveGap {
    pub topic: String,
    pub misconception: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl CognitiveGap {
    pub fn new(topic: impl Into<String>, misconception: Option<String>) -> Self {
        Self {
            topic: topic.into(),
            misconception,
            detected_at: Utc::now(),
        }
    }
}

/// The classification of a single user message. Consumed immediately by
/// [`UnderstandingState::merge`] and never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub level: UnderstandingLevel,
    pub detected_gaps: Vec<CognitiveGap>,
    pub sentiment: Sentiment,
}

/// Per-conversation record of what the engine believes the learner understands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnderstandingState {
    /// Current inferred comprehension tier.
    pub level: UnderstandingLevel,
    /// Every misconception detected in this conversation, oldest first.
    /// Append-only for the lifetime of the conversation.
    pub gaps: Vec<CognitiveGap>,
    /// When a mini-evaluation was last inserted. Informational only.
    pub last_evaluation_time: Option<DateTime<Utc>>,
    /// Number of user turns merged so far.
    pub message_count: u32,
}

impl UnderstandingState {
    /// Creates the state a conversation starts with: medium level, no gaps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state that results from applying one turn's analysis.
    ///
    /// The level is replaced, detected gaps are appended after the existing
    /// ones, and the message count is incremented.
    pub fn merge(&self, analysis: &Analysis) -> Self {
        let mut gaps = self.gaps.clone();
        gaps.extend(analysis.detected_gaps.iter().cloned());
        Self {
            level: analysis.level,
            gaps,
            last_evaluation_time: self.last_evaluation_time,
            message_count: self.message_count.saturating_add(1),
        }
    }

    /// Returns a copy stamped with the time a mini-evaluation was inserted.
    pub fn with_evaluation_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_evaluation_time: Some(at),
            ..self.clone()
        }
    }

    /// The most recently appended gap, if any.
    pub fn latest_gap(&self) -> Option<&CognitiveGap> {
        self.gaps.last()
    }

    /// The last `limit` gaps, oldest first. The full log stays in `gaps`.
    pub fn recent_gaps(&self, limit: usize) -> &[CognitiveGap] {
        let start = self.gaps.len().saturating_sub(limit);
        &self.gaps[start..]
    }
}
