//! Message Analyzer
//!
//! Classifies each learner message into an [`Analysis`]: comprehension level,
//! explicit misconceptions, and sentiment. Classification is best-effort. Any
//! failure of the Completion Service, including timeouts, malformed output and
//! stub mode, yields the neutral default analysis instead of an error so the
//! conversation is never blocked.

use crate::{
    completion::{CompletionOptions, CompletionService, complete_within},
    prompts::{PromptTemplates, render},
    understanding::{Analysis, CognitiveGap, Sentiment, UnderstandingLevel},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Number of prior turns given to the classifier as context.
pub const HISTORY_WINDOW: usize = 3;

const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ANALYSIS_MAX_TOKENS: u32 = 400;

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Student,
    Tutor,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::Student => write!(f, "student"),
            TurnRole::Tutor => write!(f, "tutor"),
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn student(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Student,
            content: content.into(),
        }
    }

    pub fn tutor(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Tutor,
            content: content.into(),
        }
    }
}

/// Infers the learner's understanding from their latest message.
pub struct MessageAnalyzer {
    completion: Arc<dyn CompletionService>,
    template: String,
    timeout: Duration,
}

impl MessageAnalyzer {
    /// Creates an analyzer.
    ///
    /// # Arguments
    ///
    /// * `completion` - Backend used for classification.
    /// * `templates` - Prompt templates; only `analyze_message` is used.
    /// * `timeout` - Upper bound on a single classification call.
    pub fn new(
        completion: Arc<dyn CompletionService>,
        templates: &PromptTemplates,
        timeout: Duration,
    ) -> Self {
        Self {
            completion,
            template: templates.analyze_message.clone(),
            timeout,
        }
    }

    /// Classifies `message` in the context of the last few `recent_history` turns.
    ///
    /// Never fails; degraded paths return [`Analysis::default`].
    pub async fn analyze(&self, message: &str, recent_history: &[Turn]) -> Analysis {
        if message.trim().is_empty() {
            debug!("Skipping classification of an empty message");
            return Analysis::default();
        }

        let prompt = self.build_prompt(message, recent_history);
        let options = CompletionOptions::json()
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_tokens(ANALYSIS_MAX_TOKENS);

        match complete_within(self.completion.as_ref(), &prompt, options, self.timeout).await {
            Ok(raw) => parse_analysis(&raw),
            Err(error) => {
                debug!(%error, "Classification unavailable, using default analysis");
                Analysis::default()
            }
        }
    }

    fn build_prompt(&self, message: &str, recent_history: &[Turn]) -> String {
        let history = format_history(recent_history);
        render(&self.template, &[("history", history.as_str()), ("message", message)])
    }
}

fn format_history(turns: &[Turn]) -> String {
    let start = turns.len().saturating_sub(HISTORY_WINDOW);
    let window = &turns[start..];
    if window.is_empty() {
        return "(no previous messages)".to_string();
    }
    window
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns the classifier's raw reply into an [`Analysis`]. Each field is read
/// on its own, so one missing, null or mistyped field only defaults itself.
fn parse_analysis(raw: &str) -> Analysis {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "Classifier returned malformed JSON, using default analysis");
            return Analysis::default();
        }
    };
    let Some(object) = value.as_object() else {
        warn!("Classifier reply is not a JSON object, using default analysis");
        return Analysis::default();
    };

    let level = object
        .get("level")
        .and_then(Value::as_str)
        .and_then(|l| l.parse::<UnderstandingLevel>().ok())
        .unwrap_or_default();
    let sentiment = object
        .get("sentiment")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Sentiment>().ok())
        .unwrap_or_default();
    let detected_gaps = object
        .get("gaps")
        .and_then(Value::as_array)
        .map(|gaps| gaps.iter().filter_map(gap_from_value).collect())
        .unwrap_or_default();

    Analysis {
        level,
        detected_gaps,
        sentiment,
    }
}

/// A gap needs a non-blank topic; a blank or non-string misconception is dropped.
fn gap_from_value(value: &Value) -> Option<CognitiveGap> {
    let topic = value.get("topic")?.as_str()?.trim();
    if topic.is_empty() {
        return None;
    }
    let misconception = value
        .get("misconception")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    Some(CognitiveGap::new(topic, misconception))
}
