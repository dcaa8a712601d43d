//! Tutoring Conversation Driver
//!
//! Ties the analyzer and the instruction adapter together for one
//! conversation. A [`TutorSession`] owns its [`UnderstandingState`] and turn
//! history exclusively; turns are processed one at a time through `&mut self`.

use crate::{
    analyzer::{MessageAnalyzer, Turn},
    instructions::{build_instructions, mini_eval_prompt, should_insert_mini_eval},
    understanding::{Analysis, UnderstandingState},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What the tutor should do with its next reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnGuidance {
    /// The analysis of the message that produced this guidance.
    pub analysis: Analysis,
    /// Guidance text to prepend to the tutor's system prompt.
    pub instructions: String,
    /// A retention question to ask at the end of the reply, on scheduled turns.
    pub mini_evaluation: Option<String>,
}

/// State for a single tutoring conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorSession {
    /// The subject the learner is studying, used when no gap names a topic.
    pub topic: String,
    pub understanding: UnderstandingState,
    pub history: Vec<Turn>,
}

impl TutorSession {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            understanding: UnderstandingState::new(),
            history: Vec::new(),
        }
    }

    /// Processes one learner message.
    ///
    /// The message is classified against the history so far, merged into the
    /// understanding state, and appended to the history. On every fourth turn
    /// (0-based index 3, 7, 11, ...) a mini-evaluation is attached and the
    /// evaluation time recorded.
    pub async fn process_turn(&mut self, analyzer: &MessageAnalyzer, message: &str) -> TurnGuidance {
        let turn_index = self.understanding.message_count;
        let analysis = analyzer.analyze(message, &self.history).await;

        let mut updated = self.understanding.merge(&analysis);
        let mini_evaluation = if should_insert_mini_eval(turn_index) {
            let topic = updated
                .latest_gap()
                .map(|gap| gap.topic.clone())
                .unwrap_or_else(|| self.topic.clone());
            updated = updated.with_evaluation_at(Utc::now());
            Some(mini_eval_prompt(&topic, updated.level))
        } else {
            None
        };

        info!(
            turn = turn_index,
            level = %updated.level,
            gaps = updated.gaps.len(),
            mini_evaluation = mini_evaluation.is_some(),
            "Processed learner turn"
        );

        self.understanding = updated;
        self.history.push(Turn::student(message));

        TurnGuidance {
            analysis,
            instructions: build_instructions(&self.understanding),
            mini_evaluation,
        }
    }

    /// Appends the tutor's reply so later classifications see it as context.
    pub fn record_tutor_reply(&mut self, content: impl Into<String>) {
        self.history.push(Turn::tutor(content));
    }
}
