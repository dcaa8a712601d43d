//! Instruction Adapter
//!
//! Pure functions turning an [`UnderstandingState`] into guidance for the next
//! tutor reply, plus the periodic mini-evaluation schedule.

use crate::understanding::{UnderstandingLevel, UnderstandingState};

const BASELINE_INSTRUCTION: &str =
    "Adapt your explanation to the student's current level of understanding.";

const LOW_LEVEL_STYLE: &str = "The student is struggling: use simple language, short sentences and everyday analogies. Introduce one idea at a time and check understanding before moving on.";
const MEDIUM_LEVEL_STYLE: &str = "The student has a working grasp: give balanced explanations that pair each concept with a concrete example, and introduce technical terms with a short definition.";
const HIGH_LEVEL_STYLE: &str = "The student understands well: be technically precise, go into depth, and discuss nuances, edge cases and connections to related concepts.";

/// Every `MINI_EVAL_PERIOD`-th turn gets a mini-evaluation.
const MINI_EVAL_PERIOD: u32 = 4;

/// Builds the guidance block for the next turn.
///
/// Consists of the baseline line, a level-specific style line, and, when any
/// gap has been recorded, a corrective line about the most recent one.
/// Earlier gaps are not surfaced.
pub fn build_instructions(state: &UnderstandingState) -> String {
    let correction = state
        .latest_gap()
        .map(|gap| match gap.misconception.as_deref() {
            Some(misconception) => format!(
                "The student recently showed a misconception about \"{}\": they believe that {}. Gently correct it in your next reply.",
                gap.topic, misconception
            ),
            None => format!(
                "The student recently showed a misconception about \"{}\". Gently correct it in your next reply.",
                gap.topic
            ),
        })
        .unwrap_or_default();

    [
        BASELINE_INSTRUCTION,
        level_style(state.level),
        correction.as_str(),
    ]
    .into_iter()
    .filter(|segment| !segment.is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

fn level_style(level: UnderstandingLevel) -> &'static str {
    match level {
        UnderstandingLevel::Low => LOW_LEVEL_STYLE,
        UnderstandingLevel::Medium => MEDIUM_LEVEL_STYLE,
        UnderstandingLevel::High => HIGH_LEVEL_STYLE,
    }
}

/// Whether the turn with 0-based index `message_count` should carry a
/// mini-evaluation. True for 3, 7, 11, ...
pub fn should_insert_mini_eval(message_count: u32) -> bool {
    // Same as (n + 1) % period == 0 without overflowing at u32::MAX.
    message_count > 0 && message_count % MINI_EVAL_PERIOD == MINI_EVAL_PERIOD - 1
}

/// A short retention question about `topic`, calibrated to `level`.
pub fn mini_eval_prompt(topic: &str, level: UnderstandingLevel) -> String {
    match level {
        UnderstandingLevel::Low => format!(
            "Quick check: can you explain the main idea of {} in your own words, as simply as possible?",
            topic
        ),
        UnderstandingLevel::Medium => format!(
            "Quick check: what is the key difference between {} and the concept most similar to it?",
            topic
        ),
        UnderstandingLevel::High => format!(
            "Quick check: what would happen with {} in an edge case where its usual assumptions no longer hold?",
            topic
        ),
    }
}
