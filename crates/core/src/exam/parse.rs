//! Best-effort parsing of model-generated exam questions.
//!
//! The model is asked for a bare JSON array but often wraps it in prose or a
//! code fence. We take everything from the first `[` to the last `]` and parse
//! that. This is deliberately simple: anything it cannot handle sends the
//! pipeline to its fallback generator.

use super::QuestionKind;
use serde_json::Value;

/// A question as the model described it, before invariants are enforced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DraftQuestion {
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub time_limit: Option<f64>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub(crate) enum ParseFailure {
    #[error("no JSON array found in response")]
    NoArray,
    #[error("invalid JSON array: {0}")]
    InvalidJson(String),
    #[error("array contained no usable questions")]
    NoQuestions,
}

/// Returns the substring spanning the first `[` through the last `]`.
pub(crate) fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses the model's reply into draft questions.
///
/// Entries that are not objects or lack question text are skipped; at least
/// one usable entry is required.
pub(crate) fn parse_questions(raw: &str) -> Result<Vec<DraftQuestion>, ParseFailure> {
    let array = extract_json_array(raw).ok_or(ParseFailure::NoArray)?;
    let items: Vec<Value> =
        serde_json::from_str(array).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    let drafts: Vec<DraftQuestion> = items.iter().filter_map(draft_from_value).collect();
    if drafts.is_empty() {
        return Err(ParseFailure::NoQuestions);
    }
    Ok(drafts)
}

fn draft_from_value(value: &Value) -> Option<DraftQuestion> {
    let object = value.as_object()?;

    let prompt = ["question", "prompt", "text"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty())?
        .to_string();

    let kind = ["type", "kind"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(parse_kind)
        .unwrap_or(QuestionKind::Open);

    let options = object.get("options").and_then(Value::as_array).map(|options| {
        options
            .iter()
            .filter_map(|option| match option {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });

    let time_limit = ["time_limit", "timeLimit", "time_limit_seconds", "timeLimitSeconds"]
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        });

    Some(DraftQuestion {
        kind,
        prompt,
        options,
        time_limit,
    })
}

fn parse_kind(raw: &str) -> QuestionKind {
    let normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    match normalized.as_str() {
        "multiplechoice" | "mc" | "choice" => QuestionKind::MultipleChoice,
        _ => QuestionKind::Open,
    }
}
