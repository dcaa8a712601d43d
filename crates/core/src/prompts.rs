//! Prompt templates for the Completion Service.
//!
//! Defaults are compiled in from `crates/core/prompts/*.md`. Deployments can
//! override any of them with a map of template strings keyed by file stem,
//! the same way the service loads its `prompts/` directory.

use std::collections::HashMap;
use tracing::debug;

pub const ANALYZE_MESSAGE_KEY: &str = "analyze_message";
pub const GENERATE_EXAM_KEY: &str = "generate_exam";

const DEFAULT_ANALYZE_MESSAGE: &str = include_str!("../prompts/analyze_message.md");
const DEFAULT_GENERATE_EXAM: &str = include_str!("../prompts/generate_exam.md");

/// The set of templates the engine renders prompts from.
///
/// Placeholders use `{name}` syntax and are substituted with plain string
/// replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    /// Needs `{history}` and `{message}`.
    pub analyze_message: String,
    /// Needs `{materials}`, `{count}`, `{open_count}` and `{choice_count}`.
    pub generate_exam: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            analyze_message: DEFAULT_ANALYZE_MESSAGE.to_string(),
            generate_exam: DEFAULT_GENERATE_EXAM.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Builds templates from a map, falling back to the defaults for any key
    /// the map does not provide. Unknown keys are ignored.
    pub fn from_map(prompts: &HashMap<String, String>) -> Self {
        let mut templates = Self::default();
        if let Some(template) = prompts.get(ANALYZE_MESSAGE_KEY) {
            debug!(key = ANALYZE_MESSAGE_KEY, "Overriding default prompt template");
            templates.analyze_message = template.clone();
        }
        if let Some(template) = prompts.get(GENERATE_EXAM_KEY) {
            debug!(key = GENERATE_EXAM_KEY, "Overriding default prompt template");
            templates.generate_exam = template.clone();
        }
        templates
    }
}

/// Substitutes every `{key}` in `template` with its value.
///
/// The template is scanned once, so placeholders that appear inside a
/// substituted value are left as they are. Braces that do not form a known
/// placeholder are copied unchanged.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match known {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_contain_placeholders() {
        let templates = PromptTemplates::default();
        assert!(templates.analyze_message.contains("{history}"));
        assert!(templates.analyze_message.contains("{message}"));
        assert!(templates.generate_exam.contains("{materials}"));
        assert!(templates.generate_exam.contains("{count}"));
    }

    #[test]
    fn test_from_map_overrides_only_known_keys() {
        let mut prompts = HashMap::new();
        prompts.insert(ANALYZE_MESSAGE_KEY.to_string(), "custom {message}".to_string());
        prompts.insert("system_prompt".to_string(), "ignored".to_string());

        let templates = PromptTemplates::from_map(&prompts);
        assert_eq!(templates.analyze_message, "custom {message}");
        assert_eq!(templates.generate_exam, PromptTemplates::default().generate_exam);
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let out = render("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_render_does_not_expand_placeholders_inside_values() {
        let out = render(
            "Notes: {materials}\nWrite {count} questions.",
            &[("materials", "a summary mentioning {count} and {materials}"), ("count", "10")],
        );
        assert_eq!(
            out,
            "Notes: a summary mentioning {count} and {materials}\nWrite 10 questions."
        );
    }

    #[test]
    fn test_render_keeps_literal_braces() {
        let out = render(r#"Reply as {"level": "low"} for {message} {unknown"#, &[("message", "hi")]);
        assert_eq!(out, r#"Reply as {"level": "low"} for hi {unknown"#);
    }
}
