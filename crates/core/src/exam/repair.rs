//! Structural guarantees for generated exams.
//!
//! Whatever the drafts look like, [`assemble`] returns exactly
//! [`EXAM_QUESTION_COUNT`] questions with at least [`MULTIPLE_CHOICE_COUNT`]
//! multiple-choice entries of exactly [`OPTIONS_PER_QUESTION`] options, and
//! time limits inside `[MIN_TIME_LIMIT_SECS, MAX_TIME_LIMIT_SECS]`.

use super::{
    DEFAULT_TIME_LIMIT_SECS, EXAM_QUESTION_COUNT, ExamQuestion, MAX_TIME_LIMIT_SECS,
    MIN_TIME_LIMIT_SECS, MULTIPLE_CHOICE_COUNT, OPTIONS_PER_QUESTION, QuestionKind,
    parse::DraftQuestion,
};
use crate::learning::LearningArtifact;
use tracing::{debug, warn};

/// Generic options used by templated and repaired multiple-choice questions.
const GENERIC_OPTIONS: [&str; OPTIONS_PER_QUESTION] = [
    "It is the central idea of the text",
    "It is mentioned only as a side detail",
    "It contradicts what the text says",
    "The text does not mention it",
];

fn generic_options() -> Vec<String> {
    GENERIC_OPTIONS.iter().map(|o| o.to_string()).collect()
}

/// The templated question for `slot`, built without the Completion Service.
/// The last [`MULTIPLE_CHOICE_COUNT`] slots are multiple choice.
fn fallback_draft(slot: usize, artifact: &LearningArtifact) -> DraftQuestion {
    if slot >= EXAM_QUESTION_COUNT - MULTIPLE_CHOICE_COUNT {
        DraftQuestion {
            kind: QuestionKind::MultipleChoice,
            prompt: format!(
                "According to the text about \"{}\", how is its main concept presented?",
                artifact.title
            ),
            options: Some(generic_options()),
            time_limit: None,
        }
    } else {
        DraftQuestion {
            kind: QuestionKind::Open,
            prompt: format!(
                "According to the text about \"{}\", what is the key concept it describes? (1-5 words)",
                artifact.title
            ),
            options: None,
            time_limit: None,
        }
    }
}

/// Templated drafts for every sampled artifact.
pub(crate) fn fallback_drafts(sampled: &[LearningArtifact]) -> Vec<DraftQuestion> {
    sampled
        .iter()
        .enumerate()
        .map(|(slot, artifact)| fallback_draft(slot, artifact))
        .collect()
}

/// Clamps a requested time limit into range, defaulting when absent.
pub(crate) fn normalize_time_limit(requested: Option<f64>) -> u32 {
    match requested {
        Some(secs) if secs.is_finite() => {
            secs.round()
                .clamp(MIN_TIME_LIMIT_SECS as f64, MAX_TIME_LIMIT_SECS as f64) as u32
        }
        _ => DEFAULT_TIME_LIMIT_SECS,
    }
}

/// Multiple-choice drafts must carry exactly four options. Extra options are
/// cut; with too few the draft becomes an open question.
fn normalize_options(mut draft: DraftQuestion) -> DraftQuestion {
    match draft.kind {
        QuestionKind::Open => draft.options = None,
        QuestionKind::MultipleChoice => {
            let mut options = draft.options.take().unwrap_or_default();
            if options.len() >= OPTIONS_PER_QUESTION {
                options.truncate(OPTIONS_PER_QUESTION);
                draft.options = Some(options);
            } else {
                debug!(
                    options = options.len(),
                    "Multiple choice question has too few options, demoting to open"
                );
                draft.kind = QuestionKind::Open;
            }
        }
    }
    draft
}

/// Ensures at least [`MULTIPLE_CHOICE_COUNT`] multiple-choice questions by
/// converting the last ones in the list.
pub(crate) fn ensure_multiple_choice(questions: &mut [ExamQuestion]) {
    let count = questions
        .iter()
        .filter(|q| q.kind == QuestionKind::MultipleChoice)
        .count();
    if count >= MULTIPLE_CHOICE_COUNT {
        return;
    }

    warn!(
        multiple_choice = count,
        "Too few multiple choice questions, converting the last {}", MULTIPLE_CHOICE_COUNT
    );
    let start = questions.len().saturating_sub(MULTIPLE_CHOICE_COUNT);
    for question in &mut questions[start..] {
        if question.kind != QuestionKind::MultipleChoice {
            question.kind = QuestionKind::MultipleChoice;
            question.options = Some(generic_options());
        }
    }
}

/// Pairs drafts with their sampled artifacts and enforces every invariant.
///
/// Drafts beyond the sample count are dropped; missing slots are filled
/// with templated questions.
pub(crate) fn assemble(sampled: &[LearningArtifact], drafts: Vec<DraftQuestion>) -> Vec<ExamQuestion> {
    if drafts.len() != sampled.len() {
        debug!(
            drafts = drafts.len(),
            expected = sampled.len(),
            "Draft count differs from sample count"
        );
    }

    let mut drafts = drafts.into_iter();
    let mut questions: Vec<ExamQuestion> = sampled
        .iter()
        .enumerate()
        .map(|(slot, artifact)| {
            let draft = drafts
                .next()
                .unwrap_or_else(|| fallback_draft(slot, artifact));
            let draft = normalize_options(draft);
            ExamQuestion {
                id: slot as u32 + 1,
                kind: draft.kind,
                source_artifact_id: artifact.id.clone(),
                source_title: artifact.title.clone(),
                prompt: draft.prompt,
                time_limit_seconds: normalize_time_limit(draft.time_limit),
                options: draft.options,
            }
        })
        .collect();

    ensure_multiple_choice(&mut questions);
    questions
}
