//! Exam Synthesis Pipeline
//!
//! Turns a learner's saved learning artifacts into a 10-question review exam:
//!
//! 1. Sample 10 artifacts uniformly with replacement.
//! 2. Render a generation prompt with each sample's title and an excerpt.
//! 3. Ask the Completion Service for a JSON array of questions and parse it
//!    leniently (see [`parse`]).
//! 4. If that fails for any reason, build templated questions locally.
//! 5. Repair structural invariants and normalise time limits (see [`repair`]).
//!
//! Only [`ExamError::InsufficientMaterial`] (and a failing store) ever reaches
//! the caller. Every other problem is absorbed so the learner still gets a
//! structurally valid exam.

mod parse;
mod repair;
pub mod status;

use crate::{
    completion::{CompletionOptions, CompletionService, complete_within},
    learning::{LearningArtifact, LearningStore},
    prompts::{PromptTemplates, render},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

pub use status::{ExamStatus, ExamStatusError};

/// Questions in every exam.
pub const EXAM_QUESTION_COUNT: usize = 10;
/// Multiple-choice questions requested from the model, and the minimum kept.
pub const MULTIPLE_CHOICE_COUNT: usize = 2;
/// Options on every multiple-choice question.
pub const OPTIONS_PER_QUESTION: usize = 4;
/// Fewer artifacts than this and no exam is generated.
pub const MIN_ARTIFACTS: usize = 3;
/// Characters of each artifact's summary shown to the model.
pub const EXCERPT_CHARS: usize = 400;

pub const MIN_TIME_LIMIT_SECS: u32 = 20;
pub const MAX_TIME_LIMIT_SECS: u32 = 40;
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Open,
    MultipleChoice,
}

/// One question of an exam, linked back to the artifact it was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestion {
    /// 1-based position in the exam.
    pub id: u32,
    pub kind: QuestionKind,
    pub source_artifact_id: String,
    pub source_title: String,
    pub prompt: String,
    pub time_limit_seconds: u32,
    /// Exactly four entries for multiple choice, `None` for open questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Where the question text of an exam came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamOrigin {
    Completion,
    Fallback,
}

/// A ready-to-run exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: Uuid,
    pub questions: Vec<ExamQuestion>,
    pub origin: ExamOrigin,
    pub created_at: DateTime<Utc>,
}

impl ExamSession {
    pub fn multiple_choice_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.kind == QuestionKind::MultipleChoice)
            .count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error(
        "At least {required} saved learning entries are needed to generate an exam, but only {available} are available."
    )]
    InsufficientMaterial { available: usize, required: usize },
    #[error("Failed to load learning artifacts: {0}")]
    Store(#[from] anyhow::Error),
}

/// Builds exams from learning artifacts. Holds no state between calls.
pub struct ExamPipeline {
    completion: Arc<dyn CompletionService>,
    template: String,
    timeout: Duration,
}

impl ExamPipeline {
    /// Creates a pipeline.
    ///
    /// # Arguments
    ///
    /// * `completion` - Backend used for question generation.
    /// * `templates` - Prompt templates; only `generate_exam` is used.
    /// * `timeout` - Upper bound on the generation call.
    pub fn new(
        completion: Arc<dyn CompletionService>,
        templates: &PromptTemplates,
        timeout: Duration,
    ) -> Self {
        Self {
            completion,
            template: templates.generate_exam.clone(),
            timeout,
        }
    }

    /// Loads every artifact from `store` and generates an exam from them.
    pub async fn generate_from_store(
        &self,
        store: &dyn LearningStore,
    ) -> Result<ExamSession, ExamError> {
        let artifacts = store.list_artifacts().await?;
        self.generate_exam(&artifacts).await
    }

    /// Generates an exam from `artifacts`, sampling with the thread-local RNG.
    pub async fn generate_exam(
        &self,
        artifacts: &[LearningArtifact],
    ) -> Result<ExamSession, ExamError> {
        // ThreadRng is not Send; keep it out of the future's state.
        let sampled = {
            let mut rng = rand::rng();
            sample_artifacts(artifacts, EXAM_QUESTION_COUNT, &mut rng)?
        };
        Ok(self.synthesize(sampled).await)
    }

    /// Like [`generate_exam`](Self::generate_exam) with a caller-supplied RNG.
    pub async fn generate_exam_with_rng<R: Rng + ?Sized>(
        &self,
        artifacts: &[LearningArtifact],
        rng: &mut R,
    ) -> Result<ExamSession, ExamError> {
        let sampled = sample_artifacts(artifacts, EXAM_QUESTION_COUNT, rng)?;
        Ok(self.synthesize(sampled).await)
    }

    async fn synthesize(&self, sampled: Vec<LearningArtifact>) -> ExamSession {
        info!(
            samples = sampled.len(),
            "Generating exam from sampled learning artifacts"
        );

        let (drafts, origin) = match self.request_drafts(&sampled).await {
            Some(drafts) => (drafts, ExamOrigin::Completion),
            None => {
                warn!("Exam generation unusable, falling back to templated questions");
                (repair::fallback_drafts(&sampled), ExamOrigin::Fallback)
            }
        };

        let questions = repair::assemble(&sampled, drafts);
        info!(?origin, questions = questions.len(), "Exam ready");

        ExamSession {
            id: Uuid::new_v4(),
            questions,
            origin,
            created_at: Utc::now(),
        }
    }

    /// Asks the Completion Service for questions. `None` on any failure.
    async fn request_drafts(&self, sampled: &[LearningArtifact]) -> Option<Vec<parse::DraftQuestion>> {
        let prompt = self.build_prompt(sampled);
        let options = CompletionOptions::default()
            .with_temperature(GENERATION_TEMPERATURE)
            .with_max_tokens(GENERATION_MAX_TOKENS);

        let raw = match complete_within(self.completion.as_ref(), &prompt, options, self.timeout).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "Exam generation call failed");
                return None;
            }
        };

        match parse::parse_questions(&raw) {
            Ok(drafts) => Some(drafts),
            Err(reason) => {
                warn!(%reason, "Could not parse generated exam");
                None
            }
        }
    }

    fn build_prompt(&self, sampled: &[LearningArtifact]) -> String {
        let materials = sampled
            .iter()
            .enumerate()
            .map(|(i, artifact)| {
                format!(
                    "[{}] Title: {}\nExcerpt: {}",
                    i + 1,
                    artifact.title,
                    excerpt(&artifact.summary_text)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let count = EXAM_QUESTION_COUNT.to_string();
        let open_count = (EXAM_QUESTION_COUNT - MULTIPLE_CHOICE_COUNT).to_string();
        let choice_count = MULTIPLE_CHOICE_COUNT.to_string();
        render(
            &self.template,
            &[
                ("materials", materials.as_str()),
                ("count", count.as_str()),
                ("open_count", open_count.as_str()),
                ("choice_count", choice_count.as_str()),
            ],
        )
    }
}

/// Draws `count` artifacts uniformly at random with replacement.
///
/// Repeats are expected when the pool is smaller than `count`.
pub fn sample_artifacts<R: Rng + ?Sized>(
    artifacts: &[LearningArtifact],
    count: usize,
    rng: &mut R,
) -> Result<Vec<LearningArtifact>, ExamError> {
    if artifacts.len() < MIN_ARTIFACTS {
        return Err(ExamError::InsufficientMaterial {
            available: artifacts.len(),
            required: MIN_ARTIFACTS,
        });
    }
    Ok((0..count)
        .map(|_| artifacts[rng.random_range(0..artifacts.len())].clone())
        .collect())
}

/// The first [`EXCERPT_CHARS`] characters of `text`, on a char boundary.
fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionError, MockCompletionService, StubCompletionService};
    use crate::learning::{InMemoryLearningStore, MockLearningStore};
    use rand::{SeedableRng, rngs::StdRng};

    fn artifacts(n: usize) -> Vec<LearningArtifact> {
        (1..=n)
            .map(|i| {
                LearningArtifact::new(
                    format!("artifact-{}", i),
                    format!("Topic {}", i),
                    format!("Summary text number {} about something worth remembering.", i),
                )
            })
            .collect()
    }

    fn pipeline_with(completion: Arc<dyn CompletionService>) -> ExamPipeline {
        ExamPipeline::new(completion, &PromptTemplates::default(), Duration::from_secs(1))
    }

    fn mock_replying(reply: String) -> MockCompletionService {
        let mut mock = MockCompletionService::new();
        mock.expect_complete()
            .returning(move |_, _| Ok(reply.clone()));
        mock
    }

    fn assert_structurally_valid(exam: &ExamSession) {
        assert_eq!(exam.questions.len(), EXAM_QUESTION_COUNT);
        assert!(exam.multiple_choice_count() >= MULTIPLE_CHOICE_COUNT);
        for (i, question) in exam.questions.iter().enumerate() {
            assert_eq!(question.id as usize, i + 1);
            assert!(
                (MIN_TIME_LIMIT_SECS..=MAX_TIME_LIMIT_SECS).contains(&question.time_limit_seconds)
            );
            assert!(!question.prompt.is_empty());
            match question.kind {
                QuestionKind::MultipleChoice => assert_eq!(
                    question.options.as_ref().map(Vec::len),
                    Some(OPTIONS_PER_QUESTION)
                ),
                QuestionKind::Open => assert!(question.options.is_none()),
            }
        }
    }

    fn generated_questions(mc_count: usize, time_limit: &str) -> String {
        let items: Vec<String> = (0..EXAM_QUESTION_COUNT)
            .map(|i| {
                if i >= EXAM_QUESTION_COUNT - mc_count {
                    format!(
                        r#"{{"type":"multiple_choice","question":"According to the text, which is right? ({})","options":["a","b","c","d"],"time_limit":{}}}"#,
                        i, time_limit
                    )
                } else {
                    format!(
                        r#"{{"type":"open","question":"According to the text, what is item {}?","time_limit":{}}}"#,
                        i, time_limit
                    )
                }
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    struct SlowService;

    #[async_trait::async_trait]
    impl CompletionService for SlowService {
        async fn complete(
            &self,
            _prompt: &str,
            _options: CompletionOptions,
        ) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(generated_questions(MULTIPLE_CHOICE_COUNT, "25"))
        }
    }

    #[tokio::test]
    async fn test_timeout_uses_fallback_exam() {
        let pipeline = ExamPipeline::new(
            Arc::new(SlowService),
            &PromptTemplates::default(),
            Duration::from_millis(20),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let exam = pipeline
            .generate_exam_with_rng(&artifacts(4), &mut rng)
            .await
            .unwrap();

        assert_eq!(exam.origin, ExamOrigin::Fallback);
        assert_structurally_valid(&exam);
        assert!(exam.questions[0].prompt.contains("key concept"));
    }

    #[tokio::test]
    async fn test_two_artifacts_is_insufficient() {
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let err = pipeline.generate_exam(&artifacts(2)).await.unwrap_err();
        match err {
            ExamError::InsufficientMaterial {
                available,
                required,
            } => {
                assert_eq!(available, 2);
                assert_eq!(required, 3);
            }
            other => panic!("Expected InsufficientMaterial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_three_artifacts_is_enough() {
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let exam = pipeline.generate_exam(&artifacts(3)).await.unwrap();
        assert_structurally_valid(&exam);
    }

    #[tokio::test]
    async fn test_stub_mode_uses_fallback() {
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let exam = pipeline.generate_exam(&artifacts(5)).await.unwrap();

        assert_eq!(exam.origin, ExamOrigin::Fallback);
        assert_structurally_valid(&exam);
        let kinds: Vec<QuestionKind> = exam.questions.iter().map(|q| q.kind).collect();
        assert!(kinds[..8].iter().all(|k| *k == QuestionKind::Open));
        assert!(kinds[8..].iter().all(|k| *k == QuestionKind::MultipleChoice));
    }

    #[tokio::test]
    async fn test_prose_reply_uses_fallback() {
        let mock = mock_replying("Sure! Here are some great questions for you.".to_string());
        let pipeline = pipeline_with(Arc::new(mock));
        let exam = pipeline.generate_exam(&artifacts(4)).await.unwrap();

        assert_eq!(exam.origin, ExamOrigin::Fallback);
        assert_structurally_valid(&exam);
    }

    #[tokio::test]
    async fn test_completion_error_uses_fallback() {
        let mut mock = MockCompletionService::new();
        mock.expect_complete()
            .returning(|_, _| Err(CompletionError::Empty));
        let pipeline = pipeline_with(Arc::new(mock));
        let exam = pipeline.generate_exam(&artifacts(4)).await.unwrap();
        assert_eq!(exam.origin, ExamOrigin::Fallback);
        assert_structurally_valid(&exam);
    }

    #[tokio::test]
    async fn test_generated_questions_are_used() {
        let reply = format!(
            "Here is the exam:\n{}\nGood luck!",
            generated_questions(2, "25")
        );
        let pipeline = pipeline_with(Arc::new(mock_replying(reply)));
        let exam = pipeline.generate_exam(&artifacts(6)).await.unwrap();

        assert_eq!(exam.origin, ExamOrigin::Completion);
        assert_structurally_valid(&exam);
        assert_eq!(exam.multiple_choice_count(), 2);
        assert_eq!(exam.questions[0].prompt, "According to the text, what is item 0?");
        assert!(exam.questions.iter().all(|q| q.time_limit_seconds == 25));
    }

    #[tokio::test]
    async fn test_missing_multiple_choice_is_repaired() {
        let pipeline = pipeline_with(Arc::new(mock_replying(generated_questions(0, "30"))));
        let exam = pipeline.generate_exam(&artifacts(3)).await.unwrap();

        assert_eq!(exam.origin, ExamOrigin::Completion);
        assert_structurally_valid(&exam);
        assert_eq!(exam.questions[8].kind, QuestionKind::MultipleChoice);
        assert_eq!(exam.questions[9].kind, QuestionKind::MultipleChoice);
    }

    #[tokio::test]
    async fn test_extra_multiple_choice_is_kept() {
        let pipeline = pipeline_with(Arc::new(mock_replying(generated_questions(5, "30"))));
        let exam = pipeline.generate_exam(&artifacts(3)).await.unwrap();
        assert_structurally_valid(&exam);
        assert_eq!(exam.multiple_choice_count(), 5);
    }

    #[tokio::test]
    async fn test_time_limits_are_clamped() {
        let pipeline = pipeline_with(Arc::new(mock_replying(generated_questions(2, "90"))));
        let exam = pipeline.generate_exam(&artifacts(3)).await.unwrap();
        assert!(exam.questions.iter().all(|q| q.time_limit_seconds == 40));

        let pipeline = pipeline_with(Arc::new(mock_replying(generated_questions(2, "5"))));
        let exam = pipeline.generate_exam(&artifacts(3)).await.unwrap();
        assert!(exam.questions.iter().all(|q| q.time_limit_seconds == 20));
    }

    #[tokio::test]
    async fn test_questions_keep_artifact_linkage() {
        let pool = artifacts(4);
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let mut rng = StdRng::seed_from_u64(42);
        let exam = pipeline.generate_exam_with_rng(&pool, &mut rng).await.unwrap();

        let mut expected_rng = StdRng::seed_from_u64(42);
        let expected = sample_artifacts(&pool, EXAM_QUESTION_COUNT, &mut expected_rng).unwrap();
        for (question, artifact) in exam.questions.iter().zip(&expected) {
            assert_eq!(question.source_artifact_id, artifact.id);
            assert_eq!(question.source_title, artifact.title);
            assert!(question.prompt.contains(&artifact.title));
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_titles_and_rules() {
        let mut mock = MockCompletionService::new();
        mock.expect_complete()
            .withf(|prompt, options| {
                !options.json_mode
                    && prompt.contains("Title: Topic 1")
                    && prompt.contains("exactly 10 questions")
                    && prompt.contains("Exactly 8 questions")
                    && prompt.contains("exactly 2 of type")
            })
            .times(1)
            .returning(|_, _| Ok("[]".to_string()));
        let pipeline = pipeline_with(Arc::new(mock));
        // A single-artifact pool repeated three times guarantees "Topic 1" is sampled.
        let mut pool = artifacts(1);
        pool.extend(artifacts(1));
        pool.extend(artifacts(1));

        let exam = pipeline.generate_exam(&pool).await.unwrap();
        assert_eq!(exam.origin, ExamOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_generate_from_store() {
        let store = InMemoryLearningStore::new(artifacts(3));
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let exam = pipeline.generate_from_store(&store).await.unwrap();
        assert_structurally_valid(&exam);
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let mut store = MockLearningStore::new();
        store
            .expect_list_artifacts()
            .returning(|| Err(anyhow::anyhow!("connection refused")));
        let pipeline = pipeline_with(Arc::new(StubCompletionService));
        let err = pipeline.generate_from_store(&store).await.unwrap_err();
        assert!(matches!(err, ExamError::Store(_)));
    }

    #[test]
    fn test_sampling_is_with_replacement() {
        let pool = artifacts(3);
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = sample_artifacts(&pool, EXAM_QUESTION_COUNT, &mut rng).unwrap();
        assert_eq!(sampled.len(), EXAM_QUESTION_COUNT);
        assert!(sampled.iter().all(|a| pool.contains(a)));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "é".repeat(1000);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("  short  "), "short");
    }

    #[test]
    fn test_insufficient_material_message() {
        let err = ExamError::InsufficientMaterial {
            available: 1,
            required: 3,
        };
        assert!(err.to_string().contains("At least 3"));
        assert!(err.to_string().contains("only 1"));
    }
}
