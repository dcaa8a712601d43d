//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the learning store provider and engine components.

use crate::{
    db::LearningStoreProvider,
    sessions::{ConversationRegistry, ExamRegistry},
};
use std::sync::Arc;
use tutor_core::{analyzer::MessageAnalyzer, exam::ExamPipeline};

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub learning: Arc<dyn LearningStoreProvider>,
    pub analyzer: Arc<MessageAnalyzer>,
    pub exam_pipeline: Arc<ExamPipeline>,
    pub conversations: ConversationRegistry,
    pub exams: ExamRegistry,
}
