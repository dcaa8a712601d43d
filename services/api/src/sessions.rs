//! In-Memory Session Registries
//!
//! Conversations and exam lifecycles live in process memory for as long as the
//! service runs. Each conversation sits behind its own mutex so turns on one
//! conversation are processed strictly one after another while different
//! conversations proceed independently.

use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;
use tutor_core::{
    exam::{ExamError, ExamSession, ExamStatus, ExamStatusError},
    tutor::TutorSession,
};
use uuid::Uuid;

/// A tutoring conversation owned by one user.
#[derive(Debug)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub session: TutorSession,
}

#[derive(Clone, Default)]
pub struct ConversationRegistry {
    // Owner id is kept beside the handle so lookups never wait on a busy turn.
    inner: Arc<Mutex<HashMap<Uuid, (String, Arc<Mutex<Conversation>>)>>>,
}

impl ConversationRegistry {
    /// Starts a new conversation and returns a handle to it.
    pub async fn create(&self, user_id: &str, topic: &str) -> Arc<Mutex<Conversation>> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            session: TutorSession::new(topic),
        };
        let id = conversation.id;
        let handle = Arc::new(Mutex::new(conversation));
        self.inner
            .lock()
            .await
            .insert(id, (user_id.to_string(), handle.clone()));
        info!(conversation_id = %id, user_id, topic, "Conversation created");
        handle
    }

    /// Looks up a conversation, scoped to the user that created it.
    pub async fn get(&self, id: Uuid, user_id: &str) -> Option<Arc<Mutex<Conversation>>> {
        let records = self.inner.lock().await;
        let (owner, handle) = records.get(&id)?;
        (owner == user_id).then(|| handle.clone())
    }
}

/// The latest exam of one user and where it is in its lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ExamRecord {
    pub status: ExamStatus,
    pub exam: Option<ExamSession>,
}

#[derive(Clone, Default)]
pub struct ExamRegistry {
    inner: Arc<Mutex<HashMap<String, ExamRecord>>>,
}

impl ExamRegistry {
    /// Returns the user's record, or an idle one if they never generated an exam.
    pub async fn get(&self, user_id: &str) -> ExamRecord {
        self.inner
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Marks a generation as started. Fails if one is already running.
    pub async fn begin(&self, user_id: &str) -> Result<(), ExamStatusError> {
        let mut records = self.inner.lock().await;
        let record = records.entry(user_id.to_string()).or_default();
        record.status = record.status.begin_generation()?;
        Ok(())
    }

    /// Records the outcome of a generation started with [`begin`](Self::begin).
    pub async fn finish(
        &self,
        user_id: &str,
        outcome: &Result<ExamSession, ExamError>,
    ) -> Result<ExamRecord, ExamStatusError> {
        let mut records = self.inner.lock().await;
        let record = records.entry(user_id.to_string()).or_default();
        record.status = record.status.finish(outcome)?;
        record.exam = outcome.as_ref().ok().cloned();
        Ok(record.clone())
    }

    /// Moves a ready exam to in-progress.
    pub async fn start(&self, user_id: &str) -> Result<ExamRecord, ExamStatusError> {
        let mut records = self.inner.lock().await;
        let record = records.entry(user_id.to_string()).or_default();
        record.status = record.status.start()?;
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::exam::ExamOrigin;

    fn empty_exam() -> ExamSession {
        ExamSession {
            id: Uuid::new_v4(),
            questions: vec![],
            origin: ExamOrigin::Fallback,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_conversation_is_scoped_to_owner() {
        let registry = ConversationRegistry::default();
        let handle = registry.create("alice", "Optics").await;
        let id = handle.lock().await.id;

        assert!(registry.get(id, "alice").await.is_some());
        assert!(registry.get(id, "bob").await.is_none());
        assert!(registry.get(Uuid::new_v4(), "alice").await.is_none());
    }

    #[tokio::test]
    async fn test_exam_lifecycle() {
        let registry = ExamRegistry::default();
        assert_eq!(registry.get("alice").await.status, ExamStatus::Idle);

        registry.begin("alice").await.unwrap();
        assert_eq!(registry.get("alice").await.status, ExamStatus::Generating);
        assert!(registry.begin("alice").await.is_err());

        let record = registry.finish("alice", &Ok(empty_exam())).await.unwrap();
        assert_eq!(record.status, ExamStatus::Ready);
        assert!(record.exam.is_some());

        let record = registry.start("alice").await.unwrap();
        assert_eq!(record.status, ExamStatus::InProgress);
        assert_eq!(registry.get("bob").await.status, ExamStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_generation_clears_exam() {
        let registry = ExamRegistry::default();
        registry.begin("alice").await.unwrap();
        registry.finish("alice", &Ok(empty_exam())).await.unwrap();

        registry.begin("alice").await.unwrap();
        let outcome = Err(ExamError::InsufficientMaterial {
            available: 1,
            required: 3,
        });
        let record = registry.finish("alice", &outcome).await.unwrap();
        assert!(matches!(record.status, ExamStatus::Error { .. }));
        assert!(record.exam.is_none());
        assert!(registry.start("alice").await.is_err());
    }
}
