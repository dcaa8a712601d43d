//! Learning Store
//!
//! Read-only access to the learning artifacts (saved summaries of previous
//! study sessions) that exams are synthesised from. Storage itself lives
//! outside the engine; implementations only need to list what exists.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

/// A previously saved piece of study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningArtifact {
    pub id: String,
    pub title: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
    pub sector_id: Option<String>,
}

impl LearningArtifact {
    /// Convenience constructor stamping the current time and no sector.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        summary_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary_text: summary_text.into(),
            created_at: Utc::now(),
            sector_id: None,
        }
    }
}

/// Defines the contract for any repository of learning artifacts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LearningStore: Send + Sync {
    /// Lists every artifact available to the current learner. No ordering or
    /// pagination is assumed.
    async fn list_artifacts(&self) -> Result<Vec<LearningArtifact>>;
}

/// A `LearningStore` over a fixed in-memory list, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLearningStore {
    artifacts: Vec<LearningArtifact>,
}

impl InMemoryLearningStore {
    pub fn new(artifacts: Vec<LearningArtifact>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl LearningStore for InMemoryLearningStore {
    async fn list_artifacts(&self) -> Result<Vec<LearningArtifact>> {
        Ok(self.artifacts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_lists_everything() {
        let store = InMemoryLearningStore::new(vec![
            LearningArtifact::new("1", "Cells", "Cells are the basic unit of life."),
            LearningArtifact::new("2", "DNA", "DNA stores genetic information."),
        ]);
        let artifacts = store.list_artifacts().await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[1].title, "DNA");
    }

    #[tokio::test]
    async fn test_default_store_is_empty() {
        let artifacts = InMemoryLearningStore::default().list_artifacts().await.unwrap();
        assert!(artifacts.is_empty());
    }
}
