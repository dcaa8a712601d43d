//! Data Access Layer
//!
//! Read-only access to learning artifacts kept in PostgreSQL. The
//! `learning_artifacts` table is owned and migrated by the application that
//! records study sessions; this service only queries it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tutor_core::learning::{LearningArtifact, LearningStore};

/// Hands out a learning store scoped to one user.
pub trait LearningStoreProvider: Send + Sync {
    fn store_for(&self, user_id: &str) -> Arc<dyn LearningStore>;
}

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LearningStoreProvider for Db {
    fn store_for(&self, user_id: &str) -> Arc<dyn LearningStore> {
        Arc::new(PgLearningStore {
            pool: self.pool.clone(),
            user_id: user_id.to_string(),
        })
    }
}

#[derive(FromRow)]
struct ArtifactRow {
    id: String,
    title: String,
    summary_text: String,
    created_at: DateTime<Utc>,
    sector_id: Option<String>,
}

impl From<ArtifactRow> for LearningArtifact {
    fn from(row: ArtifactRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            summary_text: row.summary_text,
            created_at: row.created_at,
            sector_id: row.sector_id,
        }
    }
}

/// The learning artifacts of a single user.
pub struct PgLearningStore {
    pool: PgPool,
    user_id: String,
}

#[async_trait]
impl LearningStore for PgLearningStore {
    async fn list_artifacts(&self) -> Result<Vec<LearningArtifact>> {
        let rows = sqlx::query_as::<_, ArtifactRow>(
            r#"
            SELECT id::text AS id, title, COALESCE(summary_text, '') AS summary_text, created_at,
                   sector_id::text AS sector_id
            FROM learning_artifacts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LearningArtifact::from).collect())
    }
}
