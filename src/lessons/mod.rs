//! Lesson records: read by id and update the description.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::Instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn get_lesson_by_id(&self, id: &str) -> Result<Option<Lesson>>;

    /// Returns `None` when no lesson has the given id.
    async fn update_lesson_description(&self, id: &str, description: &str)
    -> Result<Option<Lesson>>;
}

#[derive(Clone, Debug)]
pub struct PgLessonStore {
    pool: PgPool,
}

impl PgLessonStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LessonStore for PgLessonStore {
    async fn get_lesson_by_id(&self, id: &str) -> Result<Option<Lesson>> {
        let query = "SELECT id, title, description, updated_at FROM lessons WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, Lesson>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch lesson")
    }

    async fn update_lesson_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<Option<Lesson>> {
        let query = r"
            UPDATE lessons
            SET description = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, description, updated_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query_as::<_, Lesson>(query)
            .bind(id)
            .bind(description)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update lesson description")
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::{Lesson, LessonStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryLessonStore {
        lessons: Mutex<HashMap<String, Lesson>>,
    }

    impl MemoryLessonStore {
        pub(crate) async fn insert(&self, lesson: Lesson) {
            self.lessons.lock().await.insert(lesson.id.clone(), lesson);
        }
    }

    #[async_trait]
    impl LessonStore for MemoryLessonStore {
        async fn get_lesson_by_id(&self, id: &str) -> Result<Option<Lesson>> {
            Ok(self.lessons.lock().await.get(id).cloned())
        }

        async fn update_lesson_description(
            &self,
            id: &str,
            description: &str,
        ) -> Result<Option<Lesson>> {
            let mut lessons = self.lessons.lock().await;
            Ok(lessons.get_mut(id).map(|lesson| {
                lesson.description = description.to_string();
                lesson.updated_at = Utc::now();
                lesson.clone()
            }))
        }
    }
}
