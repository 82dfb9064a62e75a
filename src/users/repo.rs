use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{CreateUserOutcome, Subscription, User, UserStore};

/// `PostgreSQL` backed user store.
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_subscriptions(&self, user_id: Uuid) -> Result<Vec<Subscription>> {
        let query = r"
            SELECT id, plan, status::text AS status, created_at
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, Subscription>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to load subscriptions")
    }

    async fn with_subscriptions(&self, row: Option<(Uuid, String)>) -> Result<Option<User>> {
        let Some((id, email)) = row else {
            return Ok(None);
        };
        let subscriptions = self.load_subscriptions(id).await?;
        Ok(Some(User {
            id,
            email,
            subscriptions,
        }))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let query = "SELECT id, email FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        self.with_subscriptions(row.map(|row| (row.get("id"), row.get("email"))))
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = "SELECT id, email FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;

        self.with_subscriptions(row.map(|row| (row.get("id"), row.get("email"))))
            .await
    }

    async fn create_user_by_email(&self, email: &str) -> Result<CreateUserOutcome> {
        let query = r"
            INSERT INTO users (email)
            VALUES ($1)
            RETURNING id, email
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateUserOutcome::Created(User {
                id: row.get("id"),
                email: row.get("email"),
                subscriptions: Vec::new(),
            })),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
