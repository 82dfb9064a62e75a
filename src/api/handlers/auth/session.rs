//! Cookie-backed server-side sessions.
//!
//! The browser only holds `kelas_session=<id>.<signature>`; the signature is
//! HMAC-SHA256 of the id with the session secret, so forged or truncated
//! cookies are treated as "no session". Session contents are a JSON key/value
//! map persisted by a `SessionStore`.
//!
//! Handlers load the session explicitly at entry (`get_session`) and persist
//! it at exit (`commit_session`), which returns the `Set-Cookie` value. Two
//! concurrent requests on the same session are not serialized: the last
//! commit wins.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::Sha256;
use sqlx::{PgPool, Row, types::Json};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{Instrument, debug, warn};

use super::utils::generate_token;

pub const SESSION_COOKIE_NAME: &str = "kelas_session";

type HmacSha256 = Hmac<Sha256>;

pub type SessionData = HashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: SessionData,
    /// Id this session had before `regenerate`; deleted on commit.
    rotated_from: Option<String>,
}

impl Session {
    fn new(id: String, data: SessionData) -> Self {
        Self {
            id,
            data,
            rotated_from: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Typed read; entries that no longer deserialize are treated as absent.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.data.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("Ignoring undecodable session entry {key}: {err}");
                None
            }
        }
    }

    /// # Errors
    /// Returns an error if the value cannot be serialized.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize session entry {key}"))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.data.remove(key);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Move the session to a fresh id (after login) so a pre-login id
    /// cannot be reused by whoever planted it.
    pub(super) fn regenerate(&mut self) -> Result<()> {
        let new_id = generate_token(32)?;
        let old_id = std::mem::replace(&mut self.id, new_id);
        if self.rotated_from.is_none() {
            self.rotated_from = Some(old_id);
        }
        Ok(())
    }
}

/// Persistence for session contents, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>>;
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// `PostgreSQL` session store backed by the `sessions` table.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>> {
        let query = "SELECT data FROM sessions WHERE id = $1 AND expires_at > NOW()";
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
            .context("failed to load session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(data): Json<SessionData> =
            row.try_get("data").context("failed to decode session")?;
        Ok(Some(data))
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<()> {
        // Expired rows are purged on the same round trip; nothing else
        // deletes them.
        let query = r"
            WITH purged AS (
                DELETE FROM sessions WHERE expires_at <= NOW() AND id <> $1
            )
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
            ON CONFLICT (id) DO UPDATE
            SET data = EXCLUDED.data,
                expires_at = EXCLUDED.expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(Json(data))
            .bind(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save session")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let query = "DELETE FROM sessions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

/// Signs session cookies and moves session contents in and out of the store.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    secret: SecretString,
    ttl: Duration,
    secure: bool,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: SecretString,
        ttl: Duration,
        secure: bool,
    ) -> Self {
        Self {
            store,
            secret,
            ttl,
            secure,
        }
    }

    /// Load the session named by the request cookie, or start a new one.
    ///
    /// # Errors
    /// Returns an error if the store fails or a new id cannot be generated.
    pub async fn get_session(&self, headers: &HeaderMap) -> Result<Session> {
        if let Some(id) = extract_cookie(headers, SESSION_COOKIE_NAME)
            .and_then(|value| self.unsign(&value))
        {
            if let Some(data) = self.store.load(&id).await? {
                return Ok(Session::new(id, data));
            }
            debug!("Session cookie refers to a missing or expired session");
        }
        Ok(Session::new(generate_token(32)?, SessionData::new()))
    }

    /// Persist the session and return the `Set-Cookie` value for it.
    ///
    /// # Errors
    /// Returns an error if the store fails or the cookie cannot be encoded.
    pub async fn commit_session(&self, session: &Session) -> Result<HeaderValue> {
        // The old row stays until the new one is stored; the browser still
        // holds the old cookie if saving fails.
        self.store.save(&session.id, &session.data, self.ttl).await?;
        if let Some(old_id) = &session.rotated_from {
            self.store.delete(old_id).await?;
        }
        let value = self.sign(&session.id)?;
        self.cookie(&value, self.ttl.as_secs())
            .context("failed to build session cookie")
    }

    /// Delete the session and return a `Set-Cookie` value that clears it.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn destroy_session(&self, session: &Session) -> Result<HeaderValue> {
        if let Some(old_id) = &session.rotated_from {
            self.store.delete(old_id).await?;
        }
        self.store.delete(&session.id).await?;
        self.cookie("", 0).context("failed to build session cookie")
    }

    fn sign(&self, id: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .context("invalid session secret")?;
        mac.update(id.as_bytes());
        let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        Ok(format!("{id}.{signature}"))
    }

    fn unsign(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        mac.update(id.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("Rejected session cookie with bad signature");
            return None;
        }
        Some(id.to_string())
    }

    fn cookie(&self, value: &str, max_age: u64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
}
