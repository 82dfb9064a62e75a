//! Auth configuration.

use std::time::Duration;

const DEFAULT_MAGIC_LINK_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_EMAIL_FROM: &str = "Kelas <noreply@kelas.local>";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    magic_link_ttl_seconds: u64,
    session_ttl_seconds: u64,
    email_from: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        // Links are built as base_url + path
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            base_url,
            magic_link_ttl_seconds: DEFAULT_MAGIC_LINK_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            email_from: DEFAULT_EMAIL_FROM.to_string(),
        }
    }

    #[must_use]
    pub fn with_magic_link_ttl_seconds(mut self, seconds: u64) -> Self {
        self.magic_link_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_from(mut self, email_from: String) -> Self {
        self.email_from = email_from;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn email_from(&self) -> &str {
        &self.email_from
    }

    #[must_use]
    pub fn magic_link_ttl(&self) -> Duration {
        Duration::from_secs(self.magic_link_ttl_seconds)
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
