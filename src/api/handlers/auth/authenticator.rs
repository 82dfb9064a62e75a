//! Magic-link authenticator.
//!
//! Owns the pieces of the login flow and the session keys they use:
//!
//! - `kelas:magiclink` holds the pending marker written by `request_link`:
//!   the SHA-256 hash of the issued token, the email and the post-login
//!   destination. A newer request replaces it, so only the latest link works.
//! - `kelas:user` holds the authenticated user written by
//!   `complete_verification`. It is a cached copy; the gate refreshes it from
//!   the database where subscription data matters.
//!
//! Constructed once at startup and shared through an `Extension`.

use axum::http::HeaderValue;
use minijinja::context;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    error::{AuthError, AuthRejection},
    magic_link::{CALLBACK_PATH, MagicLinkVerifier},
    session::{Session, SessionManager, SessionStore},
    state::AuthConfig,
    utils::{DEFAULT_SUCCESS_REDIRECT, hash_token, normalize_email, safe_redirect, valid_email},
};
use crate::api::{
    email::{EmailMessage, EmailSender},
    templates,
};
use crate::users::{CreateUserOutcome, User, UserStore};

pub const PENDING_LINK_KEY: &str = "kelas:magiclink";
pub const USER_KEY: &str = "kelas:user";

const MAGIC_LINK_SUBJECT: &str = "Tautan masuk Kelas";

#[derive(Debug, Serialize, Deserialize)]
struct PendingLink {
    token_hash: String,
    email: String,
    redirect_to: Option<String>,
}

/// Result of a successful callback.
#[derive(Debug)]
pub struct VerifiedLogin {
    pub user: User,
    /// Where to send the browser next.
    pub redirect_to: String,
}

#[derive(Debug, Default, Clone)]
pub struct AuthenticateOptions {
    /// Reject anonymous sessions with a redirect here instead of returning `None`.
    pub failure_redirect: Option<String>,
}

pub struct Authenticator {
    config: AuthConfig,
    sessions: SessionManager,
    magic_link: MagicLinkVerifier,
    users: Arc<dyn UserStore>,
    email: Arc<dyn EmailSender>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        magic_link_secret: SecretString,
        session_secret: SecretString,
        session_store: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let sessions = SessionManager::new(
            session_store,
            session_secret,
            config.session_ttl(),
            config.session_cookie_secure(),
        );
        let magic_link = MagicLinkVerifier::new(magic_link_secret, config.magic_link_ttl());
        Self {
            config,
            sessions,
            magic_link,
            users,
            email,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Issue a magic link for `email`, send it, and record the pending marker.
    ///
    /// The marker is only written once the email was accepted by the sender.
    ///
    /// # Errors
    /// `InvalidEmail` for malformed addresses, `Email` when delivery fails.
    pub async fn request_link(
        &self,
        session: &mut Session,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let callback_url = format!("{}{CALLBACK_PATH}", self.config.base_url());
        let link = self.magic_link.issue(&email, &callback_url)?;

        // Rounded up so short TTLs never read as "0 menit".
        let ttl_minutes = self.magic_link.ttl().as_secs().div_ceil(60);
        let message = EmailMessage {
            to_email: email.clone(),
            subject: MAGIC_LINK_SUBJECT.to_string(),
            text_body: templates::render(
                "email/magic_link.txt",
                context! { link => &link.url, ttl_minutes },
            )?,
            html_body: templates::render(
                "email/magic_link.html",
                context! { link => &link.url, ttl_minutes },
            )?,
        };
        self.email
            .send(&message)
            .await
            .map_err(AuthError::Email)?;

        session.set(
            PENDING_LINK_KEY,
            &PendingLink {
                token_hash: hash_token(&link.token),
                email,
                redirect_to: safe_redirect(redirect_to),
            },
        )?;

        debug!("Magic link sent");
        Ok(())
    }

    /// Complete the callback: validate the token against the pending marker
    /// and store the resolved user in the session.
    ///
    /// The session id is rotated; the caller must commit the session.
    ///
    /// # Errors
    /// `InvalidLink` for expired, tampered or superseded tokens,
    /// `NoPendingLink` when this session never requested a link,
    /// `DuplicateEmail` when user creation conflicts and the user still
    /// cannot be found.
    pub async fn complete_verification(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<VerifiedLogin, AuthError> {
        let email = self.magic_link.verify(token)?;

        let pending: PendingLink = session
            .get(PENDING_LINK_KEY)
            .ok_or(AuthError::NoPendingLink)?;
        if pending.token_hash != hash_token(token.trim()) || pending.email != email {
            warn!("Magic link does not match the pending request");
            return Err(AuthError::InvalidLink);
        }

        let user = self.resolve_user(&email).await?;

        session.set(USER_KEY, &user)?;
        session.remove(PENDING_LINK_KEY);
        session.regenerate()?;

        info!(user_id = %user.id, "Magic link login");
        Ok(VerifiedLogin {
            user,
            redirect_to: pending
                .redirect_to
                .unwrap_or_else(|| DEFAULT_SUCCESS_REDIRECT.to_string()),
        })
    }

    /// The post-login destination recorded by the pending marker, if any.
    #[must_use]
    pub fn pending_redirect(&self, session: &Session) -> Option<String> {
        session
            .get::<PendingLink>(PENDING_LINK_KEY)
            .and_then(|pending| pending.redirect_to)
    }

    /// Return the session's user without touching the database.
    ///
    /// # Errors
    /// `AuthRejection::Redirect` when anonymous and a failure redirect is set.
    pub fn is_authenticated(
        &self,
        session: &Session,
        options: &AuthenticateOptions,
    ) -> Result<Option<User>, AuthRejection> {
        match session.get::<User>(USER_KEY) {
            Some(user) => Ok(Some(user)),
            None => match &options.failure_redirect {
                Some(location) => Err(AuthRejection::Redirect {
                    location: location.clone(),
                }),
                None => Ok(None),
            },
        }
    }

    /// Destroy the session; returns the cookie that clears it.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn logout(&self, session: &Session) -> Result<HeaderValue, AuthError> {
        Ok(self.sessions.destroy_session(session).await?)
    }

    async fn resolve_user(&self, email: &str) -> Result<User, AuthError> {
        if let Some(user) = self.users.get_user_by_email(email).await? {
            return Ok(user);
        }

        match self.users.create_user_by_email(email).await? {
            CreateUserOutcome::Created(user) => {
                info!(user_id = %user.id, "Created user");
                Ok(user)
            }
            CreateUserOutcome::Conflict => {
                debug!("User creation conflicted; retrying lookup");
                self.users
                    .get_user_by_email(email)
                    .await?
                    .ok_or(AuthError::DuplicateEmail)
            }
        }
    }
}
