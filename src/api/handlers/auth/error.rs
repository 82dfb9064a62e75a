use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Failures of the magic-link login flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("magic link is expired or malformed")]
    InvalidLink,
    #[error("no magic link was requested in this session")]
    NoPendingLink,
    #[error("a user with this email was created concurrently")]
    DuplicateEmail,
    #[error("session user no longer exists")]
    StaleSession,
    #[error("failed to send magic link email: {0}")]
    Email(anyhow::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    /// Short code carried in the `error` query parameter of the login page.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "invalid_email",
            Self::InvalidLink => "invalid_link",
            Self::NoPendingLink => "no_pending_link",
            Self::DuplicateEmail => "duplicate_email",
            Self::StaleSession => "stale_session",
            Self::Email(_) => "email_failed",
            Self::Store(_) => "unavailable",
        }
    }
}

/// Why a gated request did not reach its handler.
///
/// Route handlers return `Result<_, AuthRejection>` and use `?` on the gate,
/// so a rejection ends the request with the redirect it carries.
#[derive(Debug)]
pub enum AuthRejection {
    /// No authenticated user; send the browser to the login page.
    Redirect { location: String },
    /// The session was destroyed; clear the cookie and redirect.
    Logout {
        location: String,
        set_cookie: HeaderValue,
    },
    /// Storage failure while resolving the session.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect { location } => Redirect::to(&location).into_response(),
            Self::Logout {
                location,
                set_cookie,
            } => {
                let mut headers = HeaderMap::new();
                headers.insert(SET_COOKIE, set_cookie);
                (headers, Redirect::to(&location)).into_response()
            }
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
