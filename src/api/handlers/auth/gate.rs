//! Route guards for pages that need a signed-in member.
//!
//! Handlers call these at entry and `?` the result; a rejection turns into
//! the redirect it carries.

use axum::http::{HeaderMap, Uri, header::SET_COOKIE};
use tracing::{error, info};

use super::{
    authenticator::{AuthenticateOptions, Authenticator, USER_KEY},
    error::{AuthError, AuthRejection},
    session::Session,
    utils::{LOGGED_OUT_REDIRECT, login_redirect_url},
};
use crate::users::User;

/// A request that passed the gate.
#[derive(Debug)]
pub struct Authenticated {
    pub session: Session,
    pub user: User,
}

/// Path plus query of the request, the default post-login destination.
#[must_use]
pub fn request_target(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string)
}

/// Require a session user, redirecting anonymous visitors to the login page.
///
/// `redirect_to` defaults to the request's path and query.
///
/// # Errors
/// `AuthRejection::Redirect` to `/login?redirectTo=…` when anonymous,
/// `AuthRejection::Internal` when the session store fails.
pub async fn require_user(
    auth: &Authenticator,
    headers: &HeaderMap,
    uri: &Uri,
    redirect_to: Option<&str>,
) -> Result<Authenticated, AuthRejection> {
    let redirect_to = redirect_to.map_or_else(|| request_target(uri), ToString::to_string);

    let session = auth.sessions().get_session(headers).await.map_err(|err| {
        error!("Failed to load session: {err:#}");
        AuthRejection::Internal
    })?;

    let location = login_redirect_url(&redirect_to);
    let options = AuthenticateOptions {
        failure_redirect: Some(location.clone()),
    };
    match auth.is_authenticated(&session, &options)? {
        Some(user) => Ok(Authenticated { session, user }),
        None => Err(AuthRejection::Redirect { location }),
    }
}

/// Like `require_user`, but re-reads the user (with subscriptions) from the
/// store. A session whose user no longer exists is destroyed.
///
/// # Errors
/// As `require_user`, plus `AuthRejection::Logout` for stale sessions.
pub async fn require_updated_user(
    auth: &Authenticator,
    headers: &HeaderMap,
    uri: &Uri,
    redirect_to: Option<&str>,
) -> Result<Authenticated, AuthRejection> {
    let Authenticated { session, user } = require_user(auth, headers, uri, redirect_to).await?;

    match auth.users().get_user(user.id).await {
        Ok(Some(user)) => Ok(Authenticated { session, user }),
        Ok(None) => {
            info!(user_id = %user.id, "{}", AuthError::StaleSession);
            let set_cookie = auth.logout(&session).await.map_err(|err| {
                error!("Failed to destroy stale session: {err}");
                AuthRejection::Internal
            })?;
            Err(AuthRejection::Logout {
                location: LOGGED_OUT_REDIRECT.to_string(),
                set_cookie,
            })
        }
        Err(err) => {
            error!("Failed to refresh session user: {err:#}");
            Err(AuthRejection::Internal)
        }
    }
}

/// Store `user` in the request's session and return the `Set-Cookie` headers
/// to attach to the response.
///
/// # Errors
/// Returns an error if the session cannot be loaded or committed.
pub async fn get_headers_with_updated_user(
    auth: &Authenticator,
    headers: &HeaderMap,
    user: &User,
) -> Result<HeaderMap, AuthError> {
    let mut session = auth.sessions().get_session(headers).await?;
    session.set(USER_KEY, user)?;
    let cookie = auth.sessions().commit_session(&session).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok(response_headers)
}
