//! Login pages: request a link, follow it, log out.

use axum::{
    Form,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::context;
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    authenticator::{AuthenticateOptions, Authenticator},
    error::AuthError,
    types::{LoginForm, LoginQuery, MagicQuery},
    utils::{
        DEFAULT_SUCCESS_REDIRECT, LOGGED_OUT_REDIRECT, LOGIN_PATH, login_error_url, safe_redirect,
    },
};
use crate::api::templates;

/// Human-readable message for an error code on the login page.
fn error_message(code: &str) -> &'static str {
    match code {
        "invalid_email" => "Alamat email tidak valid.",
        "invalid_link" => {
            "Tautan masuk tidak valid atau sudah kedaluwarsa. Silakan minta tautan baru."
        }
        "no_pending_link" => {
            "Buka tautan masuk di browser yang sama dengan tempat kamu memintanya."
        }
        "email_failed" => "Email gagal dikirim. Silakan coba lagi.",
        "duplicate_email" => "Akun kamu sedang dibuat. Silakan minta tautan baru.",
        _ => "Terjadi kesalahan. Silakan coba lagi.",
    }
}

fn render_login(
    status: StatusCode,
    email: &str,
    redirect_to: Option<&str>,
    error: Option<&str>,
    sent: bool,
) -> Response {
    match templates::render(
        "login.html",
        context! {
            email,
            redirect_to => redirect_to.unwrap_or_default(),
            error => error.map(error_message).unwrap_or_default(),
            sent,
        },
    ) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!("Failed to render login page: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Login form. Signed-in members go straight to their destination.
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login form", content_type = "text/html"),
        (status = 303, description = "Already signed in")
    ),
    tag = "auth"
)]
pub async fn login_page(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let redirect_to = safe_redirect(query.redirect_to.as_deref());

    let session = match auth.sessions().get_session(&headers).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to load session: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Ok(Some(_)) = auth.is_authenticated(&session, &AuthenticateOptions::default()) {
        let target = redirect_to.as_deref().unwrap_or(DEFAULT_SUCCESS_REDIRECT);
        return Redirect::to(target).into_response();
    }

    render_login(
        StatusCode::OK,
        "",
        redirect_to.as_deref(),
        query.error.as_deref(),
        query.sent.is_some(),
    )
}

/// Send a magic link to the submitted address.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Link sent, redirect to /login?sent=1"),
        (status = 400, description = "Invalid email", content_type = "text/html"),
        (status = 502, description = "Email delivery failed", content_type = "text/html")
    ),
    tag = "auth"
)]
pub async fn request_login_link(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let redirect_to = safe_redirect(form.redirect_to.as_deref());

    let mut session = match auth.sessions().get_session(&headers).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to load session: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match auth
        .request_link(&mut session, &form.email, redirect_to.as_deref())
        .await
    {
        Ok(()) => match auth.sessions().commit_session(&session).await {
            Ok(cookie) => (
                [(SET_COOKIE, cookie)],
                Redirect::to(&format!("{LOGIN_PATH}?sent=1")),
            )
                .into_response(),
            Err(err) => {
                error!("Failed to commit session: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err @ AuthError::InvalidEmail) => render_login(
            StatusCode::BAD_REQUEST,
            &form.email,
            redirect_to.as_deref(),
            Some(err.code()),
            false,
        ),
        Err(err @ AuthError::Email(_)) => {
            error!("{err:#}");
            render_login(
                StatusCode::BAD_GATEWAY,
                &form.email,
                redirect_to.as_deref(),
                Some(err.code()),
                false,
            )
        }
        Err(err) => {
            error!("Failed to request magic link: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Magic link callback.
#[utoipa::path(
    get,
    path = "/magic",
    params(MagicQuery),
    responses(
        (status = 303, description = "Signed in and redirected, or sent back to /login with an error code")
    ),
    tag = "auth"
)]
pub async fn magic_link_callback(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    Query(query): Query<MagicQuery>,
) -> Response {
    let mut session = match auth.sessions().get_session(&headers).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to load session: {err:#}");
            return Redirect::to(&login_error_url(None, AuthError::Store(err).code()))
                .into_response();
        }
    };
    let redirect_to = auth.pending_redirect(&session);

    let result = match query.token.as_deref() {
        Some(token) => auth.complete_verification(&mut session, token).await,
        None => Err(AuthError::InvalidLink),
    };

    let err = match result {
        Ok(login) => match auth.sessions().commit_session(&session).await {
            Ok(cookie) => {
                return ([(SET_COOKIE, cookie)], Redirect::to(&login.redirect_to)).into_response();
            }
            Err(err) => AuthError::Store(err),
        },
        Err(err) => err,
    };

    match &err {
        AuthError::Store(_) => error!("Magic link login failed: {err:#}"),
        _ => warn!("Magic link login rejected: {err}"),
    }
    Redirect::to(&login_error_url(redirect_to.as_deref(), err.code())).into_response()
}

/// Destroy the session.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to /")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth: Extension<Arc<Authenticator>>) -> Response {
    let session = match auth.sessions().get_session(&headers).await {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to load session: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match auth.logout(&session).await {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to(LOGGED_OUT_REDIRECT)).into_response(),
        Err(err) => {
            error!("Failed to log out: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
