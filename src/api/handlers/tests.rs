//! Router-level tests over in-memory stores.

use crate::api::{
    email::recording::RecordingEmailSender,
    handlers::auth::{AuthConfig, Authenticator, session::memory::MemorySessionStore},
    router,
};
use crate::lessons::{Lesson, LessonStore, memory::MemoryLessonStore};
use crate::users::{Subscription, SubscriptionStatus, User, UserStore, memory::MemoryUserStore};
use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

struct TestApp {
    router: Router,
    users: Arc<MemoryUserStore>,
    email: Arc<RecordingEmailSender>,
}

async fn test_app() -> TestApp {
    let users = Arc::new(MemoryUserStore::default());
    let email = Arc::new(RecordingEmailSender::default());
    let lessons = Arc::new(MemoryLessonStore::default());
    lessons
        .insert(Lesson {
            id: "intro".to_string(),
            title: "Pengenalan Rust".to_string(),
            description: "Ownership dan borrowing".to_string(),
            updated_at: Utc::now(),
        })
        .await;

    let auth = Arc::new(Authenticator::new(
        AuthConfig::new("https://kelas.dev".to_string()),
        SecretString::from("magic-link-secret-for-tests"),
        SecretString::from("session-secret-for-tests"),
        Arc::new(MemorySessionStore::default()),
        users.clone(),
        email.clone(),
    ));
    let lessons: Arc<dyn LessonStore> = lessons;

    TestApp {
        router: router(auth, lessons),
        users,
        email,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Result<Response> {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        self.send(request.body(Body::empty())?).await
    }

    async fn post_login(&self, body: &str, cookie: Option<&str>) -> Result<Response> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string()))?).await
    }

    /// Callback path (`/magic?token=…`) from the last email sent.
    async fn last_callback(&self) -> Result<String> {
        let link = self.email.last_link().await.context("no email sent")?;
        let url = Url::parse(&link)?;
        Ok(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
    }

    /// Run the whole login flow and return the session cookie.
    async fn sign_in(&self, email: &str) -> Result<String> {
        let response = self
            .post_login(&format!("email={email}&redirectTo=%2Fdashboard"), None)
            .await?;
        let cookie = session_cookie(&response).context("no cookie after POST /login")?;
        let response = self.get(&self.last_callback().await?, Some(&cookie)).await?;
        assert_eq!(location(&response), Some("/dashboard"));
        session_cookie(&response).context("no cookie after callback")
    }
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}

fn set_cookie(response: &Response) -> Option<&str> {
    response.headers().get(SET_COOKIE)?.to_str().ok()
}

fn session_cookie(response: &Response) -> Option<String> {
    set_cookie(response)?.split(';').next().map(ToString::to_string)
}

async fn body_string(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn root_redirects_to_dashboard() -> Result<()> {
    let app = test_app().await;
    let response = app.get("/", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard"));
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_redirect_to_login() -> Result<()> {
    let app = test_app().await;

    let response = app.get("/dashboard", None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?redirectTo=%2Fdashboard"));

    let response = app.get("/lessons/intro?tab=notes&page=2", None).await?;
    assert_eq!(
        location(&response),
        Some("/login?redirectTo=%2Flessons%2Fintro%3Ftab%3Dnotes%26page%3D2")
    );

    let response = app.get("/dashboard/purchase", None).await?;
    assert_eq!(
        location(&response),
        Some("/login?redirectTo=%2Fdashboard%2Fpurchase")
    );
    Ok(())
}

#[tokio::test]
async fn login_page_keeps_destination() -> Result<()> {
    let app = test_app().await;
    let response = app
        .get("/login?redirectTo=%2Flessons%2Fintro&error=invalid_link", None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await?;
    assert!(body.contains(r#"name="redirectTo" value="&#x2f;lessons&#x2f;intro""#));
    assert!(body.contains("kedaluwarsa"));
    Ok(())
}

#[tokio::test]
async fn full_login_flow() -> Result<()> {
    let app = test_app().await;

    let response = app
        .post_login("email=Siti%40Example.com&redirectTo=%2Flessons%2Fintro", None)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?sent=1"));
    let pending_cookie = session_cookie(&response).context("missing session cookie")?;
    assert_eq!(app.email.messages().await[0].to_email, "siti@example.com");

    let response = app
        .get(&app.last_callback().await?, Some(&pending_cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/lessons/intro"));
    let cookie = session_cookie(&response).context("missing session cookie")?;
    assert_ne!(cookie, pending_cookie);

    let response = app.get("/lessons/intro", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let lesson: Lesson = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(lesson.title, "Pengenalan Rust");

    let response = app
        .send(
            Request::builder()
                .method(Method::PUT)
                .uri("/lessons/intro/description")
                .header(CONTENT_TYPE, "application/json")
                .header(COOKIE, &cookie)
                .body(Body::from(r#"{"description":"Lifetimes"}"#))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let lesson: Lesson = serde_json::from_str(&body_string(response).await?)?;
    assert_eq!(lesson.description, "Lifetimes");

    let response = app.get("/lessons/missing", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
    assert!(body_string(response).await?.contains("siti@example.com"));

    let response = app.get("/dashboard/purchase", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await?.contains("5041 7623 2889"));

    // Signed-in members skip the login form.
    let response = app.get("/login", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/dashboard"));

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/logout")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    assert!(set_cookie(&response).is_some_and(|value| value.contains("Max-Age=0")));

    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/login?redirectTo=%2Fdashboard"));
    Ok(())
}

#[tokio::test]
async fn invalid_email_renders_form_with_400() -> Result<()> {
    let app = test_app().await;
    let response = app.post_login("email=bukan-email", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await?.contains("tidak valid"));
    assert!(app.email.messages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn email_failure_is_reported() -> Result<()> {
    let app = test_app().await;
    app.email.fail_sends();
    let response = app.post_login("email=siti%40example.com", None).await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(set_cookie(&response).is_none());
    Ok(())
}

#[tokio::test]
async fn callback_without_request_redirects_with_error() -> Result<()> {
    let app = test_app().await;
    app.post_login("email=siti%40example.com", None).await?;

    // Same link, but a browser that never requested it.
    let response = app.get(&app.last_callback().await?, None).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?error=no_pending_link"));
    assert_eq!(app.users.len().await, 0);
    Ok(())
}

#[tokio::test]
async fn bad_token_keeps_destination() -> Result<()> {
    let app = test_app().await;
    let response = app
        .post_login("email=siti%40example.com&redirectTo=%2Flessons%2Fintro", None)
        .await?;
    let cookie = session_cookie(&response).context("missing session cookie")?;

    let response = app.get("/magic?token=forged.token", Some(&cookie)).await?;
    assert_eq!(
        location(&response),
        Some("/login?redirectTo=%2Flessons%2Fintro&error=invalid_link")
    );

    let response = app.get("/magic", Some(&cookie)).await?;
    assert_eq!(
        location(&response),
        Some("/login?redirectTo=%2Flessons%2Fintro&error=invalid_link")
    );
    Ok(())
}

#[tokio::test]
async fn unresolvable_conflict_redirects_with_duplicate_email() -> Result<()> {
    let app = test_app().await;
    app.users.conflict_without_user();
    let response = app
        .post_login("email=siti%40example.com&redirectTo=%2Flessons%2Fintro", None)
        .await?;
    let cookie = session_cookie(&response).context("missing session cookie")?;

    let response = app.get(&app.last_callback().await?, Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some("/login?redirectTo=%2Flessons%2Fintro&error=duplicate_email")
    );
    assert!(set_cookie(&response).is_none());
    Ok(())
}

#[tokio::test]
async fn dashboard_logs_out_deleted_user() -> Result<()> {
    let app = test_app().await;
    let cookie = app.sign_in("siti%40example.com").await?;

    let user = app
        .users
        .get_user_by_email("siti@example.com")
        .await?
        .context("user should exist")?;
    app.users.remove(user.id).await;

    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    assert!(set_cookie(&response).is_some_and(|value| value.contains("Max-Age=0")));

    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert_eq!(location(&response), Some("/login?redirectTo=%2Fdashboard"));
    Ok(())
}

#[tokio::test]
async fn dashboard_refreshes_stale_session_copy() -> Result<()> {
    let app = test_app().await;
    let cookie = app.sign_in("siti%40example.com").await?;

    let user = app
        .users
        .get_user_by_email("siti@example.com")
        .await?
        .context("user should exist")?;
    app.users
        .insert(User {
            subscriptions: vec![Subscription {
                id: Uuid::new_v4(),
                plan: "kelas-rust".to_string(),
                status: SubscriptionStatus::Pending,
                created_at: Utc::now(),
            }],
            ..user
        })
        .await;

    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = session_cookie(&response).context("session copy should be refreshed")?;
    assert_eq!(refreshed, cookie);
    let body = body_string(response).await?;
    assert!(body.contains("kelas-rust (pending)"));
    assert!(body.contains("/dashboard/purchase"));

    // The refreshed copy matches, so no further cookie is issued.
    let response = app.get("/dashboard", Some(&cookie)).await?;
    assert!(set_cookie(&response).is_none());
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = test_app().await;
    let response = app.get("/openapi.json", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_string(response).await?)?;
    assert!(doc.pointer("/paths/~1magic").is_some());
    Ok(())
}
