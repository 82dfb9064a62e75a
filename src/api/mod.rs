use crate::api::handlers::{
    auth::{
        self, Authenticator, PgSessionStore,
        login::{login_page, logout, magic_link_callback, request_login_link},
    },
    dashboard, health, lessons, root,
};
use crate::{
    cli::telemetry,
    lessons::{LessonStore, PgLessonStore},
    users::PgUserStore,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post, put},
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

pub mod email;
pub mod handlers;
mod openapi;
pub mod templates;

pub use openapi::openapi;

/// Build the application router.
///
/// `/health` is added by `new` because it needs the database pool.
pub fn router(auth: Arc<Authenticator>, lessons: Arc<dyn LessonStore>) -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/login", get(login_page).post(request_login_link))
        .route("/magic", get(magic_link_callback))
        .route("/logout", post(logout))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/dashboard/purchase", get(dashboard::purchase))
        .route("/lessons/:id", get(lessons::get_lesson))
        .route(
            "/lessons/:id/description",
            put(lessons::update_lesson_description),
        )
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth))
                .layer(Extension(lessons)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    magic_link_secret: SecretString,
    session_secret: SecretString,
    email: Arc<dyn email::EmailSender>,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let authenticator = Arc::new(Authenticator::new(
        auth_config,
        magic_link_secret,
        session_secret,
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(PgUserStore::new(pool.clone())),
        email,
    ));
    let lesson_store: Arc<dyn LessonStore> = Arc::new(PgLessonStore::new(pool.clone()));

    let app = router(authenticator, lesson_store)
        .route("/health", get(health::health).options(health::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_tracer();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
