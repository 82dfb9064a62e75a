use axum::response::{IntoResponse, Redirect};

/// `/` has no page of its own.
pub async fn root() -> impl IntoResponse {
    Redirect::to("/dashboard")
}
