//! Lesson JSON endpoints for signed-in members.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::{AuthRejection, Authenticator, require_user};
use crate::lessons::{Lesson, LessonStore};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UpdateLessonDescription {
    pub description: String,
}

#[utoipa::path(
    get,
    path = "/lessons/{id}",
    params(("id" = String, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson", body = Lesson),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "lessons"
)]
pub async fn get_lesson(
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<String>,
    auth: Extension<Arc<Authenticator>>,
    lessons: Extension<Arc<dyn LessonStore>>,
) -> Result<Response, AuthRejection> {
    require_user(&auth, &headers, &uri, None).await?;

    Ok(match lessons.get_lesson_by_id(&id).await {
        Ok(Some(lesson)) => Json(lesson).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load lesson {id}: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    })
}

#[utoipa::path(
    put,
    path = "/lessons/{id}/description",
    params(("id" = String, Path, description = "Lesson id")),
    request_body = UpdateLessonDescription,
    responses(
        (status = 200, description = "Updated lesson", body = Lesson),
        (status = 303, description = "Not signed in"),
        (status = 404, description = "Lesson not found")
    ),
    tag = "lessons"
)]
pub async fn update_lesson_description(
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<String>,
    auth: Extension<Arc<Authenticator>>,
    lessons: Extension<Arc<dyn LessonStore>>,
    Json(request): Json<UpdateLessonDescription>,
) -> Result<Response, AuthRejection> {
    require_user(&auth, &headers, &uri, None).await?;

    Ok(
        match lessons
            .update_lesson_description(&id, &request.description)
            .await
        {
            Ok(Some(lesson)) => Json(lesson).into_response(),
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(err) => {
                error!("Failed to update lesson {id}: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    )
}
