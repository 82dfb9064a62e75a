#![allow(clippy::needless_for_each)]

use super::handlers::{auth::login, dashboard, health, lessons};
use crate::lessons::Lesson;
use crate::users::{Subscription, SubscriptionStatus, User};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::login_page,
        login::request_login_link,
        login::magic_link_callback,
        login::logout,
        dashboard::dashboard,
        dashboard::purchase,
        lessons::get_lesson,
        lessons::update_lesson_description,
    ),
    components(schemas(
        health::Health,
        lessons::UpdateLessonDescription,
        Lesson,
        User,
        Subscription,
        SubscriptionStatus,
        crate::api::handlers::auth::types::LoginForm,
    )),
    tags(
        (name = "kelas", description = "Member pages"),
        (name = "auth", description = "Magic link login and sessions"),
        (name = "lessons", description = "Lesson data"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
