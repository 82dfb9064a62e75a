//! Member dashboard and the payment instructions page.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use minijinja::context;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::auth::{
    AuthRejection, Authenticated, Authenticator, authenticator::USER_KEY,
    get_headers_with_updated_user, require_updated_user, require_user,
};
use crate::api::templates;
use crate::users::User;

/// Manual bank transfer details shown to members buying a subscription.
#[derive(Debug, Serialize)]
pub struct PaymentInstructions {
    pub amount: &'static str,
    pub bank_name: &'static str,
    pub bank_code: &'static str,
    pub account_number: &'static str,
    pub account_holder: &'static str,
}

pub const PAYMENT_INSTRUCTIONS: PaymentInstructions = PaymentInstructions {
    amount: "Rp XX0.000,-",
    bank_name: "Jago (Bank Artos)",
    bank_code: "542",
    account_number: "5041 7623 2889",
    account_holder: "Zain Fathoni",
};

fn html(name: &str, result: anyhow::Result<String>) -> Response {
    match result {
        Ok(body) => Html(body).into_response(),
        Err(err) => {
            error!("Failed to render {name}: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Email and subscriptions, read fresh from the database.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", content_type = "text/html"),
        (status = 303, description = "Not signed in, or the account no longer exists")
    ),
    tag = "kelas"
)]
pub async fn dashboard(
    headers: HeaderMap,
    uri: Uri,
    auth: Extension<Arc<Authenticator>>,
) -> Result<Response, AuthRejection> {
    let Authenticated { session, user } =
        require_updated_user(&auth, &headers, &uri, None).await?;

    // Refresh the session copy when the database moved on.
    let mut response_headers = HeaderMap::new();
    if session.get::<User>(USER_KEY).as_ref() != Some(&user) {
        debug!(user_id = %user.id, "Refreshing session user");
        match get_headers_with_updated_user(&auth, &headers, &user).await {
            Ok(headers) => response_headers = headers,
            Err(err) => error!("Failed to refresh session user: {err:#}"),
        }
    }

    let page = html(
        "dashboard.html",
        templates::render(
            "dashboard.html",
            context! {
                user => &user,
                has_active_subscription => user.has_active_subscription(),
            },
        ),
    );
    Ok((response_headers, page).into_response())
}

/// Static bank transfer instructions for signed-in members.
#[utoipa::path(
    get,
    path = "/dashboard/purchase",
    responses(
        (status = 200, description = "Payment instructions", content_type = "text/html"),
        (status = 303, description = "Not signed in")
    ),
    tag = "kelas"
)]
pub async fn purchase(
    headers: HeaderMap,
    uri: Uri,
    auth: Extension<Arc<Authenticator>>,
) -> Result<Response, AuthRejection> {
    require_user(&auth, &headers, &uri, None).await?;

    Ok(html(
        "purchase.html",
        templates::render(
            "purchase.html",
            context! { payment => &PAYMENT_INSTRUCTIONS },
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn purchase_page_shows_transfer_details() -> Result<()> {
        let page = templates::render(
            "purchase.html",
            context! { payment => &PAYMENT_INSTRUCTIONS },
        )?;
        for expected in [
            "Rp XX0.000,-",
            "Jago (Bank Artos)",
            "542",
            "5041 7623 2889",
            "Zain Fathoni",
            "Konfirmasi Pembayaran",
        ] {
            assert!(page.contains(expected), "missing {expected}");
        }
        Ok(())
    }
}
