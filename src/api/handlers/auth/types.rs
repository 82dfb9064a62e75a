//! Request types for the login pages.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// `POST /login` form body.
#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginForm {
    pub email: String,
    #[serde(default, rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// `GET /login` query string.
#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    #[serde(default, rename = "redirectTo")]
    pub redirect_to: Option<String>,
    /// Set after a link was sent.
    #[serde(default)]
    pub sent: Option<String>,
    /// Error code from a failed callback.
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /magic` query string.
#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct MagicQuery {
    #[serde(default)]
    pub token: Option<String>,
}
