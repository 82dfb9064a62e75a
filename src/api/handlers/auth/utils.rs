//! Small helpers for email validation, random tokens and redirect targets.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

pub(super) const LOGIN_PATH: &str = "/login";
pub(super) const DEFAULT_SUCCESS_REDIRECT: &str = "/dashboard";
pub(super) const LOGGED_OUT_REDIRECT: &str = "/";

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Random URL-safe value of `len` bytes (session ids, link nonces).
pub(super) fn generate_token(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a magic-link token so the raw value never lands in session storage.
pub(super) fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

/// Accept only same-site absolute paths as post-login destinations.
pub(super) fn safe_redirect(target: Option<&str>) -> Option<String> {
    let target = target?.trim();
    if !target.starts_with('/') || target.starts_with("//") || target.contains('\\') {
        return None;
    }
    if target.chars().any(char::is_control) {
        return None;
    }
    Some(target.to_string())
}

/// `/login?redirectTo=<form-encoded path>`, the failure redirect for gated pages.
pub(crate) fn login_redirect_url(redirect_to: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirectTo", redirect_to)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Login page URL carrying an error code alongside the destination.
pub(super) fn login_error_url(redirect_to: Option<&str>, error: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(redirect_to) = redirect_to {
        serializer.append_pair("redirectTo", redirect_to);
    }
    serializer.append_pair("error", error);
    format!("{LOGIN_PATH}?{}", serializer.finish())
}
