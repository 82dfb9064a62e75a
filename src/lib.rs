//! # Kelas (e-learning service)
//!
//! `kelas` serves lessons, a payment instructions page and a member dashboard.
//! Members sign in without passwords: they receive a signed, time-limited
//! magic link by email, and following it establishes a cookie-backed session.
//!
//! ## Login flow
//!
//! `Anonymous → LinkRequested → Verified`
//!
//! - **Request:** `POST /login` issues a link to `/magic` and records a pending
//!   marker (hash of the token) in the browser's session.
//! - **Verify:** `GET /magic?token=…` checks the signature and expiry, requires
//!   the token to match the pending marker, resolves or creates the user by
//!   email, and stores the user in the session.
//! - **Gate:** protected pages redirect anonymous visitors to
//!   `/login?redirectTo=<requested path>`; the dashboard re-reads the user from
//!   the database because the session copy may be stale.
//!
//! ## Storage
//!
//! Users, subscriptions, lessons and sessions live in PostgreSQL
//! (`sql/schema.sql`). Email uniqueness is enforced by a unique index, which is
//! the only cross-request coordination the login flow relies on.

pub mod api;
pub mod cli;
pub mod lessons;
pub mod users;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
