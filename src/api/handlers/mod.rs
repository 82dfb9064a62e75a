//! Route handlers for Kelas.
//!
//! Page handlers gate on the session with the functions in `auth::gate` and
//! return `Result<_, AuthRejection>`, so an anonymous visitor ends up on the
//! login page without the handler doing anything else.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod lessons;
pub mod root;

#[cfg(test)]
mod tests;
