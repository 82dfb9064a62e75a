//! Passwordless login and session handling.
//!
//! Members request a magic link by email; following it completes the login in
//! the same browser session that requested it. Protected routes use the gate
//! functions in `gate`.
//!
//! ## Secrets
//!
//! - **Magic-link secret** signs link tokens. Rotating it invalidates every
//!   link that has been sent but not yet used.
//! - **Session secret** signs the `kelas_session` cookie. Rotating it signs
//!   everyone out.

pub mod authenticator;
pub mod error;
pub mod gate;
pub mod login;
pub mod magic_link;
pub mod session;
mod state;
pub(crate) mod types;
mod utils;

pub use authenticator::{AuthenticateOptions, Authenticator, VerifiedLogin};
pub use error::{AuthError, AuthRejection};
pub use gate::{Authenticated, get_headers_with_updated_user, require_updated_user, require_user};
pub use session::{PgSessionStore, Session, SessionManager, SessionStore};
pub use state::AuthConfig;
