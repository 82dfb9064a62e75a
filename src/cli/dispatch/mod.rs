//! Maps validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, email};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url: auth_opts.base_url,
        magic_link_secret: auth_opts.magic_link_secret,
        session_secret: auth_opts.session_secret,
        magic_link_ttl_seconds: auth_opts.magic_link_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        email_from: email_opts.from,
        email_relay_url: email_opts.relay_url,
    }))
}
