//! Magic-link and session arguments.

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_MAGIC_LINK_SECRET: &str = "magic-link-secret";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_MAGIC_LINK_TTL_SECONDS: &str = "magic-link-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

const MIN_SECRET_LEN: usize = 16;

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub magic_link_secret: SecretString,
    pub session_secret: SecretString,
    pub magic_link_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL, or a
    /// secret is missing or too short.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let base_url = matches
            .get_one::<String>(ARG_BASE_URL)
            .cloned()
            .context("missing required argument: --base-url")?;
        validate_base_url(&base_url)?;

        Ok(Self {
            base_url,
            magic_link_secret: secret(matches, ARG_MAGIC_LINK_SECRET)?,
            session_secret: secret(matches, ARG_SESSION_SECRET)?,
            magic_link_ttl_seconds: matches
                .get_one::<u64>(ARG_MAGIC_LINK_TTL_SECONDS)
                .copied()
                .unwrap_or(1800),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
        })
    }
}

// Magic links are built as `<base-url>/magic`, so this must be absolute.
fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url).context("invalid KELAS_BASE_URL")?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(anyhow!(
            "--{ARG_BASE_URL} must be an http or https URL, got {base_url}"
        ));
    }
    Ok(())
}

fn secret(matches: &ArgMatches, name: &str) -> Result<SecretString> {
    let value = matches
        .get_one::<String>(name)
        .with_context(|| format!("missing required argument: --{name}"))?;
    if value.chars().count() < MIN_SECRET_LEN {
        return Err(anyhow!(
            "--{name} must be at least {MIN_SECRET_LEN} characters"
        ));
    }
    Ok(SecretString::from(value.clone()))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL used to build magic links")
                .env("KELAS_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_MAGIC_LINK_SECRET)
                .long(ARG_MAGIC_LINK_SECRET)
                .help("Secret used to sign magic link tokens")
                .env("KELAS_MAGIC_LINK_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign the session cookie")
                .env("KELAS_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_MAGIC_LINK_TTL_SECONDS)
                .long(ARG_MAGIC_LINK_TTL_SECONDS)
                .help("Magic link lifetime in seconds")
                .env("KELAS_MAGIC_LINK_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("KELAS_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64)),
        )
}
