use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use url::Url;

pub const ARG_EMAIL_FROM: &str = "email-from";
pub const ARG_EMAIL_RELAY_URL: &str = "email-relay-url";

#[derive(Debug)]
pub struct Options {
    pub from: String,
    /// Without a relay, emails are only logged.
    pub relay_url: Option<Url>,
}

impl Options {
    /// # Errors
    /// Returns an error if the relay URL is not a valid URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let from = matches
            .get_one::<String>(ARG_EMAIL_FROM)
            .cloned()
            .context("missing required argument: --email-from")?;
        let relay_url = matches
            .get_one::<String>(ARG_EMAIL_RELAY_URL)
            .map(|url| Url::parse(url))
            .transpose()
            .context("invalid KELAS_EMAIL_RELAY_URL")?;
        Ok(Self { from, relay_url })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_FROM)
                .long(ARG_EMAIL_FROM)
                .help("Sender address for magic link emails")
                .env("KELAS_EMAIL_FROM")
                .default_value("Kelas <noreply@kelas.local>"),
        )
        .arg(
            Arg::new(ARG_EMAIL_RELAY_URL)
                .long(ARG_EMAIL_RELAY_URL)
                .help("HTTP relay that delivers email; emails are logged when unset")
                .env("KELAS_EMAIL_RELAY_URL"),
        )
}
