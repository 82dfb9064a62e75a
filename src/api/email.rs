//! Email delivery abstractions.
//!
//! Magic links are sent synchronously while handling `POST /login`: the
//! `EmailSender` returns `Ok`/`Err` and a failure aborts link issuance so the
//! login page never claims a link was sent when it was not.
//!
//! The default sender for local dev is `LogEmailSender`, which logs and returns
//! `Ok(())`. `RelayEmailSender` hands the message to an HTTP relay (a small
//! JSON endpoint in front of SMTP or a provider API).
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{Instrument, info, info_span};
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Email delivery abstraction used by the login flow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can report failure.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.text_body,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Posts messages as JSON to an HTTP relay; any non-2xx status is a failure.
#[derive(Clone, Debug)]
pub struct RelayEmailSender {
    client: Client,
    url: Url,
    from: String,
}

impl RelayEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build email relay client")?;
        Ok(Self { client, url, from })
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to_email,
            subject: &message.subject,
            text: &message.text_body,
            html: &message.html_body,
        };
        let span = info_span!("email.relay", http.url = %self.url);
        self.client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .instrument(span)
            .await
            .context("email relay request failed")?
            .error_for_status()
            .context("email relay rejected message")?;
        Ok(())
    }
}
