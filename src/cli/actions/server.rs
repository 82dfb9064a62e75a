use crate::api::{
    self,
    email::{EmailSender, LogEmailSender, RelayEmailSender},
    handlers::auth::AuthConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub magic_link_secret: SecretString,
    pub session_secret: SecretString,
    pub magic_link_ttl_seconds: u64,
    pub session_ttl_seconds: u64,
    pub email_from: String,
    pub email_relay_url: Option<Url>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the email relay client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.base_url)
        .with_magic_link_ttl_seconds(args.magic_link_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_email_from(args.email_from);

    let email: Arc<dyn EmailSender> = if let Some(url) = args.email_relay_url {
        info!("Sending email through relay {url}");
        Arc::new(RelayEmailSender::new(
            url,
            auth_config.email_from().to_string(),
        )?)
    } else {
        info!("No email relay configured; magic links are logged");
        Arc::new(LogEmailSender)
    };

    api::new(
        args.port,
        args.dsn,
        auth_config,
        args.magic_link_secret,
        args.session_secret,
        email,
    )
    .await
}
