//! Signed, time-limited login links.
//!
//! Token layout: `<payload>.<signature>`, both base64url without padding.
//! The payload is JSON `{ "email", "nonce", "exp" }` (exp in unix seconds) and
//! the signature is HMAC-SHA256 over the encoded payload with the magic-link
//! secret. The nonce makes every issued link distinct, so a newer request
//! always supersedes the pending marker of an older one.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use url::Url;

use super::error::AuthError;
use super::utils::generate_token;

type HmacSha256 = Hmac<Sha256>;

/// Callback path embedded in issued links.
pub const CALLBACK_PATH: &str = "/magic";

#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    email: String,
    nonce: String,
    exp: i64,
}

/// An issued link: the full URL to email and the raw token it carries.
#[derive(Debug, Clone)]
pub struct MagicLink {
    pub url: String,
    pub token: String,
}

pub struct MagicLinkVerifier {
    secret: SecretString,
    ttl: Duration,
}

impl MagicLinkVerifier {
    #[must_use]
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a link for `email` pointing at `callback_url`.
    ///
    /// # Errors
    /// Returns an error if the callback URL is invalid or randomness fails.
    pub fn issue(&self, email: &str, callback_url: &str) -> Result<MagicLink> {
        self.issue_at(email, callback_url, Utc::now().timestamp())
    }

    fn issue_at(&self, email: &str, callback_url: &str, now: i64) -> Result<MagicLink> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = LinkClaims {
            email: email.to_string(),
            nonce: generate_token(16)?,
            exp: now.saturating_add(ttl),
        };
        let payload = serde_json::to_vec(&claims).context("failed to encode link claims")?;
        let payload = Base64UrlUnpadded::encode_string(&payload);
        let signature = Base64UrlUnpadded::encode_string(&self.sign(payload.as_bytes())?);
        let token = format!("{payload}.{signature}");

        let mut url = Url::parse(callback_url)
            .with_context(|| format!("invalid magic link callback URL: {callback_url}"))?;
        url.query_pairs_mut().clear().append_pair("token", &token);

        Ok(MagicLink {
            url: url.to_string(),
            token,
        })
    }

    /// Check signature and expiry and return the email the token was issued for.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidLink` for malformed, tampered or expired tokens.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<String, AuthError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(AuthError::InvalidLink)?;
        let signature =
            Base64UrlUnpadded::decode_vec(signature).map_err(|_| AuthError::InvalidLink)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidLink)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidLink)?;

        let payload = Base64UrlUnpadded::decode_vec(payload).map_err(|_| AuthError::InvalidLink)?;
        let claims: LinkClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidLink)?;

        if claims.exp <= now {
            return Err(AuthError::InvalidLink);
        }
        Ok(claims.email)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .context("invalid magic link secret")?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLBACK: &str = "https://kelas.dev/magic";

    fn verifier() -> MagicLinkVerifier {
        MagicLinkVerifier::new(
            SecretString::from("magic-link-secret-for-tests"),
            Duration::from_secs(30 * 60),
        )
    }

    fn token_from(link: &MagicLink) -> Result<String> {
        let url = Url::parse(&link.url)?;
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .context("missing token parameter")
    }

    #[test]
    fn issued_link_verifies_to_email() -> Result<()> {
        let verifier = verifier();
        let link = verifier.issue("siti@example.com", CALLBACK)?;
        assert!(link.url.starts_with("https://kelas.dev/magic?token="));
        assert_eq!(token_from(&link)?, link.token);
        assert_eq!(verifier.verify(&link.token)?, "siti@example.com");
        Ok(())
    }

    #[test]
    fn links_for_same_email_differ() -> Result<()> {
        let verifier = verifier();
        let first = verifier.issue("siti@example.com", CALLBACK)?;
        let second = verifier.issue("siti@example.com", CALLBACK)?;
        assert_ne!(first.token, second.token);
        Ok(())
    }

    #[test]
    fn expired_link_is_invalid() -> Result<()> {
        let verifier = verifier();
        let issued_at = Utc::now().timestamp() - 31 * 60;
        let link = verifier.issue_at("siti@example.com", CALLBACK, issued_at)?;
        assert!(matches!(
            verifier.verify(&link.token),
            Err(AuthError::InvalidLink)
        ));
        Ok(())
    }

    #[test]
    fn link_is_valid_until_expiry() -> Result<()> {
        let verifier = verifier();
        let link = verifier.issue_at("siti@example.com", CALLBACK, 1_000)?;
        assert!(verifier.verify_at(&link.token, 1_000 + 30 * 60 - 1).is_ok());
        assert!(matches!(
            verifier.verify_at(&link.token, 1_000 + 30 * 60),
            Err(AuthError::InvalidLink)
        ));
        Ok(())
    }

    #[test]
    fn tampered_payload_is_invalid() -> Result<()> {
        let verifier = verifier();
        let link = verifier.issue("siti@example.com", CALLBACK)?;
        let (_, signature) = link.token.split_once('.').context("token shape")?;

        let forged = LinkClaims {
            email: "admin@example.com".to_string(),
            nonce: "x".to_string(),
            exp: i64::MAX,
        };
        let forged = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&forged)?);
        assert!(matches!(
            verifier.verify(&format!("{forged}.{signature}")),
            Err(AuthError::InvalidLink)
        ));
        Ok(())
    }

    #[test]
    fn tampered_signature_is_invalid() -> Result<()> {
        let verifier = verifier();
        let link = verifier.issue("siti@example.com", CALLBACK)?;
        let mut token = link.token.clone();
        let last = token.pop().context("empty token")?;
        token.push(if last == 'A' { 'B' } else { 'A' });
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidLink)));
        Ok(())
    }

    #[test]
    fn other_secret_rejects_link() -> Result<()> {
        let link = verifier().issue("siti@example.com", CALLBACK)?;
        let other = MagicLinkVerifier::new(
            SecretString::from("a-different-secret-value"),
            Duration::from_secs(30 * 60),
        );
        assert!(matches!(other.verify(&link.token), Err(AuthError::InvalidLink)));
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let verifier = verifier();
        for token in ["", "no-dot", "a.b", "!!.??", "."] {
            assert!(
                matches!(verifier.verify(token), Err(AuthError::InvalidLink)),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn invalid_callback_url_fails_issue() {
        assert!(verifier().issue("siti@example.com", "not a url").is_err());
    }
}
