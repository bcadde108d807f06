use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::graph::redact_response_body;

/// Bearer credential for the Graph API. Expiry is not managed; a token that
/// lapses mid-run surfaces as 401 responses.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.secret
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Exchange the configured client credentials for a bearer token.
///
/// A response without `access_token` yields an empty token rather than an
/// error: later requests are then rejected by the API and reported there.
pub async fn acquire_token(client: &Client, config: &Config) -> Result<AccessToken> {
    let token_url = config.token_url();
    let scope = config.scope();

    let response = client
        .post(&token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("scope", scope.as_str()),
        ])
        .send()
        .await
        .with_context(|| format!("request oauth token from {token_url}"))?;

    let status = response.status();
    let body = response.text().await.context("read oauth token response")?;
    debug!(
        "token response: status={} body={}",
        status,
        redact_token_body(&body)
    );

    let payload: OAuthTokenResponse =
        serde_json::from_str(&body).context("decode oauth token JSON response")?;

    match payload.access_token.filter(|token| !token.is_empty()) {
        Some(secret) => Ok(AccessToken {
            secret,
            expires_in: payload.expires_in,
        }),
        None => {
            warn!(
                "token endpoint returned no access_token (status={}); requests will be unauthorized",
                status
            );
            Ok(AccessToken::new(String::new()))
        }
    }
}

/// Token response body for logs, with `access_token` masked.
fn redact_token_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut fields)) => {
            if let Some(token) = fields.get_mut("access_token") {
                *token = Value::String("<redacted>".to_string());
            }
            redact_response_body(&Value::Object(fields).to_string())
        }
        Ok(_) => redact_response_body(body),
        Err(_) if body.contains("access_token") => "<unparseable body redacted>".to_string(),
        Err(_) => redact_response_body(body),
    }
}
