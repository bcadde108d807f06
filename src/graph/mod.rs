use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::AccessToken;
use crate::config::Config;

const REDACTED_BODY_MAX_LEN: usize = 200;
/// Only the sender is needed downstream; keeps pages small.
pub const MESSAGE_SELECT_FIELDS: &str = "sender";

/// One page of a Graph collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Fetched(Page),
    /// The server answered with something other than 200 OK.
    Rejected(StatusCode),
}

/// Source of collection pages, addressed by absolute URL.
#[async_trait]
pub trait PageSource {
    async fn fetch_page(&self, url: &str) -> Result<PageOutcome>;
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    client: Client,
    config: Config,
    token: AccessToken,
}

impl GraphClient {
    pub fn new(client: Client, config: Config, token: AccessToken) -> Self {
        Self {
            client,
            config,
            token,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// First page URL for the configured mailbox folder.
    pub fn messages_url(&self, top: usize) -> Result<String> {
        messages_url(&self.config, top)
    }

    pub async fn get_status_and_body(&self, url: &str) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.as_str())
            .header("accept", "application/json")
            .send()
            .await
            .with_context(|| format!("request graph page {url}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("read graph response body")?;
        debug!(
            "graph response: status={} body={}",
            status,
            redact_response_body(&body)
        );
        Ok((status, body))
    }
}

#[async_trait]
impl PageSource for GraphClient {
    async fn fetch_page(&self, url: &str) -> Result<PageOutcome> {
        let (status, body) = self.get_status_and_body(url).await?;
        if status != StatusCode::OK {
            return Ok(PageOutcome::Rejected(status));
        }

        let page: Page = serde_json::from_str(&body).context("decode graph page JSON")?;
        Ok(PageOutcome::Fetched(page))
    }
}

pub fn messages_url(config: &Config, top: usize) -> Result<String> {
    let endpoint = config.messages_endpoint();
    let mut url = Url::parse(&endpoint).with_context(|| format!("parse graph URL {endpoint}"))?;
    url.query_pairs_mut()
        .append_pair("$top", &top.to_string())
        .append_pair("$select", MESSAGE_SELECT_FIELDS);
    Ok(url.to_string())
}

/// Build the shared HTTP client. No timeout unless one is requested.
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("build HTTP client")
}

pub fn redact_response_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= REDACTED_BODY_MAX_LEN {
        return trimmed.to_string();
    }

    let mut cut = REDACTED_BODY_MAX_LEN;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…[truncated {} bytes]", &trimmed[..cut], trimmed.len())
}
