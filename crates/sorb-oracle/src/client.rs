//! Oracle backed by an HTTP completion endpoint.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Oracle;

/// Request body.
#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
}

/// Response body. Either a flat `text` or a list of content blocks.
#[derive(serde::Deserialize)]
struct CompletionResponse {
    text: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(serde::Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl CompletionResponse {
    fn into_text(self) -> String {
        self.text.unwrap_or_else(|| {
            self.content
                .into_iter()
                .map(|block| block.text)
                .collect::<Vec<_>>()
                .join("")
        })
    }
}

/// HTTP oracle client.
pub struct HttpOracle {
    client: Client,
    endpoint: String,
    /// Key stored as `SecretString` for automatic zeroization on drop.
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpOracle {
    /// Default time limit per call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Create a client for `endpoint`, optionally authenticating with a
    /// bearer key.
    ///
    /// # Errors
    /// Returns error if the HTTP client can't be built.
    pub fn new(endpoint: impl Into<String>, api_key: Option<SecretString>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("sorb-cli"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Create a client reading the bearer key from environment variable `var`.
    ///
    /// An unset variable means no authentication.
    ///
    /// # Errors
    /// Returns error if the HTTP client can't be built.
    pub fn from_env(endpoint: impl Into<String>, var: &str) -> Result<Self> {
        let api_key = std::env::var(var).ok().map(SecretString::from);
        if api_key.is_none() {
            debug!(var, "no API key in environment, sending unauthenticated requests");
        }
        Self::new(endpoint, api_key)
    }

    /// Set the per-call time limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST the prompt and return the reply text.
    ///
    /// # Errors
    /// Returns error on network failure, timeout, or a non-success status.
    pub async fn send(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let body = CompletionRequest { model, prompt };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        debug!(endpoint = %self.endpoint, model, "sending oracle request");
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))??;

        let status = response.status();
        if status.is_success() {
            let body: CompletionResponse = response.json().await?;
            return Ok(body.into_text());
        }

        match status.as_u16() {
            401 | 403 => Err(Error::AuthenticationFailed),
            429 => Err(Error::RateLimited),
            code => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::ApiError {
                    status: code,
                    message: text,
                })
            }
        }
    }
}

impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        self.send(prompt, model).await
    }
}
