// HTTP endpoint shared by the resource invokers

use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tenantq_core::port::InvocationError;
use tracing::debug;

/// Base URL plus a client with a request deadline
#[derive(Clone)]
pub struct HttpEndpoint {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InvocationError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|e| InvocationError::NotConfigured(format!("invalid url {base_url}: {e}")))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(InvocationError::NotConfigured(format!(
                "not an http(s) base url: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvocationError::Transport(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    /// `base_url` joined with `path`
    pub fn url(&self, path: &str) -> Result<Url, InvocationError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|e| InvocationError::NotConfigured(format!("invalid target url {joined}: {e}")))
    }

    /// POST a text body; any non-2xx status is a rejection
    pub async fn post(&self, url: Url, body: &str) -> Result<(), InvocationError> {
        debug!(url = %url, "Posting invocation");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(rejected(status, body))
    }

    fn map_error(&self, err: reqwest::Error) -> InvocationError {
        if err.is_timeout() {
            InvocationError::Timeout(self.timeout.as_millis() as u64)
        } else {
            InvocationError::Transport(err.to_string())
        }
    }
}

fn rejected(status: StatusCode, body: String) -> InvocationError {
    InvocationError::Rejected {
        status: status.as_u16(),
        body,
    }
}
