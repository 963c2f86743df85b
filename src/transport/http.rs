//! Request/reply over HTTP: one `POST {base}/api/request` per exchange.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{ChatError, ChatResult};
use crate::transport::RequestTransport;

/// Stateless HTTP transport. Exchanges may run concurrently.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a client for `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str, timeout: Duration) -> ChatResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/request", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn exchange(&self, request: Vec<u8>) -> ChatResult<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ChatError::Transport(format!(
                "server returned status {}",
                status
            )));
        }

        let body = response.bytes().await?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "http reply");
        Ok(body.to_vec())
    }
}
