//! HTTP transport for publish calls.

use crate::config::ClientConfig;
use crate::{PubControlError, PubControlResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Request body for one publish call.
#[derive(Debug, Serialize)]
struct PublishRequestBody<'a> {
    items: &'a [Value],
}

/// Sends one batch of exported items to an endpoint.
///
/// One call is one physical request; implementations do not retry.
#[async_trait]
pub trait PublishTransport: Send + Sync {
    async fn publish(
        &self,
        base_uri: &str,
        auth_header: Option<&str>,
        items: &[Value],
    ) -> PubControlResult<()>;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn PublishTransport>;

/// Build the publish URL for a base URI.
pub fn publish_url(base_uri: &str) -> String {
    if base_uri.ends_with('/') {
        format!("{base_uri}publish/")
    } else {
        format!("{base_uri}/publish/")
    }
}

/// reqwest-backed transport.
///
/// Redirects are not followed: only a 2xx response counts as a successful
/// publish.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the timeouts from `config`.
    pub fn new(config: &ClientConfig) -> PubControlResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PublishTransport for HttpTransport {
    async fn publish(
        &self,
        base_uri: &str,
        auth_header: Option<&str>,
        items: &[Value],
    ) -> PubControlResult<()> {
        let url = publish_url(base_uri);
        let body = serde_json::to_vec(&PublishRequestBody { items })?;

        debug!(url = %url, items = items.len(), "Sending publish request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(auth) = auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PubControlError::Publish {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %url, status = status.as_u16(), "Publish accepted");
        Ok(())
    }
}
