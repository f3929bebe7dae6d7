//! Fan-out publisher over several endpoint clients.

use crate::callback::{CallbackJoin, PublishCallback};
use crate::client::PubControlClient;
use crate::config::{ClientConfig, GripConfig, PubControlConfig};
use crate::item::{Channels, Item};
use crate::{PubControlError, PubControlResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Publishes every item to each of an ordered set of endpoints.
#[derive(Debug, Default)]
pub struct PubControl {
    clients: Vec<PubControlClient>,
    client_config: ClientConfig,
    closed: AtomicBool,
}

impl PubControl {
    /// An orchestrator with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// An orchestrator whose configured clients use `config`.
    pub fn with_client_config(config: ClientConfig) -> Self {
        Self {
            client_config: config,
            ..Self::default()
        }
    }

    /// Create an orchestrator with one client per configuration entry.
    pub fn from_config(config: impl Into<PubControlConfig>) -> PubControlResult<Self> {
        let mut pub_control = Self::new();
        pub_control.apply_config(config)?;
        Ok(pub_control)
    }

    /// Append one client per configuration entry.
    pub fn apply_config(&mut self, config: impl Into<PubControlConfig>) -> PubControlResult<()> {
        for entry in config.into().into_entries() {
            let client = PubControlClient::from_endpoint_config(&entry, self.client_config.clone())?;
            debug!(endpoint = %entry.uri, jwt = entry.iss.is_some(), "Configured endpoint");
            self.clients.push(client);
        }
        Ok(())
    }

    /// Append one client per GRIP entry that has a `control_uri`.
    ///
    /// `control_iss` selects JWT auth the same way `iss` does in
    /// [`apply_config`](Self::apply_config).
    pub fn apply_grip_config(&mut self, config: impl Into<GripConfig>) -> PubControlResult<()> {
        let endpoints = config.into().into_endpoints();
        self.apply_config(endpoints)
    }

    /// Append an already configured client.
    pub fn add_client(&mut self, client: PubControlClient) {
        self.clients.push(client);
    }

    /// Forget every client. Their queues are not drained.
    pub fn remove_all_clients(&mut self) {
        self.clients.clear();
    }

    /// Clients in publish order.
    pub fn clients(&self) -> &[PubControlClient] {
        &self.clients
    }

    /// Whether [`wait_all_sent`](Self::wait_all_sent) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> PubControlResult<()> {
        if self.is_closed() {
            return Err(PubControlError::Closed);
        }
        Ok(())
    }

    /// Publish to each endpoint in order, stopping at the first failure.
    ///
    /// Endpoints already published to are not rolled back.
    pub async fn publish(&self, channels: impl Into<Channels>, item: &Item) -> PubControlResult<()> {
        self.ensure_open()?;
        let channels = channels.into();

        for client in &self.clients {
            client.publish(channels.clone(), item).await?;
        }
        Ok(())
    }

    /// Queue `item` on every endpoint.
    ///
    /// A malformed item is rejected before anything is queued. With a
    /// callback, it runs once after every endpoint has reported, with the
    /// first failure seen (if any). Endpoints that refuse the request count as
    /// failures.
    pub fn publish_async(
        &self,
        channels: impl Into<Channels>,
        item: &Item,
        callback: Option<PublishCallback>,
    ) -> PubControlResult<()> {
        self.ensure_open()?;
        item.export()?;
        let channels = channels.into();

        let Some(callback) = callback else {
            for client in &self.clients {
                if let Err(e) = client.publish_async(channels.clone(), item, None) {
                    warn!(endpoint = %client.uri(), error = %e, "Failed to queue publish");
                }
            }
            return Ok(());
        };

        if self.clients.is_empty() {
            callback(true, String::new());
            return Ok(());
        }

        let join = CallbackJoin::new(self.clients.len(), callback);
        for client in &self.clients {
            if let Err(e) = client.publish_async(channels.clone(), item, Some(join.handler())) {
                debug!(endpoint = %client.uri(), error = %e, "Failed to queue publish");
                join.report(false, e.to_string());
            }
        }
        Ok(())
    }

    /// Close the orchestrator and drain every client in order.
    pub async fn wait_all_sent(&self) {
        self.closed.store(true, Ordering::Release);
        for client in &self.clients {
            client.wait_all_sent().await;
        }
        info!(clients = self.clients.len(), "Publisher closed");
    }

    /// Alias for [`wait_all_sent`](Self::wait_all_sent).
    pub async fn finish(&self) {
        self.wait_all_sent().await
    }

    /// Run `f` with this orchestrator, then shut it down.
    pub async fn scoped<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = T>,
    {
        let out = f(self).await;
        self.wait_all_sent().await;
        out
    }
}
