//! Client for a single publish endpoint.

use crate::auth::AuthState;
use crate::callback::PublishCallback;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{ClientConfig, EndpointConfig};
use crate::item::{Channels, Item};
use crate::jwt::Claims;
use crate::queue::{PublishRequest, QueueEntry, RequestQueue};
use crate::transport::{HttpTransport, SharedTransport};
use crate::worker::{self, AtomicWorkerState, WorkerState};
use crate::{PubControlError, PubControlResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ClientInner {
    base_uri: String,
    /// Credential lock. Also serializes worker start against shutdown.
    auth: Mutex<AuthState>,
    queue: Arc<RequestQueue>,
    state: AtomicWorkerState,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: tokio::sync::Mutex<()>,
    transport: SharedTransport,
    clock: SharedClock,
    config: ClientConfig,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Let a detached worker finish what is queued and exit.
        if self.state.load() == WorkerState::Running {
            self.queue.push(QueueEntry::Stop);
        }
    }
}

/// Publishes items to one endpoint, synchronously or through a background
/// worker that batches queued requests.
///
/// Cloning is cheap; clones share the queue, credentials and worker.
#[derive(Clone)]
pub struct PubControlClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for PubControlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubControlClient")
            .field("uri", &self.inner.base_uri)
            .field("state", &self.inner.state.load())
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}

/// Builder for [`PubControlClient`].
pub struct ClientBuilder {
    uri: String,
    config: ClientConfig,
    transport: Option<SharedTransport>,
    clock: Option<SharedClock>,
}

impl ClientBuilder {
    /// Delivery settings; defaults to [`ClientConfig::default`].
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom transport instead of HTTP.
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Time source for JWT expiry; defaults to the system clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client. Creates an HTTP transport unless one was supplied.
    pub fn build(self) -> PubControlResult<PubControlClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(PubControlClient {
            inner: Arc::new(ClientInner {
                base_uri: self.uri,
                auth: Mutex::new(AuthState::default()),
                queue: Arc::new(RequestQueue::new()),
                state: AtomicWorkerState::new(),
                worker: Mutex::new(None),
                shutdown: tokio::sync::Mutex::new(()),
                transport,
                clock,
                config: self.config,
            }),
        })
    }
}

impl PubControlClient {
    /// Create a client for `uri` using HTTP and the default configuration.
    pub fn new(uri: impl Into<String>) -> PubControlResult<Self> {
        Self::builder(uri).build()
    }

    /// Start configuring a client for `uri`.
    pub fn builder(uri: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            uri: uri.into(),
            config: ClientConfig::default(),
            transport: None,
            clock: None,
        }
    }

    /// Create a client from a configuration entry.
    ///
    /// An entry with `iss` is authenticated with JWT claims `{"iss": iss}`
    /// signed by `key` (empty when absent).
    pub fn from_endpoint_config(
        entry: &EndpointConfig,
        config: ClientConfig,
    ) -> PubControlResult<Self> {
        let client = Self::builder(entry.uri.clone()).config(config).build()?;
        client.apply_endpoint_auth(entry);
        Ok(client)
    }

    pub(crate) fn apply_endpoint_auth(&self, entry: &EndpointConfig) {
        if let Some(iss) = &entry.iss {
            let key = entry.key.clone().unwrap_or_default();
            self.set_auth_jwt(Claims::issuer(iss.clone()), key);
        }
    }

    /// Base URI of the endpoint.
    pub fn uri(&self) -> &str {
        &self.inner.base_uri
    }

    /// Current lifecycle state of the background worker.
    pub fn worker_state(&self) -> WorkerState {
        self.inner.state.load()
    }

    /// Requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Authenticate with HTTP basic credentials.
    pub fn set_auth_basic(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner.auth.lock().set_basic(username, password);
    }

    /// Authenticate with HS256 tokens signed from `claims` and `key`.
    ///
    /// Claims without `exp` are signed with an expiry of `jwt_ttl` from now.
    pub fn set_auth_jwt(&self, claims: Claims, key: impl Into<Vec<u8>>) {
        self.inner.auth.lock().set_jwt(claims, key);
    }

    /// Authenticate with a fixed bearer token.
    pub fn set_auth_bearer(&self, token: impl Into<String>) {
        self.inner.auth.lock().set_bearer(token);
    }

    fn auth_header(&self, auth: &AuthState) -> PubControlResult<Option<String>> {
        auth.header(self.inner.clock.as_ref(), self.inner.config.jwt_ttl)
    }

    /// Publish `item` to `channels` and wait for the endpoint's response.
    pub async fn publish(&self, channels: impl Into<Channels>, item: &Item) -> PubControlResult<()> {
        let channels = channels.into();
        let items = item.export_for_channels(&channels)?;

        let auth_header = {
            let auth = self.inner.auth.lock();
            if self.inner.state.load() == WorkerState::Stopped {
                return Err(PubControlError::Closed);
            }
            self.auth_header(&auth)?
        };

        self.inner
            .transport
            .publish(&self.inner.base_uri, auth_header.as_deref(), &items)
            .await
    }

    /// Queue `item` for background delivery to `channels`.
    ///
    /// Starts the worker on first use; this requires a tokio runtime. The
    /// callback, if any, receives the outcome of the batch the request was
    /// sent in.
    pub fn publish_async(
        &self,
        channels: impl Into<Channels>,
        item: &Item,
        callback: Option<PublishCallback>,
    ) -> PubControlResult<()> {
        let channels = channels.into();
        let items = item.export_for_channels(&channels)?;

        let auth = self.inner.auth.lock();
        if self.inner.state.load() == WorkerState::Stopped {
            return Err(PubControlError::Closed);
        }
        let auth_header = self.auth_header(&auth)?;
        self.ensure_worker()?;

        self.inner.queue.push(QueueEntry::Publish(PublishRequest {
            uri: self.inner.base_uri.clone(),
            auth_header,
            items,
            callback,
        }));
        drop(auth);

        Ok(())
    }

    /// Spawn the worker if it has not been started. Caller holds the credential lock.
    fn ensure_worker(&self) -> PubControlResult<()> {
        if self.inner.state.load() != WorkerState::NotStarted {
            return Ok(());
        }

        let handle = Handle::try_current()
            .map_err(|e| PubControlError::Runtime(format!("no tokio runtime for publish worker: {e}")))?;

        if self
            .inner
            .state
            .transition(WorkerState::NotStarted, WorkerState::Running)
        {
            let task = handle.spawn(worker::run(
                self.inner.base_uri.clone(),
                self.inner.queue.clone(),
                self.inner.transport.clone(),
                self.inner.config.batch_size,
            ));
            *self.inner.worker.lock() = Some(task);
            debug!(endpoint = %self.inner.base_uri, "Spawned publish worker");
        }

        Ok(())
    }

    /// Stop accepting publishes, deliver everything queued, and wait for the
    /// worker to exit.
    ///
    /// Returns immediately for a client that never published asynchronously.
    /// Repeated and concurrent calls are safe; later calls do nothing.
    pub async fn wait_all_sent(&self) {
        let _guard = self.inner.shutdown.lock().await;

        let task = {
            let _auth = self.inner.auth.lock();
            match self.inner.state.load() {
                WorkerState::Running => {
                    self.inner.state.store(WorkerState::Stopped);
                    self.inner.queue.push(QueueEntry::Stop);
                    self.inner.worker.lock().take()
                }
                WorkerState::NotStarted => {
                    self.inner.state.store(WorkerState::Stopped);
                    None
                }
                WorkerState::Stopped => None,
            }
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(endpoint = %self.inner.base_uri, error = %e, "Publish worker did not exit cleanly");
            }
            info!(endpoint = %self.inner.base_uri, "All queued publishes sent");
        }
    }

    /// Alias for [`wait_all_sent`](Self::wait_all_sent).
    pub async fn finish(&self) {
        self.wait_all_sent().await
    }

    /// Run `f` with this client, then shut it down.
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
