//! Publish-side client for HTTP pub/sub endpoints.
//!
//! This crate provides:
//! - PubControlClient: one endpoint, synchronous publish or batched background delivery
//! - PubControl: fan-out over several endpoints with a single combined callback
//! - CallbackJoin: N-of-N barrier folding endpoint results into one callback
//! - Item / Format: the payload model exported to `/publish/`
//! - AuthState: basic, JWT (HS256) and bearer credentials

mod auth;
mod callback;
mod client;
mod clock;
mod config;
mod error;
mod format;
mod item;
mod jwt;
mod pubcontrol;
mod queue;
mod transport;
mod worker;

#[cfg(test)]
mod tests;

pub use auth::AuthState;
pub use callback::{CallbackJoin, PublishCallback};
pub use client::{ClientBuilder, PubControlClient};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::{
    ClientConfig, EndpointConfig, GripConfig, GripEndpointConfig, PubControlConfig,
    DEFAULT_BATCH_SIZE, DEFAULT_JWT_TTL,
};
pub use error::{PubControlError, PubControlResult};
pub use format::Format;
pub use item::{Channels, Item};
pub use jwt::{sign as sign_jwt, Claims};
pub use pubcontrol::PubControl;
pub use transport::{publish_url, HttpTransport, PublishTransport, SharedTransport};
pub use worker::{BatchResult, WorkerState};
