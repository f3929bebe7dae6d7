//! Client and endpoint configuration.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Maximum number of queued requests folded into one publish call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Lifetime given to JWT claims that carry no `exp` of their own.
pub const DEFAULT_JWT_TTL: Duration = Duration::from_secs(3600);

/// Per-client delivery configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total request timeout for one publish call.
    pub timeout: Duration,
    /// Connect timeout for one publish call.
    pub connect_timeout: Duration,
    /// Maximum queued requests drained into one batch.
    pub batch_size: usize,
    /// Expiry applied to JWT claims without `exp`.
    pub jwt_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            batch_size: DEFAULT_BATCH_SIZE,
            jwt_ttl: DEFAULT_JWT_TTL,
        }
    }
}

impl ClientConfig {
    /// Build a config from defaults, overridden by environment variables.
    ///
    /// Recognized variables:
    /// - `PUBCONTROL_TIMEOUT_SECS`
    /// - `PUBCONTROL_CONNECT_TIMEOUT_SECS`
    /// - `PUBCONTROL_BATCH_SIZE`
    /// - `PUBCONTROL_JWT_TTL_SECS`
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = env_u64("PUBCONTROL_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let connect_timeout = env_u64("PUBCONTROL_CONNECT_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        let batch_size = env_u64("PUBCONTROL_BATCH_SIZE")
            .map(|n| n as usize)
            .filter(|n| *n > 0)
            .unwrap_or(defaults.batch_size);

        let jwt_ttl = env_u64("PUBCONTROL_JWT_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.jwt_ttl);

        Self {
            timeout,
            connect_timeout,
            batch_size,
            jwt_ttl,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// One publish endpoint as described in configuration.
///
/// Presence of `iss` selects JWT auth seeded with `{"iss": iss}`; otherwise
/// the endpoint is used without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Base URI of the publish endpoint.
    pub uri: String,
    /// JWT issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// JWT signing key.
    #[serde(default, deserialize_with = "deserialize_key")]
    pub key: Option<Vec<u8>>,
}

impl EndpointConfig {
    /// An endpoint without credentials.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            iss: None,
            key: None,
        }
    }

    /// An endpoint authenticated with a JWT issuer and signing key.
    pub fn with_jwt(uri: impl Into<String>, iss: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            uri: uri.into(),
            iss: Some(iss.into()),
            key: Some(key.into()),
        }
    }
}

fn deserialize_key<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let key: Option<String> = Option::deserialize(deserializer)?;
    Ok(key.map(String::into_bytes))
}

/// A single endpoint entry or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PubControlConfig {
    Single(EndpointConfig),
    Many(Vec<EndpointConfig>),
}

impl PubControlConfig {
    /// Flatten into the list of endpoint entries, preserving order.
    pub fn into_entries(self) -> Vec<EndpointConfig> {
        match self {
            PubControlConfig::Single(entry) => vec![entry],
            PubControlConfig::Many(entries) => entries,
        }
    }
}

impl From<EndpointConfig> for PubControlConfig {
    fn from(entry: EndpointConfig) -> Self {
        PubControlConfig::Single(entry)
    }
}

impl From<Vec<EndpointConfig>> for PubControlConfig {
    fn from(entries: Vec<EndpointConfig>) -> Self {
        PubControlConfig::Many(entries)
    }
}

/// One GRIP proxy entry.
///
/// Only entries with a `control_uri` describe a publish endpoint; the rest
/// are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GripEndpointConfig {
    /// Base URI of the proxy's control endpoint.
    #[serde(default)]
    pub control_uri: Option<String>,
    /// JWT issuer for the control endpoint.
    #[serde(default)]
    pub control_iss: Option<String>,
    /// JWT signing key.
    #[serde(default, deserialize_with = "deserialize_key")]
    pub key: Option<Vec<u8>>,
}

impl GripEndpointConfig {
    /// The publish endpoint this entry describes, if any.
    pub fn to_endpoint(&self) -> Option<EndpointConfig> {
        let uri = self.control_uri.clone()?;
        Some(EndpointConfig {
            uri,
            iss: self.control_iss.clone(),
            key: self.key.clone(),
        })
    }
}

/// A single GRIP entry or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GripConfig {
    Single(GripEndpointConfig),
    Many(Vec<GripEndpointConfig>),
}

impl GripConfig {
    /// Endpoint entries for every GRIP entry carrying a `control_uri`, in order.
    pub fn into_endpoints(self) -> Vec<EndpointConfig> {
        let entries = match self {
            GripConfig::Single(entry) => vec![entry],
            GripConfig::Many(entries) => entries,
        };
        entries.iter().filter_map(GripEndpointConfig::to_endpoint).collect()
    }
}

impl From<GripEndpointConfig> for GripConfig {
    fn from(entry: GripEndpointConfig) -> Self {
        GripConfig::Single(entry)
    }
}

impl From<Vec<GripEndpointConfig>> for GripConfig {
    fn from(entries: Vec<GripEndpointConfig>) -> Self {
        GripConfig::Many(entries)
    }
}
