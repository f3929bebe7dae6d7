//! Items and channel targets.

use crate::format::Format;
use crate::{PubControlError, PubControlResult};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A publishable unit: one or more formats plus optional `id` / `prev-id`.
///
/// No two formats in the same item may report the same name; [`Item::export`]
/// fails fast instead of letting one silently overwrite the other.
#[derive(Clone)]
pub struct Item {
    formats: Vec<Arc<dyn Format>>,
    id: Option<String>,
    prev_id: Option<String>,
}

impl Item {
    /// Create an item holding a single format.
    pub fn new(format: impl Format + 'static) -> Self {
        Self::from_formats(vec![Arc::new(format) as Arc<dyn Format>])
    }

    /// Create an item from a list of formats, kept in the given order.
    pub fn from_formats(formats: Vec<Arc<dyn Format>>) -> Self {
        Self {
            formats,
            id: None,
            prev_id: None,
        }
    }

    /// Set the item ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the previous item ID.
    pub fn with_prev_id(mut self, prev_id: impl Into<String>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn prev_id(&self) -> Option<&str> {
        self.prev_id.as_deref()
    }

    pub fn formats(&self) -> &[Arc<dyn Format>] {
        &self.formats
    }

    /// Serialize the item into the object sent to the endpoint.
    ///
    /// Keys appear in this order: `id`, `prev-id`, then one key per format in
    /// declaration order. Absent IDs are omitted entirely.
    pub fn export(&self) -> PubControlResult<Map<String, Value>> {
        let mut seen = HashSet::with_capacity(self.formats.len());
        for format in &self.formats {
            if !seen.insert(format.name()) {
                return Err(PubControlError::Config(format!(
                    "more than one instance of format '{}' specified",
                    format.name()
                )));
            }
        }

        let mut out = Map::new();
        if let Some(id) = &self.id {
            out.insert("id".to_string(), Value::String(id.clone()));
        }
        if let Some(prev_id) = &self.prev_id {
            out.insert("prev-id".to_string(), Value::String(prev_id.clone()));
        }
        for format in &self.formats {
            out.insert(format.name().to_string(), format.export());
        }
        Ok(out)
    }

    /// Export once per channel, merging `"channel"` into each copy.
    pub(crate) fn export_for_channels(&self, channels: &Channels) -> PubControlResult<Vec<Value>> {
        let base = self.export()?;
        Ok(channels
            .iter()
            .map(|channel| {
                let mut export = base.clone();
                export.insert("channel".to_string(), Value::String(channel.to_string()));
                Value::Object(export)
            })
            .collect())
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.formats.iter().map(|format| format.name()).collect();
        f.debug_struct("Item")
            .field("formats", &names)
            .field("id", &self.id)
            .field("prev_id", &self.prev_id)
            .finish()
    }
}

/// One channel or a list of channels to publish to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels(Vec<String>);

impl Channels {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Channels {
    fn from(channel: &str) -> Self {
        Channels(vec![channel.to_string()])
    }
}

impl From<String> for Channels {
    fn from(channel: String) -> Self {
        Channels(vec![channel])
    }
}

impl From<Vec<String>> for Channels {
    fn from(channels: Vec<String>) -> Self {
        Channels(channels)
    }
}

impl From<Vec<&str>> for Channels {
    fn from(channels: Vec<&str>) -> Self {
        Channels(channels.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Channels {
    fn from(channels: &[&str]) -> Self {
        Channels(channels.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Channels {
    fn from(channels: [&str; N]) -> Self {
        Channels(channels.iter().map(|c| c.to_string()).collect())
    }
}
