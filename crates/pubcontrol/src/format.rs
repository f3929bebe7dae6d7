//! Publishing formats embedded in an [`Item`](crate::Item).

use serde_json::Value;

/// A named, serializable payload variant.
///
/// Implementations are supplied by callers; the publisher never looks inside
/// the exported value. Examples of names are `"json-object"` or
/// `"http-response"`.
pub trait Format: Send + Sync {
    /// Key under which this format's export appears in the item.
    fn name(&self) -> &str;

    /// Format-specific payload.
    fn export(&self) -> Value;
}
