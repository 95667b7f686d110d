//! Codec contract and the registry mapping media types to codecs.

use crate::content::{split_media_type, Content, JsonCodec, LinkFormatCodec, OctetCodec, TextCodec};
use crate::error::Result;
use crate::types::DataSchema;
use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A (de)serializer for one or more media types.
///
/// Codecs translate between raw payload bytes and `serde_json::Value`, directed
/// by the target [`DataSchema`] where the wire format is not self-describing.
pub trait ContentCodec: Send + Sync {
    /// Media type essences this codec handles, e.g. `["application/json"]`.
    fn media_types(&self) -> &[&'static str];

    /// Parse payload bytes into a value under the given schema.
    ///
    /// Fails with a codec error when the bytes do not parse under the requested
    /// schema (e.g. invalid UTF-8 or malformed JSON).
    fn bytes_to_value(
        &self,
        body: &Bytes,
        schema: &DataSchema,
        params: &BTreeMap<String, String>,
    ) -> Result<Value>;

    /// Serialize a value into payload bytes.
    fn value_to_bytes(&self, value: &Value, params: &BTreeMap<String, String>) -> Result<Bytes>;
}

/// Registry of content codecs keyed by media type essence.
///
/// The registry is an explicit object passed by reference to the components
/// that need it; there is no process-wide singleton. Mutation (register and
/// unregister) is guarded by a single lock, and a completed unregister is
/// visible to subsequent lookups.
///
/// An unknown media type falls back to a fixed binary codec, so
/// [`value_to_content`](CodecRegistry::value_to_content) and
/// [`content_to_value`](CodecRegistry::content_to_value) never fail purely due
/// to an unknown media type, only due to malformed bytes.
pub struct CodecRegistry {
    codecs: RwLock<HashMap<String, Arc<dyn ContentCodec>>>,
    fallback: Arc<dyn ContentCodec>,
}

impl CodecRegistry {
    /// Create an empty registry with only the binary fallback installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: RwLock::new(HashMap::new()),
            fallback: Arc::new(OctetCodec),
        }
    }

    /// Register a codec for every media type it declares.
    ///
    /// A later registration for the same media type replaces the earlier one.
    pub fn register(&self, codec: Arc<dyn ContentCodec>) {
        let mut codecs = self.codecs.write();
        for media_type in codec.media_types() {
            codecs.insert((*media_type).to_string(), codec.clone());
        }
    }

    /// Remove the codec registered for a media type, if any.
    pub fn unregister(&self, media_type: &str) {
        let (essence, _) = split_media_type(media_type);
        self.codecs.write().remove(&essence);
    }

    /// Whether a codec (other than the fallback) is registered for this media
    /// type. Parameters are ignored for the lookup.
    #[must_use]
    pub fn is_supported(&self, media_type: &str) -> bool {
        let (essence, _) = split_media_type(media_type);
        self.codecs.read().contains_key(&essence)
    }

    /// Serialize a value into a [`Content`] tagged with `media_type`.
    pub fn value_to_content(&self, value: &Value, media_type: &str) -> Result<Content> {
        let (essence, params) = split_media_type(media_type);
        let codec = self.lookup(&essence);
        let body = codec.value_to_bytes(value, &params)?;
        Ok(Content::new(media_type, body))
    }

    /// Parse a [`Content`] into a value under the given schema.
    pub fn content_to_value(&self, content: &Content, schema: &DataSchema) -> Result<Value> {
        let (essence, params) = split_media_type(&content.media_type);
        let codec = self.lookup(&essence);
        codec.bytes_to_value(&content.body, schema, &params)
    }

    fn lookup(&self, essence: &str) -> Arc<dyn ContentCodec> {
        self.codecs
            .read()
            .get(essence)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for CodecRegistry {
    /// Registry with the built-in codecs installed: JSON, plaintext and
    /// CoRE link-format, plus the explicit octet-stream entry.
    fn default() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(TextCodec));
        registry.register(Arc::new(LinkFormatCodec));
        registry.register(Arc::new(OctetCodec));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_registry_supports_builtins() {
        let registry = CodecRegistry::default();
        assert!(registry.is_supported("application/json"));
        assert!(registry.is_supported("text/plain"));
        assert!(registry.is_supported("application/link-format"));
        assert!(registry.is_supported("application/octet-stream"));
        assert!(!registry.is_supported("none/none"));
    }

    #[test]
    fn test_lookup_ignores_parameters() {
        let registry = CodecRegistry::default();
        assert!(registry.is_supported("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_unregister_visible_to_lookups() {
        let registry = CodecRegistry::default();
        registry.unregister("application/json");
        assert!(!registry.is_supported("application/json"));
    }

    #[test]
    fn test_unknown_media_type_uses_fallback() {
        let registry = CodecRegistry::default();
        let content = registry.value_to_content(&json!(42), "none/none").unwrap();
        assert_eq!(content.media_type, "none/none");

        let value = registry
            .content_to_value(&content, &DataSchema::default())
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_json_round_trip_through_registry() {
        let registry = CodecRegistry::default();
        let value = json!({"foo": "bar"});
        let content = registry
            .value_to_content(&value, "application/json")
            .unwrap();
        let back = registry
            .content_to_value(&content, &DataSchema::default())
            .unwrap();
        assert_eq!(back, value);
    }
}
