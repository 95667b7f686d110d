//! Typed payload envelope and pluggable content codecs.
//!
//! Every binding boundary in the servient exchanges [`Content`]: a media-type-tagged
//! byte payload. The [`CodecRegistry`] maps Content to and from language-level
//! values (`serde_json::Value`) via codecs keyed by media type, with a binary
//! fallback so conversion never fails purely because a media type is unknown.

mod codec;
mod json;
mod link_format;
mod octet;
mod text;

pub use codec::{CodecRegistry, ContentCodec};
pub use json::JsonCodec;
pub use link_format::LinkFormatCodec;
pub use octet::OctetCodec;
pub use text::TextCodec;

use bytes::Bytes;
use std::collections::BTreeMap;

/// Media type used when a Form or binding does not specify one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Media type of serialized Thing Descriptions.
pub const TD_MEDIA_TYPE: &str = "application/td+json";

/// Media-type-tagged byte payload, the universal transport envelope.
///
/// Immutable; two Contents are equal when both media type and body match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Content {
    /// Media type of the body, possibly carrying `; param=value` pairs.
    pub media_type: String,
    /// Raw payload bytes.
    pub body: Bytes,
}

impl Content {
    /// Create a Content from a media type and body bytes.
    pub fn new(media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            body: body.into(),
        }
    }

    /// Create an empty-bodied Content, e.g. a write acknowledgement or an
    /// event notification without payload.
    pub fn empty(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            body: Bytes::new(),
        }
    }

    /// Body length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Split a media type into its essence (`type/subtype`) and parameters.
///
/// `"text/plain; charset=utf-8"` becomes `("text/plain", {charset: "utf-8"})`.
/// The essence and parameter names are lowercased; quoted parameter values are
/// unquoted.
pub(crate) fn split_media_type(media_type: &str) -> (String, BTreeMap<String, String>) {
    let mut parts = media_type.split(';');
    let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();

    let mut params = BTreeMap::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, value) = match part.split_once('=') {
            Some((n, v)) => (n, v),
            None => (part, ""),
        };
        let value = value.trim().trim_matches('"');
        params.insert(name.trim().to_ascii_lowercase(), value.to_string());
    }

    (essence, params)
}
