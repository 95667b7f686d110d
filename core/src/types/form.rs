//! Endpoint descriptors binding Thing interactions to protocols.
//!
//! A [`Form`] tells a consumer where and how an interaction can be reached:
//! an href whose URI scheme selects the binding, the allowed operations, the
//! content type of the payload, and an open-ended extension map for
//! protocol-specific metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// The closed set of interaction operations a Form can advertise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    ReadProperty,
    WriteProperty,
    ObserveProperty,
    UnobserveProperty,
    ReadAllProperties,
    ReadMultipleProperties,
    SubscribeEvent,
    UnsubscribeEvent,
    InvokeAction,
}

/// Endpoint metadata attached to a property, action or event.
///
/// A single interaction may carry multiple Forms, one per exposing binding.
/// Forms are plain data; the builder-style `with_*` methods produce modified
/// copies, which bindings use to rewrite their own hrefs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Endpoint URI. The scheme selects the binding; for the mesh binding the
    /// fragment encodes the target interaction kind and name.
    pub href: String,

    /// Operations this endpoint accepts. An empty list means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub op: Vec<Operation>,

    /// Media type of request/response payloads.
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,

    /// Sub-protocol hint, e.g. `"longpoll"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,

    /// Protocol-specific extension fields, carried verbatim.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Form {
    /// Create a Form for an href with no operations or metadata.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            op: Vec::new(),
            content_type: None,
            subprotocol: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Copy with a rewritten href.
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = href.into();
        self
    }

    /// Copy with one more allowed operation.
    #[must_use]
    pub fn with_op(mut self, op: Operation) -> Self {
        self.op.push(op);
        self
    }

    /// Copy with a set of allowed operations appended.
    #[must_use]
    pub fn with_ops(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.op.extend(ops);
        self
    }

    /// Copy with a content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Copy with a subprotocol hint.
    #[must_use]
    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = Some(subprotocol.into());
        self
    }

    /// Copy with an extension field set.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// The URI scheme of the href, used by consumers to pick a binding.
    ///
    /// Any `{uriVariable}` template suffix is stripped before parsing, so
    /// `"coap://host/{id}/value"` still yields `"coap"`. Returns `None` for
    /// relative or unparseable hrefs.
    #[must_use]
    pub fn scheme(&self) -> Option<String> {
        let end = self.href.find('{').unwrap_or(self.href.len());
        Url::parse(&self.href[..end])
            .ok()
            .map(|url| url.scheme().to_string())
    }

    /// Whether this Form accepts an operation. An empty operation list is
    /// unrestricted and accepts everything.
    #[must_use]
    pub fn supports(&self, op: Operation) -> bool {
        self.op.is_empty() || self.op.contains(&op)
    }
}
