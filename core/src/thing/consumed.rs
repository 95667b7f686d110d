//! Client-side proxy view of a remote Thing.
//!
//! A [`ConsumedThing`] pairs a Thing Description with the protocol clients the
//! consumer has instantiated. Each interaction resolves to a
//! `(ProtocolClient, Form)` pair by intersecting the Thing's advertised Forms
//! with the supported schemes, preferring the first compatible Form; beyond
//! that binding choice the proxy is stateless.

use crate::content::{CodecRegistry, DEFAULT_MEDIA_TYPE};
use crate::error::{Result, ServientError};
use crate::protocol::ProtocolClient;
use crate::types::{DataSchema, Form, Operation, Thing};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use url::Url;

/// Push sequence of decoded values produced by an observation.
pub type ValueStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Client-side view of a remote Thing.
pub struct ConsumedThing {
    thing: Thing,
    clients: HashMap<String, Arc<dyn ProtocolClient>>,
    codecs: Arc<CodecRegistry>,
}

impl ConsumedThing {
    /// Wrap a description with the consumer's clients (keyed by URI scheme)
    /// and codec registry.
    pub fn new(
        thing: Thing,
        clients: HashMap<String, Arc<dyn ProtocolClient>>,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            thing,
            clients,
            codecs,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.thing.id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.thing.title
    }

    /// The underlying description.
    pub fn thing(&self) -> &Thing {
        &self.thing
    }

    /// Resolve an href against the Thing's base URL. Absolute hrefs pass
    /// through unchanged.
    fn resolve_href(&self, href: &str) -> Result<String> {
        match Url::parse(href) {
            Ok(url) => Ok(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.thing.base.as_deref().ok_or_else(|| {
                    ServientError::InvalidHref(format!("relative href {href} without a base"))
                })?;
                Ok(Url::parse(base)?.join(href)?.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pick the first advertised Form whose scheme matches an instantiated
    /// client and which allows the operation.
    fn resolve(
        &self,
        forms: &[Form],
        op: Operation,
        target: &str,
    ) -> Result<(Arc<dyn ProtocolClient>, Form)> {
        for form in forms {
            if !form.supports(op) {
                continue;
            }
            let href = match self.resolve_href(&form.href) {
                Ok(href) => href,
                Err(_) => continue,
            };
            let resolved = form.clone().with_href(href);
            if let Some(scheme) = resolved.scheme() {
                if let Some(client) = self.clients.get(&scheme) {
                    return Ok((client.clone(), resolved));
                }
            }
        }
        Err(ServientError::NoBinding(target.to_string()))
    }

    fn media_type_of(form: &Form) -> &str {
        form.content_type.as_deref().unwrap_or(DEFAULT_MEDIA_TYPE)
    }

    /// Read a property and decode it against its schema.
    pub async fn read_property(&self, name: &str) -> Result<Value> {
        let property = self
            .thing
            .properties
            .get(name)
            .ok_or_else(|| ServientError::NotFound(format!("property {name}")))?;
        let (client, form) = self.resolve(&property.forms, Operation::ReadProperty, name)?;
        let content = client.read(&form).await?;
        self.codecs.content_to_value(&content, &property.schema())
    }

    /// Encode a value per the resolved Form and write it to a property.
    pub async fn write_property(&self, name: &str, value: &Value) -> Result<()> {
        let property = self
            .thing
            .properties
            .get(name)
            .ok_or_else(|| ServientError::NotFound(format!("property {name}")))?;
        let (client, form) = self.resolve(&property.forms, Operation::WriteProperty, name)?;
        let content = self
            .codecs
            .value_to_content(value, Self::media_type_of(&form))?;
        client.write(&form, content).await?;
        Ok(())
    }

    /// Invoke an action with an optional input, decoding any output.
    pub async fn invoke_action(&self, name: &str, input: Option<&Value>) -> Result<Option<Value>> {
        let action = self
            .thing
            .actions
            .get(name)
            .ok_or_else(|| ServientError::NotFound(format!("action {name}")))?;
        let (client, form) = self.resolve(&action.forms, Operation::InvokeAction, name)?;

        let request = match input {
            Some(value) => Some(
                self.codecs
                    .value_to_content(value, Self::media_type_of(&form))?,
            ),
            None => None,
        };
        let response = client.invoke(&form, request).await?;
        if response.is_empty() {
            return Ok(None);
        }
        let schema = action.output.clone().unwrap_or_default();
        Ok(Some(self.codecs.content_to_value(&response, &schema)?))
    }

    /// Read every property advertised through a thing-level read-all Form.
    pub async fn read_all_properties(&self) -> Result<serde_json::Map<String, Value>> {
        let (client, form) =
            self.resolve(&self.thing.forms, Operation::ReadAllProperties, "all properties")?;
        let content = client.read(&form).await?;
        let value = self
            .codecs
            .content_to_value(&content, &DataSchema::default())?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(ServientError::Codec(format!(
                "read-all-properties returned {other}"
            ))),
        }
    }

    /// Observe a property, decoding each notification lazily.
    pub fn observe_property(&self, name: &str) -> Result<ValueStream> {
        let property = self
            .thing
            .properties
            .get(name)
            .ok_or_else(|| ServientError::NotFound(format!("property {name}")))?;
        let (client, form) = self.resolve(&property.forms, Operation::ObserveProperty, name)?;
        let stream = client.observe(&form)?;
        Ok(self.decode_stream(stream, property.schema()))
    }

    /// Subscribe to an event, decoding each emission lazily.
    pub fn subscribe_event(&self, name: &str) -> Result<ValueStream> {
        let event = self
            .thing
            .events
            .get(name)
            .ok_or_else(|| ServientError::NotFound(format!("event {name}")))?;
        let (client, form) = self.resolve(&event.forms, Operation::SubscribeEvent, name)?;
        let stream = client.observe(&form)?;
        let schema = event.data.clone().unwrap_or_default();
        Ok(self.decode_stream(stream, schema))
    }

    fn decode_stream(
        &self,
        stream: crate::protocol::ContentStream,
        schema: DataSchema,
    ) -> ValueStream {
        let codecs = self.codecs.clone();
        Box::pin(stream.map(move |item| {
            item.and_then(|content| {
                // payload-less notifications decode to null
                if content.is_empty() {
                    Ok(Value::Null)
                } else {
                    codecs.content_to_value(&content, &schema)
                }
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use crate::types::{DataType, ThingProperty};
    use async_trait::async_trait;
    use serde_json::json;

    /// Client that serves reads from a fixed payload and records nothing.
    struct FixedClient {
        payload: &'static str,
    }

    #[async_trait]
    impl ProtocolClient for FixedClient {
        async fn read(&self, _form: &Form) -> Result<Content> {
            Ok(Content::new(
                "application/json",
                self.payload.as_bytes().to_vec(),
            ))
        }
    }

    fn consumed(thing: Thing, scheme: &str, payload: &'static str) -> ConsumedThing {
        let mut clients: HashMap<String, Arc<dyn ProtocolClient>> = HashMap::new();
        clients.insert(scheme.to_string(), Arc::new(FixedClient { payload }));
        ConsumedThing::new(thing, clients, Arc::new(CodecRegistry::default()))
    }

    #[tokio::test]
    async fn test_read_resolves_first_matching_scheme() {
        let thing = Thing::new("T").with_property(
            "temp",
            ThingProperty {
                data_type: Some(DataType::Integer),
                forms: vec![
                    Form::new("coap://other/temp").with_op(Operation::ReadProperty),
                    Form::new("fixed://dev/temp").with_op(Operation::ReadProperty),
                ],
                ..ThingProperty::default()
            },
        );
        let consumed = consumed(thing, "fixed", "23");
        assert_eq!(consumed.read_property("temp").await.unwrap(), json!(23));
    }

    #[tokio::test]
    async fn test_no_matching_binding() {
        let thing = Thing::new("T").with_property(
            "temp",
            ThingProperty {
                forms: vec![Form::new("coap://other/temp")],
                ..ThingProperty::default()
            },
        );
        let consumed = consumed(thing, "fixed", "23");
        let err = consumed.read_property("temp").await.unwrap_err();
        assert!(matches!(err, ServientError::NoBinding(_)));
    }

    #[tokio::test]
    async fn test_form_operation_filter() {
        // the only Form is write-only, so a read resolves nothing
        let thing = Thing::new("T").with_property(
            "temp",
            ThingProperty {
                forms: vec![Form::new("fixed://dev/temp").with_op(Operation::WriteProperty)],
                ..ThingProperty::default()
            },
        );
        let consumed = consumed(thing, "fixed", "23");
        assert!(consumed.read_property("temp").await.is_err());
    }

    #[tokio::test]
    async fn test_relative_href_resolved_against_base() {
        let thing = Thing::new("T")
            .with_base("fixed://device.local/things/t/")
            .with_property(
                "temp",
                ThingProperty {
                    forms: vec![Form::new("props/temp").with_op(Operation::ReadProperty)],
                    ..ThingProperty::default()
                },
            );
        let consumed = consumed(thing, "fixed", "5");
        assert_eq!(consumed.read_property("temp").await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn test_unknown_property() {
        let consumed = consumed(Thing::new("T"), "fixed", "1");
        let err = consumed.read_property("nope").await.unwrap_err();
        assert!(matches!(err, ServientError::NotFound(_)));
    }

    #[test]
    fn test_observe_unsupported_fails_synchronously() {
        let thing = Thing::new("T").with_property(
            "temp",
            ThingProperty {
                observable: true,
                forms: vec![Form::new("fixed://dev/temp")],
                ..ThingProperty::default()
            },
        );
        let consumed = consumed(thing, "fixed", "1");
        // FixedClient keeps the default observe, which is NotImplemented
        let err = consumed.observe_property("temp").err().unwrap();
        assert!(matches!(err, ServientError::NotImplemented(_)));
    }
}
