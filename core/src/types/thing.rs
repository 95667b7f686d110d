//! Thing Description model.
//!
//! A [`Thing`] is the static, serializable description of an entity: its
//! properties, actions and events with their schemas, metadata and Forms.
//! Runtime state lives in `ExposedThing`/`ConsumedThing`; this module is the
//! document both sides exchange.

use crate::types::{DataSchema, DataType, Form};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_context() -> String {
    "https://www.w3.org/2019/wot/td/v1".to_string()
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Description of a Thing: an addressable entity with properties, actions and
/// events, reachable through the Forms attached to each interaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thing {
    /// JSON-LD context of the description document.
    #[serde(rename = "@context", default = "default_context")]
    pub context: String,

    /// Globally unique identifier, e.g. `urn:uuid:...`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable title.
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Base URL that relative Form hrefs are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, ThingProperty>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub actions: HashMap<String, ThingAction>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub events: HashMap<String, ThingEvent>,

    /// Names of the security configurations in force, referencing
    /// `security_definitions`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<String>,

    #[serde(
        rename = "securityDefinitions",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub security_definitions: HashMap<String, SecurityScheme>,

    /// Thing-level Forms (e.g. read-all-properties endpoints).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,
}

impl Thing {
    /// Create a Thing description with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            context: default_context(),
            id: None,
            title: title.into(),
            description: None,
            base: None,
            properties: HashMap::new(),
            actions: HashMap::new(),
            events: HashMap::new(),
            security: Vec::new(),
            security_definitions: HashMap::new(),
            forms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: ThingProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    #[must_use]
    pub fn with_action(mut self, name: impl Into<String>, action: ThingAction) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    #[must_use]
    pub fn with_event(mut self, name: impl Into<String>, event: ThingEvent) -> Self {
        self.events.insert(name.into(), event);
        self
    }

    #[must_use]
    pub fn with_security(
        mut self,
        name: impl Into<String> + Clone,
        scheme: SecurityScheme,
    ) -> Self {
        self.security.push(name.clone().into());
        self.security_definitions.insert(name.into(), scheme);
        self
    }
}

/// Static description of a property: value schema plus access flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingProperty {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "readOnly", default, skip_serializing_if = "is_false")]
    pub read_only: bool,

    #[serde(rename = "writeOnly", default, skip_serializing_if = "is_false")]
    pub write_only: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub observable: bool,

    #[serde(
        rename = "uriVariables",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub uri_variables: HashMap<String, DataSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,
}

impl ThingProperty {
    /// Property of a given value type.
    #[must_use]
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    #[must_use]
    pub fn observable(mut self) -> Self {
        self.observable = true;
        self
    }

    /// Value schema derived from the declared type.
    #[must_use]
    pub fn schema(&self) -> DataSchema {
        DataSchema {
            data_type: self.data_type,
            ..DataSchema::default()
        }
    }
}

/// Static description of an action: input/output schemas.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<DataSchema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<DataSchema>,

    #[serde(
        rename = "uriVariables",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub uri_variables: HashMap<String, DataSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,
}

impl ThingAction {
    #[must_use]
    pub fn with_input(mut self, input: DataSchema) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: DataSchema) -> Self {
        self.output = Some(output);
        self
    }
}

/// Static description of an event: payload schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schema of the event payload, absent for payload-less events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,
}

impl ThingEvent {
    #[must_use]
    pub fn with_data(mut self, data: DataSchema) -> Self {
        self.data = Some(data);
        self
    }
}

/// Security configuration of a Thing, keyed by name in the description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum SecurityScheme {
    /// No security.
    Nosec,
    /// HTTP basic authentication.
    Basic {
        #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    /// Bearer token.
    Bearer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}
