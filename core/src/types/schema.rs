//! Data schemas directing codec work.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The JSON-compatible type vocabulary for interaction data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
    Null,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Object => "object",
            DataType::Array => "array",
            DataType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Static schema of a property value, action input/output or event payload.
///
/// An unspecified type means "any"; self-describing codecs accept whatever
/// parses, and schema-directed codecs fall back to strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    /// Value type, when constrained.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Unit of measurement, e.g. `"celsius"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DataSchema {
    /// Schema constrained to one type.
    #[must_use]
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::default()
        }
    }
}
