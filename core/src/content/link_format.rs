//! CoRE link-format codec.

use crate::content::ContentCodec;
use crate::error::{Result, ServientError};
use crate::types::DataSchema;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Codec for `application/link-format` payloads (RFC 6690 subset).
///
/// Parses `key;attr="v";attr2="v2",key2;...` into a mapping of key to attribute
/// map and serializes the inverse with the key before its attributes. Valueless
/// attributes decode as boolean `true`.
pub struct LinkFormatCodec;

impl LinkFormatCodec {
    /// Split on a separator, but not inside double quotes.
    fn split_unquoted(input: &str, separator: char) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        for ch in input.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                c if c == separator && !in_quotes => {
                    parts.push(std::mem::take(&mut current));
                }
                c => current.push(c),
            }
        }
        parts.push(current);
        parts
    }

    fn parse_entry(entry: &str) -> Result<(String, Value)> {
        let mut segments = Self::split_unquoted(entry, ';').into_iter();
        let key = segments
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if key.is_empty() {
            return Err(ServientError::Codec("link-format entry without key".into()));
        }

        let mut attributes = Map::new();
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches('"');
                    attributes.insert(name.trim().to_string(), Value::String(value.to_string()));
                }
                None => {
                    attributes.insert(segment.to_string(), Value::Bool(true));
                }
            }
        }

        Ok((key, Value::Object(attributes)))
    }

    fn serialize_entry(key: &str, attributes: &Value, out: &mut String) -> Result<()> {
        out.push_str(key);
        let attributes = attributes.as_object().ok_or_else(|| {
            ServientError::Codec(format!("link-format attributes for {key} must be an object"))
        })?;
        for (name, value) in attributes {
            out.push(';');
            out.push_str(name);
            match value {
                Value::Bool(true) => {}
                Value::String(s) => {
                    out.push('=');
                    out.push('"');
                    out.push_str(s);
                    out.push('"');
                }
                other => {
                    out.push('=');
                    out.push('"');
                    out.push_str(&other.to_string());
                    out.push('"');
                }
            }
        }
        Ok(())
    }
}

impl ContentCodec for LinkFormatCodec {
    fn media_types(&self) -> &[&'static str] {
        &["application/link-format"]
    }

    fn bytes_to_value(
        &self,
        body: &Bytes,
        _schema: &DataSchema,
        _params: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let text = std::str::from_utf8(body)
            .map_err(|e| ServientError::Codec(format!("invalid UTF-8 link-format: {e}")))?;

        let mut entries = Map::new();
        for entry in Self::split_unquoted(text, ',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, attributes) = Self::parse_entry(entry)?;
            entries.insert(key, attributes);
        }
        Ok(Value::Object(entries))
    }

    fn value_to_bytes(&self, value: &Value, _params: &BTreeMap<String, String>) -> Result<Bytes> {
        let entries = value
            .as_object()
            .ok_or_else(|| ServientError::Codec("link-format value must be an object".into()))?;

        let mut out = String::new();
        for (index, (key, attributes)) in entries.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            Self::serialize_entry(key, attributes, &mut out)?;
        }
        Ok(Bytes::from(out))
    }
}
