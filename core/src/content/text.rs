//! Plaintext codec.

use crate::content::ContentCodec;
use crate::error::{Result, ServientError};
use crate::types::{DataSchema, DataType};
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Codec for `text/plain` payloads.
///
/// The wire format is a bare string, so decoding is schema-directed: the target
/// type decides whether the text is parsed as a boolean, integer, number or
/// kept as a string. Honors the `charset` parameter for UTF-8 and US-ASCII.
pub struct TextCodec;

impl TextCodec {
    fn decode_text(body: &Bytes, params: &BTreeMap<String, String>) -> Result<String> {
        let charset = params
            .get("charset")
            .map(String::as_str)
            .unwrap_or("utf-8")
            .to_ascii_lowercase();

        match charset.as_str() {
            "utf-8" | "utf8" => std::str::from_utf8(body)
                .map(str::to_string)
                .map_err(|e| ServientError::Codec(format!("invalid UTF-8 text: {e}"))),
            "us-ascii" | "ascii" => {
                if body.is_ascii() {
                    // ASCII is a UTF-8 subset; the check above makes this infallible
                    Ok(String::from_utf8_lossy(body).into_owned())
                } else {
                    Err(ServientError::Codec("non-ASCII byte in us-ascii text".into()))
                }
            }
            other => Err(ServientError::Codec(format!("unsupported charset: {other}"))),
        }
    }
}

impl ContentCodec for TextCodec {
    fn media_types(&self) -> &[&'static str] {
        &["text/plain"]
    }

    fn bytes_to_value(
        &self,
        body: &Bytes,
        schema: &DataSchema,
        params: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let text = Self::decode_text(body, params)?;

        match schema.data_type {
            Some(DataType::Boolean) => text
                .trim()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| ServientError::Codec(format!("not a boolean: {text:?}"))),
            Some(DataType::Integer) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| ServientError::Codec(format!("not an integer: {text:?}"))),
            Some(DataType::Number) => {
                let parsed = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ServientError::Codec(format!("not a number: {text:?}")))?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| ServientError::Codec(format!("non-finite number: {text:?}")))
            }
            Some(DataType::Null) => Ok(Value::Null),
            Some(DataType::String) | None => Ok(Value::String(text)),
            Some(other) => Err(ServientError::Codec(format!(
                "plaintext cannot represent {other}"
            ))),
        }
    }

    fn value_to_bytes(&self, value: &Value, _params: &BTreeMap<String, String>) -> Result<Bytes> {
        let text = match value {
            // strings go on the wire bare, without JSON quoting
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(Bytes::from(text))
    }
}
