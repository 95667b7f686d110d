//! JSON codec.

use crate::content::ContentCodec;
use crate::error::{Result, ServientError};
use crate::types::{DataSchema, DataType};
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Codec for `application/json` payloads.
///
/// JSON is self-describing, so the schema only cross-checks the parsed value's
/// shape when the schema pins a type; an unspecified schema accepts any JSON.
pub struct JsonCodec;

impl ContentCodec for JsonCodec {
    fn media_types(&self) -> &[&'static str] {
        &["application/json", "application/td+json"]
    }

    fn bytes_to_value(
        &self,
        body: &Bytes,
        schema: &DataSchema,
        _params: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let value: Value = serde_json::from_slice(body)?;
        if let Some(expected) = schema.data_type {
            let matches = match expected {
                DataType::Boolean => value.is_boolean(),
                DataType::Integer => value.is_i64() || value.is_u64(),
                DataType::Number => value.is_number(),
                DataType::String => value.is_string(),
                DataType::Object => value.is_object(),
                DataType::Array => value.is_array(),
                DataType::Null => value.is_null(),
            };
            if !matches {
                return Err(ServientError::Codec(format!(
                    "expected {expected} but parsed {value}"
                )));
            }
        }
        Ok(value)
    }

    fn value_to_bytes(&self, value: &Value, _params: &BTreeMap<String, String>) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(value: Value, schema: DataSchema) -> Value {
        let codec = JsonCodec;
        let params = BTreeMap::new();
        let bytes = codec.value_to_bytes(&value, &params).unwrap();
        codec.bytes_to_value(&bytes, &schema, &params).unwrap()
    }

    #[test]
    fn test_object_round_trip() {
        let value = json!({"foo": "bar"});
        assert_eq!(round_trip(value.clone(), DataSchema::default()), value);
    }

    #[test]
    fn test_all_json_shapes_round_trip() {
        for value in [
            json!(true),
            json!(1337),
            json!(13.37),
            json!("hello"),
            json!([1, 2, 3]),
            json!(null),
        ] {
            assert_eq!(round_trip(value.clone(), DataSchema::default()), value);
        }
    }

    #[test]
    fn test_schema_directed_type_check() {
        let codec = JsonCodec;
        let params = BTreeMap::new();
        let bytes = Bytes::from_static(b"\"not a number\"");
        let err = codec
            .bytes_to_value(&bytes, &DataSchema::of(DataType::Integer), &params)
            .unwrap_err();
        assert!(matches!(err, ServientError::Codec(_)));
    }

    #[test]
    fn test_malformed_json_fails() {
        let codec = JsonCodec;
        let params = BTreeMap::new();
        let err = codec
            .bytes_to_value(
                &Bytes::from_static(b"{\"foo\":"),
                &DataSchema::default(),
                &params,
            )
            .unwrap_err();
        assert!(matches!(err, ServientError::Codec(_)));
    }
}
