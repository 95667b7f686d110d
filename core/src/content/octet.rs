//! Binary fallback codec.

use crate::content::ContentCodec;
use crate::error::{Result, ServientError};
use crate::types::DataSchema;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fallback codec for `application/octet-stream` and any unregistered media type.
///
/// Values are carried as their JSON byte encoding, which round-trips every
/// representable value regardless of the declared media type. Decoding foreign
/// bytes that are not JSON degrades to a UTF-8 string; only non-UTF-8 garbage
/// fails.
pub struct OctetCodec;

impl ContentCodec for OctetCodec {
    fn media_types(&self) -> &[&'static str] {
        &["application/octet-stream"]
    }

    fn bytes_to_value(
        &self,
        body: &Bytes,
        _schema: &DataSchema,
        _params: &BTreeMap<String, String>,
    ) -> Result<Value> {
        if body.is_empty() {
            return Ok(Value::Null);
        }
        if let Ok(value) = serde_json::from_slice(body) {
            return Ok(value);
        }
        std::str::from_utf8(body)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| ServientError::Codec(format!("opaque payload is not decodable: {e}")))
    }

    fn value_to_bytes(&self, value: &Value, _params: &BTreeMap<String, String>) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitive_round_trip() {
        let codec = OctetCodec;
        let params = BTreeMap::new();
        for value in [json!(42), json!("opaque"), json!(true), json!([1, 2])] {
            let bytes = codec.value_to_bytes(&value, &params).unwrap();
            let back = codec
                .bytes_to_value(&bytes, &DataSchema::default(), &params)
                .unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_foreign_text_decodes_as_string() {
        let codec = OctetCodec;
        let value = codec
            .bytes_to_value(
                &Bytes::from_static(b"not json at all"),
                &DataSchema::default(),
                &BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(value, json!("not json at all"));
    }

    #[test]
    fn test_empty_body_is_null() {
        let codec = OctetCodec;
        let value = codec
            .bytes_to_value(&Bytes::new(), &DataSchema::default(), &BTreeMap::new())
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_non_utf8_fails() {
        let codec = OctetCodec;
        let err = codec
            .bytes_to_value(
                &Bytes::from_static(&[0xff, 0x00, 0xfe]),
                &DataSchema::default(),
                &BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ServientError::Codec(_)));
    }
}
