//! # JSON Mapping
//!
//! Request bodies and responses use the canonical proto3 JSON mapping, as implemented by
//! `prost-reflect`'s serde support: lowerCamelCase field names on output (both spellings
//! accepted on input), 64-bit integers as strings, bytes as base64 and enums by name.
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use serde::ser::Error as _;

/// Generic key/value data produced from a response message.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Builds the input message for a request body.
///
/// An empty body yields an empty message. Unknown fields in the body are rejected.
pub fn decode_body(
    descriptor: MessageDescriptor,
    body: &[u8],
) -> Result<DynamicMessage, serde_json::Error> {
    if body.is_empty() {
        return Ok(DynamicMessage::new(descriptor));
    }

    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let message = DynamicMessage::deserialize(descriptor, &mut deserializer)?;
    deserializer.end()?;

    Ok(message)
}

/// Converts a message to its JSON object form.
pub fn to_json_object(message: &DynamicMessage) -> Result<JsonObject, serde_json::Error> {
    match serde_json::to_value(message)? {
        serde_json::Value::Object(object) => Ok(object),
        other => Err(serde_json::Error::custom(format!(
            "message '{}' does not map to a JSON object but to '{other}'",
            message.descriptor().full_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{params::ParameterBag, populate::populate};
    use prost_reflect::Value;
    use serde_json::json;

    fn request_descriptor() -> MessageDescriptor {
        greeter_service::descriptor_pool()
            .get_message_by_name("pkg.HelloRequest")
            .unwrap()
    }

    #[test]
    fn empty_body_is_an_empty_message() {
        let message = decode_body(request_descriptor(), b"").unwrap();
        assert_eq!(to_json_object(&message).unwrap(), JsonObject::new());
    }

    #[test]
    fn decodes_both_field_name_spellings() {
        let body = br#"{"name": "world", "displayName": "W", "address": {"city": "Girona"}}"#;
        let message = decode_body(request_descriptor(), body).unwrap();

        assert_eq!(
            message.get_field_by_name("display_name").unwrap().as_str(),
            Some("W")
        );

        let body = br#"{"display_name": "W"}"#;
        let message = decode_body(request_descriptor(), body).unwrap();
        assert_eq!(
            message.get_field_by_name("display_name").unwrap().as_str(),
            Some("W")
        );
    }

    #[test]
    fn rejects_invalid_bodies() {
        for body in [
            &b"not json"[..],
            br#"{"ghost": 1}"#,
            br#"{"count": "many"}"#,
            br#"{"name": "a"} trailing"#,
            br#"[]"#,
        ] {
            assert!(
                decode_body(request_descriptor(), body).is_err(),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn parameters_overlay_the_body() {
        let body = br#"{"name": "from-body", "count": 3, "numbers": [1]}"#;
        let mut message = decode_body(request_descriptor(), body).unwrap();

        let params: ParameterBag = [
            ("name", vec!["from-params".to_string()]),
            ("numbers", vec!["2".to_string()]),
        ]
        .into_iter()
        .collect();
        populate(&mut message, &params).unwrap();

        let object = to_json_object(&message).unwrap();
        assert_eq!(object["name"], "from-params");
        assert_eq!(object["count"], 3);
        assert_eq!(object["numbers"], json!([1, 2]));
    }

    #[test]
    fn encodes_canonical_json() {
        let mut message = DynamicMessage::new(request_descriptor());
        message.set_field_by_name("display_name", Value::String("W".to_string()));
        message.set_field_by_name("big", Value::I64(1 << 40));
        message.set_field_by_name("mood", Value::EnumNumber(1));
        message.set_field_by_name("payload", Value::Bytes("hi".into()));

        let object = to_json_object(&message).unwrap();

        assert_eq!(
            serde_json::Value::Object(object),
            json!({
                "displayName": "W",
                "big": "1099511627776",
                "mood": "HAPPY",
                "payload": "aGk=",
            })
        );
    }

    #[test]
    fn scalars_survive_a_json_round_trip() {
        let mut message = DynamicMessage::new(request_descriptor());
        message.set_field_by_name("name", Value::String("round".to_string()));
        message.set_field_by_name("count", Value::I32(-7));
        message.set_field_by_name("huge", Value::U64(u64::MAX));
        message.set_field_by_name("loud", Value::Bool(true));
        message.set_field_by_name("ratio", Value::F32(0.25));
        message.set_field_by_name("score", Value::F64(-1.5));
        message.set_field_by_name("payload", Value::Bytes(vec![0, 159, 255].into()));
        message.set_field_by_name("mood", Value::EnumNumber(2));

        let object = to_json_object(&message).unwrap();
        let body = serde_json::to_vec(&object).unwrap();
        let decoded = decode_body(request_descriptor(), &body).unwrap();

        // The request type is recursive, so compare the JSON forms rather than the messages.
        assert_eq!(to_json_object(&decoded).unwrap(), object);
        assert_eq!(
            decoded.get_field_by_name("huge").unwrap().as_u64(),
            Some(u64::MAX)
        );
        assert_eq!(
            decoded.get_field_by_name("payload").unwrap().as_bytes().map(|b| b.to_vec()),
            Some(vec![0, 159, 255])
        );
    }
}
