//! Tests for the JSON serialization provider.

use super::*;
use serde::Deserialize;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: u64,
    customer: String,
}

#[test]
fn test_serialize_sets_json_content_type() {
    let provider = JsonSerializationProvider::new();
    let message = provider
        .serialize(&OrderPlaced {
            order_id: 7,
            customer: "ada".to_string(),
        })
        .unwrap();

    assert_eq!(message.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
    assert_eq!(&message.body[..], br#"{"order_id":7,"customer":"ada"}"#);
    assert!(message.scheduled_enqueue_time.is_none());
}

#[test]
fn test_deserialize_restores_entity() {
    let provider = JsonSerializationProvider::new();
    let entity = OrderPlaced {
        order_id: 42,
        customer: "grace".to_string(),
    };

    let message = provider.serialize(&entity).unwrap();
    let restored: OrderPlaced = provider.deserialize(&message).unwrap();

    assert_eq!(restored, entity);
}

#[test]
fn test_deserialize_accepts_missing_content_type() {
    let provider = JsonSerializationProvider::new();
    let message = WireMessage::new("17".into());

    let value: u32 = provider.deserialize(&message).unwrap();
    assert_eq!(value, 17);
}

#[test]
fn test_deserialize_rejects_foreign_content_type() {
    let provider = JsonSerializationProvider::new();
    let message = WireMessage::new("17".into()).with_content_type("application/xml");

    let result = provider.deserialize::<u32>(&message);
    assert!(matches!(
        result,
        Err(SerializationError::UnsupportedContentType { .. })
    ));
}

#[test]
fn test_deserialize_rejects_empty_body() {
    let provider = JsonSerializationProvider::new();
    let message = WireMessage::new(Bytes::new()).with_content_type(JSON_CONTENT_TYPE);

    assert!(matches!(
        provider.deserialize::<u32>(&message),
        Err(SerializationError::EmptyBody)
    ));
}

#[test]
fn test_deserialize_reports_malformed_json() {
    let provider = JsonSerializationProvider::new();
    let message = WireMessage::new("{not json".into());

    assert!(matches!(
        provider.deserialize::<OrderPlaced>(&message),
        Err(SerializationError::Json { .. })
    ));
}
