//! Conversion between typed entities and wire messages.

use crate::error::SerializationError;
use crate::message::WireMessage;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

#[cfg(test)]
#[path = "serialization_tests.rs"]
mod tests;

/// Content type written by [`JsonSerializationProvider`]
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Converts typed entities to and from transport-neutral wire messages.
///
/// Implementations hold no per-message state; every call produces a fresh
/// [`WireMessage`].
pub trait SerializationProvider: Send + Sync + 'static {
    /// Serialize an entity into a new wire message
    fn serialize<T: Serialize>(&self, entity: &T) -> Result<WireMessage, SerializationError>;

    /// Deserialize an entity from a delivered wire message
    fn deserialize<T: DeserializeOwned>(
        &self,
        message: &WireMessage,
    ) -> Result<T, SerializationError>;
}

/// JSON serialization provider backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializationProvider;

impl JsonSerializationProvider {
    /// Create new JSON serialization provider
    pub fn new() -> Self {
        Self
    }
}

impl SerializationProvider for JsonSerializationProvider {
    fn serialize<T: Serialize>(&self, entity: &T) -> Result<WireMessage, SerializationError> {
        let body = serde_json::to_vec(entity)?;
        Ok(WireMessage::new(Bytes::from(body)).with_content_type(JSON_CONTENT_TYPE))
    }

    fn deserialize<T: DeserializeOwned>(
        &self,
        message: &WireMessage,
    ) -> Result<T, SerializationError> {
        if let Some(content_type) = message.content_type.as_deref() {
            if content_type != JSON_CONTENT_TYPE {
                return Err(SerializationError::UnsupportedContentType {
                    content_type: content_type.to_string(),
                    expected: JSON_CONTENT_TYPE.to_string(),
                });
            }
        }

        if message.body.is_empty() {
            return Err(SerializationError::EmptyBody);
        }

        Ok(serde_json::from_slice(&message.body)?)
    }
}
