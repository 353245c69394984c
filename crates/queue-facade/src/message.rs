//! Wire message types and core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

const MAX_QUEUE_NAME_LEN: usize = 260;

/// Name of the queue a client is bound to.
///
/// ASCII letters, digits, `-` and `_` only. Hyphens must sit between other
/// characters and may not repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(name: String) -> Result<Self, ValidationError> {
        let field = || "queue_name".to_string();

        if !(1..=MAX_QUEUE_NAME_LEN).contains(&name.len()) {
            return Err(ValidationError::OutOfRange {
                field: field(),
                message: format!(
                    "length {} is outside 1-{}",
                    name.len(),
                    MAX_QUEUE_NAME_LEN
                ),
            });
        }

        if let Some(rejected) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
        {
            return Err(ValidationError::InvalidFormat {
                field: field(),
                message: format!("character '{}' is not allowed", rejected),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: field(),
                message: "hyphens must separate other characters".to_string(),
            });
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random identity stamped on each wire message when it is created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// UTC instant used for enqueue scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Timestamp offset from this one by `offset`
    pub fn add(&self, offset: Duration) -> Self {
        Self(self.0 + offset)
    }

    /// Time remaining until this timestamp, zero if it already passed
    pub fn time_until(&self) -> Duration {
        (self.0 - Utc::now()).max(Duration::zero())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Wire Message
// ============================================================================

/// Transport-neutral envelope produced by serialization.
///
/// A wire message is created fresh for every send and owned by the send call
/// until it is handed to the transport. Extensions may change any metadata,
/// but the message identity is fixed at construction.
#[derive(Debug, Clone)]
pub struct WireMessage {
    message_id: MessageId,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    pub properties: HashMap<String, String>,
    pub scheduled_enqueue_time: Option<Timestamp>,
}

impl WireMessage {
    /// Create new wire message with a fresh identity
    pub fn new(body: Bytes) -> Self {
        Self {
            message_id: MessageId::new(),
            body,
            content_type: None,
            correlation_id: None,
            properties: HashMap::new(),
            scheduled_enqueue_time: None,
        }
    }

    /// Identity of this message
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add a custom property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Request delivery no earlier than `time`
    pub fn with_scheduled_enqueue_time(mut self, time: Timestamp) -> Self {
        self.scheduled_enqueue_time = Some(time);
        self
    }

    /// Check whether the message must still be held back by the transport
    pub fn is_scheduled_for_future(&self) -> bool {
        self.scheduled_enqueue_time
            .map(|time| time > Timestamp::now())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
