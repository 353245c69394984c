//! Pre-send message extensions and the pipeline that applies them.
//!
//! Extensions are part of the trusted send-time configuration of a client.
//! They run in registration order on every outbound [`WireMessage`] and an
//! extension error aborts the send.

use crate::error::QueueError;
use crate::message::WireMessage;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
#[path = "extension_tests.rs"]
mod tests;

/// Mutates outbound wire messages before they are sent.
pub trait MessageExtension<T>: Send + Sync {
    /// Name used in logs and [`QueueError::ExtensionFailed`]
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Apply the extension to `message`, which was serialized from `entity`
    fn extend(&self, message: &mut WireMessage, entity: &T) -> Result<(), QueueError>;
}

/// Ordered collection of extensions applied to every outbound message
pub struct ExtensionPipeline<T> {
    extensions: Vec<Arc<dyn MessageExtension<T>>>,
}

impl<T> ExtensionPipeline<T> {
    /// Create pipeline preserving the order of `extensions`
    pub fn new(extensions: Vec<Arc<dyn MessageExtension<T>>>) -> Self {
        Self { extensions }
    }

    /// Create pipeline with no extensions
    pub fn empty() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }

    /// Number of configured extensions
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Check if the pipeline has no extensions
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Apply every extension in registration order, stopping at the first error
    pub fn apply(&self, message: &mut WireMessage, entity: &T) -> Result<(), QueueError> {
        for extension in &self.extensions {
            extension.extend(message, entity)?;
            tracing::trace!(
                extension = extension.name(),
                message_id = %message.message_id(),
                "Applied message extension"
            );
        }
        Ok(())
    }
}

impl<T> Default for ExtensionPipeline<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> FromIterator<Arc<dyn MessageExtension<T>>> for ExtensionPipeline<T> {
    fn from_iter<I: IntoIterator<Item = Arc<dyn MessageExtension<T>>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================================
// Built-in Extensions
// ============================================================================

/// Adds a fixed set of custom properties to every message
#[derive(Debug, Clone, Default)]
pub struct StaticPropertiesExtension {
    properties: HashMap<String, String>,
}

impl StaticPropertiesExtension {
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    /// Add a property to the set written on every message
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl<T> MessageExtension<T> for StaticPropertiesExtension {
    fn name(&self) -> &str {
        "static-properties"
    }

    fn extend(&self, message: &mut WireMessage, _entity: &T) -> Result<(), QueueError> {
        for (key, value) in &self.properties {
            message.properties.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Assigns a random correlation ID to messages that do not carry one
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationIdExtension;

impl<T> MessageExtension<T> for CorrelationIdExtension {
    fn name(&self) -> &str {
        "correlation-id"
    }

    fn extend(&self, message: &mut WireMessage, _entity: &T) -> Result<(), QueueError> {
        if message.correlation_id.is_none() {
            message.correlation_id = Some(uuid::Uuid::new_v4().to_string());
        }
        Ok(())
    }
}

/// Overrides the content type chosen by the serializer
#[derive(Debug, Clone)]
pub struct ContentTypeExtension {
    content_type: String,
}

impl ContentTypeExtension {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
        }
    }
}

impl<T> MessageExtension<T> for ContentTypeExtension {
    fn name(&self) -> &str {
        "content-type"
    }

    fn extend(&self, message: &mut WireMessage, _entity: &T) -> Result<(), QueueError> {
        message.content_type = Some(self.content_type.clone());
        Ok(())
    }
}

/// Adapts a closure into a [`MessageExtension`]
pub struct FnExtension<F> {
    name: String,
    func: F,
}

impl<F> FnExtension<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<T, F> MessageExtension<T> for FnExtension<F>
where
    F: Fn(&mut WireMessage, &T) -> Result<(), QueueError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extend(&self, message: &mut WireMessage, entity: &T) -> Result<(), QueueError> {
        (self.func)(message, entity)
    }
}
