//! # Queue Facade
//!
//! Provider-agnostic, strongly typed client for sending entities to a message
//! queue and fanning received entities out to registered callbacks.
//!
//! This library provides:
//! - Lazily created, single-flight queue connections
//! - One delivery subscription shared by any number of callbacks
//! - An ordered extension pipeline applied to every outbound message
//! - Scheduled delivery relative to the time of sending
//! - An in-memory provider for tests and local development
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all facade operations
//! - [`message`] - Wire message and identifier types
//! - [`serialization`] - Entity to wire message conversion
//! - [`extension`] - Outbound message extensions
//! - [`transport`] - Provider seams: namespace manager and queue transport
//! - [`connection`] - Lazy, memoized connection creation
//! - [`callbacks`] - Callback registry with failure isolation
//! - [`client`] - The typed queue client
//! - [`config`] - Layered configuration
//! - [`providers`] - Concrete provider implementations

pub mod callbacks;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod extension;
pub mod message;
pub mod providers;
pub mod serialization;
pub mod transport;

#[cfg(test)]
mod test_doubles;

// Re-export commonly used types at crate root for convenience
pub use callbacks::{Callback, CallbackRegistry, DeliveryReport};
pub use client::{QueueClient, SubscriptionHandle};
pub use config::{FacadeConfig, LoggingConfig};
pub use connection::LazyConnection;
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use extension::{
    ContentTypeExtension, CorrelationIdExtension, ExtensionPipeline, FnExtension,
    MessageExtension, StaticPropertiesExtension,
};
pub use message::{MessageId, QueueName, Timestamp, WireMessage};
pub use serialization::{JsonSerializationProvider, SerializationProvider, JSON_CONTENT_TYPE};
pub use transport::{MessageHandler, NamespaceManager, QueueTransport};
