//! Collaborator interfaces for provisioning queues and moving wire messages.
//!
//! The facade never talks to a broker directly. A [`NamespaceManager`]
//! ensures the destination queue exists and hands out a [`QueueTransport`],
//! which the facade uses for every send and for its single receive
//! subscription.

use crate::error::QueueError;
use crate::message::WireMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivery handler attached to a transport's receive mechanism
pub type MessageHandler = Arc<dyn Fn(WireMessage) + Send + Sync>;

/// Provisions a queue and creates clients for it
#[async_trait]
pub trait NamespaceManager: Send + Sync + 'static {
    /// Transport handle produced by this manager
    type Client: QueueTransport;

    /// Ensure the queue exists. Must be idempotent.
    async fn provision_queue(&self) -> Result<(), QueueError>;

    /// Create a ready-to-use transport handle for the provisioned queue
    fn create_queue_client(&self) -> Result<Self::Client, QueueError>;
}

/// Transport handle for a single queue
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Attach the delivery handler. A transport accepts exactly one handler
    /// for its lifetime.
    fn on_message(&self, handler: MessageHandler) -> Result<(), QueueError>;

    /// Send a message, honouring its scheduled enqueue time
    async fn send(&self, message: WireMessage) -> Result<(), QueueError>;

    /// Release the underlying connection
    async fn close(&self) -> Result<(), QueueError>;
}
