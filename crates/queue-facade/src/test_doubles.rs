//! Hand-written collaborators shared by the unit tests.

use crate::error::QueueError;
use crate::message::WireMessage;
use crate::transport::{MessageHandler, NamespaceManager, QueueTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport that records sends, attachments and closes
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<WireMessage>>,
    pub handler: Mutex<Option<MessageHandler>>,
    pub attach_calls: AtomicU32,
    pub close_calls: AtomicU32,
    pub fail_sends: AtomicBool,
    pub fail_attach: AtomicBool,
}

impl RecordingTransport {
    pub fn sent_messages(&self) -> Vec<WireMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Push a message through the attached handler as the broker would
    pub fn deliver(&self, message: WireMessage) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    fn on_message(&self, handler: MessageHandler) -> Result<(), QueueError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(QueueError::SubscriptionFailed {
                message: "receiver link refused".to_string(),
            });
        }
        let mut slot = self.handler.lock().unwrap();
        if slot.is_some() {
            return Err(QueueError::HandlerAlreadyAttached {
                queue_name: "recording".to_string(),
            });
        }
        *slot = Some(handler);
        Ok(())
    }

    async fn send(&self, message: WireMessage) -> Result<(), QueueError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailed {
                message: "link detached".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Namespace manager that counts calls and hands out shared transports
pub struct CountingNamespaceManager {
    pub provision_calls: AtomicU32,
    pub create_calls: AtomicU32,
    pub fail_provisioning: bool,
    pub provision_delay: Duration,
    pub transport: Arc<RecordingTransport>,
    pub call_order: Mutex<Vec<&'static str>>,
}

impl CountingNamespaceManager {
    pub fn new() -> Self {
        Self {
            provision_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            fail_provisioning: false,
            provision_delay: Duration::ZERO,
            transport: Arc::new(RecordingTransport::default()),
            call_order: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_provisioning: true,
            ..Self::new()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            provision_delay: delay,
            ..Self::new()
        }
    }

    pub fn provision_count(&self) -> u32 {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }
}

/// Cheap handle onto a shared [`RecordingTransport`]
#[derive(Clone)]
pub struct SharedTransport(pub Arc<RecordingTransport>);

impl std::fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTransport")
            .field("sent", &self.0.sent_messages().len())
            .field("attached", &self.0.has_handler())
            .finish()
    }
}

#[async_trait]
impl QueueTransport for SharedTransport {
    fn on_message(&self, handler: MessageHandler) -> Result<(), QueueError> {
        self.0.on_message(handler)
    }

    async fn send(&self, message: WireMessage) -> Result<(), QueueError> {
        self.0.send(message).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.0.close().await
    }
}

#[async_trait]
impl NamespaceManager for CountingNamespaceManager {
    type Client = SharedTransport;

    async fn provision_queue(&self) -> Result<(), QueueError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.call_order.lock().unwrap().push("provision");
        if !self.provision_delay.is_zero() {
            tokio::time::sleep(self.provision_delay).await;
        }
        if self.fail_provisioning {
            return Err(QueueError::QueueNotFound {
                queue_name: "orders".to_string(),
            });
        }
        Ok(())
    }

    fn create_queue_client(&self) -> Result<Self::Client, QueueError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.call_order.lock().unwrap().push("create");
        Ok(SharedTransport(Arc::clone(&self.transport)))
    }
}
