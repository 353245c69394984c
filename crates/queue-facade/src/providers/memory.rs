//! In-memory queue provider for testing and development.
//!
//! This module provides a namespace manager and transport that keep queues in
//! process memory:
//! - Queues are created by provisioning and shared through an [`InMemoryBroker`]
//! - Messages sent before any handler is attached are retained until one is
//! - Scheduled messages are held back until their enqueue time
//! - Several transports attached to one queue compete for its messages
//!
//! It is also the reference behaviour for real providers.

use crate::error::QueueError;
use crate::message::{QueueName, WireMessage};
use crate::transport::{MessageHandler, NamespaceManager, QueueTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "InMemory";

/// In-memory provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Maximum number of undelivered messages a queue retains
    pub max_queue_size: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Internal state for a single queue
#[derive(Default)]
struct QueueState {
    /// Messages waiting for a handler, in send order
    pending: VecDeque<WireMessage>,
    /// Attached handlers keyed by the transport that attached them
    handlers: Vec<(u64, MessageHandler)>,
    /// Round-robin cursor over `handlers`
    next_handler: usize,
    delivered: u64,
}

impl QueueState {
    fn next_handler(&mut self) -> Option<MessageHandler> {
        if self.handlers.is_empty() {
            return None;
        }
        let index = self.next_handler % self.handlers.len();
        self.next_handler = self.next_handler.wrapping_add(1);
        Some(Arc::clone(&self.handlers[index].1))
    }
}

struct InMemoryQueue {
    name: QueueName,
    state: Mutex<QueueState>,
    max_queue_size: usize,
}

impl InMemoryQueue {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `message` to the next handler, honouring its schedule
    fn dispatch(self: &Arc<Self>, handler: MessageHandler, message: WireMessage) {
        if message.is_scheduled_for_future() {
            let delay = message
                .scheduled_enqueue_time
                .map(|time| time.time_until())
                .and_then(|remaining| remaining.to_std().ok())
                .unwrap_or_default();

            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let queue = Arc::clone(self);
                    runtime.spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.lock().delivered += 1;
                        handler(message);
                    });
                    return;
                }
                Err(_) => {
                    warn!(
                        queue = %self.name,
                        "No async runtime for scheduled delivery; delivering immediately"
                    );
                }
            }
        }

        self.lock().delivered += 1;
        handler(message);
    }
}

// ============================================================================
// InMemoryBroker
// ============================================================================

/// Shared in-process store of queues
#[derive(Clone)]
pub struct InMemoryBroker {
    queues: Arc<RwLock<HashMap<QueueName, Arc<InMemoryQueue>>>>,
    config: InMemoryConfig,
    next_transport_id: Arc<AtomicU64>,
}

impl InMemoryBroker {
    /// Create new broker with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            config,
            next_transport_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create the queue if it does not exist yet.
    ///
    /// Returns `true` if the queue was created by this call.
    pub fn create_queue(&self, name: &QueueName) -> bool {
        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        if queues.contains_key(name) {
            return false;
        }
        queues.insert(
            name.clone(),
            Arc::new(InMemoryQueue {
                name: name.clone(),
                state: Mutex::new(QueueState::default()),
                max_queue_size: self.config.max_queue_size,
            }),
        );
        true
    }

    /// Check whether the queue has been provisioned
    pub fn queue_exists(&self, name: &QueueName) -> bool {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of messages waiting for a handler
    pub fn pending_count(&self, name: &QueueName) -> usize {
        self.queue(name)
            .map(|queue| queue.lock().pending.len())
            .unwrap_or(0)
    }

    /// Number of messages handed to handlers so far
    pub fn delivered_count(&self, name: &QueueName) -> u64 {
        self.queue(name)
            .map(|queue| queue.lock().delivered)
            .unwrap_or(0)
    }

    /// Number of handlers currently attached to the queue
    pub fn handler_count(&self, name: &QueueName) -> usize {
        self.queue(name)
            .map(|queue| queue.lock().handlers.len())
            .unwrap_or(0)
    }

    /// Open a transport onto an existing queue
    pub fn connect(&self, name: &QueueName) -> Result<InMemoryQueueTransport, QueueError> {
        let queue = self.queue(name).ok_or_else(|| QueueError::QueueNotFound {
            queue_name: name.to_string(),
        })?;

        Ok(InMemoryQueueTransport {
            id: self.next_transport_id.fetch_add(1, Ordering::SeqCst),
            queue,
            attached: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    fn queue(&self, name: &QueueName) -> Option<Arc<InMemoryQueue>> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

// ============================================================================
// InMemoryNamespaceManager
// ============================================================================

/// Namespace manager provisioning a single queue on an [`InMemoryBroker`]
#[derive(Clone)]
pub struct InMemoryNamespaceManager {
    broker: InMemoryBroker,
    queue_name: QueueName,
}

impl InMemoryNamespaceManager {
    pub fn new(broker: InMemoryBroker, queue_name: QueueName) -> Self {
        Self { broker, queue_name }
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }
}

#[async_trait]
impl NamespaceManager for InMemoryNamespaceManager {
    type Client = InMemoryQueueTransport;

    async fn provision_queue(&self) -> Result<(), QueueError> {
        if self.broker.create_queue(&self.queue_name) {
            info!(queue = %self.queue_name, "Provisioned in-memory queue");
        } else {
            debug!(queue = %self.queue_name, "In-memory queue already exists");
        }
        Ok(())
    }

    fn create_queue_client(&self) -> Result<Self::Client, QueueError> {
        self.broker.connect(&self.queue_name)
    }
}

// ============================================================================
// InMemoryQueueTransport
// ============================================================================

/// Transport handle onto one in-memory queue
pub struct InMemoryQueueTransport {
    id: u64,
    queue: Arc<InMemoryQueue>,
    attached: AtomicBool,
    closed: AtomicBool,
}

impl InMemoryQueueTransport {
    /// Name of the queue this transport is bound to
    pub fn queue_name(&self) -> &QueueName {
        &self.queue.name
    }

    /// Check whether [`close`](QueueTransport::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::ConnectionFailed {
                message: format!("transport for queue '{}' is closed", self.queue.name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueueTransport {
    fn on_message(&self, handler: MessageHandler) -> Result<(), QueueError> {
        self.ensure_open()?;
        if self.attached.swap(true, Ordering::SeqCst) {
            return Err(QueueError::HandlerAlreadyAttached {
                queue_name: self.queue.name.to_string(),
            });
        }

        let backlog: Vec<WireMessage> = {
            let mut state = self.queue.lock();
            state.handlers.push((self.id, Arc::clone(&handler)));
            state.pending.drain(..).collect()
        };

        debug!(
            queue = %self.queue.name,
            backlog = backlog.len(),
            "Attached in-memory message handler"
        );
        for message in backlog {
            self.queue.dispatch(Arc::clone(&handler), message);
        }
        Ok(())
    }

    async fn send(&self, message: WireMessage) -> Result<(), QueueError> {
        self.ensure_open()?;

        let handler = {
            let mut state = self.queue.lock();
            match state.next_handler() {
                Some(handler) => handler,
                None => {
                    if state.pending.len() >= self.queue.max_queue_size {
                        return Err(QueueError::ProviderError {
                            provider: PROVIDER_NAME.to_string(),
                            code: "QueueFull".to_string(),
                            message: format!(
                                "queue '{}' holds the maximum of {} messages",
                                self.queue.name, self.queue.max_queue_size
                            ),
                        });
                    }
                    state.pending.push_back(message);
                    return Ok(());
                }
            }
        };

        self.queue.dispatch(handler, message);
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut state = self.queue.lock();
        state.handlers.retain(|(id, _)| *id != self.id);
        debug!(queue = %self.queue.name, "Closed in-memory transport");
        Ok(())
    }
}
