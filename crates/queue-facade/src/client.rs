//! Typed queue client composing connection, fan-out and send pipeline.
//!
//! [`QueueClient`] is the surface application code talks to. It
//!
//! - creates the transport connection on first use, exactly once,
//! - attaches a single delivery handler no matter how many callbacks register,
//! - runs the extension pipeline on every outbound message, and
//! - logs and returns every send failure while containing callback failures.
//!
//! # Example
//!
//! ```rust
//! use queue_facade::providers::{InMemoryBroker, InMemoryNamespaceManager};
//! use queue_facade::{JsonSerializationProvider, QueueClient, QueueName};
//! use chrono::Duration;
//!
//! # async fn example() -> Result<(), queue_facade::QueueError> {
//! let broker = InMemoryBroker::default();
//! let queue = QueueName::new("orders".to_string())?;
//! let manager = InMemoryNamespaceManager::new(broker, queue);
//!
//! let client = QueueClient::<u64, _, _>::new(manager, JsonSerializationProvider, Vec::new());
//! client.register_callback(|order: &u64| {
//!     println!("received order {order}");
//!     Ok(())
//! });
//! client.send(&42, Duration::zero()).await?;
//! client.dispose().await?;
//! # Ok(())
//! # }
//! ```

use crate::callbacks::{Callback, CallbackRegistry};
use crate::connection::LazyConnection;
use crate::error::QueueError;
use crate::extension::{ExtensionPipeline, MessageExtension};
use crate::message::{Timestamp, WireMessage};
use crate::serialization::SerializationProvider;
use crate::transport::{MessageHandler, NamespaceManager, QueueTransport};
use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Subscription Handle
// ============================================================================

/// Optional completion signal for [`QueueClient::register_callback`].
///
/// Registration never waits for the connection. Callers that want to know
/// whether the delivery handler was attached can await [`wait`](Self::wait);
/// dropping the handle leaves the attach running in the background.
pub struct SubscriptionHandle {
    state: SubscriptionState,
}

enum SubscriptionState {
    Ready(Result<(), QueueError>),
    Pending(JoinHandle<Result<(), QueueError>>),
}

impl SubscriptionHandle {
    fn ready(result: Result<(), QueueError>) -> Self {
        Self {
            state: SubscriptionState::Ready(result),
        }
    }

    fn pending(handle: JoinHandle<Result<(), QueueError>>) -> Self {
        Self {
            state: SubscriptionState::Pending(handle),
        }
    }

    /// Check whether this registration started the background attach
    pub fn is_attaching(&self) -> bool {
        matches!(self.state, SubscriptionState::Pending(_))
    }

    /// Wait for the background attach started by this registration.
    ///
    /// Registrations made once the handler is attached resolve immediately
    /// with `Ok(())`.
    pub async fn wait(self) -> Result<(), QueueError> {
        match self.state {
            SubscriptionState::Ready(result) => result,
            SubscriptionState::Pending(handle) => match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(QueueError::SubscriptionFailed {
                    message: join_error.to_string(),
                }),
            },
        }
    }
}

// ============================================================================
// Queue Client
// ============================================================================

/// Provider-agnostic client for sending and receiving entities of type `T`
///
/// # Type Parameters
///
/// - `T`: Entity type carried by the queue
/// - `C`: Transport handle created by the namespace manager
/// - `S`: Serialization provider
pub struct QueueClient<T, C, S>
where
    C: QueueTransport,
{
    inner: Arc<ClientInner<T, C, S>>,
}

struct ClientInner<T, C, S> {
    connection: LazyConnection<C>,
    serializer: Arc<S>,
    extensions: ExtensionPipeline<T>,
    callbacks: Arc<CallbackRegistry<T>>,
    attach_lock: Mutex<()>,
    subscribed: AtomicBool,
    disposed: AtomicBool,
    closed: AtomicBool,
    entity_type: &'static str,
}

impl<T, C, S> QueueClient<T, C, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: QueueTransport,
    S: SerializationProvider,
{
    /// Create client whose connection is provisioned through `manager`.
    ///
    /// Nothing is provisioned until the first send or callback registration.
    pub fn new<N>(
        manager: N,
        serializer: S,
        extensions: Vec<Arc<dyn MessageExtension<T>>>,
    ) -> Self
    where
        N: NamespaceManager<Client = C>,
    {
        Self::with_connection(
            LazyConnection::from_namespace_manager(Arc::new(manager)),
            serializer,
            extensions,
        )
    }

    /// Create client over an already configured lazy connection
    pub fn with_connection(
        connection: LazyConnection<C>,
        serializer: S,
        extensions: Vec<Arc<dyn MessageExtension<T>>>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connection,
                serializer: Arc::new(serializer),
                extensions: ExtensionPipeline::new(extensions),
                callbacks: Arc::new(CallbackRegistry::new()),
                attach_lock: Mutex::new(()),
                subscribed: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                entity_type: std::any::type_name::<T>(),
            }),
        }
    }

    /// Register a callback for every entity delivered on the queue.
    ///
    /// Returns immediately. Until the delivery handler is attached, each
    /// registration resolves the connection and attaches it on a background
    /// task, so a failed attach is retried by the next registration. Failures
    /// of that task are logged and reported through the returned handle.
    pub fn register_callback<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if self.inner.is_disposed() {
            warn!(
                entity_type = self.inner.entity_type,
                "Ignoring callback registration on disposed queue client"
            );
            return SubscriptionHandle::ready(Err(QueueError::Disposed));
        }

        let callback: Callback<T> = Arc::new(callback);
        let callbacks = self.inner.callbacks.add(callback);
        if self.inner.subscribed.load(Ordering::SeqCst) {
            debug!(
                entity_type = self.inner.entity_type,
                callbacks,
                "Added callback to existing subscription"
            );
            return SubscriptionHandle::ready(Ok(()));
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                SubscriptionHandle::pending(runtime.spawn(async move { inner.subscribe().await }))
            }
            Err(e) => {
                error!(
                    entity_type = self.inner.entity_type,
                    error = %e,
                    "No async runtime available to attach message handler"
                );
                SubscriptionHandle::ready(Err(QueueError::SubscriptionFailed {
                    message: e.to_string(),
                }))
            }
        }
    }

    /// Send `entity`, optionally scheduled for delivery `schedule_in` from now.
    ///
    /// A zero offset sends for immediate delivery. A negative offset is
    /// rejected before anything is serialized or provisioned.
    pub async fn send(&self, entity: &T, schedule_in: Duration) -> Result<(), QueueError> {
        if self.inner.is_disposed() {
            return Err(QueueError::Disposed);
        }

        if schedule_in < Duration::zero() {
            return Err(QueueError::invalid_argument(
                "schedule_in",
                "cannot schedule a message to arrive in the past",
            ));
        }

        let mut message = match self.inner.serializer.serialize(entity) {
            Ok(message) => message,
            Err(e) => {
                let error = QueueError::from(e);
                self.inner.log_send_failure(&error);
                return Err(error);
            }
        };

        if schedule_in > Duration::zero() {
            message.scheduled_enqueue_time = Some(Timestamp::now().add(schedule_in));
        }

        info!(
            entity_type = self.inner.entity_type,
            message_id = %message.message_id(),
            scheduled = message.scheduled_enqueue_time.is_some(),
            "Sending message of type: {}",
            self.inner.entity_type
        );

        let result = self.inner.send_message(message, entity).await;
        if let Err(error) = &result {
            self.inner.log_send_failure(error);
        }
        result
    }

    /// Send `entity` for immediate delivery
    pub async fn send_now(&self, entity: &T) -> Result<(), QueueError> {
        self.send(entity, Duration::zero()).await
    }

    /// Close the connection if one was created. Safe to call repeatedly.
    pub async fn dispose(&self) -> Result<(), QueueError> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(entity_type = self.inner.entity_type, "Disposing queue client");
        self.inner.close_connection().await
    }

    /// Number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.count()
    }

    /// Check whether the transport connection has been created
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_resolved()
    }

    /// Check whether the delivery handler has been attached
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    /// Check whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Type name used when logging about this client's entities
    pub fn entity_type(&self) -> &'static str {
        self.inner.entity_type
    }
}

impl<T, C, S> Drop for QueueClient<T, C, S>
where
    C: QueueTransport,
{
    /// Best-effort close for clients dropped without [`QueueClient::dispose`]
    fn drop(&mut self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(client) = self.inner.connection.get() else {
            return;
        };
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let entity_type = self.inner.entity_type;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = client.close().await {
                        warn!(entity_type, error = %e, "Failed to close dropped queue client");
                    }
                });
            }
            Err(_) => {
                warn!(
                    entity_type,
                    "Queue client dropped outside an async runtime; connection left open"
                );
            }
        }
    }
}

impl<T, C, S> ClientInner<T, C, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: QueueTransport,
    S: SerializationProvider,
{
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn send_message(&self, mut message: WireMessage, entity: &T) -> Result<(), QueueError> {
        self.extensions.apply(&mut message, entity)?;

        let client = self.connection.resolve().await?;
        if self.is_disposed() {
            self.close_connection().await?;
            return Err(QueueError::Disposed);
        }

        let message_id = message.message_id().clone();
        client.send(message).await?;
        debug!(
            entity_type = self.entity_type,
            message_id = %message_id,
            "Message sent"
        );
        Ok(())
    }

    fn log_send_failure(&self, error: &QueueError) {
        error!(
            entity_type = self.entity_type,
            error = %error,
            "Error sending message of type: {}; Error: {}",
            self.entity_type,
            error
        );
    }

    /// Resolve the connection and attach the delivery handler, once
    async fn subscribe(self: Arc<Self>) -> Result<(), QueueError> {
        let _guard = self.attach_lock.lock().await;
        if self.subscribed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let client = match self.connection.resolve().await {
            Ok(client) => client,
            Err(e) => {
                error!(
                    entity_type = self.entity_type,
                    error = %e,
                    "Could not connect to attach message handler"
                );
                return Err(e);
            }
        };

        if self.is_disposed() {
            self.close_connection().await?;
            return Err(QueueError::Disposed);
        }

        if let Err(e) = client.on_message(self.dispatcher()) {
            error!(
                entity_type = self.entity_type,
                error = %e,
                "Transport rejected message handler"
            );
            return Err(e);
        }

        self.subscribed.store(true, Ordering::SeqCst);
        info!(
            entity_type = self.entity_type,
            callbacks = self.callbacks.count(),
            "Attached message handler"
        );
        Ok(())
    }

    /// Delivery handler handed to the transport.
    ///
    /// Captures only the registry and serializer so the transport never keeps
    /// the client itself alive.
    fn dispatcher(&self) -> MessageHandler {
        let callbacks = Arc::clone(&self.callbacks);
        let serializer = Arc::clone(&self.serializer);
        let entity_type = self.entity_type;

        Arc::new(move |message: WireMessage| {
            match serializer.deserialize::<T>(&message) {
                Ok(entity) => {
                    callbacks.deliver(&entity);
                }
                Err(e) => {
                    error!(
                        entity_type,
                        message_id = %message.message_id(),
                        error = %e,
                        "Could not deserialize delivered message"
                    );
                }
            }
        })
    }

    /// Close the created connection, at most once
    async fn close_connection(&self) -> Result<(), QueueError> {
        let Some(client) = self.connection.get() else {
            debug!(
                entity_type = self.entity_type,
                "No connection was created; nothing to close"
            );
            return Ok(());
        };

        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match client.close().await {
            Ok(()) => {
                info!(entity_type = self.entity_type, "Closed queue connection");
                Ok(())
            }
            Err(e) => {
                error!(
                    entity_type = self.entity_type,
                    error = %e,
                    "Failed to close queue connection"
                );
                Err(e)
            }
        }
    }
}
