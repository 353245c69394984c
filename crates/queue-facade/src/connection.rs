//! Lazily created, memoized transport connection.
//!
//! [`LazyConnection`] runs its factory at most once for its lifetime. All
//! concurrent resolvers wait on the same in-flight initialization and observe
//! the same outcome. A failed factory is cached too: provisioning is not
//! assumed to be safe to repeat, so every later `resolve` returns the original
//! error instead of trying again.

use crate::error::QueueError;
use crate::transport::{NamespaceManager, QueueTransport};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

type ConnectionFactory<C> = Box<dyn FnOnce() -> BoxFuture<'static, Result<C, QueueError>> + Send>;

/// The single initialization every resolver awaits. Owned by the connection,
/// so a resolver dropped mid-flight stops waiting without stopping it.
type Initialization<C> = Shared<BoxFuture<'static, Result<Arc<C>, QueueError>>>;

/// Single-flight, memoize-success-and-failure connection holder
pub struct LazyConnection<C> {
    factory: Mutex<Option<ConnectionFactory<C>>>,
    initialization: OnceLock<Initialization<C>>,
}

impl<C> LazyConnection<C>
where
    C: Send + Sync + 'static,
{
    /// Create from an asynchronous factory
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<C, QueueError>> + Send + 'static,
    {
        Self {
            factory: Mutex::new(Some(Box::new(move || factory().boxed()))),
            initialization: OnceLock::new(),
        }
    }

    /// Resolve the connection, running the factory on first use.
    ///
    /// Every caller receives the same client, or a clone of the same error.
    /// Cancelling a caller never cancels the factory.
    pub async fn resolve(&self) -> Result<Arc<C>, QueueError> {
        self.initialization().await
    }

    /// Get the connection if it has been created, without creating it
    pub fn get(&self) -> Option<Arc<C>> {
        match self.completed() {
            Some(Ok(client)) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    /// Check whether a connection was successfully created
    pub fn is_resolved(&self) -> bool {
        matches!(self.completed(), Some(Ok(_)))
    }

    /// Check whether the factory ran and failed
    pub fn is_failed(&self) -> bool {
        matches!(self.completed(), Some(Err(_)))
    }

    fn completed(&self) -> Option<&Result<Arc<C>, QueueError>> {
        self.initialization.get().and_then(Shared::peek)
    }

    fn initialization(&self) -> Initialization<C> {
        self.initialization
            .get_or_init(|| {
                let factory = self
                    .factory
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                initialize(factory).boxed().shared()
            })
            .clone()
    }
}

async fn initialize<C>(factory: Option<ConnectionFactory<C>>) -> Result<Arc<C>, QueueError> {
    let Some(factory) = factory else {
        return Err(QueueError::ProvisioningFailed {
            message: "connection factory missing".to_string(),
        });
    };

    match factory().await {
        Ok(client) => Ok(Arc::new(client)),
        Err(error @ QueueError::ProvisioningFailed { .. }) => Err(error),
        Err(error) => Err(QueueError::ProvisioningFailed {
            message: error.to_string(),
        }),
    }
}

impl<C> LazyConnection<C>
where
    C: QueueTransport,
{
    /// Create a connection whose factory provisions the queue and then
    /// acquires a client from `manager`
    pub fn from_namespace_manager<N>(manager: Arc<N>) -> Self
    where
        N: NamespaceManager<Client = C>,
    {
        Self::new(move || async move {
            manager.provision_queue().await?;
            manager.create_queue_client()
        })
    }
}
