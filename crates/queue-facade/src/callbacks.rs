//! Fan-out of delivered entities to application callbacks.
//!
//! A client owns one [`CallbackRegistry`] and attaches one delivery handler to
//! its transport. Every delivered entity is handed to every registered
//! callback. Each invocation runs inside its own failure boundary so a
//! callback that errors or panics cannot stop delivery to the others, and
//! nothing it does reaches the transport.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};

#[cfg(test)]
#[path = "callbacks_tests.rs"]
mod tests;

/// Application callback invoked for every delivered entity
pub type Callback<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Outcome of delivering one entity to all callbacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub invoked: usize,
    pub failed: usize,
}

/// Growable, thread-safe set of callbacks sharing one subscription
pub struct CallbackRegistry<T> {
    callbacks: RwLock<Vec<Callback<T>>>,
    entity_type: &'static str,
}

impl<T> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            entity_type: std::any::type_name::<T>(),
        }
    }

    /// Append a callback, returning the number registered afterwards
    pub fn add(&self, callback: Callback<T>) -> usize {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        callbacks.push(callback);
        callbacks.len()
    }

    /// Number of registered callbacks
    pub fn count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke every registered callback with `entity`, in registration order.
    ///
    /// Failures are logged and counted; they are never propagated.
    pub fn deliver(&self, entity: &T) -> DeliveryReport {
        let snapshot: Vec<Callback<T>> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut report = DeliveryReport::default();
        for (index, callback) in snapshot.iter().enumerate() {
            report.invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| callback(entity))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    error!(
                        entity_type = self.entity_type,
                        callback_index = index,
                        error = %err,
                        "Message callback returned an error"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        entity_type = self.entity_type,
                        callback_index = index,
                        panic = %panic_message(panic.as_ref()),
                        "Message callback panicked"
                    );
                }
            }
        }

        debug!(
            entity_type = self.entity_type,
            invoked = report.invoked,
            failed = report.failed,
            "Delivered message to callbacks"
        );
        report
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
