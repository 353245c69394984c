//! Common test utilities for queue-facade integration tests
//!
//! This module provides:
//! - The `Invoice` entity used across scenarios
//! - Builders for clients over the in-memory provider
//! - A collector that waits for deliveries
//! - A namespace manager wrapper that counts and injects provisioning failures

use async_trait::async_trait;
use queue_facade::providers::{InMemoryBroker, InMemoryNamespaceManager, InMemoryQueueTransport};
use queue_facade::{
    JsonSerializationProvider, MessageExtension, NamespaceManager, QueueClient, QueueError,
    QueueName,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Duration;

#[allow(dead_code)]
pub type InvoiceClient = QueueClient<Invoice, InMemoryQueueTransport, JsonSerializationProvider>;

// ============================================================================
// Test Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: u32,
    pub customer: String,
    pub amount_cents: u64,
}

#[allow(dead_code)]
pub fn invoice(number: u32) -> Invoice {
    Invoice {
        number,
        customer: format!("customer-{number}"),
        amount_cents: u64::from(number) * 1_000,
    }
}

#[allow(dead_code)]
pub fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).expect("valid queue name")
}

// ============================================================================
// Client Builders
// ============================================================================

/// Client over `broker` with no extensions
#[allow(dead_code)]
pub fn invoice_client(broker: &InMemoryBroker, queue: &str) -> InvoiceClient {
    invoice_client_with(broker, queue, Vec::new())
}

#[allow(dead_code)]
pub fn invoice_client_with(
    broker: &InMemoryBroker,
    queue: &str,
    extensions: Vec<Arc<dyn MessageExtension<Invoice>>>,
) -> InvoiceClient {
    let manager = InMemoryNamespaceManager::new(broker.clone(), queue_name(queue));
    QueueClient::new(manager, JsonSerializationProvider, extensions)
}

// ============================================================================
// Delivery Collector
// ============================================================================

/// Records delivered invoices and wakes waiters on every delivery
#[derive(Clone, Default)]
pub struct Collector {
    received: Arc<Mutex<Vec<Invoice>>>,
    delivered: Arc<Notify>,
}

#[allow(dead_code)]
impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback suitable for `QueueClient::register_callback`
    pub fn callback(&self) -> impl Fn(&Invoice) -> anyhow::Result<()> + Send + Sync + 'static {
        let received = Arc::clone(&self.received);
        let delivered = Arc::clone(&self.delivered);
        move |invoice: &Invoice| {
            received.lock().unwrap().push(invoice.clone());
            delivered.notify_waiters();
            Ok(())
        }
    }

    pub fn received(&self) -> Vec<Invoice> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Wait until at least `expected` invoices arrived, or `timeout` passes
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.delivered.notified();
                if self.count() >= expected {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

// ============================================================================
// Counting Namespace Manager
// ============================================================================

/// Wraps an in-memory namespace manager, counting calls and optionally
/// failing provisioning
#[allow(dead_code)]
pub struct CountingManager {
    inner: InMemoryNamespaceManager,
    pub provision_calls: Arc<AtomicU32>,
    pub create_calls: Arc<AtomicU32>,
    fail_provisioning: bool,
    provision_delay: Duration,
}

#[allow(dead_code)]
impl CountingManager {
    pub fn new(broker: &InMemoryBroker, queue: &str) -> Self {
        Self {
            inner: InMemoryNamespaceManager::new(broker.clone(), queue_name(queue)),
            provision_calls: Arc::new(AtomicU32::new(0)),
            create_calls: Arc::new(AtomicU32::new(0)),
            fail_provisioning: false,
            provision_delay: Duration::ZERO,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_provisioning = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }
}

#[async_trait]
impl NamespaceManager for CountingManager {
    type Client = InMemoryQueueTransport;

    async fn provision_queue(&self) -> Result<(), QueueError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        if !self.provision_delay.is_zero() {
            tokio::time::sleep(self.provision_delay).await;
        }
        if self.fail_provisioning {
            return Err(QueueError::ProviderError {
                provider: "InMemory".to_string(),
                code: "Unauthorized".to_string(),
                message: "namespace rejected the management token".to_string(),
            });
        }
        self.inner.provision_queue().await
    }

    fn create_queue_client(&self) -> Result<Self::Client, QueueError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_queue_client()
    }
}
