//! Integration tests for the outbound extension pipeline
//!
//! These tests verify:
//! - Configured extensions stamp metadata on every sent message
//! - Extensions run in order and may inspect the entity
//! - A failing extension aborts the send

mod common;

use common::{invoice, invoice_client_with, queue_name, Invoice};
use queue_facade::providers::{InMemoryBroker, InMemoryQueueTransport};
use queue_facade::{
    FacadeConfig, FnExtension, MessageExtension, MessageHandler, QueueError, QueueTransport,
    WireMessage,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Attach a raw handler to the queue and return what it captures
fn capture_wire_messages(
    broker: &InMemoryBroker,
    queue: &str,
) -> (InMemoryQueueTransport, Arc<Mutex<Vec<WireMessage>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let handler: MessageHandler = Arc::new(move |message: WireMessage| {
        sink.lock().unwrap().push(message);
    });

    let transport = broker.connect(&queue_name(queue)).unwrap();
    transport.on_message(handler).unwrap();
    (transport, captured)
}

/// Verify extensions built from configuration decorate outbound messages.
#[tokio::test]
async fn test_configured_extensions_decorate_messages() {
    let broker = InMemoryBroker::default();
    let config = FacadeConfig {
        queue_name: "billing".to_string(),
        static_properties: HashMap::from([("tenant".to_string(), "contoso".to_string())]),
        content_type: Some("application/vnd.invoice+json".to_string()),
        ..FacadeConfig::default()
    };
    let client = invoice_client_with(&broker, "billing", config.extensions());
    client.send_now(&invoice(1)).await.unwrap();

    let (_transport, captured) = capture_wire_messages(&broker, "billing");

    let messages = captured.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].properties.get("tenant"),
        Some(&"contoso".to_string())
    );
    assert!(messages[0].correlation_id.is_some());
    assert_eq!(
        messages[0].content_type.as_deref(),
        Some("application/vnd.invoice+json")
    );
}

/// Verify extensions can derive metadata from the entity being sent.
#[tokio::test]
async fn test_entity_aware_extension() {
    let broker = InMemoryBroker::default();
    let customer_tag = FnExtension::new(
        "customer-tag",
        |message: &mut WireMessage, invoice: &Invoice| -> Result<(), QueueError> {
            message
                .properties
                .insert("customer".to_string(), invoice.customer.clone());
            Ok(())
        },
    );
    let extensions: Vec<Arc<dyn MessageExtension<Invoice>>> = vec![Arc::new(customer_tag)];
    let client = invoice_client_with(&broker, "tagged", extensions);

    client.send_now(&invoice(3)).await.unwrap();
    client.send_now(&invoice(4)).await.unwrap();
    let (_transport, captured) = capture_wire_messages(&broker, "tagged");

    let customers: Vec<String> = captured
        .lock()
        .unwrap()
        .iter()
        .map(|message| message.properties["customer"].clone())
        .collect();
    assert_eq!(customers, vec!["customer-3", "customer-4"]);
}

/// Verify a rejecting extension stops the message from being sent.
#[tokio::test]
async fn test_rejecting_extension_aborts_send() {
    let broker = InMemoryBroker::default();
    let limit = FnExtension::new(
        "amount-limit",
        |_message: &mut WireMessage, invoice: &Invoice| -> Result<(), QueueError> {
            if invoice.amount_cents > 5_000 {
                return Err(QueueError::ExtensionFailed {
                    extension: "amount-limit".to_string(),
                    message: format!("invoice {} exceeds the limit", invoice.number),
                });
            }
            Ok(())
        },
    );
    let extensions: Vec<Arc<dyn MessageExtension<Invoice>>> = vec![Arc::new(limit)];
    let client = invoice_client_with(&broker, "limited", extensions);

    client.send_now(&invoice(2)).await.unwrap();
    let rejected = client.send_now(&invoice(9)).await;

    assert!(matches!(rejected, Err(QueueError::ExtensionFailed { .. })));
    assert_eq!(broker.pending_count(&queue_name("limited")), 1);
}
