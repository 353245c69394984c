//! Queue provider implementations.
//!
//! This module contains concrete implementations of the `NamespaceManager`
//! and `QueueTransport` traits for different queue backends.

pub mod memory;

pub use memory::{InMemoryBroker, InMemoryConfig, InMemoryNamespaceManager, InMemoryQueueTransport};
