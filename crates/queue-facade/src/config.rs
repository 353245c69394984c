//! Configuration for building queue clients.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!  1. Built-in defaults
//!  2. An optional configuration file (format chosen by its extension)
//!  3. Environment variables prefixed `QF` with `__` as separator,
//!     e.g. `QF__QUEUE_NAME=orders` or `QF__LOGGING__LEVEL=debug`

use crate::error::ConfigurationError;
use crate::extension::{
    ContentTypeExtension, CorrelationIdExtension, MessageExtension, StaticPropertiesExtension,
};
use crate::message::QueueName;
use crate::providers::InMemoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "QF";

/// Queue client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacadeConfig {
    /// Name of the queue the client sends to and receives from
    pub queue_name: String,

    /// Content type override applied after serialization
    pub content_type: Option<String>,

    /// Properties stamped on every outbound message
    pub static_properties: HashMap<String, String>,

    /// Assign a correlation ID to messages that have none
    pub correlation_ids: bool,

    /// In-memory provider settings
    pub in_memory: InMemoryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            queue_name: "default-queue".to_string(),
            content_type: None,
            static_properties: HashMap::new(),
            correlation_ids: true,
            in_memory: InMemoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter, used when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl FacadeConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Check the configuration for values no client could work with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.queue_name()?;

        if self.in_memory.max_queue_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "in_memory.max_queue_size must be greater than zero".to_string(),
            });
        }

        if let Some(content_type) = &self.content_type {
            if content_type.trim().is_empty() {
                return Err(ConfigurationError::Invalid {
                    message: "content_type must not be empty when set".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validated queue name
    pub fn queue_name(&self) -> Result<QueueName, ConfigurationError> {
        QueueName::new(self.queue_name.clone()).map_err(|e| ConfigurationError::Invalid {
            message: e.to_string(),
        })
    }

    /// Extensions described by this configuration, in application order
    pub fn extensions<T>(&self) -> Vec<Arc<dyn MessageExtension<T>>> {
        let mut extensions: Vec<Arc<dyn MessageExtension<T>>> = Vec::new();

        if !self.static_properties.is_empty() {
            extensions.push(Arc::new(StaticPropertiesExtension::new(
                self.static_properties.clone(),
            )));
        }
        if self.correlation_ids {
            extensions.push(Arc::new(CorrelationIdExtension));
        }
        if let Some(content_type) = &self.content_type {
            extensions.push(Arc::new(ContentTypeExtension::new(content_type.clone())));
        }

        extensions
    }
}
