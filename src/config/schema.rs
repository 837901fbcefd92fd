//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the invoker host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::invoker::callbacks::DEFAULT_LONG_RUNNING_LIMIT_MS;
use crate::routing::ambiguity::{FirstRegistered, RefuseAmbiguous};
use crate::routing::router::RouteRegistry;

/// Placeholder admin key shipped in defaults; rejected when admin is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct InvokerConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Invocation pipeline settings.
    pub invocation: InvocationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// What to do when a request matches several routes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Treat as not found and log a diagnostic.
    #[default]
    Refuse,
    /// Dispatch to the earliest-registered route.
    FirstRegistered,
}

impl AmbiguityPolicy {
    /// Empty registry using this policy.
    pub fn registry(self) -> RouteRegistry {
        match self {
            AmbiguityPolicy::Refuse => RouteRegistry::with_resolver(RefuseAmbiguous),
            AmbiguityPolicy::FirstRegistered => RouteRegistry::with_resolver(FirstRegistered),
        }
    }
}

/// Invocation pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct InvocationConfig {
    /// Long-running threshold in milliseconds. Zero disables detection.
    pub long_running_limit_ms: i64,

    /// Register the logging exception observer.
    pub log_exceptions: bool,

    pub ambiguity: AmbiguityPolicy,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            long_running_limit_ms: DEFAULT_LONG_RUNNING_LIMIT_MS,
            log_exceptions: true,
            ambiguity: AmbiguityPolicy::Refuse,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/admin/*` on the main listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}
