//! Engine configuration.
//!
//! All settings have defaults, so an empty JSON object (or a missing `engine`
//! section in the front end's config file) yields a working engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue depth for each routine's trigger queue.
/// 8 absorbs a burst of clicks while a request is in flight.
const DEFAULT_TRIGGER_BUFFER: usize = 8;

/// Initial delay before restarting a failed routine.
const DEFAULT_RESTART_BACKOFF_MS: u64 = 100;

/// Upper bound for the doubling restart delay.
const DEFAULT_MAX_RESTART_BACKOFF_MS: u64 = 5000;

/// Salt prefix for transport secret derivation
const DEFAULT_SALT_PREFIX: &str = "authflow";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trigger_buffer: usize,
    pub restart_backoff_ms: u64,
    pub max_restart_backoff_ms: u64,
    pub secret: SecretConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_buffer: DEFAULT_TRIGGER_BUFFER,
            restart_backoff_ms: DEFAULT_RESTART_BACKOFF_MS,
            max_restart_backoff_ms: DEFAULT_MAX_RESTART_BACKOFF_MS,
            secret: SecretConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    pub fn max_restart_backoff(&self) -> Duration {
        Duration::from_millis(self.max_restart_backoff_ms.max(self.restart_backoff_ms))
    }

    /// Trigger queues need room for at least one pending trigger
    pub fn trigger_buffer(&self) -> usize {
        self.trigger_buffer.max(1)
    }
}

/// Argon2id parameters for turning a password into a transport secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub salt_prefix: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            salt_prefix: DEFAULT_SALT_PREFIX.to_string(),
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Settings for the HTTP-backed credential client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// 30s allows for slow responses while failing fast enough for good UX.
fn default_timeout_secs() -> u64 {
    30
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
