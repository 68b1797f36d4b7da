//! Driver settings.

use std::time::Duration;

/// Default transmit timeout in milliseconds.
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u64 = 250;

/// Default time to wait for a get reply, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 100;

/// Default component registry capacity.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 32;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Timeouts and table sizes, fixed when the driver is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Upper bound on writing one command to the link.
    pub transmit_timeout: Duration,
    /// Upper bound on waiting for a get reply.
    pub response_timeout: Duration,
    /// Maximum number of registered components.
    pub registry_capacity: usize,
    /// Events buffered per subscriber before old ones are dropped.
    pub event_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            transmit_timeout: Duration::from_millis(DEFAULT_TRANSMIT_TIMEOUT_MS),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
