//! Health check types.

use serde::{Deserialize, Serialize};

/// Health status of the Kafka connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the connection is established.
    pub connected: bool,
    /// Number of brokers discovered.
    pub brokers: usize,
    /// Number of topics discovered.
    pub topics: usize,
}

impl HealthStatus {
    /// Check if the connection is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.connected && self.brokers > 0
    }
}
