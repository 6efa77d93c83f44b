//! Per-provider health and metrics snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one health probe. Recomputed per probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub healthy: bool,

    /// Latency of the probe call
    pub latency_ms: u64,

    /// Cumulative failed calls at probe time
    pub error_count: u64,

    /// Share of successful calls among the most recent samples, 1.0 when
    /// no calls were made
    pub success_rate: f64,

    pub last_checked: DateTime<Utc>,

    pub message: String,
}

/// Cumulative call statistics for one adapter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,

    /// Mean of the rolling latency window
    pub average_latency_ms: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl ProviderMetrics {
    /// Successful / total, 1.0 before the first call.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}
