use serde::{Deserialize, Serialize};

/// Classification of a failed provider call.
///
/// Carried on fail-soft replies so the aggregator can feed the circuit
/// breaker without seeing the underlying error.
///
/// # Behavior Summary
///
/// | Kind | Counts as circuit failure? |
/// |------|---------------------------|
/// | `Configuration` | No (provider was never callable) |
/// | `Transport` | Yes |
/// | `Timeout` | Yes |
/// | `RateLimited` | Yes |
/// | `Parse` | Yes |
/// | `Vendor` | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials missing or adapter not initialized.
    Configuration,
    /// Connection refused, DNS, TLS and similar.
    Transport,
    /// The vendor or the aggregator deadline timed out.
    Timeout,
    /// HTTP 429 or an exhausted quota.
    RateLimited,
    /// The payload could not be normalized.
    Parse,
    /// The vendor answered with an error.
    Vendor,
}

impl FailureKind {
    /// Whether this failure should be counted by the circuit breaker.
    pub fn trips_circuit(self) -> bool {
        !matches!(self, Self::Configuration)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Parse => "parse",
            Self::Vendor => "vendor",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
