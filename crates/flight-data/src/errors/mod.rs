//! Error types and failure classification for the flight data crate.
//!
//! This module provides:
//! - [`FlightDataError`]: The main error enum for all flight data operations
//! - [`FailureKind`]: Compact classification carried on fail-soft provider replies

mod failure;

pub use failure::FailureKind;

use thiserror::Error;

/// Errors that can occur during flight data operations.
///
/// Only the registry/configuration family ever reaches a caller of the
/// aggregator. The transient family is produced inside adapters and absorbed
/// by their fail-soft contract; see [`is_transient`](Self::is_transient).
#[derive(Error, Debug)]
pub enum FlightDataError {
    /// Mandatory credentials or settings are missing for a provider.
    /// Fatal to that provider only.
    #[error("Configuration error for {provider}: {message}")]
    Configuration {
        /// The provider that is misconfigured
        provider: String,
        /// What is missing or invalid
        message: String,
    },

    /// The caller supplied search parameters that cannot be served.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No provider with this name is registered.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A provider with this name is already registered.
    #[error("Provider already registered: {0}")]
    DuplicateProvider(String),

    /// The registry refused a state change that would break an invariant.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The provider rate limited the request (HTTP 429 or quota exhausted).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with an error status or error payload.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered with a body we could not normalize.
    #[error("Parse error: {provider} - {message}")]
    Parse {
        /// The provider whose payload failed to parse
        provider: String,
        /// Description of the parse failure
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FlightDataError {
    /// Shorthand for a configuration error.
    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a vendor error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a parse error.
    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors produced by talking to a vendor.
    ///
    /// Transient errors are absorbed by the adapter that produced them and
    /// feed that provider's metrics and circuit breaker. Everything else is
    /// surfaced to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ProviderError { .. }
                | Self::Parse { .. }
                | Self::Network(_)
        )
    }

    /// Returns the failure classification recorded on a fail-soft reply.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Configuration { .. } => FailureKind::Configuration,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Parse { .. } => FailureKind::Parse,
            Self::Network(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Network(_) => FailureKind::Transport,
            Self::ProviderError { .. }
            | Self::InvalidRequest(_)
            | Self::ProviderNotFound(_)
            | Self::DuplicateProvider(_)
            | Self::InvalidOperation(_) => FailureKind::Vendor,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlightDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FlightDataError::RateLimited {
            provider: "KIWI".to_string()
        }
        .is_transient());
        assert!(FlightDataError::Timeout {
            provider: "AMADEUS".to_string()
        }
        .is_transient());
        assert!(FlightDataError::provider("DUFFEL", "500").is_transient());
        assert!(FlightDataError::parse("SKYSCANNER", "bad json").is_transient());
    }

    #[test]
    fn test_registry_errors_are_surfaced() {
        assert!(!FlightDataError::ProviderNotFound("X".to_string()).is_transient());
        assert!(!FlightDataError::DuplicateProvider("X".to_string()).is_transient());
        assert!(!FlightDataError::configuration("X", "missing api_key").is_transient());
        assert!(!FlightDataError::InvalidRequest("origin".to_string()).is_transient());
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            FlightDataError::configuration("KIWI", "missing api_key").failure_kind(),
            FailureKind::Configuration
        );
        assert_eq!(
            FlightDataError::RateLimited {
                provider: "KIWI".to_string()
            }
            .failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            FlightDataError::parse("KIWI", "eof").failure_kind(),
            FailureKind::Parse
        );
    }

    #[test]
    fn test_error_display() {
        let error = FlightDataError::ProviderNotFound("NOPE".to_string());
        assert_eq!(format!("{}", error), "Provider not found: NOPE");

        let error = FlightDataError::configuration("AMADEUS", "missing client_secret");
        assert_eq!(
            format!("{}", error),
            "Configuration error for AMADEUS: missing client_secret"
        );
    }
}
