//! Flight provider trait definitions.
//!
//! This module defines the core `FlightProvider` trait that every vendor
//! adapter implements, and the fail-soft [`ProviderReply`] it returns.

use async_trait::async_trait;

use crate::errors::{FailureKind, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, FlightOffer, FlightSearchParams, ProviderCredentials,
    ProviderHealth, ProviderMetrics,
};

/// Outcome of a single provider call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallOutcome {
    Success,
    Failed(FailureKind),
}

/// Fail-soft reply from a provider.
///
/// A failed call carries no items, never an error. The outcome is kept so
/// the aggregator can feed the provider's circuit breaker.
#[derive(Clone, Debug)]
pub struct ProviderReply<T> {
    pub items: Vec<T>,
    pub outcome: CallOutcome,
}

impl<T> ProviderReply<T> {
    pub fn success(items: Vec<T>) -> Self {
        Self {
            items,
            outcome: CallOutcome::Success,
        }
    }

    pub fn failed(kind: FailureKind) -> Self {
        Self {
            items: Vec::new(),
            outcome: CallOutcome::Failed(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == CallOutcome::Success
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self.outcome {
            CallOutcome::Success => None,
            CallOutcome::Failed(kind) => Some(kind),
        }
    }
}

/// Trait for flight data providers.
///
/// Implement this trait to add support for a new upstream vendor. Each
/// adapter keeps its wire protocol (sessions, polling, pagination, field
/// naming) private and exposes only normalized shapes.
///
/// # Fail-soft contract
///
/// `search_flights`, `search_airports` and `check_health` never return an
/// error. Transport, rate-limit, parse and vendor failures produce an empty
/// reply and increment the adapter's failure counter. Only
/// [`initialize`](FlightProvider::initialize) reports errors, and only
/// configuration errors.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use farescout_flight_data::provider::{CallTracker, FlightProvider, ProviderReply};
///
/// struct MyProvider {
///     tracker: CallTracker,
/// }
///
/// #[async_trait]
/// impl FlightProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     // ... implement search methods
/// }
/// ```
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "AMADEUS", "KIWI", etc.
    /// Used for logging, attribution and registry lookup.
    fn id(&self) -> &'static str;

    /// Install or rotate credentials.
    ///
    /// Fails with a configuration error when mandatory keys are missing.
    /// Calling it again replaces the previous credentials and drops any
    /// cached vendor session.
    fn initialize(&self, credentials: &ProviderCredentials) -> Result<()>;

    /// Search offers, at most `params.max_results`.
    async fn search_flights(&self, params: &FlightSearchParams) -> ProviderReply<FlightOffer>;

    /// Look up airports and cities by keyword.
    async fn search_airports(&self, params: &AirportSearchParams) -> ProviderReply<AirportRecord>;

    /// Probe the vendor with one cheap representative call.
    async fn check_health(&self) -> ProviderHealth;

    /// Read-only snapshot of cumulative call metrics.
    fn get_metrics(&self) -> ProviderMetrics;
}
