//! Farescout Flight Data Crate
//!
//! Provider abstraction, aggregation and resilience layer for searching
//! flight offers across several independent travel-data vendors.
//!
//! # Overview
//!
//! - One adapter per vendor (Amadeus, Duffel, Kiwi/Tequila, Skyscanner)
//!   normalizing its payloads into a single offer model
//! - Parallel fan-out with per-provider deadlines
//! - Cross-provider deduplication and deterministic ranking
//! - Per-provider circuit breaking and health tracking
//! - Audited provider administration
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | FlightAggregator |  (fan-out, dedup, ranking)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | ProviderRegistry | <-- |  AdminService    |  (toggle, primary, audit)
//! +------------------+     +------------------+
//!          |                        |
//!          v                        v
//! +------------------+     +------------------+
//! |  CircuitBreaker  |     |  HealthMonitor   |
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  FlightProvider  |  (Amadeus, Duffel, Kiwi, Skyscanner)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`FlightSearchParams`] - One search request
//! - [`FlightOffer`] - Normalized offer with attribution
//! - [`SearchOutcome`] - Ranked offers plus per-provider reports
//! - [`ProviderHealth`] / [`ProviderMetrics`] - Probe and traffic statistics

pub mod admin;
pub mod aggregator;
pub mod errors;
pub mod health;
pub mod models;
pub mod provider;
pub mod registry;

#[cfg(test)]
mod test_support;

// Re-export all public types from models
pub use models::{
    AirportRecord, AirportSearchParams, CabinClass, Currency, FlightOffer, FlightSearchParams,
    IataCode, Itinerary, LocationKind, Price, ProviderCredentials, ProviderHealth, ProviderId,
    ProviderMetrics, Segment, SegmentKey,
};

// Re-export provider types
pub use provider::amadeus::AmadeusProvider;
pub use provider::duffel::DuffelProvider;
pub use provider::kiwi::KiwiProvider;
pub use provider::skyscanner::SkyscannerProvider;
pub use provider::{CallOutcome, FlightProvider, ProviderKind, ProviderReply};

// Re-export orchestration types
pub use admin::{AdminCommand, AdminService, AuditEntry, AuditSink, InMemoryAuditLog};
pub use aggregator::{
    AggregatorConfig, FlightAggregator, ProviderCallStatus, ProviderReport, SearchOutcome,
    SearchStatus,
};
pub use health::HealthMonitor;
pub use registry::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState, ProviderRegistry,
    ProviderSettings, ProviderSnapshot,
};

// Re-export error types
pub use errors::{FailureKind, FlightDataError, Result};
