//! Flight data models
//!
//! This module contains the core data types shared by every provider:
//! - `types` - Type aliases for common identifiers (ProviderId, IataCode, Currency)
//! - `search` - Search parameters (FlightSearchParams, AirportSearchParams, CabinClass)
//! - `offer` - Normalized offer model (FlightOffer, Price, Itinerary, Segment)
//! - `airport` - Normalized airport/city records (AirportRecord)
//! - `health` - Per-provider health and metrics snapshots
//! - `credentials` - Opaque credential bag (ProviderCredentials)

mod airport;
mod credentials;
mod health;
mod offer;
mod search;
mod types;

pub use airport::{AirportRecord, LocationKind};
pub use credentials::ProviderCredentials;
pub use health::{ProviderHealth, ProviderMetrics};
pub use offer::{FlightOffer, Itinerary, Price, Segment, SegmentKey};
pub use search::{AirportSearchParams, CabinClass, FlightSearchParams};
pub use types::{Currency, IataCode, ProviderId};
