//! Search aggregation.
//!
//! - `aggregator` - parallel fan-out with per-provider deadlines
//! - `dedup` - merging offers for the same logical flight
//! - `ranking` - deterministic result order

#[allow(clippy::module_inception)]
mod aggregator;
mod dedup;
mod ranking;

pub use aggregator::{
    AggregatorConfig, FlightAggregator, ProviderCallStatus, ProviderReport, SearchOutcome,
    SearchStatus,
};
pub use dedup::deduplicate;
pub use ranking::{compare_offers, rank};
