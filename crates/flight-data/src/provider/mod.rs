//! Flight provider abstractions and vendor adapters.
//!
//! This module contains:
//! - The `FlightProvider` trait that every vendor adapter implements
//! - The fail-soft `ProviderReply` returned by provider calls
//! - `CallTracker`, the per-adapter metrics and latency window
//! - Concrete adapters (Amadeus, Duffel, Kiwi, Skyscanner)
//!
//! # Architecture
//!
//! Adapters are designed to be:
//! - **Opaque**: sessions, polling, pagination and field naming stay private
//! - **Fail-soft**: vendor failures become empty replies, never errors
//! - **Self-measuring**: every call updates the adapter's own metrics
//!
//! Selection, circuit breaking and merging live in the registry and
//! aggregator, never in an adapter.

mod http;
mod kind;
mod tracker;
mod traits;

pub mod amadeus;
pub mod duffel;
pub mod kiwi;
pub mod skyscanner;

// Re-exports
pub use kind::ProviderKind;
pub use tracker::{CallTracker, LATENCY_WINDOW};
pub use traits::{CallOutcome, FlightProvider, ProviderReply};
