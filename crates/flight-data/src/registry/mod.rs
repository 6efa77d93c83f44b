//! Provider registry module.
//!
//! This module provides orchestration state for flight providers:
//! - Provider registration, activation and priority ordering
//! - Primary provider selection
//! - Circuit breaking for fault tolerance

mod circuit_breaker;
#[allow(clippy::module_inception)]
mod registry;

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
pub use registry::{EligibleProvider, ProviderRegistry, ProviderSettings, ProviderSnapshot};
