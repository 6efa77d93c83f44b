//! Provider registry for orchestrating flight data providers.
//!
//! The registry owns every configured adapter as an arena of provider
//! records addressed by a stable index. Each record guards its own settings,
//! circuit breaker and latest health snapshot, so updating one provider
//! never blocks another. The primary is a single index field, which makes
//! "exactly one primary" a property of the representation.
//!
//! Lock order, where more than one is held: records, then primary, then a
//! record's settings.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::errors::{FlightDataError, Result};
use crate::models::{ProviderHealth, ProviderMetrics};
use crate::provider::FlightProvider;

/// Default per-provider call timeout.
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default priority; lower runs earlier.
const DEFAULT_PRIORITY: u32 = 100;

/// Registration settings for one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub active: bool,
    /// Promote to primary on registration
    pub primary: bool,
    /// Lower values are queried first
    pub priority: u32,
    /// Deadline for one search call
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            active: true,
            primary: false,
            priority: DEFAULT_PRIORITY,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

impl ProviderSettings {
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn as_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Mutable settings of a registered provider.
#[derive(Clone, Copy, Debug)]
struct RecordSettings {
    active: bool,
    priority: u32,
    timeout: Duration,
}

/// One arena slot.
struct ProviderRecord {
    name: &'static str,
    adapter: Arc<dyn FlightProvider>,
    settings: RwLock<RecordSettings>,
    breaker: Arc<CircuitBreaker>,
    health: RwLock<Option<ProviderHealth>>,
}

impl ProviderRecord {
    fn settings(&self) -> RecordSettings {
        *read_lock(&self.settings)
    }
}

/// A provider selected for a live call.
#[derive(Clone)]
pub struct EligibleProvider {
    pub name: &'static str,
    pub adapter: Arc<dyn FlightProvider>,
    pub breaker: Arc<CircuitBreaker>,
    pub timeout: Duration,
    pub priority: u32,
    pub is_primary: bool,
}

impl std::fmt::Debug for EligibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EligibleProvider")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("priority", &self.priority)
            .field("is_primary", &self.is_primary)
            .finish()
    }
}

/// Read-only admin view of one provider.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    pub name: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub priority: u32,
    pub timeout_ms: u64,
    pub circuit: CircuitSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ProviderHealth>,
    pub metrics: ProviderMetrics,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("Registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("Registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Registry of configured flight providers.
pub struct ProviderRegistry {
    records: RwLock<Vec<Arc<ProviderRecord>>>,
    primary: RwLock<Option<usize>>,
    breaker_config: CircuitBreakerConfig,
}

impl ProviderRegistry {
    /// Create an empty registry with default circuit breaker settings.
    pub fn new() -> Self {
        Self::with_breaker_config(CircuitBreakerConfig::default())
    }

    /// Create an empty registry whose providers use `config` for breaking.
    pub fn with_breaker_config(config: CircuitBreakerConfig) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            primary: RwLock::new(None),
            breaker_config: config,
        }
    }

    fn position(records: &[Arc<ProviderRecord>], name: &str) -> Result<usize> {
        records
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| FlightDataError::ProviderNotFound(name.to_string()))
    }

    fn record(&self, name: &str) -> Result<Arc<ProviderRecord>> {
        let records = read_lock(&self.records);
        let index = Self::position(&records, name)?;
        Ok(Arc::clone(&records[index]))
    }

    /// Register an adapter under its own id.
    ///
    /// The first provider registered becomes primary; `settings.primary`
    /// promotes a later one (and activates it).
    pub fn register(
        &self,
        adapter: Arc<dyn FlightProvider>,
        settings: ProviderSettings,
    ) -> Result<()> {
        let name = adapter.id();
        let mut records = write_lock(&self.records);

        if records.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            return Err(FlightDataError::DuplicateProvider(name.to_string()));
        }

        let mut primary = write_lock(&self.primary);
        let becomes_primary = primary.is_none() || settings.primary;

        let index = records.len();
        records.push(Arc::new(ProviderRecord {
            name,
            adapter,
            settings: RwLock::new(RecordSettings {
                // The primary is always active
                active: settings.active || becomes_primary,
                priority: settings.priority,
                timeout: settings.timeout,
            }),
            breaker: Arc::new(CircuitBreaker::with_config(
                name,
                self.breaker_config.clone(),
            )),
            health: RwLock::new(None),
        }));

        if becomes_primary {
            *primary = Some(index);
            info!("Registered provider '{}' as primary", name);
        } else {
            info!(
                "Registered provider '{}' (priority {}, active {})",
                name, settings.priority, settings.active
            );
        }
        Ok(())
    }

    /// Promote a provider to primary.
    ///
    /// The old primary is demoted and the new one activated in one update,
    /// so no reader observes zero or two primaries.
    pub fn set_primary(&self, name: &str) -> Result<()> {
        let records = read_lock(&self.records);
        let index = Self::position(&records, name)?;

        let mut primary = write_lock(&self.primary);
        write_lock(&records[index].settings).active = true;
        let previous = primary.replace(index);

        if previous != Some(index) {
            info!(
                "Primary provider changed from '{}' to '{}'",
                previous.map_or("<none>", |i| records[i].name),
                records[index].name
            );
        }
        Ok(())
    }

    /// Enable or disable a provider, keeping its settings and history.
    ///
    /// The primary cannot be deactivated; promote another provider first.
    pub fn toggle(&self, name: &str, active: bool) -> Result<()> {
        let records = read_lock(&self.records);
        let index = Self::position(&records, name)?;

        let primary = read_lock(&self.primary);
        if !active && *primary == Some(index) {
            return Err(FlightDataError::InvalidOperation(format!(
                "cannot deactivate primary provider '{}'",
                records[index].name
            )));
        }

        write_lock(&records[index].settings).active = active;
        info!(
            "Provider '{}' {}",
            records[index].name,
            if active { "activated" } else { "deactivated" }
        );
        Ok(())
    }

    pub fn update_priority(&self, name: &str, priority: u32) -> Result<()> {
        let record = self.record(name)?;
        write_lock(&record.settings).priority = priority;
        debug!("Provider '{}' priority set to {}", record.name, priority);
        Ok(())
    }

    /// Providers that may take part in a live search, best first.
    ///
    /// Active providers whose circuit is not OPEN (after evaluating cool-down
    /// expiry). The primary comes first, the rest by priority then name.
    pub fn eligible_providers(&self) -> Vec<EligibleProvider> {
        let records = read_lock(&self.records);
        let primary = *read_lock(&self.primary);

        let mut eligible: Vec<EligibleProvider> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let settings = record.settings();
                if !settings.active {
                    return None;
                }
                if !record.breaker.is_callable() {
                    debug!("Circuit open for provider '{}', skipping", record.name);
                    return None;
                }
                Some(EligibleProvider {
                    name: record.name,
                    adapter: Arc::clone(&record.adapter),
                    breaker: Arc::clone(&record.breaker),
                    timeout: settings.timeout,
                    priority: settings.priority,
                    is_primary: primary == Some(index),
                })
            })
            .collect();

        eligible.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.name.cmp(b.name))
        });
        eligible
    }

    /// Every active provider regardless of circuit state, for health probes.
    pub fn probe_targets(&self) -> Vec<(&'static str, Arc<dyn FlightProvider>)> {
        read_lock(&self.records)
            .iter()
            .filter(|record| record.settings().active)
            .map(|record| (record.name, Arc::clone(&record.adapter)))
            .collect()
    }

    /// The adapter registered under `name`.
    pub fn adapter(&self, name: &str) -> Result<Arc<dyn FlightProvider>> {
        Ok(Arc::clone(&self.record(name)?.adapter))
    }

    /// The circuit breaker of the provider registered under `name`.
    pub fn breaker(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        Ok(Arc::clone(&self.record(name)?.breaker))
    }

    /// Store the latest health probe result.
    pub fn record_health(&self, name: &str, health: ProviderHealth) -> Result<()> {
        let record = self.record(name)?;
        *write_lock(&record.health) = Some(health);
        Ok(())
    }

    /// Force a provider's circuit back to CLOSED.
    pub fn reset_circuit(&self, name: &str) -> Result<()> {
        self.record(name)?.breaker.reset();
        Ok(())
    }

    /// Name of the current primary, if any provider is registered.
    pub fn primary(&self) -> Option<&'static str> {
        let records = read_lock(&self.records);
        let primary = *read_lock(&self.primary);
        primary.map(|index| records[index].name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        read_lock(&self.records).iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Admin view of one provider.
    pub fn snapshot(&self, name: &str) -> Result<ProviderSnapshot> {
        let records = read_lock(&self.records);
        let index = Self::position(&records, name)?;
        let primary = *read_lock(&self.primary);
        Ok(Self::build_snapshot(&records[index], primary == Some(index)))
    }

    /// Admin view of every provider in registration order.
    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        let records = read_lock(&self.records);
        let primary = *read_lock(&self.primary);
        records
            .iter()
            .enumerate()
            .map(|(index, record)| Self::build_snapshot(record, primary == Some(index)))
            .collect()
    }

    fn build_snapshot(record: &ProviderRecord, is_primary: bool) -> ProviderSnapshot {
        let settings = record.settings();
        ProviderSnapshot {
            name: record.name.to_string(),
            is_active: settings.active,
            is_primary,
            priority: settings.priority,
            timeout_ms: u64::try_from(settings.timeout.as_millis()).unwrap_or(u64::MAX),
            circuit: record.breaker.snapshot(),
            health: read_lock(&record.health).clone(),
            metrics: record.adapter.get_metrics(),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CircuitState;
    use crate::test_support::MockProvider;

    fn registry_with(names: &[&'static str]) -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        for &name in names {
            registry
                .register(Arc::new(MockProvider::new(name)), ProviderSettings::default())
                .unwrap();
        }
        registry
    }

    fn primaries(registry: &ProviderRegistry) -> Vec<String> {
        registry
            .snapshots()
            .into_iter()
            .filter(|s| s.is_primary)
            .map(|s| s.name)
            .collect()
    }

    #[test]
    fn test_first_registered_becomes_primary() {
        let registry = registry_with(&["A", "B"]);
        assert_eq!(registry.primary(), Some("A"));
        assert_eq!(primaries(&registry), vec!["A".to_string()]);
    }

    #[test]
    fn test_register_with_primary_flag_promotes() {
        let registry = registry_with(&["A"]);
        registry
            .register(
                Arc::new(MockProvider::new("B")),
                ProviderSettings::default().as_primary().inactive(),
            )
            .unwrap();
        assert_eq!(registry.primary(), Some("B"));
        assert!(registry.snapshot("B").unwrap().is_active);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = registry_with(&["A"]);
        let result = registry.register(Arc::new(MockProvider::new("A")), ProviderSettings::default());
        assert!(matches!(result, Err(FlightDataError::DuplicateProvider(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_primary_leaves_exactly_one() {
        let registry = registry_with(&["A", "B", "C"]);
        registry.toggle("B", false).unwrap();

        registry.set_primary("B").unwrap();
        assert_eq!(primaries(&registry), vec!["B".to_string()]);
        // Promotion activates
        assert!(registry.snapshot("B").unwrap().is_active);
    }

    #[test]
    fn test_unknown_provider_errors() {
        let registry = registry_with(&["A"]);
        assert!(matches!(
            registry.set_primary("NOPE"),
            Err(FlightDataError::ProviderNotFound(_))
        ));
        assert!(matches!(
            registry.toggle("NOPE", true),
            Err(FlightDataError::ProviderNotFound(_))
        ));
        assert!(registry.snapshot("NOPE").is_err());
    }

    #[test]
    fn test_cannot_deactivate_primary() {
        let registry = registry_with(&["A", "B"]);
        assert!(matches!(
            registry.toggle("A", false),
            Err(FlightDataError::InvalidOperation(_))
        ));
        assert!(registry.snapshot("A").unwrap().is_active);
    }

    #[test]
    fn test_inactive_provider_never_eligible() {
        let registry = registry_with(&["A", "B", "C"]);
        registry.toggle("B", false).unwrap();

        let names: Vec<_> = registry.eligible_providers().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A", "C"]);

        // Re-activation keeps previous settings
        registry.update_priority("B", 1).unwrap();
        registry.toggle("B", true).unwrap();
        assert_eq!(registry.snapshot("B").unwrap().priority, 1);
    }

    #[test]
    fn test_eligible_order_primary_then_priority_then_name() {
        let registry = ProviderRegistry::new();
        registry
            .register(
                Arc::new(MockProvider::new("ZULU")),
                ProviderSettings::default().with_priority(50),
            )
            .unwrap();
        registry
            .register(
                Arc::new(MockProvider::new("BRAVO")),
                ProviderSettings::default().with_priority(10),
            )
            .unwrap();
        registry
            .register(
                Arc::new(MockProvider::new("ALPHA")),
                ProviderSettings::default().with_priority(10),
            )
            .unwrap();

        let names: Vec<_> = registry.eligible_providers().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["ZULU", "ALPHA", "BRAVO"]);
        assert!(registry.eligible_providers()[0].is_primary);
    }

    #[test]
    fn test_open_circuit_excluded_from_eligibility() {
        let registry = ProviderRegistry::with_breaker_config(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        for name in ["A", "B"] {
            registry
                .register(Arc::new(MockProvider::new(name)), ProviderSettings::default())
                .unwrap();
        }

        registry.breaker("B").unwrap().record_failure();
        let names: Vec<_> = registry.eligible_providers().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["A"]);
        assert_eq!(registry.snapshot("B").unwrap().circuit.state, CircuitState::Open);

        registry.reset_circuit("B").unwrap();
        assert_eq!(registry.eligible_providers().len(), 2);
    }

    #[test]
    fn test_record_health_visible_in_snapshot() {
        let registry = registry_with(&["A"]);
        assert!(registry.snapshot("A").unwrap().health.is_none());

        let health = ProviderHealth {
            healthy: false,
            latency_ms: 12,
            error_count: 3,
            success_rate: 0.5,
            last_checked: chrono::Utc::now(),
            message: "HTTP 503".to_string(),
        };
        registry.record_health("A", health.clone()).unwrap();
        assert_eq!(registry.snapshot("A").unwrap().health, Some(health));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = registry_with(&["KIWI"]);
        assert!(registry.adapter("kiwi").is_ok());
    }
}
