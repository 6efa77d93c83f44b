//! Provider health monitoring.
//!
//! Probes providers with their cheap representative call and stores the
//! result on the provider record for admin visibility. Probe results are
//! informational: they never open a circuit and never remove a provider from
//! eligibility. Only live search traffic feeds the circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::models::ProviderHealth;
use crate::registry::ProviderRegistry;

/// Runs health probes against registered providers.
#[derive(Clone)]
pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Probe one provider now and store the result.
    pub async fn check_provider(&self, name: &str) -> Result<ProviderHealth> {
        let adapter = self.registry.adapter(name)?;
        let health = adapter.check_health().await;
        log_probe(adapter.id(), &health);
        self.registry.record_health(adapter.id(), health.clone())?;
        Ok(health)
    }

    /// Probe every active provider concurrently and store the results.
    pub async fn check_all(&self) -> Vec<(String, ProviderHealth)> {
        let targets = self.registry.probe_targets();
        let probes = targets.into_iter().map(|(name, adapter)| async move {
            let health = adapter.check_health().await;
            (name, health)
        });

        let mut results = Vec::new();
        for (name, health) in join_all(probes).await {
            log_probe(name, &health);
            // A provider cannot be unregistered, so this only fails on a bug
            if let Err(e) = self.registry.record_health(name, health.clone()) {
                warn!("Could not store health for '{}': {}", name, e);
                continue;
            }
            results.push((name.to_string(), health));
        }
        results
    }

    /// Probe all providers every `interval` in a background task.
    ///
    /// The first round runs immediately. Abort the handle to stop.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Health monitor started ({:?} interval)", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let results = self.check_all().await;
                let unhealthy = results.iter().filter(|(_, h)| !h.healthy).count();
                debug!(
                    "Health round complete: {} probed, {} unhealthy",
                    results.len(),
                    unhealthy
                );
            }
        })
    }
}

fn log_probe(name: &str, health: &ProviderHealth) {
    if health.healthy {
        debug!("Provider '{}' healthy ({} ms)", name, health.latency_ms);
    } else {
        warn!(
            "Provider '{}' unhealthy after {} ms: {}",
            name, health.latency_ms, health.message
        );
    }
}
