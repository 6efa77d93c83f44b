//! Multi-provider search fan-out.
//!
//! One search runs as one spawned task per eligible provider, each bounded
//! by that provider's timeout. All calls are joined before the result is
//! built, so one provider's failure never aborts or delays another. A call
//! that misses its deadline counts as a circuit failure at the deadline; its
//! task keeps running in the background only so the adapter can record its
//! own metrics.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{dedup, ranking};
use crate::errors::{FailureKind, Result};
use crate::models::{AirportRecord, AirportSearchParams, FlightOffer, FlightSearchParams};
use crate::provider::{CallOutcome, FlightProvider, ProviderReply};
use crate::registry::{CircuitBreaker, EligibleProvider, ProviderRegistry, ProviderSettings};

/// Default window within which two departures count as the same flight.
const DEFAULT_DEDUP_TOLERANCE: Duration = Duration::from_secs(5 * 60);

const DEFAULT_MAX_PARALLEL_PROVIDERS: usize = 4;

const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Aggregator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Query every eligible provider; when off only the primary is queried
    pub multi_provider: bool,
    /// Upper bound on providers queried per search
    pub max_parallel_providers: usize,
    /// Timeout given to providers registered through this config
    pub default_provider_timeout: Duration,
    /// Departure window for merging offers of the same flight
    pub dedup_tolerance: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            multi_provider: true,
            max_parallel_providers: DEFAULT_MAX_PARALLEL_PROVIDERS,
            default_provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            dedup_tolerance: DEFAULT_DEDUP_TOLERANCE,
        }
    }
}

impl AggregatorConfig {
    /// Registration settings carrying this config's default timeout.
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings::default().with_timeout(self.default_provider_timeout)
    }
}

/// Overall status of a search.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    /// No provider could be queried
    NoProvidersAvailable,
    /// Providers were queried but none returned offers
    NoResults,
    Results,
}

/// What happened to one provider during a search.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderCallStatus {
    Success,
    Failed { kind: FailureKind },
    TimedOut,
    /// Another caller holds the half-open trial slot
    Skipped,
}

/// Per-provider attribution of one search.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReport {
    pub provider: String,
    /// Offers contributed before deduplication
    pub offers: usize,
    #[serde(flatten)]
    pub status: ProviderCallStatus,
    pub latency_ms: u64,
}

/// Result of one aggregated search.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub offers: Vec<FlightOffer>,
    pub providers: Vec<ProviderReport>,
}

impl SearchOutcome {
    fn no_providers() -> Self {
        Self {
            status: SearchStatus::NoProvidersAvailable,
            offers: Vec::new(),
            providers: Vec::new(),
        }
    }
}

/// Fans searches out to the registry's eligible providers and merges results.
pub struct FlightAggregator {
    registry: Arc<ProviderRegistry>,
    config: AggregatorConfig,
}

impl FlightAggregator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_config(registry, AggregatorConfig::default())
    }

    pub fn with_config(registry: Arc<ProviderRegistry>, config: AggregatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Providers to query for one request.
    fn select_providers(&self) -> Vec<EligibleProvider> {
        let mut providers = self.registry.eligible_providers();
        if !self.config.multi_provider {
            providers.retain(|p| p.is_primary);
        }
        providers.truncate(self.config.max_parallel_providers.max(1));
        providers
    }

    /// Search every selected provider and return merged, ranked offers.
    ///
    /// Only invalid parameters produce an error. Provider failures and
    /// timeouts are reported per provider; an empty provider set yields
    /// [`SearchStatus::NoProvidersAvailable`].
    pub async fn search(&self, params: &FlightSearchParams) -> Result<SearchOutcome> {
        params.validate()?;

        let providers = self.select_providers();
        if providers.is_empty() {
            warn!(
                "No providers available for {} -> {}",
                params.origin, params.destination
            );
            return Ok(SearchOutcome::no_providers());
        }

        info!(
            "Searching {} -> {} on {} across {} provider(s)",
            params.origin,
            params.destination,
            params.departure_date,
            providers.len()
        );

        let shared = Arc::new(params.clone());
        let calls = providers.into_iter().map(|provider| {
            let params = Arc::clone(&shared);
            dispatch(provider, move |adapter| async move {
                adapter.search_flights(&params).await
            })
        });
        let results = join_all(calls).await;

        let mut reports = Vec::with_capacity(results.len());
        let mut offers = Vec::new();
        for (report, items) in results {
            reports.push(report);
            offers.extend(items);
        }

        if reports.iter().all(|r| r.status == ProviderCallStatus::Skipped) {
            return Ok(SearchOutcome {
                status: SearchStatus::NoProvidersAvailable,
                offers: Vec::new(),
                providers: reports,
            });
        }

        let before = offers.len();
        offers.retain(|offer| {
            let keep = offer.price.currency.eq_ignore_ascii_case(&params.currency)
                && (!params.direct_only || offer.is_direct());
            if !keep {
                debug!(
                    "Dropping offer {} from '{}' ({} {}, direct {})",
                    offer.id,
                    offer.provider,
                    offer.price.total,
                    offer.price.currency,
                    offer.is_direct()
                );
            }
            keep
        });

        let mut offers = dedup::deduplicate(offers, self.config.dedup_tolerance);
        ranking::rank(&mut offers);
        offers.truncate(params.max_results);

        info!(
            "Search {} -> {} returned {} offer(s) from {} raw",
            params.origin,
            params.destination,
            offers.len(),
            before
        );

        let status = if offers.is_empty() {
            SearchStatus::NoResults
        } else {
            SearchStatus::Results
        };
        Ok(SearchOutcome {
            status,
            offers,
            providers: reports,
        })
    }

    /// Look up airports and cities across providers, merged by IATA code.
    ///
    /// When two providers return the same code, the record from the
    /// higher-ranked provider wins. Results are sorted by code.
    pub async fn search_airports(&self, params: &AirportSearchParams) -> Result<Vec<AirportRecord>> {
        params.validate()?;

        let providers = self.select_providers();
        if providers.is_empty() {
            warn!("No providers available for airport search '{}'", params.keyword);
            return Ok(Vec::new());
        }

        let shared = Arc::new(params.clone());
        let calls = providers.into_iter().map(|provider| {
            let params = Arc::clone(&shared);
            dispatch(provider, move |adapter| async move {
                adapter.search_airports(&params).await
            })
        });

        let mut merged: BTreeMap<String, AirportRecord> = BTreeMap::new();
        for (_, records) in join_all(calls).await {
            for record in records {
                merged.entry(record.iata_code.clone()).or_insert(record);
            }
        }

        let mut records: Vec<AirportRecord> = merged.into_values().collect();
        records.truncate(params.limit);
        Ok(records)
    }
}

/// Run one provider call under its breaker and deadline.
async fn dispatch<T, F, Fut>(provider: EligibleProvider, call: F) -> (ProviderReport, Vec<T>)
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn FlightProvider>) -> Fut,
    Fut: Future<Output = ProviderReply<T>> + Send + 'static,
{
    let name = provider.name;
    let report = |status, offers, started: Option<Instant>| ProviderReport {
        provider: name.to_string(),
        offers,
        status,
        latency_ms: started
            .map(|s| u64::try_from(s.elapsed().as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0),
    };

    // Held across the await so a dropped search gives back a half-open trial
    let Some(permit) = CircuitBreaker::acquire(&provider.breaker) else {
        debug!("Provider '{}' trial already in flight, skipping", name);
        return (report(ProviderCallStatus::Skipped, 0, None), Vec::new());
    };

    let started = Instant::now();
    let task = tokio::spawn(call(Arc::clone(&provider.adapter)));

    match tokio::time::timeout(provider.timeout, task).await {
        Ok(Ok(reply)) => match reply.outcome {
            CallOutcome::Success => {
                permit.success();
                let count = reply.items.len();
                (
                    report(ProviderCallStatus::Success, count, Some(started)),
                    reply.items,
                )
            }
            CallOutcome::Failed(kind) => {
                if kind.trips_circuit() {
                    permit.failure();
                } else {
                    permit.release();
                }
                (
                    report(ProviderCallStatus::Failed { kind }, 0, Some(started)),
                    Vec::new(),
                )
            }
        },
        Ok(Err(join_error)) => {
            warn!("Provider '{}' task failed: {}", name, join_error);
            permit.failure();
            (
                report(
                    ProviderCallStatus::Failed {
                        kind: FailureKind::Vendor,
                    },
                    0,
                    Some(started),
                ),
                Vec::new(),
            )
        }
        Err(_) => {
            // The spawned task is detached, not cancelled
            warn!(
                "Provider '{}' timed out after {:?}",
                name, provider.timeout
            );
            permit.failure();
            (
                report(ProviderCallStatus::TimedOut, 0, Some(started)),
                Vec::new(),
            )
        }
    }
}
