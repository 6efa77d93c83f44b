//! End-to-end aggregation scenarios against scripted providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use farescout_flight_data::provider::CallTracker;
use farescout_flight_data::{
    AdminCommand, AdminService, AggregatorConfig, AirportRecord, AirportSearchParams,
    CircuitBreakerConfig, CircuitState, FailureKind, FlightAggregator, FlightDataError,
    FlightOffer, FlightProvider, FlightSearchParams, InMemoryAuditLog, Itinerary, Price,
    ProviderCallStatus, ProviderCredentials, ProviderHealth, ProviderMetrics, ProviderRegistry,
    ProviderReply, ProviderSettings, SearchStatus, Segment,
};
use rust_decimal_macros::dec;

// =============================================================================
// Scripted provider
// =============================================================================

enum Script {
    Offers(Vec<FlightOffer>),
    Fail(FailureKind),
}

struct ScriptedProvider {
    id: &'static str,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    tracker: CallTracker,
}

impl ScriptedProvider {
    fn returning(id: &'static str, offers: Vec<FlightOffer>) -> Self {
        Self {
            id,
            script: Script::Offers(offers),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            tracker: CallTracker::new(id),
        }
    }

    fn failing(id: &'static str, kind: FailureKind) -> Self {
        Self {
            script: Script::Fail(kind),
            ..Self::returning(id, Vec::new())
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlightProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn initialize(&self, _credentials: &ProviderCredentials) -> farescout_flight_data::Result<()> {
        Ok(())
    }

    async fn search_flights(&self, _params: &FlightSearchParams) -> ProviderReply<FlightOffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        tokio::time::sleep(self.delay).await;
        let result = match &self.script {
            Script::Offers(offers) => Ok(offers.clone()),
            Script::Fail(FailureKind::RateLimited) => Err(FlightDataError::RateLimited {
                provider: self.id.to_string(),
            }),
            Script::Fail(_) => Err(FlightDataError::ProviderError {
                provider: self.id.to_string(),
                message: "HTTP 502".to_string(),
            }),
        };
        self.tracker.complete("search_flights", started, result)
    }

    async fn search_airports(&self, _params: &AirportSearchParams) -> ProviderReply<AirportRecord> {
        ProviderReply::success(Vec::new())
    }

    async fn check_health(&self) -> ProviderHealth {
        self.tracker.probe(Instant::now(), Ok(()))
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.tracker.snapshot()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn departure(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 11, 2)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

fn offer(
    id: &str,
    provider: &str,
    total: rust_decimal::Decimal,
    flight: &str,
    dep: NaiveDateTime,
) -> FlightOffer {
    let arrival = dep + chrono::Duration::minutes(330);
    FlightOffer::new(
        id,
        provider,
        Price::total_only(total, "USD"),
        vec![Itinerary::new(
            vec![Segment {
                origin: "JFK".to_string(),
                destination: "LAX".to_string(),
                departure: dep,
                arrival,
                carrier: "DL".to_string(),
                flight_number: flight.to_string(),
                duration_minutes: 330,
            }],
            None,
        )],
    )
}

fn params() -> FlightSearchParams {
    FlightSearchParams::one_way("JFK", "LAX", NaiveDate::from_ymd_opt(2026, 11, 2).unwrap())
}

fn settings(timeout_secs: u64) -> ProviderSettings {
    ProviderSettings::default().with_timeout(Duration::from_secs(timeout_secs))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cheaper_duplicate_wins_and_slow_provider_is_cut_off() {
    let registry = Arc::new(ProviderRegistry::new());
    let slow = Arc::new(
        ScriptedProvider::returning("C", vec![offer("c1", "C", dec!(100), "900", departure(6, 0))])
            .delayed(Duration::from_secs(60)),
    );
    registry
        .register(
            Arc::new(ScriptedProvider::returning(
                "A",
                vec![
                    offer("a1", "A", dec!(300), "400", departure(8, 0)),
                    offer("a2", "A", dec!(350), "410", departure(13, 0)),
                ],
            )),
            settings(5),
        )
        .unwrap();
    registry
        .register(
            Arc::new(ScriptedProvider::returning(
                "B",
                vec![offer("b1", "B", dec!(295), "400", departure(8, 3))],
            )),
            settings(5),
        )
        .unwrap();
    registry.register(slow.clone(), settings(3)).unwrap();

    let aggregator = FlightAggregator::new(Arc::clone(&registry));
    let started = tokio::time::Instant::now();
    let outcome = aggregator.search(&params()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.status, SearchStatus::Results);
    assert_eq!(outcome.offers.len(), 2);

    assert_eq!(outcome.offers[0].price.total, dec!(295));
    assert_eq!(outcome.offers[0].provider, "B");
    assert_eq!(
        outcome.offers[0].offered_by,
        vec!["A".to_string(), "B".to_string()]
    );
    assert_eq!(outcome.offers[1].price.total, dec!(350));
    assert_eq!(outcome.offers[1].offered_by, vec!["A".to_string()]);

    // Bounded by the slow provider's deadline, not its delay
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(60));

    let report = outcome.providers.iter().find(|r| r.provider == "C").unwrap();
    assert_eq!(report.status, ProviderCallStatus::TimedOut);
    assert_eq!(registry.breaker("C").unwrap().failure_count(), 1);
    assert_eq!(slow.calls(), 1);
}

#[tokio::test]
async fn partial_failure_returns_the_successful_union() {
    let registry = Arc::new(ProviderRegistry::new());
    registry
        .register(
            Arc::new(ScriptedProvider::failing("A", FailureKind::Vendor)),
            settings(5),
        )
        .unwrap();
    registry
        .register(
            Arc::new(ScriptedProvider::returning(
                "B",
                vec![offer("b1", "B", dec!(410), "1", departure(9, 0))],
            )),
            settings(5),
        )
        .unwrap();
    registry
        .register(
            Arc::new(ScriptedProvider::failing("C", FailureKind::RateLimited)),
            settings(5),
        )
        .unwrap();

    let outcome = FlightAggregator::new(registry)
        .search(&params())
        .await
        .unwrap();

    assert_eq!(outcome.status, SearchStatus::Results);
    assert_eq!(outcome.offers.len(), 1);
    assert_eq!(outcome.offers[0].id, "b1");
    assert_eq!(outcome.providers.len(), 3);
    let failed: Vec<_> = outcome
        .providers
        .iter()
        .filter(|r| matches!(r.status, ProviderCallStatus::Failed { .. }))
        .map(|r| r.provider.as_str())
        .collect();
    assert_eq!(failed, vec!["A", "C"]);
}

#[tokio::test]
async fn repeated_failures_open_the_circuit_and_admin_reset_restores_it() {
    let registry = Arc::new(ProviderRegistry::with_breaker_config(CircuitBreakerConfig {
        failure_threshold: 3,
        ..Default::default()
    }));
    let flaky = Arc::new(ScriptedProvider::failing("FLAKY", FailureKind::Transport));
    registry
        .register(
            Arc::new(ScriptedProvider::returning(
                "STEADY",
                vec![offer("s1", "STEADY", dec!(500), "7", departure(10, 0))],
            )),
            settings(5),
        )
        .unwrap();
    registry.register(flaky.clone(), settings(5)).unwrap();

    let aggregator = FlightAggregator::new(Arc::clone(&registry));
    for _ in 0..3 {
        aggregator.search(&params()).await.unwrap();
    }
    assert_eq!(registry.breaker("FLAKY").unwrap().state(), CircuitState::Open);

    // An open circuit keeps the provider out of live traffic
    let outcome = aggregator.search(&params()).await.unwrap();
    assert_eq!(outcome.providers.len(), 1);
    assert_eq!(flaky.calls(), 3);

    let audit = InMemoryAuditLog::new();
    let admin = AdminService::new(Arc::clone(&registry), Arc::new(audit.clone()));
    admin
        .execute(
            "oncall",
            AdminCommand::ResetCircuit {
                provider: "FLAKY".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(registry.breaker("FLAKY").unwrap().state(), CircuitState::Closed);
    assert_eq!(audit.len(), 1);

    aggregator.search(&params()).await.unwrap();
    assert_eq!(flaky.calls(), 4);
}

#[tokio::test]
async fn inactive_and_single_provider_modes_limit_fan_out() {
    let registry = Arc::new(ProviderRegistry::new());
    let primary = Arc::new(ScriptedProvider::returning("P", Vec::new()));
    let backup = Arc::new(ScriptedProvider::returning("Q", Vec::new()));
    let disabled = Arc::new(ScriptedProvider::returning("R", Vec::new()));
    registry.register(primary.clone(), settings(5)).unwrap();
    registry.register(backup.clone(), settings(5)).unwrap();
    registry
        .register(disabled.clone(), settings(5).inactive())
        .unwrap();

    let outcome = FlightAggregator::new(Arc::clone(&registry))
        .search(&params())
        .await
        .unwrap();
    assert_eq!(outcome.status, SearchStatus::NoResults);
    assert_eq!(disabled.calls(), 0);
    assert_eq!(backup.calls(), 1);

    let single = FlightAggregator::with_config(
        Arc::clone(&registry),
        AggregatorConfig {
            multi_provider: false,
            ..Default::default()
        },
    );
    single.search(&params()).await.unwrap();
    assert_eq!(primary.calls(), 2);
    assert_eq!(backup.calls(), 1);
}
