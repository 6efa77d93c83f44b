//! Scriptable provider and offer builders shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::errors::{FailureKind, FlightDataError, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, FlightOffer, FlightSearchParams, Itinerary, Price,
    ProviderCredentials, ProviderHealth, ProviderMetrics, Segment,
};
use crate::provider::{CallTracker, FlightProvider, ProviderReply};

pub(crate) struct MockProvider {
    id: &'static str,
    offers: Vec<FlightOffer>,
    airports: Vec<AirportRecord>,
    delay: Duration,
    failure: Option<FailureKind>,
    healthy: bool,
    pub(crate) calls: AtomicUsize,
    tracker: CallTracker,
}

impl MockProvider {
    pub(crate) fn new(id: &'static str) -> Self {
        Self {
            id,
            offers: Vec::new(),
            airports: Vec::new(),
            delay: Duration::ZERO,
            failure: None,
            healthy: true,
            calls: AtomicUsize::new(0),
            tracker: CallTracker::new(id),
        }
    }

    pub(crate) fn with_offers(mut self, offers: Vec<FlightOffer>) -> Self {
        self.offers = offers;
        self
    }

    pub(crate) fn with_airports(mut self, airports: Vec<AirportRecord>) -> Self {
        self.airports = airports;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub(crate) fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome<T: Clone>(&self, items: &[T], limit: usize) -> Result<Vec<T>> {
        match self.failure {
            Some(kind) => Err(match kind {
                FailureKind::Configuration => FlightDataError::configuration(self.id, "mock"),
                FailureKind::Timeout => FlightDataError::Timeout {
                    provider: self.id.to_string(),
                },
                FailureKind::RateLimited => FlightDataError::RateLimited {
                    provider: self.id.to_string(),
                },
                FailureKind::Parse => FlightDataError::parse(self.id, "mock"),
                FailureKind::Transport | FailureKind::Vendor => {
                    FlightDataError::provider(self.id, "Mock failure")
                }
            }),
            None => Ok(items.iter().take(limit).cloned().collect()),
        }
    }
}

#[async_trait]
impl FlightProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn initialize(&self, _credentials: &ProviderCredentials) -> Result<()> {
        Ok(())
    }

    async fn search_flights(&self, params: &FlightSearchParams) -> ProviderReply<FlightOffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.outcome(&self.offers, params.max_results);
        self.tracker.complete("search_flights", started, result)
    }

    async fn search_airports(&self, params: &AirportSearchParams) -> ProviderReply<AirportRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let result = self.outcome(&self.airports, params.limit);
        self.tracker.complete("search_airports", started, result)
    }

    async fn check_health(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = if self.healthy {
            Ok(())
        } else {
            Err(FlightDataError::provider(self.id, "HTTP 503"))
        };
        self.tracker.probe(started, result)
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.tracker.snapshot()
    }
}

pub(crate) fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 11, 2)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

pub(crate) fn search_params() -> FlightSearchParams {
    FlightSearchParams::one_way("JFK", "LAX", NaiveDate::from_ymd_opt(2026, 11, 2).unwrap())
}

/// A non-stop JFK-LAX offer on UA `flight`.
pub(crate) fn direct_offer(
    id: &str,
    provider: &str,
    total: Decimal,
    flight: &str,
    departure: NaiveDateTime,
    minutes: u32,
) -> FlightOffer {
    let arrival = departure + chrono::Duration::minutes(i64::from(minutes));
    FlightOffer::new(
        id,
        provider,
        Price::total_only(total, "USD"),
        vec![Itinerary::new(
            vec![Segment {
                origin: "JFK".to_string(),
                destination: "LAX".to_string(),
                departure,
                arrival,
                carrier: "UA".to_string(),
                flight_number: flight.to_string(),
                duration_minutes: minutes,
            }],
            None,
        )],
    )
}

/// A one-stop JFK-ORD-LAX offer with the given total duration.
pub(crate) fn one_stop_offer(
    id: &str,
    provider: &str,
    total: Decimal,
    departure: NaiveDateTime,
    minutes: u32,
) -> FlightOffer {
    let first_leg = minutes / 2;
    let connection = departure + chrono::Duration::minutes(i64::from(first_leg));
    let arrival = departure + chrono::Duration::minutes(i64::from(minutes));
    let segment = |origin: &str, destination: &str, dep, arr, flight: &str, mins| Segment {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure: dep,
        arrival: arr,
        carrier: "AA".to_string(),
        flight_number: flight.to_string(),
        duration_minutes: mins,
    };
    FlightOffer::new(
        id,
        provider,
        Price::total_only(total, "USD"),
        vec![Itinerary::new(
            vec![
                segment("JFK", "ORD", departure, connection, "1", first_leg),
                segment("ORD", "LAX", connection, arrival, "2", minutes - first_leg),
            ],
            Some(minutes),
        )],
    )
}
