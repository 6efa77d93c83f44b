//! Kiwi.com (Tequila) flight data provider.
//!
//! This module provides flight data from the Tequila API:
//! - Offers via GET /v2/search
//! - Airports and cities via GET /locations/query
//!
//! Tequila quirks handled here:
//! - dates are sent as `dd/mm/YYYY`
//! - a round trip is one flat `route` list split by the `return` flag
//! - local times carry a misleading `Z` suffix
//! - durations are reported in seconds
//! API documentation: https://tequila.kiwi.com/portal/docs/tequila_api

use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::{CallTracker, FlightProvider, ProviderReply};
use crate::errors::{FlightDataError, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, CabinClass, FlightOffer, FlightSearchParams, Itinerary,
    LocationKind, Price, ProviderCredentials, ProviderHealth, ProviderMetrics, Segment,
};

const BASE_URL: &str = "https://api.tequila.kiwi.com";
const PROVIDER_ID: &str = "KIWI";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /v2/search
#[derive(Debug, Deserialize)]
struct SearchResponse {
    currency: String,
    #[serde(default)]
    data: Vec<KiwiItinerary>,
    // Note: search_id, fx_rate, _results exist but not used
}

#[derive(Debug, Deserialize)]
struct KiwiItinerary {
    id: String,
    /// Total price in the response currency, sent as a JSON number
    price: serde_json::Number,
    #[serde(default)]
    availability: Option<Availability>,
    #[serde(default)]
    duration: Option<KiwiDuration>,
    #[serde(default)]
    route: Vec<KiwiRoute>,
}

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    seats: Option<u32>,
}

/// Durations in seconds
#[derive(Debug, Deserialize)]
struct KiwiDuration {
    #[serde(default)]
    departure: u64,
    #[serde(default, rename = "return")]
    inbound: u64,
}

#[derive(Debug, Deserialize)]
struct KiwiRoute {
    #[serde(rename = "flyFrom")]
    fly_from: String,
    #[serde(rename = "flyTo")]
    fly_to: String,
    local_departure: String,
    local_arrival: String,
    #[serde(default)]
    utc_departure: Option<String>,
    #[serde(default)]
    utc_arrival: Option<String>,
    airline: String,
    flight_no: u32,
    /// 0 for outbound, 1 for the return leg
    #[serde(default, rename = "return")]
    return_leg: u8,
    #[serde(default)]
    fare_classes: Option<String>,
}

/// Response from /locations/query
#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    locations: Vec<KiwiLocation>,
}

#[derive(Debug, Deserialize)]
struct KiwiLocation {
    #[serde(default)]
    code: Option<String>,
    name: String,
    /// "airport", "city", "country", ...
    #[serde(rename = "type")]
    location_type: String,
    /// Present on airports
    #[serde(default)]
    city: Option<KiwiCity>,
    /// Present on cities
    #[serde(default)]
    country: Option<KiwiCountry>,
}

#[derive(Debug, Deserialize)]
struct KiwiCity {
    name: String,
    #[serde(default)]
    country: Option<KiwiCountry>,
}

#[derive(Debug, Deserialize)]
struct KiwiCountry {
    code: String,
}

// ============================================================================
// KiwiProvider
// ============================================================================

/// Kiwi.com Tequila flight data provider.
pub struct KiwiProvider {
    client: Client,
    base_url: String,
    api_key: RwLock<Option<String>>,
    tracker: CallTracker,
}

impl KiwiProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http::build_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: RwLock::new(None),
            tracker: CallTracker::new(PROVIDER_ID),
        }
    }

    fn api_key(&self) -> Result<String> {
        self.api_key
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| FlightDataError::configuration(PROVIDER_ID, "provider not initialized"))
    }

    async fn fetch_offers(&self, params: &FlightSearchParams) -> Result<Vec<FlightOffer>> {
        let api_key = self.api_key()?;
        let request = self
            .client
            .get(format!("{}/v2/search", self.base_url))
            .header("apikey", api_key)
            .query(&search_query(params));
        let response: SearchResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut offers = normalize_offers(response);
        offers.truncate(params.max_results);
        Ok(offers)
    }

    async fn fetch_locations(&self, term: &str, limit: usize) -> Result<Vec<AirportRecord>> {
        let api_key = self.api_key()?;
        let request = self
            .client
            .get(format!("{}/locations/query", self.base_url))
            .header("apikey", api_key)
            .query(&[
                ("term", term.trim().to_string()),
                ("location_types", "airport".to_string()),
                ("location_types", "city".to_string()),
                ("limit", limit.to_string()),
                ("active_only", "true".to_string()),
            ]);
        let response: LocationsResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut records = normalize_locations(response);
        records.truncate(limit);
        Ok(records)
    }
}

impl Default for KiwiProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn kiwi_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn cabin_code(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "M",
        CabinClass::PremiumEconomy => "W",
        CabinClass::Business => "C",
        CabinClass::First => "F",
    }
}

fn search_query(params: &FlightSearchParams) -> Vec<(&'static str, String)> {
    let departure = kiwi_date(params.departure_date);
    let mut query = vec![
        ("fly_from", params.origin.clone()),
        ("fly_to", params.destination.clone()),
        ("date_from", departure.clone()),
        ("date_to", departure),
        ("adults", params.adults.to_string()),
        ("children", params.children.to_string()),
        ("infants", params.infants.to_string()),
        ("selected_cabins", cabin_code(params.cabin_class).to_string()),
        ("curr", params.currency.clone()),
        ("limit", params.max_results.to_string()),
        ("sort", "price".to_string()),
    ];
    match params.return_date {
        Some(return_date) => {
            let inbound = kiwi_date(return_date);
            query.push(("flight_type", "round".to_string()));
            query.push(("return_from", inbound.clone()));
            query.push(("return_to", inbound));
        }
        None => query.push(("flight_type", "oneway".to_string())),
    }
    if params.direct_only {
        query.push(("max_stopovers", "0".to_string()));
    }
    query
}

fn normalize_offers(response: SearchResponse) -> Vec<FlightOffer> {
    let currency = response.currency;
    response
        .data
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id.clone();
            match normalize_offer(raw, &currency) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    warn!("Skipping Kiwi itinerary {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn normalize_segment(route: KiwiRoute) -> Result<Segment> {
    let departure = http::parse_local_datetime(PROVIDER_ID, &route.local_departure)?;
    let arrival = http::parse_local_datetime(PROVIDER_ID, &route.local_arrival)?;

    // UTC times give the real flown time across time zones
    let utc_span = match (route.utc_departure.as_deref(), route.utc_arrival.as_deref()) {
        (Some(dep), Some(arr)) => {
            let dep = http::parse_local_datetime(PROVIDER_ID, dep)?;
            let arr = http::parse_local_datetime(PROVIDER_ID, arr)?;
            Some(arr - dep)
        }
        _ => None,
    };
    let span = utc_span.unwrap_or(arrival - departure);

    Ok(Segment {
        origin: route.fly_from,
        destination: route.fly_to,
        departure,
        arrival,
        carrier: route.airline,
        flight_number: route.flight_no.to_string(),
        duration_minutes: u32::try_from(span.num_minutes()).unwrap_or(0),
    })
}

fn normalize_offer(raw: KiwiItinerary, currency: &str) -> Result<FlightOffer> {
    let total = http::parse_amount(PROVIDER_ID, &raw.price.to_string())?;
    let fare_class = raw.route.first().and_then(|r| r.fare_classes.clone());

    let mut outbound = Vec::new();
    let mut inbound = Vec::new();
    for route in raw.route {
        let is_return = route.return_leg == 1;
        let segment = normalize_segment(route)?;
        if is_return {
            inbound.push(segment);
        } else {
            outbound.push(segment);
        }
    }
    if outbound.is_empty() {
        return Err(FlightDataError::parse(PROVIDER_ID, "itinerary without outbound route"));
    }

    let to_minutes = |secs: u64| u32::try_from(secs / 60).ok().filter(|m| *m > 0);
    let (outbound_minutes, inbound_minutes) = match raw.duration {
        Some(d) => (to_minutes(d.departure), to_minutes(d.inbound)),
        None => (None, None),
    };

    let mut itineraries = vec![Itinerary::new(outbound, outbound_minutes)];
    if !inbound.is_empty() {
        itineraries.push(Itinerary::new(inbound, inbound_minutes));
    }

    Ok(
        FlightOffer::new(raw.id, PROVIDER_ID, Price::total_only(total, currency), itineraries)
            .with_seats(raw.availability.and_then(|a| a.seats))
            .with_fare_class(fare_class),
    )
}

fn normalize_locations(response: LocationsResponse) -> Vec<AirportRecord> {
    response
        .locations
        .into_iter()
        .filter_map(|loc| {
            let code = loc.code.filter(|c| c.len() == 3)?;
            let record = match loc.location_type.as_str() {
                "airport" => {
                    let (city, country) = match loc.city {
                        Some(city) => (Some(city.name), city.country.map(|c| c.code)),
                        None => (None, None),
                    };
                    AirportRecord::new(code, loc.name, LocationKind::Airport, PROVIDER_ID)
                        .with_city(city)
                        .with_country(country)
                }
                "city" => {
                    let city = Some(loc.name.clone());
                    AirportRecord::new(code, loc.name, LocationKind::City, PROVIDER_ID)
                        .with_city(city)
                        .with_country(loc.country.map(|c| c.code))
                }
                _ => return None,
            };
            Some(record)
        })
        .collect()
}

// ============================================================================
// FlightProvider implementation
// ============================================================================

#[async_trait]
impl FlightProvider for KiwiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn initialize(&self, credentials: &ProviderCredentials) -> Result<()> {
        let api_key = credentials.require(PROVIDER_ID, "api_key")?;
        *self
            .api_key
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(api_key);
        debug!("Kiwi provider initialized");
        Ok(())
    }

    async fn search_flights(&self, params: &FlightSearchParams) -> ProviderReply<FlightOffer> {
        let started = Instant::now();
        let result = self.fetch_offers(params).await;
        self.tracker.complete("search_flights", started, result)
    }

    async fn search_airports(&self, params: &AirportSearchParams) -> ProviderReply<AirportRecord> {
        let started = Instant::now();
        let result = self.fetch_locations(&params.keyword, params.limit).await;
        self.tracker.complete("search_airports", started, result)
    }

    async fn check_health(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self.fetch_locations("PRG", 1).await.map(|_| ());
        self.tracker.probe(started, result)
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.tracker.snapshot()
    }
}
