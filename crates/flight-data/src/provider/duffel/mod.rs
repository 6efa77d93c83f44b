//! Duffel flight data provider.
//!
//! This module provides flight data from the Duffel API:
//! - Offers via POST /air/offer_requests (offers returned inline)
//! - Airports and cities via GET /places/suggestions
//!
//! Requests carry a bearer access token and a pinned `Duffel-Version` header.
//! Duffel prices offers in the airline's selling currency; the requested
//! currency is not forwarded.
//! API documentation: https://duffel.com/docs/api

use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::{CallTracker, FlightProvider, ProviderReply};
use crate::errors::{FlightDataError, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, CabinClass, FlightOffer, FlightSearchParams, Itinerary,
    LocationKind, Price, ProviderCredentials, ProviderHealth, ProviderMetrics, Segment,
};

const BASE_URL: &str = "https://api.duffel.com";
const PROVIDER_ID: &str = "DUFFEL";
const API_VERSION: &str = "v2";

// ============================================================================
// API Request Structures
// ============================================================================

#[derive(Debug, Serialize)]
struct OfferRequestBody {
    data: OfferRequestData,
}

#[derive(Debug, Serialize)]
struct OfferRequestData {
    slices: Vec<SliceRequest>,
    passengers: Vec<PassengerRequest>,
    cabin_class: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_connections: Option<u8>,
}

#[derive(Debug, Serialize)]
struct SliceRequest {
    origin: String,
    destination: String,
    departure_date: String,
}

#[derive(Debug, Serialize)]
struct PassengerRequest {
    #[serde(rename = "type")]
    passenger_type: &'static str,
}

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /air/offer_requests
#[derive(Debug, Deserialize)]
struct OfferRequestResponse {
    data: OfferRequestPayload,
}

#[derive(Debug, Deserialize)]
struct OfferRequestPayload {
    #[serde(default)]
    offers: Vec<DuffelOffer>,
    // Note: id, slices and passengers echo the request and are not used
}

#[derive(Debug, Deserialize)]
struct DuffelOffer {
    id: String,
    total_amount: String,
    total_currency: String,
    #[serde(default)]
    base_amount: Option<String>,
    #[serde(default)]
    slices: Vec<DuffelSlice>,
    // Note: tax_amount is implied by total minus base
}

#[derive(Debug, Deserialize)]
struct DuffelSlice {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    segments: Vec<DuffelSegment>,
}

#[derive(Debug, Deserialize)]
struct DuffelSegment {
    origin: DuffelPlace,
    destination: DuffelPlace,
    departing_at: String,
    arriving_at: String,
    marketing_carrier: DuffelCarrier,
    marketing_carrier_flight_number: String,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    passengers: Vec<SegmentPassenger>,
}

#[derive(Debug, Deserialize)]
struct DuffelPlace {
    iata_code: String,
}

#[derive(Debug, Deserialize)]
struct DuffelCarrier {
    iata_code: String,
}

#[derive(Debug, Deserialize)]
struct SegmentPassenger {
    #[serde(default)]
    fare_basis_code: Option<String>,
}

/// Response from /places/suggestions
#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    data: Vec<DuffelSuggestion>,
}

#[derive(Debug, Deserialize)]
struct DuffelSuggestion {
    /// "airport" or "city"
    #[serde(rename = "type")]
    place_type: String,
    name: String,
    #[serde(default)]
    iata_code: Option<String>,
    #[serde(default)]
    city_name: Option<String>,
    #[serde(default)]
    iata_country_code: Option<String>,
}

// ============================================================================
// DuffelProvider
// ============================================================================

/// Duffel flight data provider.
pub struct DuffelProvider {
    client: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
    tracker: CallTracker,
}

impl DuffelProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http::build_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
            tracker: CallTracker::new(PROVIDER_ID),
        }
    }

    fn token(&self) -> Result<String> {
        self.access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| FlightDataError::configuration(PROVIDER_ID, "provider not initialized"))
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .bearer_auth(token)
            .header("Duffel-Version", API_VERSION)
            .header("Accept", "application/json")
    }

    async fn fetch_offers(&self, params: &FlightSearchParams) -> Result<Vec<FlightOffer>> {
        let token = self.token()?;
        let body = build_offer_request(params);

        let request = self.authorized(
            self.client
                .post(format!("{}/air/offer_requests", self.base_url))
                .query(&[("return_offers", "true")])
                .json(&body),
            &token,
        );
        let response: OfferRequestResponse = http::send_json(PROVIDER_ID, request).await?;

        // Duffel has no result limit on offer requests
        let mut offers = normalize_offers(response.data.offers);
        offers.truncate(params.max_results);
        Ok(offers)
    }

    async fn fetch_places(&self, keyword: &str, limit: usize) -> Result<Vec<AirportRecord>> {
        let token = self.token()?;
        let request = self.authorized(
            self.client
                .get(format!("{}/places/suggestions", self.base_url))
                .query(&[("query", keyword.trim())]),
            &token,
        );
        let response: PlacesResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut records = normalize_places(response);
        records.truncate(limit);
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        let token = self.token()?;
        let request = self.authorized(
            self.client
                .get(format!("{}/air/airlines", self.base_url))
                .query(&[("limit", "1")]),
            &token,
        );
        http::send_text(PROVIDER_ID, request).await.map(|_| ())
    }
}

impl Default for DuffelProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn cabin_code(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "economy",
        CabinClass::PremiumEconomy => "premium_economy",
        CabinClass::Business => "business",
        CabinClass::First => "first",
    }
}

fn build_offer_request(params: &FlightSearchParams) -> OfferRequestBody {
    let mut slices = vec![SliceRequest {
        origin: params.origin.clone(),
        destination: params.destination.clone(),
        departure_date: http::iso_date(params.departure_date),
    }];
    if let Some(return_date) = params.return_date {
        slices.push(SliceRequest {
            origin: params.destination.clone(),
            destination: params.origin.clone(),
            departure_date: http::iso_date(return_date),
        });
    }

    let passengers = std::iter::repeat("adult")
        .take(usize::from(params.adults))
        .chain(std::iter::repeat("child").take(usize::from(params.children)))
        .chain(std::iter::repeat("infant_without_seat").take(usize::from(params.infants)))
        .map(|passenger_type| PassengerRequest { passenger_type })
        .collect();

    OfferRequestBody {
        data: OfferRequestData {
            slices,
            passengers,
            cabin_class: cabin_code(params.cabin_class),
            max_connections: params.direct_only.then_some(0),
        },
    }
}

fn normalize_offers(raw: Vec<DuffelOffer>) -> Vec<FlightOffer> {
    raw.into_iter()
        .filter_map(|offer| {
            let id = offer.id.clone();
            match normalize_offer(offer) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    warn!("Skipping Duffel offer {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn normalize_offer(raw: DuffelOffer) -> Result<FlightOffer> {
    let total = http::parse_amount(PROVIDER_ID, &raw.total_amount)?;
    let price = match raw.base_amount.as_deref() {
        Some(base) => Price::from_total_and_base(
            total,
            http::parse_amount(PROVIDER_ID, base)?,
            Decimal::ZERO,
            raw.total_currency.as_str(),
        ),
        None => Price::total_only(total, raw.total_currency.as_str()),
    };

    let mut fare_class = None;
    let mut itineraries = Vec::with_capacity(raw.slices.len());
    for slice in raw.slices {
        let mut segments = Vec::with_capacity(slice.segments.len());
        for seg in slice.segments {
            let departure = http::parse_local_datetime(PROVIDER_ID, &seg.departing_at)?;
            let arrival = http::parse_local_datetime(PROVIDER_ID, &seg.arriving_at)?;
            if fare_class.is_none() {
                fare_class = seg
                    .passengers
                    .first()
                    .and_then(|p| p.fare_basis_code.clone());
            }
            let duration_minutes = seg
                .duration
                .as_deref()
                .and_then(http::parse_iso_duration)
                .unwrap_or_else(|| u32::try_from((arrival - departure).num_minutes()).unwrap_or(0));
            segments.push(Segment {
                origin: seg.origin.iata_code,
                destination: seg.destination.iata_code,
                departure,
                arrival,
                carrier: seg.marketing_carrier.iata_code,
                flight_number: seg.marketing_carrier_flight_number,
                duration_minutes,
            });
        }
        if segments.is_empty() {
            return Err(FlightDataError::parse(PROVIDER_ID, "slice without segments"));
        }
        let duration = slice.duration.as_deref().and_then(http::parse_iso_duration);
        itineraries.push(Itinerary::new(segments, duration));
    }
    if itineraries.is_empty() {
        return Err(FlightDataError::parse(PROVIDER_ID, "offer without slices"));
    }

    Ok(FlightOffer::new(raw.id, PROVIDER_ID, price, itineraries).with_fare_class(fare_class))
}

fn normalize_places(response: PlacesResponse) -> Vec<AirportRecord> {
    response
        .data
        .into_iter()
        .filter_map(|place| {
            let code = place.iata_code?;
            let kind = match place.place_type.as_str() {
                "city" => LocationKind::City,
                "airport" => LocationKind::Airport,
                _ => return None,
            };
            Some(
                AirportRecord::new(code, place.name, kind, PROVIDER_ID)
                    .with_city(place.city_name)
                    .with_country(place.iata_country_code),
            )
        })
        .collect()
}

// ============================================================================
// FlightProvider implementation
// ============================================================================

#[async_trait]
impl FlightProvider for DuffelProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn initialize(&self, credentials: &ProviderCredentials) -> Result<()> {
        let token = credentials.require(PROVIDER_ID, "access_token")?;
        *self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        debug!("Duffel provider initialized");
        Ok(())
    }

    async fn search_flights(&self, params: &FlightSearchParams) -> ProviderReply<FlightOffer> {
        let started = Instant::now();
        let result = self.fetch_offers(params).await;
        self.tracker.complete("search_flights", started, result)
    }

    async fn search_airports(&self, params: &AirportSearchParams) -> ProviderReply<AirportRecord> {
        let started = Instant::now();
        let result = self.fetch_places(&params.keyword, params.limit).await;
        self.tracker.complete("search_airports", started, result)
    }

    async fn check_health(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self.ping().await;
        self.tracker.probe(started, result)
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.tracker.snapshot()
    }
}
