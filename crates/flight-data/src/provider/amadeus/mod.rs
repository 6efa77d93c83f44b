//! Amadeus Self-Service flight data provider.
//!
//! This module provides flight data from the Amadeus Self-Service APIs:
//! - Offers via GET /v2/shopping/flight-offers
//! - Airports and cities via GET /v1/reference-data/locations
//!
//! Every call needs an OAuth2 bearer token obtained with the client
//! credentials grant. Tokens are cached until shortly before expiry and are
//! dropped whenever credentials are rotated.
//! API documentation: https://developers.amadeus.com/self-service

mod models;

use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::{CallTracker, FlightProvider, ProviderReply};
use crate::errors::{FlightDataError, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, FlightOffer, FlightSearchParams, Itinerary, LocationKind,
    Price, ProviderCredentials, ProviderHealth, ProviderMetrics, Segment,
};
use models::{AmadeusOffer, FlightOffersResponse, LocationsResponse, TokenResponse};

const BASE_URL: &str = "https://api.amadeus.com";
const PROVIDER_ID: &str = "AMADEUS";

/// Refresh tokens this long before the vendor expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Hard cap the vendor puts on the `max` query parameter.
const MAX_OFFERS_PER_REQUEST: usize = 250;

#[derive(Clone)]
struct AmadeusCredentials {
    client_id: String,
    client_secret: String,
}

#[derive(Clone)]
struct CachedToken {
    /// Client the token was issued to
    client_id: String,
    value: String,
    expires_at: Instant,
}

/// Amadeus flight data provider.
pub struct AmadeusProvider {
    client: Client,
    base_url: String,
    credentials: RwLock<Option<AmadeusCredentials>>,
    token: Mutex<Option<CachedToken>>,
    tracker: CallTracker,
}

impl AmadeusProvider {
    /// Create a provider against the production endpoint.
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Create a provider against another endpoint (test environment or stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http::build_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: RwLock::new(None),
            token: Mutex::new(None),
            tracker: CallTracker::new(PROVIDER_ID),
        }
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<CachedToken>> {
        self.token.lock().unwrap_or_else(|poisoned| {
            warn!("Amadeus token mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn credentials(&self) -> Result<AmadeusCredentials> {
        let guard = self
            .credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .clone()
            .ok_or_else(|| FlightDataError::configuration(PROVIDER_ID, "provider not initialized"))
    }

    /// Return a valid bearer token, requesting a new one when needed.
    async fn access_token(&self, credentials: &AmadeusCredentials) -> Result<String> {
        {
            let cached = self.lock_token();
            if let Some(token) = cached.as_ref() {
                if token.client_id == credentials.client_id && token.expires_at > Instant::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        debug!("Requesting new Amadeus access token");
        let request = self
            .client
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ]);
        let response: TokenResponse = http::send_json(PROVIDER_ID, request).await?;

        let lifetime =
            Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.lock_token() = Some(CachedToken {
            client_id: credentials.client_id.clone(),
            value: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(response.access_token)
    }

    async fn fetch_offers(&self, params: &FlightSearchParams) -> Result<Vec<FlightOffer>> {
        let credentials = self.credentials()?;
        let token = self.access_token(&credentials).await?;

        let mut query: Vec<(&str, String)> = vec![
            ("originLocationCode", params.origin.clone()),
            ("destinationLocationCode", params.destination.clone()),
            ("departureDate", http::iso_date(params.departure_date)),
            ("adults", params.adults.to_string()),
            ("travelClass", params.cabin_class.as_str().to_string()),
            ("currencyCode", params.currency.clone()),
            (
                "max",
                params.max_results.min(MAX_OFFERS_PER_REQUEST).to_string(),
            ),
        ];
        if let Some(return_date) = params.return_date {
            query.push(("returnDate", http::iso_date(return_date)));
        }
        if params.children > 0 {
            query.push(("children", params.children.to_string()));
        }
        if params.infants > 0 {
            query.push(("infants", params.infants.to_string()));
        }
        if params.direct_only {
            query.push(("nonStop", "true".to_string()));
        }

        let request = self
            .client
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(token)
            .query(&query);
        let response: FlightOffersResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut offers = normalize_offers(response);
        offers.truncate(params.max_results);
        Ok(offers)
    }

    async fn fetch_locations(&self, keyword: &str, limit: usize) -> Result<Vec<AirportRecord>> {
        let credentials = self.credentials()?;
        let token = self.access_token(&credentials).await?;

        let request = self
            .client
            .get(format!("{}/v1/reference-data/locations", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("subType", "AIRPORT,CITY".to_string()),
                ("keyword", keyword.trim().to_ascii_uppercase()),
                ("page[limit]", limit.to_string()),
            ]);
        let response: LocationsResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut records = normalize_locations(response);
        records.truncate(limit);
        Ok(records)
    }
}

impl Default for AmadeusProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Normalization
// ============================================================================

fn normalize_offers(response: FlightOffersResponse) -> Vec<FlightOffer> {
    response
        .data
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id.clone();
            match normalize_offer(raw) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    warn!("Skipping Amadeus offer {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn normalize_offer(raw: AmadeusOffer) -> Result<FlightOffer> {
    let total = http::parse_amount(PROVIDER_ID, &raw.price.total)?;
    let fees = raw
        .price
        .fees
        .iter()
        .map(|fee| http::parse_amount(PROVIDER_ID, &fee.amount))
        .sum::<Result<Decimal>>()?;
    let price = match raw.price.base.as_deref() {
        Some(base) => Price::from_total_and_base(
            total,
            http::parse_amount(PROVIDER_ID, base)?,
            fees,
            raw.price.currency.as_str(),
        ),
        None => Price::total_only(total, raw.price.currency.as_str()),
    };

    let mut itineraries = Vec::with_capacity(raw.itineraries.len());
    for itinerary in raw.itineraries {
        let mut segments = Vec::with_capacity(itinerary.segments.len());
        for seg in itinerary.segments {
            let departure = http::parse_local_datetime(PROVIDER_ID, &seg.departure.at)?;
            let arrival = http::parse_local_datetime(PROVIDER_ID, &seg.arrival.at)?;
            let duration_minutes = seg
                .duration
                .as_deref()
                .and_then(http::parse_iso_duration)
                .unwrap_or_else(|| u32::try_from((arrival - departure).num_minutes()).unwrap_or(0));
            segments.push(Segment {
                origin: seg.departure.iata_code,
                destination: seg.arrival.iata_code,
                departure,
                arrival,
                carrier: seg.carrier_code,
                flight_number: seg.number,
                duration_minutes,
            });
        }
        if segments.is_empty() {
            return Err(FlightDataError::parse(PROVIDER_ID, "itinerary without segments"));
        }
        let duration = itinerary.duration.as_deref().and_then(http::parse_iso_duration);
        itineraries.push(Itinerary::new(segments, duration));
    }
    if itineraries.is_empty() {
        return Err(FlightDataError::parse(PROVIDER_ID, "offer without itineraries"));
    }

    let fare_class = raw
        .traveler_pricings
        .first()
        .and_then(|tp| tp.fare_details_by_segment.first())
        .and_then(|fd| fd.booking_class.clone());

    Ok(FlightOffer::new(raw.id, PROVIDER_ID, price, itineraries)
        .with_seats(raw.number_of_bookable_seats)
        .with_fare_class(fare_class))
}

fn normalize_locations(response: LocationsResponse) -> Vec<AirportRecord> {
    response
        .data
        .into_iter()
        .filter_map(|loc| {
            let code = loc.iata_code?;
            let kind = if loc.sub_type.eq_ignore_ascii_case("CITY") {
                LocationKind::City
            } else {
                LocationKind::Airport
            };
            let (city, country) = match loc.address {
                Some(address) => (address.city_name, address.country_code),
                None => (None, None),
            };
            Some(
                AirportRecord::new(code, loc.name, kind, PROVIDER_ID)
                    .with_city(city)
                    .with_country(country),
            )
        })
        .collect()
}

// ============================================================================
// FlightProvider implementation
// ============================================================================

#[async_trait]
impl FlightProvider for AmadeusProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn initialize(&self, credentials: &ProviderCredentials) -> Result<()> {
        let parsed = AmadeusCredentials {
            client_id: credentials.require(PROVIDER_ID, "client_id")?,
            client_secret: credentials.require(PROVIDER_ID, "client_secret")?,
        };

        *self
            .credentials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(parsed);
        *self.lock_token() = None;

        debug!("Amadeus provider initialized");
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
        let result = self.fetch_locations("LON", 1).await.map(|_| ());
        self.tracker.probe(started, result)
    }

    fn get_metrics(&self) -> ProviderMetrics {
        self.tracker.snapshot()
    }
}
