//! Skyscanner Travel API flight data provider.
//!
//! This module provides flight data from the Skyscanner live pricing API:
//! - Offers via POST /v3/flights/live/search/create, then
//!   POST /v3/flights/live/search/poll/{sessionToken} until complete
//! - Airports and cities via POST /v3/autosuggest/flights
//!
//! Live results arrive as id-keyed maps (itineraries, legs, segments,
//! places, carriers) that are stitched together into offers here.
//! Prices are integers scaled by a unit (milli-units by default).
//! API documentation: https://developers.skyscanner.net/docs/intro

mod models;

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::http::{self, DEFAULT_HTTP_TIMEOUT};
use super::{CallTracker, FlightProvider, ProviderReply};
use crate::errors::{FlightDataError, Result};
use crate::models::{
    AirportRecord, AirportSearchParams, CabinClass, FlightOffer, FlightSearchParams, Itinerary,
    LocationKind, Price, ProviderCredentials, ProviderHealth, ProviderMetrics, Segment,
};
use models::{
    AutosuggestQuery, AutosuggestRequest, AutosuggestResponse, CreateRequest, LiveQuery,
    LiveResults, LiveSearchResponse, PlaceRef, QueryDate, QueryLeg, SkyDateTime, SkyItinerary,
    SkyPrice, STATUS_COMPLETE,
};

const BASE_URL: &str = "https://partners.api.skyscanner.net/apiservices";
const PROVIDER_ID: &str = "SKYSCANNER";

const DEFAULT_MARKET: &str = "US";
const DEFAULT_LOCALE: &str = "en-US";

/// Poll attempts after the create call before settling for partial results.
const MAX_POLLS: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Age sent for each child and infant traveller.
const CHILD_AGE: u8 = 8;
const INFANT_AGE: u8 = 1;

#[derive(Clone)]
struct SkyscannerCredentials {
    api_key: String,
    market: String,
    locale: String,
}

/// Skyscanner flight data provider.
pub struct SkyscannerProvider {
    client: Client,
    base_url: String,
    credentials: RwLock<Option<SkyscannerCredentials>>,
    poll_interval: Duration,
    tracker: CallTracker,
}

impl SkyscannerProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http::build_client(DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: RwLock::new(None),
            poll_interval: POLL_INTERVAL,
            tracker: CallTracker::new(PROVIDER_ID),
        }
    }

    fn credentials(&self) -> Result<SkyscannerCredentials> {
        self.credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| FlightDataError::configuration(PROVIDER_ID, "provider not initialized"))
    }

    fn authorized(request: RequestBuilder, credentials: &SkyscannerCredentials) -> RequestBuilder {
        request.header("x-api-key", credentials.api_key.as_str())
    }

    /// Create a live search session and poll it until complete.
    async fn run_live_search(
        &self,
        credentials: &SkyscannerCredentials,
        params: &FlightSearchParams,
    ) -> Result<LiveResults> {
        let body = CreateRequest {
            query: build_query(params, credentials),
        };
        let request = Self::authorized(
            self.client
                .post(format!("{}/v3/flights/live/search/create", self.base_url))
                .json(&body),
            credentials,
        );
        let mut response: LiveSearchResponse = http::send_json(PROVIDER_ID, request).await?;

        let session = response
            .session_token
            .clone()
            .ok_or_else(|| FlightDataError::parse(PROVIDER_ID, "create response without session"))?;

        let mut polls = 0;
        while response.status != STATUS_COMPLETE && polls < MAX_POLLS {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let request = Self::authorized(
                self.client.post(format!(
                    "{}/v3/flights/live/search/poll/{}",
                    self.base_url, session
                )),
                credentials,
            );
            response = http::send_json(PROVIDER_ID, request).await?;
            debug!("Skyscanner poll {} status {}", polls, response.status);
        }

        if response.status != STATUS_COMPLETE {
            debug!(
                "Skyscanner session still {} after {} polls, using partial results",
                response.status, polls
            );
        }
        Ok(response.content.results)
    }

    async fn fetch_offers(&self, params: &FlightSearchParams) -> Result<Vec<FlightOffer>> {
        let credentials = self.credentials()?;
        let results = self.run_live_search(&credentials, params).await?;
        Ok(assemble_offers(results, &params.currency, params.max_results))
    }

    async fn fetch_places(&self, keyword: &str, limit: usize) -> Result<Vec<AirportRecord>> {
        let credentials = self.credentials()?;
        let body = AutosuggestRequest {
            query: AutosuggestQuery {
                market: credentials.market.clone(),
                locale: credentials.locale.clone(),
                search_term: keyword.trim().to_string(),
                included_entity_types: vec!["PLACE_TYPE_CITY", "PLACE_TYPE_AIRPORT"],
            },
            limit,
        };
        let request = Self::authorized(
            self.client
                .post(format!("{}/v3/autosuggest/flights", self.base_url))
                .json(&body),
            &credentials,
        );
        let response: AutosuggestResponse = http::send_json(PROVIDER_ID, request).await?;

        let mut records = normalize_places(response);
        records.truncate(limit);
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        let credentials = self.credentials()?;
        let request = Self::authorized(
            self.client
                .get(format!("{}/v3/culture/currencies", self.base_url)),
            &credentials,
        );
        http::send_text(PROVIDER_ID, request).await.map(|_| ())
    }
}

impl Default for SkyscannerProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn cabin_code(cabin: CabinClass) -> &'static str {
    match cabin {
        CabinClass::Economy => "CABIN_CLASS_ECONOMY",
        CabinClass::PremiumEconomy => "CABIN_CLASS_PREMIUM_ECONOMY",
        CabinClass::Business => "CABIN_CLASS_BUSINESS",
        CabinClass::First => "CABIN_CLASS_FIRST",
    }
}

fn query_date(date: NaiveDate) -> QueryDate {
    use chrono::Datelike;
    QueryDate {
        year: date.year(),
        month: date.month(),
        day: date.day(),
    }
}

fn build_query(params: &FlightSearchParams, credentials: &SkyscannerCredentials) -> LiveQuery {
    let leg = |from: &str, to: &str, date: NaiveDate| QueryLeg {
        origin_place_id: PlaceRef {
            iata: from.to_string(),
        },
        destination_place_id: PlaceRef {
            iata: to.to_string(),
        },
        date: query_date(date),
    };

    let mut query_legs = vec![leg(&params.origin, &params.destination, params.departure_date)];
    if let Some(return_date) = params.return_date {
        query_legs.push(leg(&params.destination, &params.origin, return_date));
    }

    let children_ages = std::iter::repeat(CHILD_AGE)
        .take(usize::from(params.children))
        .chain(std::iter::repeat(INFANT_AGE).take(usize::from(params.infants)))
        .collect();

    LiveQuery {
        market: credentials.market.clone(),
        locale: credentials.locale.clone(),
        currency: params.currency.clone(),
        query_legs,
        cabin_class: cabin_code(params.cabin_class),
        adults: params.adults,
        children_ages,
        nonstop_only: params.direct_only,
    }
}

/// Convert a scaled integer price into a decimal amount.
fn price_amount(price: &SkyPrice) -> Result<Decimal> {
    let raw = http::parse_amount(PROVIDER_ID, &price.amount)?;
    let scale = match price.unit.as_deref() {
        Some("PRICE_UNIT_WHOLE") => 0,
        Some("PRICE_UNIT_CENTI") => 2,
        Some("PRICE_UNIT_MICRO") => 6,
        _ => 3,
    };
    Ok((raw / Decimal::from(10_i64.pow(scale))).normalize())
}

fn to_datetime(dt: &SkyDateTime) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(dt.year, dt.month, dt.day)
        .and_then(|d| d.and_hms_opt(dt.hour, dt.minute, dt.second))
        .ok_or_else(|| FlightDataError::parse(PROVIDER_ID, "invalid date-time parts"))
}

/// Stitch id-keyed live results into offers, cheapest first.
fn assemble_offers(results: LiveResults, currency: &str, max_results: usize) -> Vec<FlightOffer> {
    let mut offers: Vec<FlightOffer> = results
        .itineraries
        .iter()
        .filter_map(|(id, itinerary)| match assemble_offer(id, itinerary, &results, currency) {
            Ok(offer) => Some(offer),
            Err(e) => {
                warn!("Skipping Skyscanner itinerary {}: {}", id, e);
                None
            }
        })
        .collect();

    // Map order is arbitrary
    offers.sort_by(|a, b| a.price.total.cmp(&b.price.total).then_with(|| a.id.cmp(&b.id)));
    offers.truncate(max_results);
    offers
}

fn assemble_offer(
    id: &str,
    itinerary: &SkyItinerary,
    results: &LiveResults,
    currency: &str,
) -> Result<FlightOffer> {
    let total = itinerary
        .pricing_options
        .iter()
        .map(|option| price_amount(&option.price))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .min()
        .ok_or_else(|| FlightDataError::parse(PROVIDER_ID, "itinerary without pricing options"))?;

    let place = |place_id: &str| -> Result<String> {
        results
            .places
            .get(place_id)
            .and_then(|p| p.iata.clone())
            .ok_or_else(|| FlightDataError::parse(PROVIDER_ID, format!("unknown place {}", place_id)))
    };
    let carrier = |carrier_id: &str| -> Result<String> {
        results
            .carriers
            .get(carrier_id)
            .and_then(|c| c.iata.clone())
            .ok_or_else(|| {
                FlightDataError::parse(PROVIDER_ID, format!("unknown carrier {}", carrier_id))
            })
    };

    let mut itineraries = Vec::with_capacity(itinerary.leg_ids.len());
    for leg_id in &itinerary.leg_ids {
        let leg = results
            .legs
            .get(leg_id)
            .ok_or_else(|| FlightDataError::parse(PROVIDER_ID, format!("unknown leg {}", leg_id)))?;

        let mut segments = Vec::with_capacity(leg.segment_ids.len());
        for segment_id in &leg.segment_ids {
            let seg = results.segments.get(segment_id).ok_or_else(|| {
                FlightDataError::parse(PROVIDER_ID, format!("unknown segment {}", segment_id))
            })?;
            let departure = to_datetime(&seg.departure_date_time)?;
            let arrival = to_datetime(&seg.arrival_date_time)?;
            segments.push(Segment {
                origin: place(&seg.origin_place_id)?,
                destination: place(&seg.destination_place_id)?,
                departure,
                arrival,
                carrier: carrier(&seg.marketing_carrier_id)?,
                flight_number: seg.marketing_flight_number.clone(),
                duration_minutes: seg.duration_in_minutes.unwrap_or_else(|| {
                    u32::try_from((arrival - departure).num_minutes()).unwrap_or(0)
                }),
            });
        }
        if segments.is_empty() {
            return Err(FlightDataError::parse(PROVIDER_ID, "leg without segments"));
        }
        itineraries.push(Itinerary::new(segments, leg.duration_in_minutes));
    }
    if itineraries.is_empty() {
        return Err(FlightDataError::parse(PROVIDER_ID, "itinerary without legs"));
    }

    Ok(FlightOffer::new(
        id,
        PROVIDER_ID,
        Price::total_only(total, currency),
        itineraries,
    ))
}

fn normalize_places(response: AutosuggestResponse) -> Vec<AirportRecord> {
    response
        .places
        .into_iter()
        .filter_map(|place| {
            let code = place.iata_code?;
            let kind = match place.place_type.as_str() {
                "PLACE_TYPE_AIRPORT" => LocationKind::Airport,
                "PLACE_TYPE_CITY" => LocationKind::City,
                _ => return None,
            };
            Some(
                AirportRecord::new(code, place.name, kind, PROVIDER_ID)
                    .with_city(place.city_name)
                    .with_country(place.country_id),
            )
        })
        .collect()
}

// ============================================================================
// FlightProvider implementation
// ============================================================================

#[async_trait]
impl FlightProvider for SkyscannerProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn initialize(&self, credentials: &ProviderCredentials) -> Result<()> {
        let parsed = SkyscannerCredentials {
            api_key: credentials.require(PROVIDER_ID, "api_key")?,
            market: credentials
                .get("market")
                .unwrap_or(DEFAULT_MARKET)
                .to_ascii_uppercase(),
            locale: credentials
                .get("locale")
                .unwrap_or(DEFAULT_LOCALE)
                .to_string(),
        };
        *self
            .credentials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(parsed);
        debug!("Skyscanner provider initialized");
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
