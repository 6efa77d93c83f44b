//! Skyscanner Travel API request and response models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Status value reported once a live search stops changing.
pub const STATUS_COMPLETE: &str = "RESULT_STATUS_COMPLETE";

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateRequest {
    pub query: LiveQuery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuery {
    pub market: String,
    pub locale: String,
    pub currency: String,
    pub query_legs: Vec<QueryLeg>,
    pub cabin_class: &'static str,
    pub adults: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children_ages: Vec<u8>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nonstop_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLeg {
    pub origin_place_id: PlaceRef,
    pub destination_place_id: PlaceRef,
    pub date: QueryDate,
}

#[derive(Debug, Serialize)]
pub struct PlaceRef {
    pub iata: String,
}

#[derive(Debug, Serialize)]
pub struct QueryDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Serialize)]
pub struct AutosuggestRequest {
    pub query: AutosuggestQuery,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosuggestQuery {
    pub market: String,
    pub locale: String,
    pub search_term: String,
    pub included_entity_types: Vec<&'static str>,
}

// ============================================================================
// Responses
// ============================================================================

/// Response from both /create and /poll
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSearchResponse {
    #[serde(default)]
    pub session_token: Option<String>,
    pub status: String,
    #[serde(default)]
    pub content: LiveContent,
    // Note: action (replaced/omitted) is ignored; every poll carries full results
}

#[derive(Debug, Default, Deserialize)]
pub struct LiveContent {
    #[serde(default)]
    pub results: LiveResults,
}

/// Id-keyed result maps; offers are assembled by following the ids.
#[derive(Debug, Default, Deserialize)]
pub struct LiveResults {
    #[serde(default)]
    pub itineraries: HashMap<String, SkyItinerary>,
    #[serde(default)]
    pub legs: HashMap<String, SkyLeg>,
    #[serde(default)]
    pub segments: HashMap<String, SkySegment>,
    #[serde(default)]
    pub places: HashMap<String, SkyPlace>,
    #[serde(default)]
    pub carriers: HashMap<String, SkyCarrier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkyItinerary {
    #[serde(default)]
    pub pricing_options: Vec<PricingOption>,
    #[serde(default)]
    pub leg_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PricingOption {
    pub price: SkyPrice,
}

/// Integer amount scaled by `unit`
#[derive(Debug, Deserialize)]
pub struct SkyPrice {
    pub amount: String,
    /// PRICE_UNIT_WHOLE, PRICE_UNIT_CENTI, PRICE_UNIT_MILLI, PRICE_UNIT_MICRO
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkyLeg {
    #[serde(default)]
    pub duration_in_minutes: Option<u32>,
    #[serde(default)]
    pub segment_ids: Vec<String>,
    // Note: stopCount is derived from the segment list instead
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkySegment {
    pub origin_place_id: String,
    pub destination_place_id: String,
    pub departure_date_time: SkyDateTime,
    pub arrival_date_time: SkyDateTime,
    #[serde(default)]
    pub duration_in_minutes: Option<u32>,
    pub marketing_flight_number: String,
    pub marketing_carrier_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SkyDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
}

#[derive(Debug, Deserialize)]
pub struct SkyPlace {
    #[serde(default)]
    pub iata: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkyCarrier {
    #[serde(default)]
    pub iata: Option<String>,
}

/// Response from /v3/autosuggest/flights
#[derive(Debug, Deserialize)]
pub struct AutosuggestResponse {
    #[serde(default)]
    pub places: Vec<SuggestedPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedPlace {
    pub name: String,
    /// PLACE_TYPE_AIRPORT or PLACE_TYPE_CITY
    #[serde(rename = "type")]
    pub place_type: String,
    #[serde(default)]
    pub iata_code: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub country_id: Option<String>,
}
