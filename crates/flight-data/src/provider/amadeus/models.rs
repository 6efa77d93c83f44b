//! Amadeus Self-Service API response models.

use serde::Deserialize;

/// Response from /v1/security/oauth2/token
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    // Note: token_type, application_name, state exist but not used
}

/// Response from /v2/shopping/flight-offers
#[derive(Debug, Deserialize)]
pub struct FlightOffersResponse {
    #[serde(default)]
    pub data: Vec<AmadeusOffer>,
    // Note: meta and dictionaries (carrier names, aircraft) are ignored
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusOffer {
    pub id: String,
    #[serde(default)]
    pub number_of_bookable_seats: Option<u32>,
    #[serde(default)]
    pub itineraries: Vec<AmadeusItinerary>,
    pub price: AmadeusPrice,
    #[serde(default)]
    pub traveler_pricings: Vec<TravelerPricing>,
}

#[derive(Debug, Deserialize)]
pub struct AmadeusItinerary {
    /// ISO-8601 duration, e.g. "PT5H30M"
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<AmadeusSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusSegment {
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    pub carrier_code: String,
    pub number: String,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightEndpoint {
    pub iata_code: String,
    /// Local time without offset
    pub at: String,
}

/// Amounts are decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusPrice {
    pub currency: String,
    pub total: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub fees: Vec<AmadeusFee>,
    // Note: grandTotal includes ancillaries, total is the fare price
}

#[derive(Debug, Deserialize)]
pub struct AmadeusFee {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelerPricing {
    #[serde(default)]
    pub fare_details_by_segment: Vec<FareDetail>,
}

#[derive(Debug, Deserialize)]
pub struct FareDetail {
    /// Booking class letter
    #[serde(default, rename = "class")]
    pub booking_class: Option<String>,
}

/// Response from /v1/reference-data/locations
#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub data: Vec<AmadeusLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmadeusLocation {
    /// "AIRPORT" or "CITY"
    pub sub_type: String,
    pub name: String,
    #[serde(default)]
    pub iata_code: Option<String>,
    #[serde(default)]
    pub address: Option<LocationAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAddress {
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}
