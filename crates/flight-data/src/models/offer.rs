//! Normalized flight offer model.
//!
//! Every adapter maps its vendor payload into [`FlightOffer`]. The vendor's
//! own offer id is kept for display and tie-breaking only; identity across
//! vendors is derived from the segments (see [`FlightOffer::segment_keys`]).

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price of an offer in a single currency.
///
/// `base`, `taxes` and `fees` are present when the vendor decomposes its
/// price. Constructors keep `total == base + taxes + fees` in that case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub total: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxes: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<Decimal>,

    pub currency: String,
}

impl Price {
    /// Build a price from its components; the total is derived.
    pub fn decomposed(
        base: Decimal,
        taxes: Decimal,
        fees: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            total: base + taxes + fees,
            base: Some(base),
            taxes: Some(taxes),
            fees: Some(fees),
            currency: currency.into(),
        }
    }

    /// Build a price when the vendor only reports a total.
    pub fn total_only(total: Decimal, currency: impl Into<String>) -> Self {
        Self {
            total,
            base: None,
            taxes: None,
            fees: None,
            currency: currency.into(),
        }
    }

    /// Build a price from a vendor total and base, attributing the remainder
    /// to taxes after subtracting known fees.
    pub fn from_total_and_base(
        total: Decimal,
        base: Decimal,
        fees: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let taxes = (total - base - fees).max(Decimal::ZERO);
        Self {
            total,
            base: Some(base),
            taxes: Some(taxes),
            fees: Some(fees),
            currency: currency.into(),
        }
    }

    /// True when the price is not decomposed or its components add up.
    pub fn is_consistent(&self) -> bool {
        match (self.base, self.taxes, self.fees) {
            (Some(base), Some(taxes), Some(fees)) => base + taxes + fees == self.total,
            _ => true,
        }
    }
}

/// One flown leg between two airports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub origin: String,
    pub destination: String,
    /// Local departure time at origin
    pub departure: NaiveDateTime,
    /// Local arrival time at destination
    pub arrival: NaiveDateTime,
    /// Marketing carrier IATA code
    pub carrier: String,
    /// Flight number without the carrier prefix
    pub flight_number: String,
    pub duration_minutes: u32,
}

/// Identity of a segment for cross-vendor matching. Times are compared
/// separately with a tolerance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey {
    pub origin: String,
    pub destination: String,
    pub carrier: String,
    pub flight_number: String,
}

impl Segment {
    pub fn key(&self) -> SegmentKey {
        SegmentKey {
            origin: self.origin.to_ascii_uppercase(),
            destination: self.destination.to_ascii_uppercase(),
            carrier: self.carrier.to_ascii_uppercase(),
            flight_number: normalize_flight_number(&self.flight_number),
        }
    }
}

/// Strip leading zeros so "0012" and "12" match across vendors.
fn normalize_flight_number(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

/// One direction of travel made of one or more segments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub segments: Vec<Segment>,
    /// Door-to-door duration including layovers
    pub duration_minutes: u32,
}

impl Itinerary {
    /// Build an itinerary, deriving the duration from the first departure and
    /// last arrival when the vendor does not report one.
    pub fn new(segments: Vec<Segment>, duration_minutes: Option<u32>) -> Self {
        let duration_minutes = duration_minutes.unwrap_or_else(|| {
            match (segments.first(), segments.last()) {
                (Some(first), Some(last)) => {
                    let span = last.arrival - first.departure;
                    u32::try_from(span.num_minutes()).unwrap_or(0)
                }
                _ => 0,
            }
        });
        Self {
            segments,
            duration_minutes,
        }
    }

    pub fn stops(&self) -> u32 {
        self.segments.len().saturating_sub(1) as u32
    }
}

/// One priced, bookable itinerary returned by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    /// Vendor's opaque offer id
    pub id: String,

    /// Provider that supplied this (lowest-priced) instance
    pub provider: String,

    pub price: Price,

    /// Outbound first, then return for round trips
    pub itineraries: Vec<Itinerary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare_class: Option<String>,

    /// Every provider that offered this logical flight, sorted
    pub offered_by: Vec<String>,
}

impl FlightOffer {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        price: Price,
        itineraries: Vec<Itinerary>,
    ) -> Self {
        let provider = provider.into();
        Self {
            id: id.into(),
            offered_by: vec![provider.clone()],
            provider,
            price,
            itineraries,
            seats_available: None,
            fare_class: None,
        }
    }

    pub fn with_seats(mut self, seats: Option<u32>) -> Self {
        self.seats_available = seats;
        self
    }

    pub fn with_fare_class(mut self, fare_class: Option<String>) -> Self {
        self.fare_class = fare_class;
        self
    }

    /// Local departure time of the first segment.
    pub fn departure(&self) -> Option<NaiveDateTime> {
        self.itineraries
            .first()
            .and_then(|it| it.segments.first())
            .map(|s| s.departure)
    }

    pub fn total_duration_minutes(&self) -> u32 {
        self.itineraries.iter().map(|it| it.duration_minutes).sum()
    }

    pub fn total_stops(&self) -> u32 {
        self.itineraries.iter().map(Itinerary::stops).sum()
    }

    /// True when every itinerary is non-stop.
    pub fn is_direct(&self) -> bool {
        self.itineraries.iter().all(|it| it.segments.len() == 1)
    }

    /// Segment identities across all itineraries, in travel order.
    pub fn segment_keys(&self) -> Vec<SegmentKey> {
        self.itineraries
            .iter()
            .flat_map(|it| it.segments.iter().map(Segment::key))
            .collect()
    }
}
