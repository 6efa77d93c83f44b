//! Airport/city lookup records.

use serde::{Deserialize, Serialize};

/// Whether a record is a single airport or a metropolitan city code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Airport,
    City,
}

/// Normalized airport or city record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportRecord {
    /// IATA code (e.g., "LHR", or "LON" for a city)
    pub iata_code: String,

    /// Display name (e.g., "Heathrow")
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    /// ISO 3166-1 alpha-2 country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    pub kind: LocationKind,

    /// Provider that supplied the record
    pub source: String,
}

impl AirportRecord {
    pub fn new(
        iata_code: impl Into<String>,
        name: impl Into<String>,
        kind: LocationKind,
        source: impl Into<String>,
    ) -> Self {
        Self {
            iata_code: iata_code.into().to_ascii_uppercase(),
            name: name.into(),
            city: None,
            country_code: None,
            kind,
            source: source.into(),
        }
    }

    pub fn with_city(mut self, city: Option<String>) -> Self {
        self.city = city;
        self
    }

    pub fn with_country(mut self, country_code: Option<String>) -> Self {
        self.country_code = country_code.map(|c| c.to_ascii_uppercase());
        self
    }
}
