//! Search parameter models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{FlightDataError, Result};

/// Default number of offers returned when the caller does not say.
const DEFAULT_MAX_RESULTS: usize = 50;

/// Cabin class requested by the traveller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }
}

impl std::str::FromStr for CabinClass {
    type Err = FlightDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ECONOMY" | "M" => Ok(Self::Economy),
            "PREMIUM_ECONOMY" | "W" => Ok(Self::PremiumEconomy),
            "BUSINESS" | "C" => Ok(Self::Business),
            "FIRST" | "F" => Ok(Self::First),
            other => Err(FlightDataError::InvalidRequest(format!(
                "unknown cabin class '{}'",
                other
            ))),
        }
    }
}

/// Parameters for one logical flight search. Immutable per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchParams {
    /// Origin IATA code
    pub origin: String,

    /// Destination IATA code
    pub destination: String,

    /// Outbound date (local to origin)
    pub departure_date: NaiveDate,

    /// Inbound date for round trips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,

    pub adults: u8,

    #[serde(default)]
    pub children: u8,

    #[serde(default)]
    pub infants: u8,

    #[serde(default)]
    pub cabin_class: CabinClass,

    /// Requested currency (ISO 4217)
    pub currency: String,

    /// Upper bound on offers per provider and on the merged result
    pub max_results: usize,

    /// Only non-stop itineraries
    #[serde(default)]
    pub direct_only: bool,
}

impl FlightSearchParams {
    /// Create one-way economy parameters for a single adult.
    pub fn one_way(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_date: NaiveDate,
    ) -> Self {
        Self {
            origin: origin.into().trim().to_ascii_uppercase(),
            destination: destination.into().trim().to_ascii_uppercase(),
            departure_date,
            return_date: None,
            adults: 1,
            children: 0,
            infants: 0,
            cabin_class: CabinClass::Economy,
            currency: "USD".to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            direct_only: false,
        }
    }

    pub fn with_return(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn with_passengers(mut self, adults: u8, children: u8, infants: u8) -> Self {
        self.adults = adults;
        self.children = children;
        self.infants = infants;
        self
    }

    pub fn with_cabin(mut self, cabin_class: CabinClass) -> Self {
        self.cabin_class = cabin_class;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_ascii_uppercase();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn direct_only(mut self, direct_only: bool) -> Self {
        self.direct_only = direct_only;
        self
    }

    /// Total number of travellers across all passenger types.
    pub fn passenger_count(&self) -> u32 {
        u32::from(self.adults) + u32::from(self.children) + u32::from(self.infants)
    }

    /// Check the parameters before any provider is contacted.
    pub fn validate(&self) -> Result<()> {
        if !is_iata(&self.origin) {
            return Err(FlightDataError::InvalidRequest(format!(
                "origin '{}' is not a 3-letter IATA code",
                self.origin
            )));
        }
        if !is_iata(&self.destination) {
            return Err(FlightDataError::InvalidRequest(format!(
                "destination '{}' is not a 3-letter IATA code",
                self.destination
            )));
        }
        if self.origin.eq_ignore_ascii_case(&self.destination) {
            return Err(FlightDataError::InvalidRequest(
                "origin and destination must differ".to_string(),
            ));
        }
        if self.adults == 0 {
            return Err(FlightDataError::InvalidRequest(
                "at least one adult passenger is required".to_string(),
            ));
        }
        if self.infants > self.adults {
            return Err(FlightDataError::InvalidRequest(
                "each infant must travel with an adult".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(FlightDataError::InvalidRequest(
                "max_results must be greater than zero".to_string(),
            ));
        }
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(FlightDataError::InvalidRequest(
                    "return date is before departure date".to_string(),
                ));
            }
        }
        if self.currency.len() != 3 {
            return Err(FlightDataError::InvalidRequest(format!(
                "currency '{}' is not an ISO 4217 code",
                self.currency
            )));
        }
        Ok(())
    }
}

fn is_iata(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parameters for an airport/city lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportSearchParams {
    /// Free-text keyword (city, airport name or code)
    pub keyword: String,

    /// Maximum number of records
    pub limit: usize,
}

impl AirportSearchParams {
    pub fn new(keyword: impl Into<String>, limit: usize) -> Self {
        Self {
            keyword: keyword.into(),
            limit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().len() < 2 {
            return Err(FlightDataError::InvalidRequest(
                "airport keyword must have at least two characters".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(FlightDataError::InvalidRequest(
                "airport search limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
