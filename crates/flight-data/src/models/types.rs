use std::borrow::Cow;

/// Provider identifier - mostly static constants like "AMADEUS"
pub type ProviderId = Cow<'static, str>;

/// IATA airport or city code (e.g. "LHR")
pub type IataCode = String;

/// Currency code (ISO 4217)
pub type Currency = String;
