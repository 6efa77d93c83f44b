use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::amadeus::AmadeusProvider;
use super::duffel::DuffelProvider;
use super::kiwi::KiwiProvider;
use super::skyscanner::SkyscannerProvider;
use super::FlightProvider;
use crate::errors::FlightDataError;

/// Known upstream vendors, used by configuration to build adapters by name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    Amadeus,
    Duffel,
    Kiwi,
    Skyscanner,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Amadeus,
        ProviderKind::Duffel,
        ProviderKind::Kiwi,
        ProviderKind::Skyscanner,
    ];

    /// Registry name of the adapter built for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amadeus => "AMADEUS",
            Self::Duffel => "DUFFEL",
            Self::Kiwi => "KIWI",
            Self::Skyscanner => "SKYSCANNER",
        }
    }

    /// Environment prefix for this vendor's credentials, e.g. `FS_KIWI_`.
    pub fn env_prefix(self) -> String {
        format!("FS_{}_", self.as_str())
    }

    /// Build an uninitialized adapter with production endpoints.
    pub fn build(self) -> Arc<dyn FlightProvider> {
        match self {
            Self::Amadeus => Arc::new(AmadeusProvider::new()),
            Self::Duffel => Arc::new(DuffelProvider::new()),
            Self::Kiwi => Arc::new(KiwiProvider::new()),
            Self::Skyscanner => Arc::new(SkyscannerProvider::new()),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = FlightDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AMADEUS" => Ok(Self::Amadeus),
            "DUFFEL" => Ok(Self::Duffel),
            "KIWI" | "TEQUILA" => Ok(Self::Kiwi),
            "SKYSCANNER" => Ok(Self::Skyscanner),
            other => Err(FlightDataError::ProviderNotFound(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_vendors() {
        assert_eq!("amadeus".parse::<ProviderKind>().unwrap(), ProviderKind::Amadeus);
        assert_eq!(" Kiwi ".parse::<ProviderKind>().unwrap(), ProviderKind::Kiwi);
        assert_eq!("tequila".parse::<ProviderKind>().unwrap(), ProviderKind::Kiwi);
        assert!(matches!(
            "expedia".parse::<ProviderKind>(),
            Err(FlightDataError::ProviderNotFound(_))
        ));
    }

    #[test]
    fn test_built_adapter_ids_match_kind() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.build().id(), kind.as_str());
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ProviderKind::Skyscanner.env_prefix(), "FS_SKYSCANNER_");
    }
}
