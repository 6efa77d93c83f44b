//! HTTP plumbing shared by the vendor adapters.
//!
//! Maps reqwest failures and HTTP statuses onto [`FlightDataError`] the same
//! way for every vendor, so adapters only deal with their payload shapes.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{FlightDataError, Result};

/// Upper bound on any single vendor HTTP exchange.
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

/// Build the HTTP client used by an adapter.
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a request and return the raw body of a successful response.
pub(crate) async fn send_text(provider: &'static str, request: RequestBuilder) -> Result<String> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FlightDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            FlightDataError::provider(provider, format!("Request failed: {}", e))
        }
    })?;

    let status = response.status();
    debug!("{} responded with HTTP {}", provider, status);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FlightDataError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FlightDataError::provider(
            provider,
            "Credentials rejected by vendor",
        ));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(FlightDataError::provider(
            provider,
            format!("HTTP {} - {}", status, snippet),
        ));
    }

    response
        .text()
        .await
        .map_err(|e| FlightDataError::provider(provider, format!("Failed to read response: {}", e)))
}

/// Send a request and decode a successful JSON response.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T> {
    let text = send_text(provider, request).await?;
    decode(provider, &text)
}

/// Decode a vendor payload, mapping failures to a parse error.
pub(crate) fn decode<T: DeserializeOwned>(provider: &'static str, text: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| FlightDataError::parse(provider, format!("Failed to parse response: {}", e)))
}

/// Parse an ISO-8601 duration such as `PT2H35M` or `P1DT3H` into minutes.
pub(crate) fn parse_iso_duration(raw: &str) -> Option<u32> {
    let rest = raw.trim().strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut minutes: u32 = 0;
    let mut number = String::new();

    for c in date_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'D' => {
                minutes = minutes.checked_add(number.parse::<u32>().ok()?.checked_mul(24 * 60)?)?;
                number.clear();
            }
            _ => return None,
        }
    }
    for c in time_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'H' => {
                minutes = minutes.checked_add(number.parse::<u32>().ok()?.checked_mul(60)?)?;
                number.clear();
            }
            'M' => {
                minutes = minutes.checked_add(number.parse::<u32>().ok()?)?;
                number.clear();
            }
            'S' => number.clear(),
            _ => return None,
        }
    }

    if number.is_empty() {
        Some(minutes)
    } else {
        None
    }
}

/// Parse a vendor local timestamp, tolerating seconds fractions and a
/// trailing `Z` that some vendors attach to local times.
pub(crate) fn parse_local_datetime(provider: &'static str, raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    let trimmed = match trimmed.find('+') {
        Some(idx) if idx > 10 => &trimmed[..idx],
        _ => trimmed,
    };

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .map_err(|e| FlightDataError::parse(provider, format!("Invalid timestamp '{}': {}", raw, e)))
}

/// Parse a vendor decimal amount sent as a string.
pub(crate) fn parse_amount(provider: &'static str, raw: &str) -> Result<Decimal> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|e| FlightDataError::parse(provider, format!("Invalid amount '{}': {}", raw, e)))
}

/// Format a date the way most vendors expect it.
pub(crate) fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT2H35M"), Some(155));
        assert_eq!(parse_iso_duration("PT45M"), Some(45));
        assert_eq!(parse_iso_duration("PT11H"), Some(660));
        assert_eq!(parse_iso_duration("P1DT2H"), Some(1560));
        assert_eq!(parse_iso_duration("PT1H30M20S"), Some(90));
    }

    #[test]
    fn test_parse_iso_duration_rejects_garbage() {
        assert_eq!(parse_iso_duration("2H35M"), None);
        assert_eq!(parse_iso_duration("PT2X"), None);
        assert_eq!(parse_iso_duration("PT12"), None);
    }

    #[test]
    fn test_parse_local_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2026, 11, 2)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        assert_eq!(
            parse_local_datetime("TEST", "2026-11-02T08:05:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_local_datetime("TEST", "2026-11-02T08:05:00.000Z").unwrap(),
            expected
        );
        assert_eq!(
            parse_local_datetime("TEST", "2026-11-02T08:05").unwrap(),
            expected
        );
        assert!(parse_local_datetime("TEST", "02/11/2026 08:05").is_err());
    }

    #[test]
    fn test_decode_maps_to_parse_error() {
        let result: Result<serde_json::Value> = decode("TEST", "{not json");
        assert!(matches!(result, Err(FlightDataError::Parse { .. })));
    }
}
