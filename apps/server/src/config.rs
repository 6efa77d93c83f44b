use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use farescout_flight_data::{AggregatorConfig, CircuitBreakerConfig, ProviderKind};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Vendors to register, in registration order
    pub providers: Vec<ProviderKind>,
    pub primary_provider: Option<ProviderKind>,
    pub aggregator: AggregatorConfig,
    pub circuit: CircuitBreakerConfig,
    /// Zero disables the background health monitor
    pub health_interval: Duration,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = parse_var(
            "FS_LISTEN_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let cors_allow = parse_list(&var("FS_CORS_ALLOW_ORIGINS").unwrap_or_else(|| "*".into()));
        let timeout_ms: u64 = parse_var("FS_REQUEST_TIMEOUT_MS", 30_000)?;

        let providers = match var("FS_PROVIDERS") {
            Some(raw) => parse_list(&raw)
                .iter()
                .map(|name| name.parse::<ProviderKind>())
                .collect::<Result<Vec<_>, _>>()
                .context("Invalid FS_PROVIDERS")?,
            None => ProviderKind::ALL.to_vec(),
        };
        let primary_provider = var("FS_PRIMARY_PROVIDER")
            .map(|name| name.parse::<ProviderKind>())
            .transpose()
            .context("Invalid FS_PRIMARY_PROVIDER")?;

        let defaults = AggregatorConfig::default();
        let aggregator = AggregatorConfig {
            multi_provider: parse_var("FS_MULTI_PROVIDER", defaults.multi_provider)?,
            max_parallel_providers: parse_var(
                "FS_MAX_PARALLEL_PROVIDERS",
                defaults.max_parallel_providers,
            )?,
            default_provider_timeout: Duration::from_millis(parse_var(
                "FS_PROVIDER_TIMEOUT_MS",
                defaults.default_provider_timeout.as_millis() as u64,
            )?),
            dedup_tolerance: Duration::from_secs(parse_var(
                "FS_DEDUP_TOLERANCE_SECS",
                defaults.dedup_tolerance.as_secs(),
            )?),
        };

        let breaker = CircuitBreakerConfig::default();
        let circuit = CircuitBreakerConfig {
            failure_threshold: parse_var("FS_CIRCUIT_FAILURE_THRESHOLD", breaker.failure_threshold)?,
            base_cooldown: Duration::from_secs(parse_var(
                "FS_CIRCUIT_COOLDOWN_SECS",
                breaker.base_cooldown.as_secs(),
            )?),
            max_cooldown: Duration::from_secs(parse_var(
                "FS_CIRCUIT_MAX_COOLDOWN_SECS",
                breaker.max_cooldown.as_secs(),
            )?),
            ..breaker
        };

        let health_interval = Duration::from_secs(parse_var("FS_HEALTH_INTERVAL_SECS", 300)?);

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            providers,
            primary_provider,
            aggregator,
            circuit,
            health_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" AMADEUS, ,kiwi,"),
            vec!["AMADEUS".to_string(), "kiwi".to_string()]
        );
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: u32 = parse_var("FS_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
