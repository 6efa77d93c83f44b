use std::sync::Arc;

use farescout_flight_data::{
    AdminService, FlightAggregator, HealthMonitor, InMemoryAuditLog, ProviderCredentials,
    ProviderRegistry,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub aggregator: Arc<FlightAggregator>,
    pub admin: Arc<AdminService>,
    pub health: HealthMonitor,
    pub audit_log: InMemoryAuditLog,
}

pub fn init_tracing() {
    let log_format = std::env::var("FS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Register the configured vendors and wire the services around them.
///
/// A vendor whose credentials are missing is still registered; its calls
/// fail soft as configuration errors and it shows up in the admin view.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let registry = Arc::new(ProviderRegistry::with_breaker_config(config.circuit.clone()));

    for kind in &config.providers {
        let adapter = kind.build();
        let credentials = ProviderCredentials::from_env(&kind.env_prefix());
        if let Err(e) = adapter.initialize(&credentials) {
            tracing::warn!("Provider {} is not configured: {}", kind, e);
        }

        let mut settings = config.aggregator.provider_settings();
        if config.primary_provider == Some(*kind) {
            settings = settings.as_primary();
        }
        registry.register(adapter, settings)?;
    }

    if registry.is_empty() {
        tracing::warn!("No flight providers configured; searches will return no offers");
    }

    let audit_log = InMemoryAuditLog::new();
    let aggregator = Arc::new(FlightAggregator::with_config(
        Arc::clone(&registry),
        config.aggregator.clone(),
    ));
    let admin = Arc::new(AdminService::new(
        Arc::clone(&registry),
        Arc::new(audit_log.clone()),
    ));
    let health = HealthMonitor::new(Arc::clone(&registry));

    Ok(Arc::new(AppState {
        registry,
        aggregator,
        admin,
        health,
        audit_log,
    }))
}
