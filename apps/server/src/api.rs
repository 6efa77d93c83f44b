use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use farescout_flight_data::{
    admin::CommandResult, AdminCommand, AirportRecord, AirportSearchParams, AuditEntry,
    CabinClass, FlightSearchParams, ProviderSnapshot, SearchOutcome,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Header naming the operator behind an admin command.
pub const ACTOR_HEADER: &str = "x-actor";

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightSearchQuery {
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
    adults: Option<u8>,
    children: Option<u8>,
    infants: Option<u8>,
    cabin_class: Option<String>,
    currency: Option<String>,
    max_results: Option<usize>,
    direct_only: Option<bool>,
}

impl FlightSearchQuery {
    fn into_params(self) -> ApiResult<FlightSearchParams> {
        let mut params =
            FlightSearchParams::one_way(self.origin, self.destination, self.departure_date)
                .with_passengers(
                    self.adults.unwrap_or(1),
                    self.children.unwrap_or(0),
                    self.infants.unwrap_or(0),
                )
                .direct_only(self.direct_only.unwrap_or(false));
        if let Some(return_date) = self.return_date {
            params = params.with_return(return_date);
        }
        if let Some(cabin) = self.cabin_class {
            params = params.with_cabin(cabin.parse::<CabinClass>()?);
        }
        if let Some(currency) = self.currency {
            params = params.with_currency(currency);
        }
        if let Some(max_results) = self.max_results {
            params = params.with_max_results(max_results);
        }
        Ok(params)
    }
}

async fn search_flights(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FlightSearchQuery>,
) -> ApiResult<Json<SearchOutcome>> {
    let params = query.into_params()?;
    let outcome = state.aggregator.search(&params).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct AirportQuery {
    keyword: String,
    limit: Option<usize>,
}

async fn search_airports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AirportQuery>,
) -> ApiResult<Json<Vec<AirportRecord>>> {
    let params = AirportSearchParams::new(query.keyword, query.limit.unwrap_or(10));
    let records = state.aggregator.search_airports(&params).await?;
    Ok(Json(records))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderSnapshot>> {
    Json(state.admin.overview())
}

async fn provider_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(command): Json<AdminCommand>,
) -> ApiResult<Json<CommandResult>> {
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {} header", ACTOR_HEADER)))?;
    let result = state.admin.execute(actor, command).await?;
    Ok(Json(result))
}

async fn audit_log(State(state): State<Arc<AppState>>) -> Json<Vec<AuditEntry>> {
    Json(state.audit_log.entries())
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<HeaderValue>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/flights/search", get(search_flights))
        .route("/airports/search", get(search_airports))
        .route("/admin/providers", get(list_providers))
        .route("/admin/providers/command", post(provider_command))
        .route("/admin/audit", get(audit_log));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
