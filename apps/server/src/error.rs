use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use farescout_flight_data::FlightDataError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] FlightDataError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(e) => match e {
                FlightDataError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                FlightDataError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
                FlightDataError::DuplicateProvider(_) | FlightDataError::InvalidOperation(_) => {
                    StatusCode::CONFLICT
                }
                FlightDataError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
