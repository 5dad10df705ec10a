use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Storage-layer failures. Always unexpected: none of these are part of the
/// reservation workflow and they propagate to the generic 500 path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("seat claim lost a concurrent update race")]
    ClaimConflict,

    #[error("inconsistent storage state: {0}")]
    Inconsistent(String),
}

/// Expected, caller-visible outcomes of the reservation workflow, plus the
/// fatal `Storage` escape hatch.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("seats no longer available: {}", seats.join(", "))]
    SeatsUnavailable { seats: Vec<String> },

    #[error("reservation hold has expired")]
    ReservationExpired,

    #[error("reservation not found")]
    ReservationNotFound,

    #[error("event not found")]
    EventNotFound,

    #[error("client not found")]
    ClientNotFound,

    #[error("no client registered under {0}")]
    UnknownClientEmail(String),

    #[error("no seats were selected")]
    EmptySeatSelection,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::SeatsUnavailable { .. } => StatusCode::CONFLICT,
            ServiceError::ReservationExpired => StatusCode::GONE,
            ServiceError::ReservationNotFound
            | ServiceError::EventNotFound
            | ServiceError::ClientNotFound
            | ServiceError::UnknownClientEmail(_) => StatusCode::NOT_FOUND,
            ServiceError::EmptySeatSelection => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the log; the client gets the outcome only.
        let body = match &self {
            ServiceError::SeatsUnavailable { seats } => serde_json::json!({
                "error": "seats_unavailable",
                "seats": seats,
            }),
            ServiceError::Storage(e) => {
                error!(error = %e, "storage failure");
                serde_json::json!({ "error": "internal_error" })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
