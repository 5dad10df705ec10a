use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TierSeating;
use crate::error::ServiceError;
use crate::models::{Event, Reservation};
use crate::service::{
    format_remaining, CancelOutcome, HistoryEntry, LookupTarget, ReservationService,
};
use crate::store::postgres::PgStore;
use crate::store::{NewEventData, ReservedSeat};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService<PgStore>>,
}

#[derive(Debug, Deserialize)]
pub struct SelectSeatsRequest {
    pub seats: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub reservation_id: Option<Uuid>,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub booked_time: chrono::DateTime<chrono::Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            event_id: r.event_id,
            status: r.status,
            booked_time: r.booked_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReservationDetailsResponse {
    pub reservation: ReservationResponse,
    pub seats: Vec<ReservedSeat>,
    pub total_price: BigDecimal,
    /// `MM:SS` left on the hold; absent once paid or lapsed.
    pub hold_remaining: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/:event_id/seats", get(seating_plan))
        .route("/events/:event_id/reservations", post(select_seats))
        .route("/reservations/:id", get(reservation_details).delete(cancel))
        .route("/reservations/:id/contact", post(attach_contact))
        .route("/reservations/:id/payment", post(confirm_payment))
        .route("/lookup", post(lookup))
        .route("/clients/:id/reservations", get(client_reservations))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<NewEventData>,
) -> Result<(StatusCode, Json<Event>), ServiceError> {
    let event = state.service.create_event(request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn seating_plan(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<TierSeating>>, ServiceError> {
    let plan = state.service.seating_plan(event_id).await?;
    Ok(Json(plan))
}

async fn select_seats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<SelectSeatsRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ServiceError> {
    let reservation = state.service.select_seats(event_id, &request.seats).await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

async fn reservation_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetailsResponse>, ServiceError> {
    let (reservation, seats, total_price) = state.service.reservation_details(id).await?;

    let hold_remaining = if reservation.is_paid() {
        None
    } else {
        state
            .service
            .remaining_hold_time(id)
            .await?
            .map(format_remaining)
    };

    Ok(Json(ReservationDetailsResponse {
        reservation: reservation.into(),
        seats,
        total_price,
        hold_remaining,
    }))
}

async fn attach_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<ReservationResponse>, ServiceError> {
    let reservation = state
        .service
        .attach_contact(id, &request.email, &request.first_name, &request.last_name)
        .await?;
    Ok(Json(reservation.into()))
}

/// Success callback from the payment gateway adapter.
async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, ServiceError> {
    let reservation = state.service.confirm_payment(id).await?;
    Ok(Json(reservation.into()))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ServiceError> {
    let status = match state.service.cancel(id).await? {
        CancelOutcome::Canceled => "canceled",
        CancelOutcome::AlreadyPaid => "already_paid",
    };
    Ok(Json(CancelResponse { status }))
}

async fn lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<LookupTarget>, ServiceError> {
    let target = state
        .service
        .find_reservation_or_client(request.reservation_id, &request.email)
        .await?;
    Ok(Json(target))
}

async fn client_reservations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, ServiceError> {
    let history = state.service.list_client_reservations(id).await?;
    Ok(Json(history))
}

async fn health_check() -> &'static str {
    "OK"
}
