use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourbook_catalog::{Tour, TourDate, TourDatePatch};
use tourbook_core::{LedgerError, PaymentStatus, SeatAvailability};
use uuid::Uuid;

use crate::bookings::{BookingResponse, ChangeStatusRequest};
use crate::error::AppError;
use crate::middleware::AdminClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub name: String,
    pub adult_price: i64,
    pub child_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTourDateRequest {
    pub starts_at: DateTime<Utc>,
    pub capacity: i32,
    pub price_override: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TourDetailResponse {
    #[serde(flatten)]
    pub tour: Tour,
    pub dates: Vec<TourDate>,
}

#[derive(Debug, Serialize)]
pub struct TourDateBookingsResponse {
    pub tour_date: TourDate,
    pub availability: SeatAvailability,
    pub bookings: Vec<BookingResponse>,
}

// ============================================================================
// Routes
// ============================================================================

/// Routes behind `admin_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/tours", post(create_tour))
        .route("/v1/admin/tours/{id}", get(get_tour))
        .route("/v1/admin/tours/{id}/dates", post(create_tour_date))
        .route("/v1/admin/tour-dates/{id}", patch(update_tour_date))
        .route("/v1/admin/tour-dates/{id}/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{id}/status", post(set_booking_status))
        .route("/v1/admin/bookings/{id}", delete(delete_booking))
}

// ============================================================================
// Tour Management
// ============================================================================

pub async fn create_tour(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Json(req): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    let tour = Tour::new(req.name, req.adult_price, req.child_price).map_err(LedgerError::from)?;
    let tour = state.catalog.create_tour(tour).await?;

    tracing::info!(tour_id = %tour.id, admin = %admin.sub, "Tour created");
    Ok((StatusCode::CREATED, Json(tour)))
}

pub async fn get_tour(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
) -> Result<Json<TourDetailResponse>, AppError> {
    let tour = state
        .catalog
        .get_tour(tour_id)
        .await?
        .ok_or(LedgerError::TourNotFound(tour_id))?;
    let dates = state.catalog.list_tour_dates(tour_id).await?;

    Ok(Json(TourDetailResponse { tour, dates }))
}

pub async fn create_tour_date(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(tour_id): Path<Uuid>,
    Json(req): Json<CreateTourDateRequest>,
) -> Result<(StatusCode, Json<TourDate>), AppError> {
    let date = TourDate::new(tour_id, req.starts_at, req.capacity, req.price_override)
        .map_err(LedgerError::from)?;
    let date = state.catalog.create_tour_date(date).await?;

    tracing::info!(
        tour_date_id = %date.id,
        %tour_id,
        capacity = date.capacity,
        admin = %admin.sub,
        "Tour date scheduled"
    );
    Ok((StatusCode::CREATED, Json(date)))
}

pub async fn update_tour_date(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(tour_date_id): Path<Uuid>,
    Json(patch): Json<TourDatePatch>,
) -> Result<Json<TourDate>, AppError> {
    let date = state.catalog.update_tour_date(tour_date_id, patch).await?;

    tracing::info!(
        %tour_date_id,
        capacity = date.capacity,
        status = %date.status,
        admin = %admin.sub,
        "Tour date updated"
    );
    Ok(Json(date))
}

// ============================================================================
// Booking Management
// ============================================================================

pub async fn list_bookings(
    State(state): State<AppState>,
    Path(tour_date_id): Path<Uuid>,
) -> Result<Json<TourDateBookingsResponse>, AppError> {
    let tour_date = state
        .catalog
        .get_tour_date(tour_date_id)
        .await?
        .ok_or(LedgerError::TourDateNotFound(tour_date_id))?;
    let availability = state.reservations.availability(tour_date_id).await?;
    let bookings = state
        .reservations
        .ledger()
        .list_bookings(tour_date_id)
        .await?
        .into_iter()
        .map(BookingResponse::from)
        .collect();

    Ok(Json(TourDateBookingsResponse {
        tour_date,
        availability,
        bookings,
    }))
}

pub async fn set_booking_status(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<ChangeStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.reservations.set_status(booking_id, body.status).await?;
    state.metrics.record_status_change(body.status.as_str());

    if body.status == PaymentStatus::Paid {
        tracing::info!(%booking_id, admin = %admin.sub, total_price = booking.total_price, "Payment confirmed");
    }
    Ok(Json(booking.into()))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reservations.delete_booking(booking_id).await?;
    tracing::info!(%booking_id, admin = %admin.sub, "Booking removed by admin");
    Ok(StatusCode::NO_CONTENT)
}
