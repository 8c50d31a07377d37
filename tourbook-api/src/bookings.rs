use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourbook_catalog::PartySize;
use tourbook_core::{Booking, PaymentStatus, ReserveRequest, SeatAvailability};
use tourbook_shared::Masked;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReserveRequestBody {
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    pub contact_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub tour_date_id: Uuid,
    pub customer_id: String,
    pub contact_email: Option<Masked<String>>,
    pub adults: i32,
    pub children: i32,
    pub seats: i32,
    pub payment_status: PaymentStatus,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            seats: b.seats(),
            id: b.id,
            tour_date_id: b.tour_date_id,
            customer_id: b.customer_id,
            contact_email: b.contact_email,
            adults: b.adults,
            children: b.children,
            payment_status: b.payment_status,
            total_price: b.total_price,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Routes that need no token.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/v1/tour-dates/{id}/availability", get(get_availability))
}

/// Routes behind `customer_auth_middleware`.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tour-dates/{id}/bookings", post(reserve_booking))
        .route("/v1/bookings/{id}", get(get_booking).put(update_booking))
        .route("/v1/bookings/{id}/status", post(change_status))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_availability(
    State(state): State<AppState>,
    Path(tour_date_id): Path<Uuid>,
) -> Result<Json<SeatAvailability>, AppError> {
    let availability = state.reservations.availability(tour_date_id).await?;
    Ok(Json(availability))
}

pub async fn reserve_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(tour_date_id): Path<Uuid>,
    Json(body): Json<ReserveRequestBody>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let party = PartySize::new(body.adults, body.children)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let contact_email = body.contact_email.or(claims.email);
    if let Some(email) = contact_email.as_deref() {
        if !email.contains('@') {
            return Err(AppError::ValidationError("Invalid contact email".to_string()));
        }
    }

    let result = state
        .reservations
        .reserve(ReserveRequest {
            tour_date_id,
            customer_id: claims.sub,
            contact_email: contact_email.map(Masked),
            party,
        })
        .await;
    state.metrics.record_reservation("reserve", &result);

    Ok((StatusCode::CREATED, Json(result?.into())))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = owned_booking(&state, &claims, booking_id).await?;
    Ok(Json(booking.into()))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let party = PartySize::new(body.adults, body.children)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;
    owned_booking(&state, &claims, booking_id).await?;

    let result = state.reservations.update(booking_id, party).await;
    state.metrics.record_reservation("update", &result);

    Ok(Json(result?.into()))
}

/// Customers may cancel or ask for a refund; payment itself is confirmed by staff.
pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<ChangeStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    if !matches!(body.status, PaymentStatus::Cancelled | PaymentStatus::Refunded) {
        return Err(AppError::AuthorizationError(format!(
            "Customers cannot set status {}",
            body.status
        )));
    }
    owned_booking(&state, &claims, booking_id).await?;

    let booking = state.reservations.set_status(booking_id, body.status).await?;
    state.metrics.record_status_change(body.status.as_str());

    Ok(Json(booking.into()))
}

async fn owned_booking(
    state: &AppState,
    claims: &CustomerClaims,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let booking = state.reservations.get_booking(booking_id).await?;
    if booking.customer_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "Booking belongs to another customer".to_string(),
        ));
    }
    Ok(booking)
}
