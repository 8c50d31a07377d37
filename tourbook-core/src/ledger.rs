use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tourbook_catalog::{InventoryError, PartySize, PricingError, SeatTally, TourError};
use tourbook_shared::Masked;
use uuid::Uuid;

use crate::booking::{Booking, PaymentStatus, TransitionError};
use crate::BoxError;

/// A request for seats on one tour date.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub tour_date_id: Uuid,
    pub customer_id: String,
    pub contact_email: Option<Masked<String>>,
    pub party: PartySize,
}

/// Seat counts for a tour date as seen by the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatAvailability {
    pub tour_date_id: Uuid,
    pub capacity: i32,
    pub booked: i64,
    pub available: i32,
}

impl SeatAvailability {
    pub fn from_tally(tour_date_id: Uuid, tally: SeatTally) -> Self {
        Self {
            tour_date_id,
            capacity: tally.capacity,
            booked: tally.booked,
            available: tally.available(),
        }
    }
}

/// Seat accounting for tour dates.
///
/// Every write that can change the seats held against a tour date runs its
/// capacity check and its write as one atomic step per tour date. Concurrent
/// reservations against the same date are serialized; the loser sees
/// `CapacityExceeded`.
#[async_trait]
pub trait CapacityLedger: Send + Sync {
    /// Create a PENDING booking if the party fits the remaining seats.
    async fn reserve(&self, request: ReserveRequest) -> LedgerResult<Booking>;

    /// Resize a booking. Its own prior seats do not count against the new party.
    async fn update_party(&self, booking_id: Uuid, party: PartySize) -> LedgerResult<Booking>;

    /// Apply a payment status change. Returns the booking and its previous status.
    async fn set_status(
        &self,
        booking_id: Uuid,
        status: PaymentStatus,
    ) -> LedgerResult<(Booking, PaymentStatus)>;

    async fn availability(&self, tour_date_id: Uuid) -> LedgerResult<SeatAvailability>;

    async fn get_booking(&self, booking_id: Uuid) -> LedgerResult<Option<Booking>>;

    async fn list_bookings(&self, tour_date_id: Uuid) -> LedgerResult<Vec<Booking>>;

    /// Remove a booking row. Paid bookings are refused.
    async fn delete_booking(&self, booking_id: Uuid) -> LedgerResult<Booking>;
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Tour not found: {0}")]
    TourNotFound(Uuid),

    #[error("Tour date not found: {0}")]
    TourDateNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Tour date {0} is not active")]
    TourDateInactive(Uuid),

    #[error("Capacity exceeded: {available} seats available")]
    CapacityExceeded { available: i32 },

    #[error("Reservation conflicted with a concurrent update")]
    ConcurrencyConflict,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Booking {id} is {status} and cannot be modified")]
    BookingNotModifiable { id: Uuid, status: PaymentStatus },

    #[error("Capacity {capacity} is below {booked} booked seats")]
    CapacityBelowBooked { capacity: i32, booked: i64 },

    #[error("Booking {0} is paid and cannot be deleted")]
    PaidBookingDeletion(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] BoxError),
}

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::TourNotFound(_)
                | LedgerError::TourDateNotFound(_)
                | LedgerError::BookingNotFound(_)
        )
    }

    pub fn storage<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        LedgerError::Storage(err.into())
    }
}

impl From<InventoryError> for LedgerError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientSeats { available, .. } => {
                LedgerError::CapacityExceeded { available }
            }
            InventoryError::CapacityBelowBooked { capacity, booked } => {
                LedgerError::CapacityBelowBooked { capacity, booked }
            }
            InventoryError::InvalidParty(msg) => LedgerError::Validation(msg),
        }
    }
}

impl From<PricingError> for LedgerError {
    fn from(err: PricingError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

impl From<TourError> for LedgerError {
    fn from(err: TourError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}
