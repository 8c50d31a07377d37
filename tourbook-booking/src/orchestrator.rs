use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tourbook_catalog::PartySize;
use tourbook_core::{
    Booking, CapacityLedger, LedgerError, LedgerResult, Notifier, PaymentStatus, ReserveRequest,
    SeatAvailability,
};
use tourbook_shared::models::events::{
    BookingReservedEvent, BookingStatusChangedEvent, BookingUpdatedEvent, ReservationRejectedEvent,
};
use tourbook_shared::BookingEvent;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives the capacity ledger on behalf of callers and reports outcomes.
pub struct ReservationService {
    ledger: Arc<dyn CapacityLedger>,
    notifier: Arc<dyn Notifier>,
    conflict_retries: u32,
}

impl ReservationService {
    pub fn new(ledger: Arc<dyn CapacityLedger>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger,
            notifier,
            conflict_retries: 1,
        }
    }

    /// How many times a call is repeated after `ConcurrencyConflict`.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn ledger(&self) -> &Arc<dyn CapacityLedger> {
        &self.ledger
    }

    pub async fn reserve(&self, request: ReserveRequest) -> LedgerResult<Booking> {
        let tour_date_id = request.tour_date_id;
        let seats = request.party.seats();

        let result = self
            .retry_on_conflict("reserve", || self.ledger.reserve(request.clone()))
            .await;

        match &result {
            Ok(booking) => {
                info!(
                    booking_id = %booking.id,
                    %tour_date_id,
                    seats,
                    total_price = booking.total_price,
                    "Booking reserved"
                );
                self.publish(BookingEvent::BookingReserved(BookingReservedEvent {
                    booking_id: booking.id,
                    tour_date_id,
                    customer_id: booking.customer_id.clone(),
                    adults: booking.adults,
                    children: booking.children,
                    total_price: booking.total_price,
                    timestamp: Utc::now().timestamp(),
                }))
                .await;
            }
            Err(LedgerError::CapacityExceeded { available }) => {
                warn!(%tour_date_id, seats, available, "Reservation rejected: capacity exceeded");
                self.publish(BookingEvent::ReservationRejected(ReservationRejectedEvent {
                    tour_date_id,
                    booking_id: None,
                    requested_seats: seats,
                    available: *available,
                    timestamp: Utc::now().timestamp(),
                }))
                .await;
            }
            Err(e) => warn!(%tour_date_id, "Reservation failed: {}", e),
        }

        result
    }

    pub async fn update(&self, booking_id: Uuid, party: PartySize) -> LedgerResult<Booking> {
        let result = self
            .retry_on_conflict("update", || self.ledger.update_party(booking_id, party))
            .await;

        match &result {
            Ok(booking) => {
                info!(%booking_id, seats = booking.seats(), "Booking updated");
                self.publish(BookingEvent::BookingUpdated(BookingUpdatedEvent {
                    booking_id,
                    tour_date_id: booking.tour_date_id,
                    adults: booking.adults,
                    children: booking.children,
                    total_price: booking.total_price,
                    timestamp: Utc::now().timestamp(),
                }))
                .await;
            }
            Err(LedgerError::CapacityExceeded { available }) => {
                warn!(%booking_id, available, "Booking update rejected: capacity exceeded");
                if let Ok(Some(booking)) = self.ledger.get_booking(booking_id).await {
                    self.publish(BookingEvent::ReservationRejected(ReservationRejectedEvent {
                        tour_date_id: booking.tour_date_id,
                        booking_id: Some(booking_id),
                        requested_seats: party.seats(),
                        available: *available,
                        timestamp: Utc::now().timestamp(),
                    }))
                    .await;
                }
            }
            Err(e) => warn!(%booking_id, "Booking update failed: {}", e),
        }

        result
    }

    pub async fn set_status(&self, booking_id: Uuid, status: PaymentStatus) -> LedgerResult<Booking> {
        let (booking, previous) = self
            .retry_on_conflict("set_status", || self.ledger.set_status(booking_id, status))
            .await?;

        info!(%booking_id, from = %previous, to = %status, "Booking status changed");
        self.publish(BookingEvent::BookingStatusChanged(BookingStatusChangedEvent {
            booking_id,
            tour_date_id: booking.tour_date_id,
            from: previous.to_string(),
            to: status.to_string(),
            timestamp: Utc::now().timestamp(),
        }))
        .await;

        Ok(booking)
    }

    pub async fn availability(&self, tour_date_id: Uuid) -> LedgerResult<SeatAvailability> {
        self.ledger.availability(tour_date_id).await
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> LedgerResult<Booking> {
        self.ledger
            .get_booking(booking_id)
            .await?
            .ok_or(LedgerError::BookingNotFound(booking_id))
    }

    pub async fn delete_booking(&self, booking_id: Uuid) -> LedgerResult<Booking> {
        let booking = self.ledger.delete_booking(booking_id).await?;
        info!(%booking_id, status = %booking.payment_status, "Booking deleted");
        Ok(booking)
    }

    async fn retry_on_conflict<T, F, Fut>(&self, op: &'static str, mut call: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(LedgerError::ConcurrencyConflict) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(op, attempt, "Concurrency conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            error!(topic = event.topic(), "Failed to deliver booking event: {}", e);
        }
    }
}
