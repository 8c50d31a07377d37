use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tourbook_catalog::{PartySize, PriceQuote, SeatTally, Tour, TourDate, TourDatePatch};
use tourbook_core::{
    BoxError, Booking, CapacityLedger, CatalogRepository, LedgerError, LedgerResult, Notifier,
    PaymentStatus, ReserveRequest, SeatAvailability,
};
use tourbook_shared::BookingEvent;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    tours: HashMap<Uuid, Tour>,
    dates: HashMap<Uuid, TourDate>,
    bookings: HashMap<Uuid, Booking>,
}

impl Store {
    /// Seats held on `date`, optionally leaving one booking out.
    fn tally(&self, date: &TourDate, exclude: Option<Uuid>) -> SeatTally {
        let parties = self
            .bookings
            .values()
            .filter(|b| b.tour_date_id == date.id && b.holds_seats())
            .filter(|b| Some(b.id) != exclude)
            .map(Booking::party);
        SeatTally::from_parties(date.capacity, parties)
    }

    fn active_date(&self, id: Uuid) -> LedgerResult<(&Tour, &TourDate)> {
        let date = self.dates.get(&id).ok_or(LedgerError::TourDateNotFound(id))?;
        if !date.is_active() {
            return Err(LedgerError::TourDateInactive(id));
        }
        let tour = self
            .tours
            .get(&date.tour_id)
            .ok_or(LedgerError::TourNotFound(date.tour_id))?;
        Ok((tour, date))
    }
}

/// Ledger and catalog held in process memory.
///
/// A single mutex covers every tour date, so each capacity check and the
/// write that follows it happen under one guard. Nothing awaits while the
/// guard is held.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    store: Arc<Mutex<Store>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|e| LedgerError::storage(format!("ledger lock poisoned: {}", e)))
    }
}

#[async_trait]
impl CapacityLedger for InMemoryLedger {
    async fn reserve(&self, request: ReserveRequest) -> LedgerResult<Booking> {
        let mut store = self.lock()?;

        let (tour, date) = store.active_date(request.tour_date_id)?;
        store.tally(date, None).check_fit(request.party.seats())?;
        let quote = PriceQuote::for_party(tour, date, request.party)?;

        let booking = Booking::new(
            request.tour_date_id,
            request.customer_id,
            request.contact_email,
            request.party,
            quote.total,
        );
        store.bookings.insert(booking.id, booking.clone());

        Ok(booking)
    }

    async fn update_party(&self, booking_id: Uuid, party: PartySize) -> LedgerResult<Booking> {
        let mut store = self.lock()?;

        let mut booking = store
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(LedgerError::BookingNotFound(booking_id))?;
        if !booking.payment_status.is_modifiable() {
            return Err(LedgerError::BookingNotModifiable {
                id: booking_id,
                status: booking.payment_status,
            });
        }

        let (tour, date) = store.active_date(booking.tour_date_id)?;
        store.tally(date, Some(booking_id)).check_fit(party.seats())?;
        let quote = PriceQuote::for_party(tour, date, party)?;

        booking.resize(party, quote.total);
        store.bookings.insert(booking_id, booking.clone());

        Ok(booking)
    }

    async fn set_status(
        &self,
        booking_id: Uuid,
        status: PaymentStatus,
    ) -> LedgerResult<(Booking, PaymentStatus)> {
        let mut store = self.lock()?;

        let booking = store
            .bookings
            .get_mut(&booking_id)
            .ok_or(LedgerError::BookingNotFound(booking_id))?;
        let previous = booking.transition_to(status)?;

        Ok((booking.clone(), previous))
    }

    async fn availability(&self, tour_date_id: Uuid) -> LedgerResult<SeatAvailability> {
        let store = self.lock()?;

        let date = store
            .dates
            .get(&tour_date_id)
            .ok_or(LedgerError::TourDateNotFound(tour_date_id))?;
        Ok(SeatAvailability::from_tally(tour_date_id, store.tally(date, None)))
    }

    async fn get_booking(&self, booking_id: Uuid) -> LedgerResult<Option<Booking>> {
        Ok(self.lock()?.bookings.get(&booking_id).cloned())
    }

    async fn list_bookings(&self, tour_date_id: Uuid) -> LedgerResult<Vec<Booking>> {
        let store = self.lock()?;
        let mut bookings: Vec<Booking> = store
            .bookings
            .values()
            .filter(|b| b.tour_date_id == tour_date_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn delete_booking(&self, booking_id: Uuid) -> LedgerResult<Booking> {
        let mut store = self.lock()?;

        let status = store
            .bookings
            .get(&booking_id)
            .map(|b| b.payment_status)
            .ok_or(LedgerError::BookingNotFound(booking_id))?;
        if status == PaymentStatus::Paid {
            return Err(LedgerError::PaidBookingDeletion(booking_id));
        }

        store
            .bookings
            .remove(&booking_id)
            .ok_or(LedgerError::BookingNotFound(booking_id))
    }
}

#[async_trait]
impl CatalogRepository for InMemoryLedger {
    async fn create_tour(&self, tour: Tour) -> LedgerResult<Tour> {
        self.lock()?.tours.insert(tour.id, tour.clone());
        Ok(tour)
    }

    async fn get_tour(&self, id: Uuid) -> LedgerResult<Option<Tour>> {
        Ok(self.lock()?.tours.get(&id).cloned())
    }

    async fn create_tour_date(&self, date: TourDate) -> LedgerResult<TourDate> {
        let mut store = self.lock()?;
        if !store.tours.contains_key(&date.tour_id) {
            return Err(LedgerError::TourNotFound(date.tour_id));
        }
        store.dates.insert(date.id, date.clone());
        Ok(date)
    }

    async fn get_tour_date(&self, id: Uuid) -> LedgerResult<Option<TourDate>> {
        Ok(self.lock()?.dates.get(&id).cloned())
    }

    async fn list_tour_dates(&self, tour_id: Uuid) -> LedgerResult<Vec<TourDate>> {
        let store = self.lock()?;
        let mut dates: Vec<TourDate> = store
            .dates
            .values()
            .filter(|d| d.tour_id == tour_id)
            .cloned()
            .collect();
        dates.sort_by_key(|d| d.starts_at);
        Ok(dates)
    }

    async fn update_tour_date(&self, id: Uuid, patch: TourDatePatch) -> LedgerResult<TourDate> {
        patch.validate()?;
        let mut store = self.lock()?;

        let mut date = store
            .dates
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TourDateNotFound(id))?;
        if let Some(capacity) = patch.capacity {
            store.tally(&date, None).check_capacity_change(capacity)?;
            date.capacity = capacity;
        }
        patch.apply_fields(&mut date);
        store.dates.insert(id, date.clone());

        Ok(date)
    }
}

/// Notifier that keeps every event it receives. Can be told to fail delivery.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<BookingEvent>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<BookingEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &BookingEvent) -> Result<(), BoxError> {
        self.events
            .lock()
            .map_err(|e| format!("recorder lock poisoned: {}", e))?
            .push(event.clone());
        if self.failing {
            return Err("notification channel unavailable".into());
        }
        Ok(())
    }
}
