use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingReservedEvent {
    pub booking_id: Uuid,
    pub tour_date_id: Uuid,
    pub customer_id: String,
    pub adults: i32,
    pub children: i32,
    pub total_price: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingUpdatedEvent {
    pub booking_id: Uuid,
    pub tour_date_id: Uuid,
    pub adults: i32,
    pub children: i32,
    pub total_price: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingStatusChangedEvent {
    pub booking_id: Uuid,
    pub tour_date_id: Uuid,
    pub from: String,
    pub to: String,
    pub timestamp: i64,
}

/// A reserve or update attempt that did not fit the remaining seats.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ReservationRejectedEvent {
    pub tour_date_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub requested_seats: i32,
    pub available: i32,
    pub timestamp: i64,
}

/// Everything the notification collaborator is told about.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    BookingReserved(BookingReservedEvent),
    BookingUpdated(BookingUpdatedEvent),
    BookingStatusChanged(BookingStatusChangedEvent),
    ReservationRejected(ReservationRejectedEvent),
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::BookingReserved(_) => "booking.reserved",
            BookingEvent::BookingUpdated(_) => "booking.updated",
            BookingEvent::BookingStatusChanged(_) => "booking.status_changed",
            BookingEvent::ReservationRejected(_) => "booking.rejected",
        }
    }

    /// Partition key. Events for one tour date stay ordered.
    pub fn tour_date_id(&self) -> Uuid {
        match self {
            BookingEvent::BookingReserved(e) => e.tour_date_id,
            BookingEvent::BookingUpdated(e) => e.tour_date_id,
            BookingEvent::BookingStatusChanged(e) => e.tour_date_id,
            BookingEvent::ReservationRejected(e) => e.tour_date_id,
        }
    }
}
