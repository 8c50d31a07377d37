use async_trait::async_trait;
use tourbook_shared::BookingEvent;

use crate::BoxError;

/// Receives booking outcomes. Delivery failures never change a reservation's result.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> Result<(), BoxError>;
}

/// Writes events to the log only. Used when no broker is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &BookingEvent) -> Result<(), BoxError> {
        tracing::info!(
            topic = event.topic(),
            tour_date_id = %event.tour_date_id(),
            "Booking event: {:?}",
            event
        );
        Ok(())
    }
}
