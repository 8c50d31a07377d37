use async_trait::async_trait;
use tourbook_catalog::{Tour, TourDate, TourDatePatch};
use uuid::Uuid;

use crate::ledger::LedgerResult;

/// Admin-side access to tours and their scheduled dates.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn create_tour(&self, tour: Tour) -> LedgerResult<Tour>;

    async fn get_tour(&self, id: Uuid) -> LedgerResult<Option<Tour>>;

    /// Fails with `TourNotFound` unless the parent tour exists.
    async fn create_tour_date(&self, date: TourDate) -> LedgerResult<TourDate>;

    async fn get_tour_date(&self, id: Uuid) -> LedgerResult<Option<TourDate>>;

    async fn list_tour_dates(&self, tour_id: Uuid) -> LedgerResult<Vec<TourDate>>;

    /// Lowering capacity is checked against booked seats under the same
    /// guard the ledger uses for reservations.
    async fn update_tour_date(&self, id: Uuid, patch: TourDatePatch) -> LedgerResult<TourDate>;
}
