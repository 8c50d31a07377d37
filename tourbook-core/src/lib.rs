pub mod booking;
pub mod ledger;
pub mod notify;
pub mod repository;

pub use booking::{Booking, PaymentStatus, TransitionError};
pub use ledger::{CapacityLedger, LedgerError, LedgerResult, ReserveRequest, SeatAvailability};
pub use notify::{LogNotifier, Notifier};
pub use repository::CatalogRepository;

/// Boxed error used at the storage and delivery seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
