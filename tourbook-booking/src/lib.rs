pub mod memory;
pub mod orchestrator;

pub use memory::{InMemoryLedger, RecordingNotifier};
pub use orchestrator::ReservationService;
