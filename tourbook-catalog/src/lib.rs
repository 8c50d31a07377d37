pub mod tour;
pub mod pricing;
pub mod inventory;

pub use tour::{Tour, TourDate, TourDatePatch, TourDateStatus, TourError};
pub use pricing::{PriceQuote, PricingError};
pub use inventory::{InventoryError, PartySize, SeatTally};
