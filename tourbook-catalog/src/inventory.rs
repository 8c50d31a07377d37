use serde::{Deserialize, Serialize};

/// Seats requested by one booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartySize {
    pub adults: i32,
    pub children: i32,
}

impl PartySize {
    /// At least one adult, no negative children.
    pub fn new(adults: i32, children: i32) -> Result<Self, InventoryError> {
        if adults < 1 {
            return Err(InventoryError::InvalidParty(format!(
                "adults must be at least 1, got {}",
                adults
            )));
        }
        if children < 0 {
            return Err(InventoryError::InvalidParty(format!(
                "children must not be negative, got {}",
                children
            )));
        }
        adults
            .checked_add(children)
            .ok_or_else(|| InventoryError::InvalidParty("party too large".to_string()))?;

        Ok(Self { adults, children })
    }

    pub fn seats(&self) -> i32 {
        self.adults + self.children
    }
}

/// Seat accounting for one tour date at a single point in time.
///
/// `booked` is the sum of seats held by every booking that still counts
/// against the date, so callers decide which bookings to feed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatTally {
    pub capacity: i32,
    pub booked: i64,
}

impl SeatTally {
    pub fn new(capacity: i32, booked: i64) -> Self {
        Self { capacity, booked }
    }

    pub fn from_parties<I>(capacity: i32, parties: I) -> Self
    where
        I: IntoIterator<Item = PartySize>,
    {
        let booked = parties.into_iter().map(|p| i64::from(p.seats())).sum();
        Self { capacity, booked }
    }

    /// Seats still free. Zero when the date is already at or above capacity.
    pub fn available(&self) -> i32 {
        let free = i64::from(self.capacity) - self.booked;
        free.clamp(0, i64::from(self.capacity.max(0))) as i32
    }

    /// Fails unless `requested` more seats fit under the ceiling.
    pub fn check_fit(&self, requested: i32) -> Result<(), InventoryError> {
        if self.booked + i64::from(requested) > i64::from(self.capacity) {
            return Err(InventoryError::InsufficientSeats {
                requested,
                available: self.available(),
            });
        }
        Ok(())
    }

    /// Fails if the ceiling would drop below seats already held.
    pub fn check_capacity_change(&self, new_capacity: i32) -> Result<(), InventoryError> {
        if i64::from(new_capacity) < self.booked {
            return Err(InventoryError::CapacityBelowBooked {
                capacity: new_capacity,
                booked: self.booked,
            });
        }
        Ok(())
    }

    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.booked as f64 / f64::from(self.capacity)
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Invalid party: {0}")]
    InvalidParty(String),

    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats {
        requested: i32,
        available: i32,
    },

    #[error("Capacity {capacity} is below {booked} booked seats")]
    CapacityBelowBooked {
        capacity: i32,
        booked: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_at_the_ceiling() {
        let tally = SeatTally::new(10, 8);

        assert_eq!(
            tally.check_fit(3),
            Err(InventoryError::InsufficientSeats { requested: 3, available: 2 })
        );
        assert!(tally.check_fit(2).is_ok());
    }

    #[test]
    fn test_tally_from_parties() {
        let parties = vec![PartySize::new(2, 0).unwrap(), PartySize::new(1, 3).unwrap()];
        let tally = SeatTally::from_parties(10, parties);

        assert_eq!(tally.booked, 6);
        assert_eq!(tally.available(), 4);
        assert!((tally.utilization() - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_available_never_negative() {
        let tally = SeatTally::new(4, 6);
        assert_eq!(tally.available(), 0);
        assert_eq!(
            tally.check_fit(1),
            Err(InventoryError::InsufficientSeats { requested: 1, available: 0 })
        );
    }

    #[test]
    fn test_capacity_change_guard() {
        let tally = SeatTally::new(10, 7);
        assert!(tally.check_capacity_change(7).is_ok());
        assert_eq!(
            tally.check_capacity_change(6),
            Err(InventoryError::CapacityBelowBooked { capacity: 6, booked: 7 })
        );
    }

    #[test]
    fn test_party_validation() {
        assert!(PartySize::new(0, 2).is_err());
        assert!(PartySize::new(1, -1).is_err());
        assert!(PartySize::new(i32::MAX, 1).is_err());
        assert_eq!(PartySize::new(1, 3).unwrap().seats(), 4);
    }
}
