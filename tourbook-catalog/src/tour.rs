use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Whether a tour date accepts new reservations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TourDateStatus {
    Active,
    Inactive,
}

impl TourDateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourDateStatus::Active => "ACTIVE",
            TourDateStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for TourDateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TourDateStatus {
    type Err = TourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(TourDateStatus::Active),
            "INACTIVE" => Ok(TourDateStatus::Inactive),
            other => Err(TourError::UnknownStatus(other.to_string())),
        }
    }
}

/// A bookable tour. Prices are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub adult_price: i64,
    pub child_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(name: impl Into<String>, adult_price: i64, child_price: i64) -> Result<Self, TourError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TourError::EmptyName);
        }
        validate_price(adult_price)?;
        validate_price(child_price)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            adult_price,
            child_price,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A scheduled occurrence of a [`Tour`] with its own seat ceiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TourDate {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub capacity: i32,
    pub status: TourDateStatus,
    /// Replaces the tour's adult price for this date only.
    pub price_override: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TourDate {
    pub fn new(
        tour_id: Uuid,
        starts_at: DateTime<Utc>,
        capacity: i32,
        price_override: Option<i64>,
    ) -> Result<Self, TourError> {
        validate_capacity(capacity)?;
        if let Some(price) = price_override {
            validate_price(price)?;
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tour_id,
            starts_at,
            capacity,
            status: TourDateStatus::Active,
            price_override,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == TourDateStatus::Active
    }
}

/// Partial update of a tour date. `price_override: Some(None)` clears the override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TourDatePatch {
    pub capacity: Option<i32>,
    pub status: Option<TourDateStatus>,
    #[serde(default, with = "double_option")]
    pub price_override: Option<Option<i64>>,
}

impl TourDatePatch {
    pub fn validate(&self) -> Result<(), TourError> {
        if let Some(capacity) = self.capacity {
            validate_capacity(capacity)?;
        }
        if let Some(Some(price)) = self.price_override {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Apply the non-capacity fields. Capacity is applied by the ledger after its seat check.
    pub fn apply_fields(&self, date: &mut TourDate) {
        if let Some(status) = self.status {
            date.status = status;
        }
        if let Some(price) = self.price_override {
            date.price_override = price;
        }
        date.updated_at = Utc::now();
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer).map(Some)
    }
}

fn validate_price(price: i64) -> Result<(), TourError> {
    if price < 0 {
        return Err(TourError::InvalidPrice(price));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), TourError> {
    if capacity < 0 {
        return Err(TourError::InvalidCapacity(capacity));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TourError {
    #[error("Tour name must not be empty")]
    EmptyName,

    #[error("Invalid price: {0}")]
    InvalidPrice(i64),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(i32),

    #[error("Unknown tour date status: {0}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tour_date_is_active() {
        let tour = Tour::new("Old Town Walk", 5000, 2000).unwrap();
        let date = TourDate::new(tour.id, Utc::now(), 10, None).unwrap();

        assert!(date.is_active());
        assert_eq!(date.tour_id, tour.id);
    }

    #[test]
    fn test_rejects_negative_values() {
        assert_eq!(Tour::new("Harbour", -1, 0).unwrap_err(), TourError::InvalidPrice(-1));
        assert_eq!(Tour::new("  ", 1, 0).unwrap_err(), TourError::EmptyName);
        assert_eq!(
            TourDate::new(Uuid::new_v4(), Utc::now(), -5, None).unwrap_err(),
            TourError::InvalidCapacity(-5)
        );
    }

    #[test]
    fn test_patch_distinguishes_cleared_override() {
        let cleared: TourDatePatch = serde_json::from_str(r#"{"price_override": null}"#).unwrap();
        assert_eq!(cleared.price_override, Some(None));

        let untouched: TourDatePatch = serde_json::from_str(r#"{"capacity": 12}"#).unwrap();
        assert_eq!(untouched.price_override, None);
        assert_eq!(untouched.capacity, Some(12));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("INACTIVE".parse::<TourDateStatus>().unwrap(), TourDateStatus::Inactive);
        assert!("PAUSED".parse::<TourDateStatus>().is_err());
    }
}
