use serde::{Deserialize, Serialize};

use crate::inventory::PartySize;
use crate::tour::{Tour, TourDate};

/// Price breakdown for one booking, in minor currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub adult_unit_price: i64,
    pub child_unit_price: i64,
    pub total: i64,
}

impl PriceQuote {
    /// Quote a party for a tour date. The date's override, when set, replaces the adult price only.
    pub fn for_party(tour: &Tour, date: &TourDate, party: PartySize) -> Result<Self, PricingError> {
        let adult_unit_price = effective_adult_price(tour, date);
        let child_unit_price = tour.child_price;

        let adults_total = adult_unit_price
            .checked_mul(i64::from(party.adults))
            .ok_or(PricingError::Overflow)?;
        let children_total = child_unit_price
            .checked_mul(i64::from(party.children))
            .ok_or(PricingError::Overflow)?;
        let total = adults_total
            .checked_add(children_total)
            .ok_or(PricingError::Overflow)?;

        Ok(Self {
            adult_unit_price,
            child_unit_price,
            total,
        })
    }
}

pub fn effective_adult_price(tour: &Tour, date: &TourDate) -> i64 {
    date.price_override.unwrap_or(tour.adult_price)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Total price overflows")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixture(override_price: Option<i64>) -> (Tour, TourDate) {
        let tour = Tour::new("Canal Cruise", 50, 20).unwrap();
        let date = TourDate::new(tour.id, Utc::now(), 10, override_price).unwrap();
        (tour, date)
    }

    #[test]
    fn test_base_price() {
        let (tour, date) = fixture(None);
        let quote = PriceQuote::for_party(&tour, &date, PartySize::new(2, 1).unwrap()).unwrap();
        assert_eq!(quote.total, 120);
    }

    #[test]
    fn test_override_replaces_adult_price_only() {
        let (tour, date) = fixture(Some(40));
        let quote = PriceQuote::for_party(&tour, &date, PartySize::new(2, 1).unwrap()).unwrap();
        assert_eq!(quote.adult_unit_price, 40);
        assert_eq!(quote.child_unit_price, 20);
        assert_eq!(quote.total, 100);
    }

    #[test]
    fn test_overflow_is_reported() {
        let (mut tour, date) = fixture(None);
        tour.adult_price = i64::MAX;
        let result = PriceQuote::for_party(&tour, &date, PartySize::new(2, 0).unwrap());
        assert_eq!(result, Err(PricingError::Overflow));
    }
}
