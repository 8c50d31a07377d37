use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tourbook_catalog::PartySize;
use tourbook_shared::Masked;
use uuid::Uuid;

/// Payment state of a booking.
///
/// Every state except `Cancelled` holds seats on the tour date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Allowed next states. `Cancelled` is terminal.
    pub fn allowed_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[PaymentStatus::Paid, PaymentStatus::Cancelled],
            PaymentStatus::Paid => &[PaymentStatus::Refunded, PaymentStatus::Cancelled],
            PaymentStatus::Refunded => &[PaymentStatus::Cancelled],
            PaymentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn holds_seats(&self) -> bool {
        *self != PaymentStatus::Cancelled
    }

    /// Party size and price may only change while the booking is live.
    pub fn is_modifiable(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }
}

/// A reservation of adult and child seats on exactly one tour date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub tour_date_id: Uuid,
    pub customer_id: String,
    pub contact_email: Option<Masked<String>>,
    pub adults: i32,
    pub children: i32,
    pub payment_status: PaymentStatus,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        tour_date_id: Uuid,
        customer_id: String,
        contact_email: Option<Masked<String>>,
        party: PartySize,
        total_price: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tour_date_id,
            customer_id,
            contact_email,
            adults: party.adults,
            children: party.children,
            payment_status: PaymentStatus::Pending,
            total_price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn party(&self) -> PartySize {
        PartySize {
            adults: self.adults,
            children: self.children,
        }
    }

    pub fn seats(&self) -> i32 {
        self.adults + self.children
    }

    pub fn holds_seats(&self) -> bool {
        self.payment_status.holds_seats()
    }

    /// Move to `next` if the transition table allows it. Returns the previous status.
    pub fn transition_to(&mut self, next: PaymentStatus) -> Result<PaymentStatus, TransitionError> {
        let from = self.payment_status;
        if !from.can_transition_to(next) {
            return Err(TransitionError::InvalidTransition { from, to: next });
        }
        self.payment_status = next;
        self.updated_at = Utc::now();
        Ok(from)
    }

    pub fn resize(&mut self, party: PartySize, total_price: i64) {
        self.adults = party.adults;
        self.children = party.children;
        self.total_price = total_price;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Unknown payment status: {0}")]
    UnknownStatus(String),
}
