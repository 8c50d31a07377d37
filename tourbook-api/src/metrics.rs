use axum::extract::State;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tourbook_core::{Booking, LedgerError, LedgerResult};

use crate::error::AppError;
use crate::state::AppState;

/// Prometheus counters for reservation outcomes.
pub struct Metrics {
    registry: Registry,
    reservations: IntCounterVec,
    status_changes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tourbook".to_string()), None)?;

        let reservations = IntCounterVec::new(
            Opts::new("reservations_total", "Reservation and resize attempts by outcome"),
            &["operation", "outcome"],
        )?;
        let status_changes = IntCounterVec::new(
            Opts::new("booking_status_changes_total", "Applied payment status changes"),
            &["to"],
        )?;

        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(status_changes.clone()))?;

        Ok(Self {
            registry,
            reservations,
            status_changes,
        })
    }

    pub fn record_reservation(&self, operation: &str, result: &LedgerResult<Booking>) {
        self.reservations
            .with_label_values(&[operation, outcome_label(result)])
            .inc();
    }

    pub fn record_status_change(&self, to: &str) {
        self.status_changes.with_label_values(&[to]).inc();
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn outcome_label(result: &LedgerResult<Booking>) -> &'static str {
    match result {
        Ok(_) => "committed",
        Err(LedgerError::CapacityExceeded { .. }) => "capacity_exceeded",
        Err(LedgerError::ConcurrencyConflict) => "conflict",
        Err(LedgerError::TourDateInactive(_)) => "inactive",
        Err(e) if e.is_not_found() => "not_found",
        Err(_) => "error",
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, AppError> {
    Ok(state.metrics.render()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_counted() {
        let metrics = Metrics::new().unwrap();
        metrics.record_reservation("reserve", &Err(LedgerError::CapacityExceeded { available: 1 }));
        metrics.record_reservation("reserve", &Err(LedgerError::CapacityExceeded { available: 0 }));
        metrics.record_status_change("PAID");

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"tourbook_reservations_total{operation="reserve",outcome="capacity_exceeded"} 2"#
        ));
        assert!(text.contains(r#"tourbook_booking_status_changes_total{to="PAID"} 1"#));
    }
}
