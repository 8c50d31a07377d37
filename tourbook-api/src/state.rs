use std::sync::Arc;
use tourbook_booking::ReservationService;
use tourbook_core::CatalogRepository;
use tourbook_store::app_config::RateLimitConfig;
use tourbook_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationService>,
    pub catalog: Arc<dyn CatalogRepository>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub metrics: Arc<Metrics>,
}
