pub mod app_config;
pub mod database;
pub mod events;
pub mod ledger_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use events::EventProducer;
pub use ledger_repo::PgLedger;
pub use redis_repo::RedisClient;
