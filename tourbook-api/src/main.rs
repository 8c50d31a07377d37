use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tourbook_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig},
};
use tourbook_booking::ReservationService;
use tourbook_core::{LogNotifier, Notifier};
use tourbook_store::{app_config::Config, DbClient, EventProducer, PgLedger, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourbook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tourbook API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let ledger = Arc::new(PgLedger::new(db.pool.clone()));

    // Kafka
    let notifier: Arc<dyn Notifier> = if config.kafka.brokers.is_empty() {
        tracing::warn!("No Kafka brokers configured, booking events go to the log only");
        Arc::new(LogNotifier)
    } else {
        Arc::new(
            EventProducer::new(&config.kafka.brokers, &config.kafka.topic_prefix)
                .context("Failed to create Kafka producer")?,
        )
    };

    // Redis
    let redis = match config.redis.url.as_deref() {
        Some(url) => Some(Arc::new(
            RedisClient::new(url).context("Invalid Redis URL")?,
        )),
        None => {
            tracing::warn!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let reservations = ReservationService::new(ledger.clone(), notifier)
        .with_conflict_retries(config.business_rules.conflict_retries);

    let app_state = AppState {
        reservations: Arc::new(reservations),
        catalog: ledger,
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rate_limit: config.rate_limit.clone(),
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
