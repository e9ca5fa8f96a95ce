use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_ride_backend::{
    config::Config,
    coordination::{RideRegistry, SessionDeps},
    db::create_pool,
    repositories::{InMemoryRideStore, PgRideStore, RideStore},
    router::build_router,
    services::{AccessPolicy, LogNotificationSink, PgAccessPolicy, StaticAccessPolicy},
    state::AppState,
    utils::time::SystemClock,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_ride_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        persistent = config.database_url.is_some(),
        jwt_secret = %mask_secret(&config.jwt_secret),
        livekit_url = %config.livekit_url,
        livekit_api_key = %mask_secret(&config.livekit_api_key),
        "Loaded configuration from environment/.env"
    );

    let store: Arc<dyn RideStore>;
    let access: Arc<dyn AccessPolicy>;
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(url, config.database_max_connections).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            store = Arc::new(PgRideStore::new(pool.clone()));
            access = Arc::new(PgAccessPolicy::new(pool));
        }
        None => {
            tracing::warn!("DATABASE_URL not set, rides are kept in memory only");
            store = Arc::new(InMemoryRideStore::new());
            access = Arc::new(StaticAccessPolicy::new());
        }
    }

    let deps = SessionDeps {
        store,
        access,
        clock: Arc::new(SystemClock),
        settings: config.settings(),
    };
    let rides = RideRegistry::new(deps).with_notifications(Arc::new(LogNotificationSink));
    let app = build_router(AppState::new(Arc::new(rides), config.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str()).await?;
    tracing::info!("Server listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
