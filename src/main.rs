use snake_arena::auth::IdentityVerifier;
use snake_arena::config::Config;
use snake_arena::game::engine::Engine;
use snake_arena::leaderboard::LeaderboardStore;
use snake_arena::metrics::Metrics;
use snake_arena::rate_limit::RateLimiter;
use snake_arena::server::{router, AppState};
use snake_arena::session::SessionRegistry;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Arc::new(Config::load(config_path.as_deref())?);

    ensure_db_dir(&config.server.database_url)?;
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.server.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let metrics = Arc::new(Metrics::new(config.metrics.enabled));
    let (stats_tx, stats_rx) = mpsc::unbounded_channel();
    let leaderboard = LeaderboardStore::new(db, config.leaderboard.clone());
    leaderboard.clone().spawn_writer(stats_rx);

    let engine = Arc::new(Engine::new(
        config.game.clone(),
        stats_tx,
        Arc::clone(&metrics),
    ));
    engine.start();

    let limiter = Arc::new(RateLimiter::new());
    spawn_limiter_cleanup(Arc::clone(&limiter));

    let state = AppState {
        config: Arc::clone(&config),
        engine: Arc::clone(&engine),
        registry: Arc::new(SessionRegistry::new()),
        leaderboard,
        verifier: IdentityVerifier::from_config(&config.auth)?,
        limiter,
        metrics,
    };
    let app = router(state);

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    tracing::info!(%address, "snake arena listening");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    engine.stop();
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(?error, "failed to listen for shutdown signal");
    }
}

fn spawn_limiter_cleanup(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            limiter.cleanup(3600);
        }
    });
}

fn ensure_db_dir(database_url: &str) -> anyhow::Result<()> {
    if database_url.starts_with("sqlite::memory:") {
        return Ok(());
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"));
    let Some(path) = path else { return Ok(()) };
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !db_path.exists() {
        std::fs::File::create(db_path)?;
    }
    Ok(())
}
