//! MedSync Hub entry point.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medsync_server::config::Config;
use medsync_server::db::{self, PgClinicStore, PgReplicaStore};
use medsync_server::lock::{DistributedLock, LockStore, MemoryLockStore, RedisLockStore};
use medsync_server::{jobs, routes, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medsync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting MedSync Hub on {}:{}", config.host, config.port);

    // Create database pool and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Lock backend: shared Redis when configured, otherwise process-local
    // (single-instance deployments only).
    let lock_store: Arc<dyn LockStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisLockStore::new(url)?),
        None => {
            tracing::warn!("REDIS_URL not set; scheduled jobs are only coordinated within this process");
            Arc::new(MemoryLockStore::new())
        }
    };
    let lock = DistributedLock::new(lock_store);

    // Build application state
    let clinics = Arc::new(PgClinicStore::new(pool.clone()));
    let replicas = Arc::new(PgReplicaStore::new(pool));
    let state = AppState {
        clinics: clinics.clone(),
        replicas,
        lock: lock.clone(),
        config: Arc::new(config.clone()),
    };

    // Background maintenance, coordinated across instances by the lock
    jobs::spawn_scheduled_jobs(lock, clinics);

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
