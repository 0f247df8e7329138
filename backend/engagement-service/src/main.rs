use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use prometheus::{Encoder, TextEncoder};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use engagement_service::cache::{CacheConn, CounterCache, RankingIndex, RedisCache};
use engagement_service::config::Config;
use engagement_service::services::{CascadeDeleteExecutor, InteractionService, SubtreeResolver};
use engagement_service::store::{PgStoreGateway, StoreGateway};
use engagement_service::workers::Reconciler;
use engagement_service::AppState;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

async fn health() -> impl Responder {
    "OK"
}

async fn ready(state: web::Data<AppState>) -> HttpResponse {
    match state.interactions.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "status": "ready" })),
        Err(err) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "error": err.to_string(),
        })),
    }
}

async fn metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(format!("error: {}", err));
    }
    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("🔧 Starting engagement-service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "✅ Configuration loaded: env={}, http_port={}",
        config.app.env, config.app.http_port
    );

    // Initialize database pool
    let connect_options =
        PgConnectOptions::from_str(&config.database.url).context("Failed to parse DATABASE_URL")?;

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    // Verify database connection
    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("✅ Database pool created and verified");

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations completed");

    // Initialize Redis connection
    let redis_cache = RedisCache::connect(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    info!("✅ Redis connection established");

    // Wire up the engagement services; every component receives its store
    // and cache handles explicitly, and this function owns their lifecycle.
    let store: Arc<dyn StoreGateway> = Arc::new(PgStoreGateway::new(pg_pool.clone()));
    let cache: Arc<dyn CacheConn> = Arc::new(redis_cache);

    let counter_ttl = Duration::from_secs(config.engagement.counter_ttl_secs);
    let deadline = Duration::from_secs(config.engagement.request_deadline_secs);

    let counters = CounterCache::new(cache.clone(), store.clone(), counter_ttl);
    let ranking = RankingIndex::new(cache.clone(), counter_ttl);
    let interactions =
        InteractionService::new(store.clone(), counters.clone(), ranking.clone(), deadline);
    let resolver = SubtreeResolver::new(
        store.clone(),
        config.engagement.max_traversal_depth,
        config.engagement.max_traversal_nodes,
    );
    let cascade = CascadeDeleteExecutor::new(store.clone(), resolver, counters, ranking, deadline);
    info!("✅ Engagement services initialized");

    // Start the reconciliation worker
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    if config.engagement.reconcile_enabled {
        let reconciler = Reconciler::new(cache.clone(), store.clone());
        let interval = Duration::from_secs(config.engagement.reconcile_interval_secs);
        tokio::spawn(async move { reconciler.run(interval, shutdown_rx).await });
        info!(
            "✅ Reconciliation worker started (interval={}s)",
            config.engagement.reconcile_interval_secs
        );
    }

    let state = web::Data::new(AppState {
        interactions,
        cascade,
    });

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    info!("🚀 HTTP operational endpoints on http://{}", http_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/ready", web::get().to(ready))
            .route("/metrics", web::get().to(metrics))
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .run();

    tokio::select! {
        result = server => {
            result.context("HTTP server terminated")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    info!("👋 engagement-service stopped");
    Ok(())
}
