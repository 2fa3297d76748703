use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use cache_invalidation::RevalidationPublisher;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use strand_service::cache::{NoopRevalidator, PathRevalidator, RedisRevalidator};
use strand_service::db::PgStrandStore;
use strand_service::middleware::{IdentityHeader, RequestTimer, USER_ID_HEADER};
use strand_service::services::{FeedLimits, StrandService};
use strand_service::{handlers, metrics, Config};
use tokio::sync::watch;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "strand-service";

async fn health(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": SERVICE_NAME
        })),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn build_revalidator(config: &Config) -> Arc<dyn PathRevalidator> {
    let Some(url) = config.cache.url.as_deref() else {
        tracing::warn!("REDIS_URL not set; page revalidation disabled");
        return Arc::new(NoopRevalidator);
    };

    match RevalidationPublisher::with_channel(
        url,
        SERVICE_NAME.to_string(),
        config.cache.revalidation_channel.clone(),
    )
    .await
    {
        Ok(publisher) => {
            tracing::info!(channel = %publisher.channel(), "Revalidation publisher connected");
            Arc::new(RedisRevalidator::new(publisher))
        }
        Err(e) => {
            tracing::warn!("Revalidation publisher unavailable ({}); continuing without it", e);
            Arc::new(NoopRevalidator)
        }
    }
}

/// Strand Service
///
/// # Routes
///
/// - `/api/v1/strands/*` - Create, read, reply to and delete strands
/// - `/api/v1/users/{id}/strands`, `/api/v1/communities/{id}/strands`
/// - `/health`, `/metrics`
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env().map_err(anyhow::Error::msg)?;

    tracing::info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to create database pool")?;

    let store = PgStrandStore::new(db_pool.clone());
    store.migrate().await.context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let revalidator = build_revalidator(&config).await;
    let service = web::Data::new(
        StrandService::new(Arc::new(store), revalidator).with_feed_limits(FeedLimits {
            default_page_size: config.feed.default_page_size,
            max_page_size: config.feed.max_page_size,
        }),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_flag = web::Data::new(shutdown_rx);
    let pool_data = web::Data::new(db_pool);

    let allowed_origins: Vec<String> = config
        .cors
        .allowed_origins
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();
    let allow_any_origin = allowed_origins.iter().any(|origin| origin == "*");

    let bind_address = config.bind_address();
    tracing::info!("Starting HTTP server at {}", bind_address);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
            .allowed_header(USER_ID_HEADER)
            .max_age(3600);
        if allow_any_origin {
            cors = cors.allow_any_origin();
        } else {
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        App::new()
            .app_data(service.clone())
            .app_data(shutdown_flag.clone())
            .app_data(pool_data.clone())
            .wrap(IdentityHeader)
            .wrap(RequestTimer)
            .wrap(cors)
            .wrap(TracingLogger::default())
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .disable_signals()
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
        handle.stop(true).await;
    });

    server.await.context("HTTP server error")?;
    tracing::info!("{} stopped", SERVICE_NAME);
    Ok(())
}
