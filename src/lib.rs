//! ARC CMS - headless content backend serving pages, media and site settings

pub mod blocks;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod pages;
pub mod routes;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::logging::LogConfig;

/// Configure CORS: read-only methods, credentials allowed, and either the
/// configured origin list or every origin when `CORS_ALLOW_ALL_ORIGINS` is set.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
            header::USER_AGENT,
            header::CACHE_CONTROL,
            header::PRAGMA,
            header::EXPIRES,
            HeaderName::from_static("x-csrftoken"),
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true);

    if config.cors_allow_all_origins {
        return cors.allow_origin(AllowOrigin::mirror_request());
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

/// Register `path` both with and without its trailing slash.
fn both_slashes(router: Router, path: &str, handler: MethodRouter) -> Router {
    let bare = path.trim_end_matches('/');
    router
        .route(bare, handler.clone())
        .route(&format!("{}/", bare), handler)
}

fn api_routes() -> Router {
    let mut router = Router::new();
    for (path, handler) in [
        ("/api/v2/pages/", get(routes::pages::list_pages)),
        ("/api/v2/pages/find/", get(routes::pages::find_page)),
        ("/api/v2/pages/{id}/", get(routes::pages::page_detail)),
        ("/api/v2/images/", get(routes::images::list_images)),
        ("/api/v2/images/{id}/", get(routes::images::image_detail)),
        ("/api/v2/documents/", get(routes::documents::list_documents)),
        ("/api/v2/documents/{id}/", get(routes::documents::document_detail)),
        ("/api/v2/settings/", get(routes::settings::get_site_settings)),
    ] {
        router = both_slashes(router, path, handler);
    }

    router
        .route(
            "/documents/{id}/{filename}",
            get(routes::documents::serve_document),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
}

/// Mount a directory at a URL prefix like `/media/`. Absolute URLs are served elsewhere.
fn serve_files(router: Router, url_prefix: &str, root: &std::path::Path) -> Router {
    let prefix = url_prefix.trim_end_matches('/');
    if !url_prefix.starts_with('/') || prefix.is_empty() {
        return router;
    }
    router.nest_service(prefix, ServeDir::new(root))
}

/// Create and configure the application router.
pub fn create_app(config: &AppConfig) -> Router {
    let cors = configure_cors(config);
    tracing::info!(allow_all = config.cors_allow_all_origins, "CORS configured");

    let mut app = api_routes();
    app = serve_files(app, &config.media_url, &config.media_root);
    app = serve_files(app, &config.static_url, &config.static_root);

    app.layer(middleware::from_fn_with_state(
        Arc::new(config.clone()),
        routes::require_allowed_host,
    ))
    .layer(RequestBodyLimitLayer::new(config.max_request_body_bytes))
    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
    .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests))
    .layer(logging::middleware::propagate_request_id_layer())
    .layer(middleware::from_fn(logging::middleware::log_request))
    .layer(logging::middleware::request_id_layer())
    .layer(TraceLayer::new_for_http())
    .layer(CompressionLayer::new())
    .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    let config = config::init(AppConfig::from_env().context("Invalid configuration")?);

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&LogConfig::from_env());

    routes::health::init_start_time();

    if config.is_production() {
        if config.debug {
            tracing::warn!("DEBUG is enabled in production");
        }
        if config.cors_allow_all_origins {
            tracing::warn!("CORS allows every origin in production");
        }
    }

    if std::env::var("DATABASE_URL").is_ok() {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
    }

    let app = create_app(config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT configuration")?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let draining = Arc::new(tokio::sync::Notify::new());
    let signalled = draining.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        signalled.notify_one();
    })
    .into_future();

    let grace = Duration::from_secs(config.graceful_timeout_secs);
    tokio::select! {
        result = server => result.context("Server error")?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                "Connections still open after {}s, shutting down anyway",
                grace.as_secs()
            );
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
