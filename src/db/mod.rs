pub mod media;
pub mod models;
pub mod pages;
pub mod sites;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::blocks::InvalidContent;
use crate::pages::tree::TreeError;

static DB_POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/arc_cms".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Errors from content writes: the database, or content that may not be stored.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Invalid(#[from] InvalidContent),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("{0} {1} does not exist")]
    NotFound(&'static str, i64),

    #[error("Unknown page type '{0}'")]
    UnknownPageType(String),
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!("Database URL: {}", redact_url(&config.url));

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<PgPool>> {
    DB_POOL.get().cloned()
}

/// Hide the password part of a connection URL.
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

pub async fn health_check() -> Result<std::time::Duration, sqlx::Error> {
    let pool = get_pool()
        .ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pages (
        id BIGSERIAL PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        depth INTEGER NOT NULL,
        numchild INTEGER NOT NULL DEFAULT 0,
        page_type TEXT NOT NULL,
        title TEXT NOT NULL,
        draft_title TEXT NOT NULL,
        slug TEXT NOT NULL,
        url_path TEXT NOT NULL,
        live BOOLEAN NOT NULL DEFAULT false,
        has_unpublished_changes BOOLEAN NOT NULL DEFAULT false,
        show_in_menus BOOLEAN NOT NULL DEFAULT false,
        seo_title TEXT NOT NULL DEFAULT '',
        search_description TEXT NOT NULL DEFAULT '',
        content JSONB NOT NULL DEFAULT '{}',
        latest_revision_id BIGINT,
        live_revision_id BIGINT,
        first_published_at TIMESTAMPTZ,
        last_published_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pages_url_path ON pages(url_path)",
    "CREATE INDEX IF NOT EXISTS idx_pages_page_type ON pages(page_type)",
    "CREATE INDEX IF NOT EXISTS idx_pages_live ON pages(live)",
    r#"
    CREATE TABLE IF NOT EXISTS page_revisions (
        id BIGSERIAL PRIMARY KEY,
        page_id BIGINT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
        content JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        published_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_page_revisions_page_id ON page_revisions(page_id)",
    r#"
    CREATE TABLE IF NOT EXISTS sites (
        id BIGSERIAL PRIMARY KEY,
        hostname TEXT NOT NULL,
        port INTEGER NOT NULL DEFAULT 80,
        site_name TEXT NOT NULL DEFAULT '',
        root_page_id BIGINT NOT NULL REFERENCES pages(id),
        is_default_site BOOLEAN NOT NULL DEFAULT false,
        UNIQUE (hostname, port)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sites_single_default ON sites(is_default_site) WHERE is_default_site",
    r#"
    CREATE TABLE IF NOT EXISTS site_settings (
        site_id BIGINT PRIMARY KEY REFERENCES sites(id) ON DELETE CASCADE,
        content JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        file TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        file_size BIGINT,
        file_hash TEXT NOT NULL DEFAULT '',
        tags TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_images_file_hash ON images(file_hash)",
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        file TEXT NOT NULL,
        file_size BIGINT,
        file_hash TEXT NOT NULL DEFAULT '',
        tags TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_file_hash ON documents(file_hash)",
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
