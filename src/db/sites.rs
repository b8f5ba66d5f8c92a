//! Sites and their settings records.

use serde_json::Value;
use sqlx::PgPool;

use super::models::{Site, SiteSettingsRecord};
use crate::pages::settings;

const SITE_COLUMNS: &str = "id, hostname, port, site_name, root_page_id, is_default_site";

pub async fn default_site(pool: &PgPool) -> Result<Option<Site>, sqlx::Error> {
    sqlx::query_as::<_, Site>(&format!(
        "SELECT {} FROM sites WHERE is_default_site LIMIT 1",
        SITE_COLUMNS
    ))
    .fetch_optional(pool)
    .await
}

/// Site serving `hostname`, preferring an exact port match, else the default site.
pub async fn find_for_host(
    pool: &PgPool,
    hostname: &str,
    port: Option<u16>,
) -> Result<Option<Site>, sqlx::Error> {
    let matched = sqlx::query_as::<_, Site>(&format!(
        r#"
        SELECT {} FROM sites
        WHERE lower(hostname) = lower($1)
        ORDER BY (port = $2) DESC, is_default_site DESC, id
        LIMIT 1
        "#,
        SITE_COLUMNS
    ))
    .bind(hostname)
    .bind(port.map(i32::from).unwrap_or(80))
    .fetch_optional(pool)
    .await?;

    match matched {
        Some(site) => Ok(Some(site)),
        None => default_site(pool).await,
    }
}

/// Point the default site at `root_page_id`, creating it when there is none.
pub async fn upsert_default(
    pool: &PgPool,
    hostname: &str,
    port: i32,
    site_name: &str,
    root_page_id: i64,
) -> Result<Site, sqlx::Error> {
    let updated = sqlx::query_as::<_, Site>(&format!(
        r#"
        UPDATE sites SET hostname = $1, port = $2, site_name = $3, root_page_id = $4
        WHERE is_default_site
        RETURNING {}
        "#,
        SITE_COLUMNS
    ))
    .bind(hostname)
    .bind(port)
    .bind(site_name)
    .bind(root_page_id)
    .fetch_optional(pool)
    .await?;

    if let Some(site) = updated {
        tracing::info!(site_id = site.id, "default site updated");
        return Ok(site);
    }

    let site = sqlx::query_as::<_, Site>(&format!(
        r#"
        INSERT INTO sites (hostname, port, site_name, root_page_id, is_default_site)
        VALUES ($1, $2, $3, $4, true)
        RETURNING {}
        "#,
        SITE_COLUMNS
    ))
    .bind(hostname)
    .bind(port)
    .bind(site_name)
    .bind(root_page_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(site_id = site.id, "default site created");
    Ok(site)
}

pub async fn set_root_page(pool: &PgPool, site_id: i64, root_page_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sites SET root_page_id = $2 WHERE id = $1")
        .bind(site_id)
        .bind(root_page_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Settings content for a site, creating the record with defaults on first access.
pub async fn settings_for(pool: &PgPool, site_id: i64) -> Result<Value, sqlx::Error> {
    let existing = sqlx::query_as::<_, SiteSettingsRecord>(
        "SELECT site_id, content, updated_at FROM site_settings WHERE site_id = $1",
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?;

    if let Some(record) = existing {
        return Ok(record.content);
    }

    let defaults = settings::default_content();
    sqlx::query(
        "INSERT INTO site_settings (site_id, content) VALUES ($1, $2) ON CONFLICT (site_id) DO NOTHING",
    )
    .bind(site_id)
    .bind(&defaults)
    .execute(pool)
    .await?;

    tracing::info!(site_id, "site settings created with defaults");
    Ok(defaults)
}

/// Replace a site's settings. `content` must already be cleaned.
pub async fn save_settings(pool: &PgPool, site_id: i64, content: &Value) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO site_settings (site_id, content, updated_at) VALUES ($1, $2, now())
        ON CONFLICT (site_id) DO UPDATE SET content = EXCLUDED.content, updated_at = now()
        "#,
    )
    .bind(site_id)
    .bind(content)
    .execute(pool)
    .await?;
    Ok(())
}
