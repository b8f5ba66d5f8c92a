/**
 * Settings Routes
 * Site-wide settings of the default site, never cached
 */
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::pool;
use crate::blocks::serialize::{serialize_value, RequestOrigin, SerializeContext};
use crate::config;
use crate::db;
use crate::error::ApiResult;
use crate::media::{MediaIndex, MediaRefs};
use crate::pages::settings;

/// Resolve media references in stored settings and render them as API JSON.
pub fn serialize_settings(content: &Value, media: &MediaIndex, ctx: &SerializeContext) -> Value {
    let resolved = settings::schema().resolve(content, media);
    serialize_value(&resolved, ctx)
}

fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

async fn load_settings(origin: &RequestOrigin) -> ApiResult<Option<Value>> {
    let pool = pool()?;
    let site = match db::sites::default_site(&pool).await? {
        Some(site) => site,
        None => return Ok(None),
    };

    let content = db::sites::settings_for(&pool, site.id).await?;
    let mut refs = MediaRefs::default();
    settings::schema().collect_media(&content, &mut refs);
    let media = db::media::load_index(&pool, &refs).await?;

    let ctx = SerializeContext::new(origin, &config::get().media_url);
    Ok(Some(serialize_settings(&content, &media, &ctx)))
}

/// Render the outcome of loading settings. `None` means there is no default site.
pub fn settings_response(loaded: ApiResult<Option<Value>>) -> Response {
    let response = match loaded {
        Ok(Some(body)) => Json(body).into_response(),
        Ok(None) => {
            tracing::warn!("settings requested but no default site exists");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Default site not found"})),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    };
    no_cache(response)
}

/// GET /api/v2/settings/ - Settings of the default site
pub async fn get_site_settings(origin: RequestOrigin) -> Response {
    settings_response(load_settings(&origin).await)
}
