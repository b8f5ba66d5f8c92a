/**
 * Image Routes
 * Image metadata listing and detail
 */
use axum::{
    extract::{Path, Query},
    Json,
};
use serde_json::{json, Value};

use super::{check_query_params, listing, parse_id, parse_order, parse_paging, pool, Ordering, QueryParams};
use crate::blocks::serialize::{RequestOrigin, SerializeContext};
use crate::config;
use crate::db::{self, media::MediaOrder, models::Image};
use crate::error::{ApiError, ApiResult};

const LISTING_PARAMS: &[&str] = &["limit", "offset", "order"];

const ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("created_at", "created_at"),
];

pub fn image_item(image: &Image, ctx: &SerializeContext) -> Value {
    json!({
        "id": image.id,
        "meta": {
            "type": "wagtailimages.Image",
            "detail_url": ctx.origin.build_absolute_uri(&format!("/api/v2/images/{}/", image.id)),
            "tags": image.tags,
            "download_url": ctx.absolute_media_url(&image.file),
        },
        "title": image.title,
        "width": image.width,
        "height": image.height,
    })
}

/// Only column orderings are supported for media.
pub(super) fn media_order(ordering: Option<Ordering>) -> ApiResult<MediaOrder> {
    match ordering {
        None => Ok(MediaOrder::default()),
        Some(Ordering::Column { column, descending }) => Ok(MediaOrder { column, descending }),
        Some(Ordering::Random) => Err(ApiError::BadRequest(
            "cannot order by 'random' (unknown field)".into(),
        )),
    }
}

/// GET /api/v2/images/ - List images
pub async fn list_images(
    origin: RequestOrigin,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let config = config::get();
    check_query_params(&params, LISTING_PARAMS)?;
    let paging = parse_paging(&params, config)?;
    let order = media_order(parse_order(
        params.get("order").map(String::as_str),
        ORDER_FIELDS,
        &paging,
    )?)?;

    let pool = pool()?;
    let (images, total) = db::media::list_images(&pool, order, paging.limit, paging.offset).await?;

    let ctx = SerializeContext::new(&origin, &config.media_url);
    let items = images.iter().map(|image| image_item(image, &ctx)).collect();
    Ok(Json(listing(total, items)))
}

/// GET /api/v2/images/{id}/ - Single image
pub async fn image_detail(origin: RequestOrigin, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "Image")?;
    let pool = pool()?;
    let image = db::media::get_image(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Image"))?;

    let ctx = SerializeContext::new(&origin, &config::get().media_url);
    Ok(Json(image_item(&image, &ctx)))
}
