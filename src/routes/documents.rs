/**
 * Document Routes
 * Document metadata API and file downloads
 */
use axum::{
    extract::{Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use super::images::media_order;
use super::{check_query_params, listing, parse_id, parse_order, parse_paging, pool, QueryParams};
use crate::blocks::serialize::{document_url, RequestOrigin, SerializeContext};
use crate::config;
use crate::db::{self, models::Document};
use crate::error::{ApiError, ApiResult};
use crate::media::storage;

const LISTING_PARAMS: &[&str] = &["limit", "offset", "order"];

const ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("created_at", "created_at"),
];

/// Served inline; everything else is an attachment.
const INLINE_CONTENT_TYPES: &[&str] = &["application/pdf", "text/plain"];

pub fn document_item(document: &Document, ctx: &SerializeContext) -> Value {
    json!({
        "id": document.id,
        "meta": {
            "type": "wagtaildocs.Document",
            "detail_url": ctx.origin.build_absolute_uri(&format!("/api/v2/documents/{}/", document.id)),
            "tags": document.tags,
            "download_url": ctx.origin.build_absolute_uri(&document_url(document)),
        },
        "title": document.title,
    })
}

/// GET /api/v2/documents/ - List documents
pub async fn list_documents(
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
    let (documents, total) =
        db::media::list_documents(&pool, order, paging.limit, paging.offset).await?;

    let ctx = SerializeContext::new(&origin, &config.media_url);
    let items = documents.iter().map(|d| document_item(d, &ctx)).collect();
    Ok(Json(listing(total, items)))
}

/// GET /api/v2/documents/{id}/ - Single document
pub async fn document_detail(
    origin: RequestOrigin,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "Document")?;
    let pool = pool()?;
    let document = db::media::get_document(&pool, id)
        .await?
        .ok_or(ApiError::NotFound("Document"))?;

    let ctx = SerializeContext::new(&origin, &config::get().media_url);
    Ok(Json(document_item(&document, &ctx)))
}

fn content_disposition(content_type: &str, filename: &str) -> String {
    let kind = if INLINE_CONTENT_TYPES.contains(&content_type) {
        "inline"
    } else {
        "attachment"
    };
    format!("{}; filename=\"{}\"", kind, filename.replace(['"', '\\'], "_"))
}

/// GET /documents/{id}/{filename} - Download a document file
pub async fn serve_document(Path((id, filename)): Path<(String, String)>) -> ApiResult<Response> {
    let id = parse_id(&id, "Document")?;
    let pool = pool()?;
    let document = db::media::get_document(&pool, id)
        .await?
        .filter(|d| d.filename() == filename)
        .ok_or(ApiError::NotFound("Document"))?;

    let path = config::get().media_root.join(&document.file);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::warn!(document_id = id, path = %path.display(), "document file unreadable: {}", e);
        ApiError::NotFound("Document")
    })?;

    let content_type = storage::content_type_for(&document.file);
    let disposition = content_disposition(&content_type, document.filename());
    tracing::debug!(document_id = id, bytes = bytes.len(), "serving document");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
