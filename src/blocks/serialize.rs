//! Block values to API JSON.
//!
//! Media references come out as objects carrying absolute URLs built from the
//! scheme and host the request arrived on.

use axum::http::{header, HeaderMap, Uri};
use serde_json::{json, Map, Value};

use super::{BlockValue, StreamItem};
use crate::db::models::{Document, Image};
use crate::media::rendition::{self, rendition_for, Filter, FilterSpec};

/// Scheme and host of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Work out the origin from request headers. `X-Forwarded-Proto` and
    /// `X-Forwarded-Host` are only honoured behind a trusted proxy.
    pub fn from_parts(headers: &HeaderMap, uri: &Uri, trust_forwarded: bool) -> Self {
        let scheme = trust_forwarded
            .then(|| first_header_value(headers, "x-forwarded-proto"))
            .flatten()
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let host = Self::request_host(headers, uri, trust_forwarded)
            .unwrap_or_else(|| "localhost".to_string());

        Self { scheme, host }
    }

    /// The host absolute URLs are built from, if the request names one.
    /// The allowed-host check must look at this same value.
    pub fn request_host(headers: &HeaderMap, uri: &Uri, trust_forwarded: bool) -> Option<String> {
        trust_forwarded
            .then(|| first_header_value(headers, "x-forwarded-host"))
            .flatten()
            .or_else(|| first_header_value(headers, header::HOST.as_str()))
            .or_else(|| uri.authority().map(|a| a.to_string()))
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Join `location` onto this origin. Absolute URLs are returned unchanged.
    pub fn build_absolute_uri(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        if let Some(rest) = location.strip_prefix("//") {
            return format!("{}://{}", self.scheme, rest);
        }
        if location.starts_with('/') {
            format!("{}{}", self.base_url(), location)
        } else {
            format!("{}/{}", self.base_url(), location)
        }
    }
}

/// Everything URL construction needs for one request.
#[derive(Debug, Clone, Copy)]
pub struct SerializeContext<'a> {
    pub origin: &'a RequestOrigin,
    pub media_url: &'a str,
}

impl<'a> SerializeContext<'a> {
    pub fn new(origin: &'a RequestOrigin, media_url: &'a str) -> Self {
        Self { origin, media_url }
    }

    /// Public URL of a file stored under the media root, as the frontend would link it.
    pub fn media_url_for(&self, file: &str) -> String {
        let base = self.media_url.trim_end_matches('/');
        format!("{}/{}", base, file.trim_start_matches('/'))
    }

    pub fn absolute_media_url(&self, file: &str) -> String {
        self.origin.build_absolute_uri(&self.media_url_for(file))
    }
}

/// Serialize a block stream. Absent or empty streams become `[]`.
pub fn serialize_stream(stream: Option<&[StreamItem]>, ctx: &SerializeContext) -> Value {
    let children = match stream {
        Some(children) if !children.is_empty() => children,
        _ => return Value::Array(Vec::new()),
    };

    Value::Array(
        children
            .iter()
            .map(|item| match item {
                StreamItem::Block(child) => json!({
                    "type": child.block_type,
                    "value": serialize_value(&child.value, ctx),
                    "id": child.id,
                }),
                StreamItem::Raw(v) => v.clone(),
            })
            .collect(),
    )
}

pub fn serialize_value(value: &BlockValue, ctx: &SerializeContext) -> Value {
    match value {
        BlockValue::Scalar(v) => v.clone(),
        BlockValue::Struct(fields) => {
            let map: Map<String, Value> = fields
                .iter()
                .map(|(name, v)| (name.clone(), serialize_value(v, ctx)))
                .collect();
            Value::Object(map)
        }
        BlockValue::List(items) => {
            Value::Array(items.iter().map(|v| serialize_value(v, ctx)).collect())
        }
        BlockValue::Stream(children) => serialize_stream(Some(children.as_slice()), ctx),
        BlockValue::Image {
            image,
            rendition: Some(spec),
        } => image_rendition_representation(image, spec, ctx),
        BlockValue::Image {
            image,
            rendition: None,
        } => image_representation(image, ctx),
        BlockValue::Document(doc) => document_representation(doc, ctx),
    }
}

/// `{id, title, original, width, height, thumbnail, large}` for an image.
pub fn image_representation(image: &Image, ctx: &SerializeContext) -> Value {
    let rendition_url = |filter: Filter| {
        let r = rendition_for(image, &FilterSpec::from(filter));
        ctx.absolute_media_url(&r.file)
    };

    json!({
        "id": image.id,
        "title": image.title,
        "original": ctx.absolute_media_url(&image.file),
        "width": image.width,
        "height": image.height,
        "thumbnail": rendition_url(rendition::THUMBNAIL),
        "large": rendition_url(rendition::LARGE),
    })
}

/// A single rendition of an image: `{url, full_url, width, height, alt}`.
pub fn image_rendition_representation(
    image: &Image,
    spec: &FilterSpec,
    ctx: &SerializeContext,
) -> Value {
    let r = rendition_for(image, spec);
    let url = ctx.media_url_for(&r.file);

    json!({
        "url": url,
        "full_url": ctx.origin.build_absolute_uri(&url),
        "width": r.width,
        "height": r.height,
        "alt": image.title,
    })
}

/// Path the document is served from.
pub fn document_url(doc: &Document) -> String {
    format!("/documents/{}/{}", doc.id, doc.filename())
}

pub fn document_representation(doc: &Document, ctx: &SerializeContext) -> Value {
    json!({
        "id": doc.id,
        "title": doc.title,
        "url": ctx.origin.build_absolute_uri(&document_url(doc)),
        "filename": doc.filename(),
        "file_extension": doc.file_extension(),
        "file_size": doc.file_size,
    })
}
