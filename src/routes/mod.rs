/**
 * Routes Module
 * API route handlers and the request helpers they share
 */
pub mod documents;
pub mod health;
pub mod images;
pub mod pages;
pub mod settings;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use crate::blocks::serialize::RequestOrigin;
use crate::config::{self, AppConfig};
use crate::db::{self, models::Site};
use crate::error::{ApiError, ApiResult};

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestOrigin::from_parts(
            &parts.headers,
            &parts.uri,
            config::get().trust_forwarded_headers,
        ))
    }
}

/// Reject requests whose host is not in `ALLOWED_HOSTS`. Behind a trusted
/// proxy that is the `X-Forwarded-Host` value, as used for absolute URLs.
pub async fn require_allowed_host(
    State(config): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let host = RequestOrigin::request_host(req.headers(), req.uri(), config.trust_forwarded_headers);

    if let Some(host) = host {
        if !config.is_allowed_host(&host) {
            tracing::warn!(host = %host, "rejected request for disallowed host");
            return ApiError::BadRequest(format!("Invalid HTTP_HOST header: '{}'.", host))
                .into_response();
        }
    }

    next.run(req).await
}

pub fn pool() -> ApiResult<Arc<PgPool>> {
    db::get_pool().ok_or(ApiError::DatabaseUnavailable)
}

/// Split `host[:port]`, keeping IPv6 brackets.
pub fn split_host(host: &str) -> (&str, Option<u16>) {
    if let Some(end) = host.find(']') {
        let port = host[end + 1..].strip_prefix(':').and_then(|p| p.parse().ok());
        return (&host[..=end], port);
    }
    match host.rsplit_once(':') {
        Some((name, port)) => (name, port.parse().ok()),
        None => (host, None),
    }
}

/// The site the request was made to, falling back to the default site.
pub async fn current_site(pool: &PgPool, origin: &RequestOrigin) -> ApiResult<Site> {
    let (hostname, port) = split_host(&origin.host);
    let port = port.or(match origin.scheme.as_str() {
        "https" => Some(443),
        _ => Some(80),
    });
    db::sites::find_for_host(pool, hostname, port)
        .await?
        .ok_or(ApiError::NotFound("Site"))
}

/// Query string as a flat map; repeated keys keep the last value.
pub type QueryParams = HashMap<String, String>;

/// Refuse query parameters no operation or filter understands.
pub fn check_query_params(params: &QueryParams, known: &[&str]) -> ApiResult<()> {
    let mut unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !known.contains(k))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(ApiError::BadRequest(format!(
        "query parameter is not an operation or a recognised field: {}",
        unknown.join(", ")
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub limit: i64,
    pub offset: i64,
}

pub fn parse_paging(params: &QueryParams, config: &AppConfig) -> ApiResult<Paging> {
    let limit = match params.get("limit") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| ApiError::BadRequest("limit must be a positive integer".into()))?,
        None => config.api_default_limit,
    };
    if limit > config.api_max_limit {
        return Err(ApiError::BadRequest(format!(
            "limit cannot be higher than {}",
            config.api_max_limit
        )));
    }

    let offset = match params.get("offset") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| ApiError::BadRequest("offset must be a positive integer".into()))?,
        None => 0,
    };

    Ok(Paging { limit, offset })
}

/// Requested ordering of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Column {
        column: &'static str,
        descending: bool,
    },
    Random,
}

/// Parse `order=field`, `order=-field` or `order=random`. `allowed` maps API
/// names to database columns.
pub fn parse_order(
    raw: Option<&str>,
    allowed: &[(&str, &'static str)],
    paging: &Paging,
) -> ApiResult<Option<Ordering>> {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw,
        None => return Ok(None),
    };

    if raw == "random" {
        if paging.offset > 0 {
            return Err(ApiError::BadRequest(
                "random ordering with offset is not supported".into(),
            ));
        }
        return Ok(Some(Ordering::Random));
    }

    let (name, descending) = match raw.strip_prefix('-') {
        Some(name) => (name, true),
        None => (raw, false),
    };
    allowed
        .iter()
        .find(|(api, _)| *api == name)
        .map(|(_, column)| Some(Ordering::Column { column, descending }))
        .ok_or_else(|| ApiError::BadRequest(format!("cannot order by '{}' (unknown field)", name)))
}

/// `fields=` selection: `*` for everything, `_` for nothing, `-name` to drop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    pub all: bool,
    pub none: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FieldSelection {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut selection = FieldSelection::default();
        for item in raw.unwrap_or_default().split(',').map(str::trim) {
            match item {
                "" => {}
                "*" => selection.all = true,
                "_" => selection.none = true,
                _ => match item.strip_prefix('-') {
                    Some(name) => selection.exclude.push(name.to_string()),
                    None => selection.include.push(item.to_string()),
                },
            }
        }
        selection
    }

    /// Resolve against the `available` field names, in their order.
    pub fn resolve<'a>(&self, defaults: &[&str], available: &[&'a str]) -> ApiResult<Vec<&'a str>> {
        let mut unknown: Vec<&str> = self
            .include
            .iter()
            .chain(self.exclude.iter())
            .map(String::as_str)
            .filter(|name| !available.contains(name))
            .collect();
        if !unknown.is_empty() {
            unknown.dedup();
            return Err(ApiError::BadRequest(format!(
                "unknown fields: {}",
                unknown.join(", ")
            )));
        }

        Ok(available
            .iter()
            .copied()
            .filter(|name| {
                let base = if self.all {
                    true
                } else if self.none {
                    false
                } else {
                    defaults.contains(name)
                };
                (base || self.include.iter().any(|i| i == name))
                    && !self.exclude.iter().any(|e| e == name)
            })
            .collect())
    }
}

/// `{"meta": {"total_count": n}, "items": [...]}`
pub fn listing(total: i64, items: Vec<Value>) -> Value {
    json!({
        "meta": {"total_count": total},
        "items": items,
    })
}

/// Parse a numeric path id; anything else is treated as a missing record.
pub fn parse_id(raw: &str, kind: &'static str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(ApiError::NotFound(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn message(err: ApiError) -> String {
        err.to_string()
    }

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("localhost:8000"), ("localhost", Some(8000)));
        assert_eq!(split_host("arc.example"), ("arc.example", None));
        assert_eq!(split_host("[::1]:8001"), ("[::1]", Some(8001)));
    }

    #[test]
    fn test_paging_defaults_and_limits() {
        let config = AppConfig::default();
        assert_eq!(
            parse_paging(&params(&[]), &config).unwrap(),
            Paging { limit: 20, offset: 0 }
        );
        assert_eq!(
            parse_paging(&params(&[("limit", "5"), ("offset", "10")]), &config).unwrap(),
            Paging { limit: 5, offset: 10 }
        );
        assert_eq!(
            message(parse_paging(&params(&[("limit", "21")]), &config).unwrap_err()),
            "limit cannot be higher than 20"
        );
        assert_eq!(
            message(parse_paging(&params(&[("limit", "abc")]), &config).unwrap_err()),
            "limit must be a positive integer"
        );
        assert_eq!(
            message(parse_paging(&params(&[("offset", "-1")]), &config).unwrap_err()),
            "offset must be a positive integer"
        );
    }

    #[test]
    fn test_order_parsing() {
        let allowed = [("id", "id"), ("title", "title")];
        let paging = Paging { limit: 20, offset: 0 };
        assert_eq!(parse_order(None, &allowed, &paging).unwrap(), None);
        assert_eq!(
            parse_order(Some("-title"), &allowed, &paging).unwrap(),
            Some(Ordering::Column {
                column: "title",
                descending: true
            })
        );
        assert_eq!(
            parse_order(Some("random"), &allowed, &paging).unwrap(),
            Some(Ordering::Random)
        );
        assert_eq!(
            message(parse_order(Some("random"), &allowed, &Paging { limit: 20, offset: 5 }).unwrap_err()),
            "random ordering with offset is not supported"
        );
        assert_eq!(
            message(parse_order(Some("colour"), &allowed, &paging).unwrap_err()),
            "cannot order by 'colour' (unknown field)"
        );
    }

    #[test]
    fn test_unknown_query_params() {
        assert!(check_query_params(&params(&[("limit", "1")]), &["limit"]).is_ok());
        assert_eq!(
            message(check_query_params(&params(&[("zed", "1"), ("abc", "2")]), &["limit"]).unwrap_err()),
            "query parameter is not an operation or a recognised field: abc, zed"
        );
    }

    #[test]
    fn test_field_selection() {
        let available = ["title", "slug", "hero_title", "body"];
        let defaults = ["title", "slug"];

        let fields = FieldSelection::parse(None).resolve(&defaults, &available).unwrap();
        assert_eq!(fields, vec!["title", "slug"]);

        let fields = FieldSelection::parse(Some("body,-slug"))
            .resolve(&defaults, &available)
            .unwrap();
        assert_eq!(fields, vec!["title", "body"]);

        let fields = FieldSelection::parse(Some("*")).resolve(&defaults, &available).unwrap();
        assert_eq!(fields, available.to_vec());

        let fields = FieldSelection::parse(Some("_,hero_title"))
            .resolve(&defaults, &available)
            .unwrap();
        assert_eq!(fields, vec!["hero_title"]);

        let err = FieldSelection::parse(Some("nope"))
            .resolve(&defaults, &available)
            .unwrap_err();
        assert_eq!(message(err), "unknown fields: nope");
    }

    #[test]
    fn test_listing_shape() {
        assert_eq!(
            listing(2, vec![json!({"id": 1}), json!({"id": 2})]),
            json!({"meta": {"total_count": 2}, "items": [{"id": 1}, {"id": 2}]})
        );
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12", "Page").unwrap(), 12);
        assert!(matches!(parse_id("abc", "Page"), Err(ApiError::NotFound("Page"))));
        assert!(matches!(parse_id("0", "Page"), Err(ApiError::NotFound("Page"))));
    }
}
