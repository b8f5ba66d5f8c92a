/**
 * Page Routes
 * Read-only pages API: listing, detail and lookup by html path
 */
use axum::{
    extract::{Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use super::{
    check_query_params, current_site, listing, parse_id, parse_order, parse_paging, pool,
    FieldSelection, Ordering, QueryParams,
};
use crate::blocks::serialize::{serialize_value, RequestOrigin, SerializeContext};
use crate::config;
use crate::db::{
    self,
    models::Page,
    pages::{PageFilter, PageOrder},
};
use crate::error::{ApiError, ApiResult};
use crate::media::{MediaIndex, MediaRefs};
use crate::pages::{tree, PageType};

const LISTING_PARAMS: &[&str] = &[
    "limit",
    "offset",
    "fields",
    "order",
    "type",
    "child_of",
    "descendant_of",
    "slug",
    "show_in_menus",
];

/// Fields that are rendered inside the `meta` object.
const META_FIELDS: &[&str] = &[
    "type",
    "detail_url",
    "html_url",
    "slug",
    "show_in_menus",
    "seo_title",
    "search_description",
    "first_published_at",
    "parent",
];

const LISTING_DEFAULTS: &[&str] = &[
    "type",
    "detail_url",
    "html_url",
    "slug",
    "first_published_at",
    "title",
];

const ORDER_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("title", "title"),
    ("slug", "slug"),
    ("path", "path"),
    ("first_published_at", "first_published_at"),
    ("last_published_at", "last_published_at"),
];

/// Everything needed to render pages of one site for one request.
pub struct PageContext<'a> {
    pub serialize: SerializeContext<'a>,
    pub site_root: &'a Page,
    pub media: &'a MediaIndex,
}

impl PageContext<'_> {
    pub fn detail_url(&self, id: i64) -> String {
        self.serialize
            .origin
            .build_absolute_uri(&format!("/api/v2/pages/{}/", id))
    }

    /// Public URL of a page, relative to its site root. `None` outside the site.
    pub fn html_url(&self, page: &Page) -> Option<String> {
        page.url_path
            .strip_prefix(self.site_root.url_path.as_str())
            .map(|rest| self.serialize.origin.build_absolute_uri(&format!("/{}", rest)))
    }
}

pub fn page_type_of(page: &Page) -> PageType {
    page.page_type.parse().unwrap_or(PageType::Root)
}

/// Field names a page can be rendered with. Type-specific fields are only
/// known once the type is.
pub fn available_fields(page_type: Option<PageType>, with_parent: bool) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = META_FIELDS
        .iter()
        .copied()
        .filter(|f| with_parent || *f != "parent")
        .collect();
    fields.push("title");
    if let Some(page_type) = page_type {
        fields.extend(page_type.field_names());
    }
    fields
}

fn is_specific(field: &str) -> bool {
    field != "title" && !META_FIELDS.contains(&field)
}

/// Render one page with the selected fields.
pub fn page_item(page: &Page, fields: &[&str], ctx: &PageContext, parent: Option<&Page>) -> Value {
    let mut item = Map::new();
    item.insert("id".into(), json!(page.id));

    let mut meta = Map::new();
    for field in fields.iter().copied().filter(|f| META_FIELDS.contains(f)) {
        let value = match field {
            "type" => json!(page.page_type),
            "detail_url" => json!(ctx.detail_url(page.id)),
            "html_url" => json!(ctx.html_url(page)),
            "slug" => json!(page.slug),
            "show_in_menus" => json!(page.show_in_menus),
            "seo_title" => json!(page.seo_title),
            "search_description" => json!(page.search_description),
            "first_published_at" => json!(page.first_published_at),
            "parent" => parent.map_or(Value::Null, |p| parent_item(p, ctx)),
            _ => continue,
        };
        meta.insert(field.to_string(), value);
    }
    if !meta.is_empty() {
        item.insert("meta".into(), Value::Object(meta));
    }

    if fields.contains(&"title") {
        item.insert("title".into(), json!(page.title));
    }

    if fields.iter().any(|f| is_specific(f)) {
        let resolved = page_type_of(page).schema().resolve(&page.content, ctx.media);
        let content = serialize_value(&resolved, &ctx.serialize);
        for field in fields.iter().copied().filter(|f| is_specific(f)) {
            let value = content.get(field).cloned().unwrap_or(Value::Null);
            item.insert(field.to_string(), value);
        }
    }

    Value::Object(item)
}

fn parent_item(parent: &Page, ctx: &PageContext) -> Value {
    json!({
        "id": parent.id,
        "meta": {
            "type": parent.page_type,
            "detail_url": ctx.detail_url(parent.id),
            "html_url": ctx.html_url(parent),
        },
        "title": parent.title,
    })
}

async fn load_media(pool: &PgPool, pages: &[Page]) -> ApiResult<MediaIndex> {
    let mut refs = MediaRefs::default();
    for page in pages {
        page_type_of(page)
            .schema()
            .collect_media(&page.content, &mut refs);
    }
    Ok(db::media::load_index(pool, &refs).await?)
}

async fn site_root(pool: &PgPool, origin: &RequestOrigin) -> ApiResult<Page> {
    let site = current_site(pool, origin).await?;
    db::pages::get(pool, site.root_page_id)
        .await?
        .ok_or(ApiError::NotFound("Site"))
}

fn visible_in(page: &Page, site_root: &Page) -> bool {
    page.live && (page.path == site_root.path || tree::is_descendant_of(&page.path, &site_root.path))
}

/// Resolve a `child_of` / `descendant_of` id to a live page of this site.
async fn filter_page(
    pool: &PgPool,
    params: &QueryParams,
    key: &str,
    missing: &str,
    site_root: &Page,
) -> ApiResult<Option<Page>> {
    let raw = match params.get(key) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let id = raw
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a positive integer", key)))?;

    db::pages::get(pool, id)
        .await?
        .filter(|page| visible_in(page, site_root))
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(missing.to_string()))
}

fn parse_type(params: &QueryParams) -> ApiResult<Option<PageType>> {
    params
        .get("type")
        .map(|raw| {
            raw.parse::<PageType>()
                .map_err(|_| ApiError::BadRequest("type doesn't exist".into()))
        })
        .transpose()
}

fn parse_show_in_menus(params: &QueryParams) -> ApiResult<Option<bool>> {
    match params.get("show_in_menus").map(|s| s.to_ascii_lowercase()).as_deref() {
        None => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(_) => Err(ApiError::BadRequest(
            "show_in_menus must be 'true' or 'false'".into(),
        )),
    }
}

/// GET /api/v2/pages/ - List live pages of the current site
pub async fn list_pages(
    origin: RequestOrigin,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let config = config::get();
    check_query_params(&params, LISTING_PARAMS)?;
    let paging = parse_paging(&params, config)?;
    let page_type = parse_type(&params)?;
    let available = available_fields(page_type, false);
    let fields = FieldSelection::parse(params.get("fields").map(String::as_str))
        .resolve(LISTING_DEFAULTS, &available)?;
    let order = match parse_order(params.get("order").map(String::as_str), ORDER_FIELDS, &paging)? {
        Some(Ordering::Column { column, descending }) => PageOrder::Column { column, descending },
        Some(Ordering::Random) => PageOrder::Random,
        None => PageOrder::default(),
    };
    let show_in_menus = parse_show_in_menus(&params)?;

    let pool = pool()?;
    let root = site_root(&pool, &origin).await?;
    let child_of = filter_page(&pool, &params, "child_of", "parent page doesn't exist", &root).await?;
    let descendant_of =
        filter_page(&pool, &params, "descendant_of", "ancestor page doesn't exist", &root).await?;

    let filter = PageFilter {
        site_root_path: root.path.clone(),
        page_type,
        child_of: child_of.map(|p| p.path),
        descendant_of: descendant_of.map(|p| p.path),
        slug: params.get("slug").cloned(),
        show_in_menus,
        order,
        limit: paging.limit,
        offset: paging.offset,
    };
    let (pages, total) = db::pages::list_live(&pool, &filter).await?;

    let media = if fields.iter().any(|f| is_specific(f)) {
        load_media(&pool, &pages).await?
    } else {
        MediaIndex::default()
    };
    let ctx = PageContext {
        serialize: SerializeContext::new(&origin, &config.media_url),
        site_root: &root,
        media: &media,
    };

    let items = pages
        .iter()
        .map(|page| page_item(page, &fields, &ctx, None))
        .collect();

    tracing::debug!(total, returned = pages.len(), "pages listed");
    Ok(Json(listing(total, items)))
}

/// GET /api/v2/pages/{id}/ - Single live page with all of its fields
pub async fn page_detail(
    origin: RequestOrigin,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let config = config::get();
    check_query_params(&params, &["fields"])?;
    let id = parse_id(&id, "Page")?;

    let pool = pool()?;
    let root = site_root(&pool, &origin).await?;
    let page = db::pages::get(&pool, id)
        .await?
        .filter(|page| visible_in(page, &root))
        .ok_or(ApiError::NotFound("Page"))?;

    let available = available_fields(Some(page_type_of(&page)), true);
    let fields = FieldSelection::parse(params.get("fields").map(String::as_str))
        .resolve(&available, &available)?;

    let parent = match tree::parent_path(&page.path) {
        Some(path) if fields.contains(&"parent") => db::pages::by_path(&pool, path)
            .await?
            .filter(|parent| visible_in(parent, &root)),
        _ => None,
    };

    let media = load_media(&pool, std::slice::from_ref(&page)).await?;
    let ctx = PageContext {
        serialize: SerializeContext::new(&origin, &config.media_url),
        site_root: &root,
        media: &media,
    };

    Ok(Json(page_item(&page, &fields, &ctx, parent.as_ref())))
}

/// Site-relative html path to a stored url_path under `root_url_path`.
pub fn url_path_for(root_url_path: &str, html_path: &str) -> String {
    let trimmed = html_path.trim_matches('/');
    if trimmed.is_empty() {
        root_url_path.to_string()
    } else {
        format!("{}{}/", root_url_path, trimmed)
    }
}

/// GET /api/v2/pages/find/?html_path=/x/ - Redirect to the page's detail endpoint
pub async fn find_page(
    origin: RequestOrigin,
    Query(params): Query<QueryParams>,
) -> ApiResult<Response> {
    let html_path = params
        .get("html_path")
        .ok_or_else(|| ApiError::BadRequest("html_path is required".into()))?;

    let pool = pool()?;
    let root = site_root(&pool, &origin).await?;
    let url_path = url_path_for(&root.url_path, html_path);
    let page = db::pages::find_live_by_url_path(&pool, &root.path, &url_path)
        .await?
        .ok_or(ApiError::NotFound("Page"))?;

    Ok(redirect_to_detail(page.id, &params))
}

fn redirect_to_detail(id: i64, params: &QueryParams) -> Response {
    let mut rest: Vec<(&String, &String)> =
        params.iter().filter(|(k, _)| k.as_str() != "html_path").collect();
    rest.sort();

    let mut location = format!("/api/v2/pages/{}/", id);
    if !rest.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(rest)
            .finish();
        location.push('?');
        location.push_str(&query);
    }

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use crate::db::models::Image;
    use crate::error::ErrorResponse;

    fn page(id: i64, path: &str, url_path: &str, page_type: PageType, content: Value) -> Page {
        let published = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Page {
            id,
            path: path.into(),
            depth: tree::depth_of(path),
            numchild: 0,
            page_type: page_type.api_type().into(),
            title: format!("Page {}", id),
            draft_title: format!("Page {}", id),
            slug: url_path.trim_matches('/').rsplit('/').next().unwrap_or("").into(),
            url_path: url_path.into(),
            live: true,
            has_unpublished_changes: false,
            show_in_menus: true,
            seo_title: String::new(),
            search_description: String::new(),
            content,
            latest_revision_id: None,
            live_revision_id: None,
            first_published_at: Some(published),
            last_published_at: Some(published),
            created_at: published,
            updated_at: published,
        }
    }

    fn home() -> Page {
        page(
            3,
            "00010001",
            "/home/",
            PageType::Home,
            json!({"hero_title": "Welcome to ARC", "hero_subtitle": "", "hero_background": 9, "body": []}),
        )
    }

    fn hero_image() -> Image {
        Image {
            id: 9,
            title: "Arena".into(),
            file: "original_images/arena.jpg".into(),
            width: 3840,
            height: 2160,
            file_size: None,
            file_hash: String::new(),
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    fn test_router() -> Router {
        Router::new()
            .route("/api/v2/pages/", get(list_pages))
            .route("/api/v2/pages/find/", get(find_page))
            .route("/api/v2/pages/{id}/", get(page_detail))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, T) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value: T = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    #[test]
    fn test_available_fields_need_type_for_specific_fields() {
        let untyped = available_fields(None, false);
        assert!(untyped.contains(&"title"));
        assert!(!untyped.contains(&"body"));
        assert!(!untyped.contains(&"parent"));

        let typed = available_fields(Some(PageType::Home), true);
        assert!(typed.contains(&"hero_title"));
        assert!(typed.contains(&"body"));
        assert!(typed.contains(&"parent"));
    }

    #[test]
    fn test_listing_item_has_default_meta() {
        let origin = RequestOrigin::new("http", "localhost:8001");
        let root = home();
        let about = page(4, "000100010001", "/home/about/", PageType::About, json!({}));
        let media = MediaIndex::default();
        let ctx = PageContext {
            serialize: SerializeContext::new(&origin, "/media/"),
            site_root: &root,
            media: &media,
        };

        let fields = FieldSelection::parse(None)
            .resolve(LISTING_DEFAULTS, &available_fields(None, false))
            .unwrap();
        let item = page_item(&about, &fields, &ctx, None);

        assert_eq!(item["id"], 4);
        assert_eq!(item["title"], "Page 4");
        assert_eq!(item["meta"]["type"], "cms_app.AboutPage");
        assert_eq!(item["meta"]["detail_url"], "http://localhost:8001/api/v2/pages/4/");
        assert_eq!(item["meta"]["html_url"], "http://localhost:8001/about/");
        assert_eq!(item["meta"]["slug"], "about");
        assert!(item["meta"].get("seo_title").is_none());
        assert!(item.get("intro").is_none());

        let keys: Vec<&String> = item.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "meta", "title"]);
    }

    #[test]
    fn test_detail_item_resolves_media_and_parent() {
        let origin = RequestOrigin::new("https", "api.arc.example");
        let root = home();
        let media = MediaIndex::new(vec![hero_image()], vec![]);
        let ctx = PageContext {
            serialize: SerializeContext::new(&origin, "/media/"),
            site_root: &root,
            media: &media,
        };

        let available = available_fields(Some(PageType::Home), true);
        let fields = FieldSelection::parse(None).resolve(&available, &available).unwrap();
        let item = page_item(&root, &fields, &ctx, None);

        assert_eq!(item["meta"]["html_url"], "https://api.arc.example/");
        assert_eq!(item["meta"]["parent"], Value::Null);
        assert_eq!(item["hero_title"], "Welcome to ARC");
        assert_eq!(item["body"], json!([]));
        assert_eq!(
            item["hero_background"]["full_url"],
            "https://api.arc.example/media/images/arena.9.fill-1920x1080.jpg"
        );
        assert_eq!(item["hero_background"]["width"], 1920);
        assert_eq!(item["hero_background"]["alt"], "Arena");

        let child = page(5, "000100010002", "/home/rules/", PageType::Rules, json!({}));
        let available = available_fields(Some(PageType::Rules), true);
        let fields = FieldSelection::parse(Some("_,parent"))
            .resolve(&available, &available)
            .unwrap();
        let item = page_item(&child, &fields, &ctx, Some(&root));
        assert_eq!(item["meta"]["parent"]["id"], 3);
        assert_eq!(item["meta"]["parent"]["title"], "Page 3");
        assert_eq!(item["meta"]["parent"]["meta"]["html_url"], "https://api.arc.example/");
    }

    #[test]
    fn test_missing_media_renders_null() {
        let origin = RequestOrigin::new("http", "localhost");
        let root = home();
        let media = MediaIndex::default();
        let ctx = PageContext {
            serialize: SerializeContext::new(&origin, "/media/"),
            site_root: &root,
            media: &media,
        };
        let item = page_item(&root, &["hero_background"], &ctx, None);
        assert_eq!(item["hero_background"], Value::Null);
    }

    #[test]
    fn test_url_path_for_html_path() {
        assert_eq!(url_path_for("/home/", "/"), "/home/");
        assert_eq!(url_path_for("/home/", "/about/"), "/home/about/");
        assert_eq!(url_path_for("/home/", "events"), "/home/events/");
    }

    #[test]
    fn test_find_redirect_keeps_other_params() {
        let mut params = QueryParams::new();
        params.insert("html_path".into(), "/about/".into());
        params.insert("fields".into(), "title,intro".into());
        let res = redirect_to_detail(4, &params);
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers()[header::LOCATION],
            "/api/v2/pages/4/?fields=title%2Cintro"
        );
    }

    #[tokio::test]
    async fn test_list_rejects_bad_params_before_touching_db() {
        let (status, body) =
            get_json::<ErrorResponse>(test_router(), "/api/v2/pages/?limit=50").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "limit cannot be higher than 20");

        let (status, body) =
            get_json::<ErrorResponse>(test_router(), "/api/v2/pages/?type=cms_app.Nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "type doesn't exist");

        let (status, body) = get_json::<ErrorResponse>(test_router(), "/api/v2/pages/?fields=body").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "unknown fields: body");

        let (status, body) = get_json::<ErrorResponse>(test_router(), "/api/v2/pages/?colour=red").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.message,
            "query parameter is not an operation or a recognised field: colour"
        );
    }

    #[tokio::test]
    async fn test_typed_listing_without_db_is_unavailable() {
        let (status, _) = get_json::<ErrorResponse>(
            test_router(),
            "/api/v2/pages/?type=cms_app.HomePage&fields=body",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_detail_with_non_numeric_id_is_not_found() {
        let (status, body) = get_json::<ErrorResponse>(test_router(), "/api/v2/pages/home/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "No Page matches the given query.");
    }

    #[tokio::test]
    async fn test_find_requires_html_path() {
        let (status, body) = get_json::<ErrorResponse>(test_router(), "/api/v2/pages/find/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "html_path is required");
    }
}
