//! Page tree storage, revisions and publishing.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::models::{NewPage, Page, PageRevision, RevisionContent};
use super::StoreError;
use crate::pages::tree::{self, TreeError, TreeNode};
use crate::pages::{validate_slug, PageType};

const PAGE_COLUMNS: &str = "id, path, depth, numchild, page_type, title, draft_title, slug, \
    url_path, live, has_unpublished_changes, show_in_menus, seo_title, search_description, \
    content, latest_revision_id, live_revision_id, first_published_at, last_published_at, \
    created_at, updated_at";

/// Sort order for page listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOrder {
    Column { column: &'static str, descending: bool },
    Random,
}

impl Default for PageOrder {
    fn default() -> Self {
        PageOrder::Column {
            column: "path",
            descending: false,
        }
    }
}

/// Filters for listing live pages below a site root.
#[derive(Debug, Clone, Default)]
pub struct PageFilter {
    /// Path of the site root; only it and its descendants are listed
    pub site_root_path: String,
    pub page_type: Option<PageType>,
    pub child_of: Option<String>,
    pub descendant_of: Option<String>,
    pub slug: Option<String>,
    pub show_in_menus: Option<bool>,
    pub order: PageOrder,
    pub limit: i64,
    pub offset: i64,
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!("SELECT {} FROM pages WHERE id = $1", PAGE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn by_path(pool: &PgPool, path: &str) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!("SELECT {} FROM pages WHERE path = $1", PAGE_COLUMNS))
        .bind(path)
        .fetch_optional(pool)
        .await
}

pub async fn root(pool: &PgPool) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE depth = 1 ORDER BY path LIMIT 1",
        PAGE_COLUMNS
    ))
    .fetch_optional(pool)
    .await
}

pub async fn of_type(pool: &PgPool, page_type: PageType) -> Result<Vec<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE page_type = $1 ORDER BY path",
        PAGE_COLUMNS
    ))
    .bind(page_type.api_type())
    .fetch_all(pool)
    .await
}

pub async fn children(pool: &PgPool, parent: &Page) -> Result<Vec<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE path LIKE $1 AND depth = $2 ORDER BY path",
        PAGE_COLUMNS
    ))
    .bind(format!("{}%", parent.path))
    .bind(parent.depth + 1)
    .fetch_all(pool)
    .await
}

/// Live page at `url_path` that lies within the tree under `site_root_path`.
pub async fn find_live_by_url_path(
    pool: &PgPool,
    site_root_path: &str,
    url_path: &str,
) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE live AND url_path = $1 AND path LIKE $2 ORDER BY path LIMIT 1",
        PAGE_COLUMNS
    ))
    .bind(url_path)
    .bind(format!("{}%", site_root_path))
    .fetch_optional(pool)
    .await
}

/// Live pages matching `filter`, with the total count before paging.
pub async fn list_live(pool: &PgPool, filter: &PageFilter) -> Result<(Vec<Page>, i64), sqlx::Error> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM pages");
    push_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM pages", PAGE_COLUMNS));
    push_filter(&mut query, filter);
    match &filter.order {
        PageOrder::Column { column, descending } => {
            query.push(format!(
                " ORDER BY {} {}, id",
                column,
                if *descending { "DESC" } else { "ASC" }
            ));
        }
        PageOrder::Random => {
            query.push(" ORDER BY random()");
        }
    }
    query.push(" LIMIT ").push_bind(filter.limit);
    query.push(" OFFSET ").push_bind(filter.offset);

    let pages = query.build_query_as::<Page>().fetch_all(pool).await?;
    Ok((pages, total))
}

fn push_filter<'a>(query: &mut QueryBuilder<'a, Postgres>, filter: &'a PageFilter) {
    query
        .push(" WHERE live AND path LIKE ")
        .push_bind(format!("{}%", filter.site_root_path));

    if let Some(page_type) = filter.page_type {
        query.push(" AND page_type = ").push_bind(page_type.api_type());
    }
    if let Some(parent) = &filter.child_of {
        query
            .push(" AND path LIKE ")
            .push_bind(format!("{}%", parent))
            .push(" AND depth = ")
            .push_bind(tree::depth_of(parent) + 1);
    }
    if let Some(ancestor) = &filter.descendant_of {
        query
            .push(" AND path LIKE ")
            .push_bind(format!("{}%", ancestor))
            .push(" AND path <> ")
            .push_bind(ancestor.as_str());
    }
    if let Some(slug) = &filter.slug {
        query.push(" AND slug = ").push_bind(slug.as_str());
    }
    if let Some(show) = filter.show_in_menus {
        query.push(" AND show_in_menus = ").push_bind(show);
    }
}

/// Create the tree root. Fails if one already exists.
pub async fn add_root(pool: &PgPool, title: &str) -> Result<Page, StoreError> {
    let page = sqlx::query_as::<_, Page>(&format!(
        r#"
        INSERT INTO pages (path, depth, numchild, page_type, title, draft_title, slug, url_path,
                           live, show_in_menus, content)
        VALUES ($1, 1, 0, $2, $3, $3, 'root', $4, true, false, '{{}}'::jsonb)
        RETURNING {}
        "#,
        PAGE_COLUMNS
    ))
    .bind(tree::ROOT_PATH)
    .bind(PageType::Root.api_type())
    .bind(title)
    .bind(tree::ROOT_URL_PATH)
    .fetch_one(pool)
    .await?;

    tracing::info!(page_id = page.id, "root page created");
    Ok(page)
}

/// Insert a new, not yet live, page as the last child of `parent_id`.
pub async fn add_child(pool: &PgPool, parent_id: i64, new: NewPage) -> Result<Page, StoreError> {
    let page_type: PageType = new
        .page_type
        .parse()
        .map_err(|_| StoreError::UnknownPageType(new.page_type.clone()))?;
    validate_slug(&new.slug).map_err(|e| crate::blocks::InvalidContent(vec![e]))?;
    let content = page_type.clean_content(new.content)?;

    let mut tx = pool.begin().await?;
    let parent = lock_page(&mut tx, parent_id).await?;
    ensure_unique_slug(&mut tx, &parent, &new.slug, None).await?;

    let last_child: Option<(String,)> = sqlx::query_as(
        "SELECT path FROM pages WHERE path LIKE $1 AND depth = $2 ORDER BY path DESC LIMIT 1",
    )
    .bind(format!("{}%", parent.path))
    .bind(parent.depth + 1)
    .fetch_optional(&mut *tx)
    .await?;
    let path = tree::next_child_path(&parent.path, last_child.as_ref().map(|(p,)| p.as_str()))?;

    let page = sqlx::query_as::<_, Page>(&format!(
        r#"
        INSERT INTO pages (path, depth, numchild, page_type, title, draft_title, slug, url_path,
                           live, show_in_menus, content)
        VALUES ($1, $2, 0, $3, $4, $4, $5, $6, false, $7, $8)
        RETURNING {}
        "#,
        PAGE_COLUMNS
    ))
    .bind(&path)
    .bind(tree::depth_of(&path))
    .bind(page_type.api_type())
    .bind(&new.title)
    .bind(&new.slug)
    .bind(tree::child_url_path(&parent.url_path, &new.slug))
    .bind(new.show_in_menus)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE pages SET numchild = numchild + 1, updated_at = now() WHERE id = $1")
        .bind(parent.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(page_id = page.id, path = %page.path, page_type = %page.page_type, "page created");
    Ok(page)
}

/// Store a draft revision. The live copy is untouched until it is published.
pub async fn save_revision(
    pool: &PgPool,
    page_id: i64,
    content: RevisionContent,
) -> Result<PageRevision, StoreError> {
    let mut tx = pool.begin().await?;
    let page = lock_page(&mut tx, page_id).await?;
    let page_type: PageType = page
        .page_type
        .parse()
        .map_err(|_| StoreError::UnknownPageType(page.page_type.clone()))?;

    validate_slug(&content.slug).map_err(|e| crate::blocks::InvalidContent(vec![e]))?;
    let fields = page_type.clean_content(content.fields)?;
    if let Some(parent_path) = tree::parent_path(&page.path) {
        let parent = lock_page_by_path(&mut tx, parent_path).await?;
        ensure_unique_slug(&mut tx, &parent, &content.slug, Some(page.id)).await?;
    }

    let snapshot = RevisionContent { fields, ..content };
    let revision = sqlx::query_as::<_, PageRevision>(
        r#"
        INSERT INTO page_revisions (page_id, content)
        VALUES ($1, $2)
        RETURNING id, page_id, content, created_at, published_at
        "#,
    )
    .bind(page.id)
    .bind(sqlx::types::Json(&snapshot))
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE pages
        SET draft_title = $2, has_unpublished_changes = true, latest_revision_id = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(page.id)
    .bind(&snapshot.title)
    .bind(revision.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(page_id = page.id, revision_id = revision.id, "revision saved");
    Ok(revision)
}

/// Make a revision the live version of its page.
///
/// A slug change moves the page's url path and those of all its descendants.
pub async fn publish_revision(pool: &PgPool, revision_id: i64) -> Result<Page, StoreError> {
    let mut tx = pool.begin().await?;

    let revision = sqlx::query_as::<_, PageRevision>(
        "SELECT id, page_id, content, created_at, published_at FROM page_revisions WHERE id = $1",
    )
    .bind(revision_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(StoreError::NotFound("Revision", revision_id))?;
    let snapshot: RevisionContent = serde_json::from_value(revision.content.clone())
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;

    let page = lock_page(&mut tx, revision.page_id).await?;
    let url_path = match tree::parent_path(&page.path) {
        Some(parent_path) => {
            let parent = lock_page_by_path(&mut tx, parent_path).await?;
            tree::child_url_path(&parent.url_path, &snapshot.slug)
        }
        None => tree::ROOT_URL_PATH.to_string(),
    };

    let published = sqlx::query_as::<_, Page>(&format!(
        r#"
        UPDATE pages
        SET title = $2, draft_title = $2, slug = $3, url_path = $4, show_in_menus = $5,
            seo_title = $6, search_description = $7, content = $8, live = true,
            has_unpublished_changes = (latest_revision_id IS NOT NULL AND latest_revision_id <> $9),
            live_revision_id = $9,
            first_published_at = COALESCE(first_published_at, now()),
            last_published_at = now(), updated_at = now()
        WHERE id = $1
        RETURNING {}
        "#,
        PAGE_COLUMNS
    ))
    .bind(page.id)
    .bind(&snapshot.title)
    .bind(&snapshot.slug)
    .bind(&url_path)
    .bind(snapshot.show_in_menus)
    .bind(&snapshot.seo_title)
    .bind(&snapshot.search_description)
    .bind(&snapshot.fields)
    .bind(revision.id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE page_revisions SET published_at = now() WHERE id = $1")
        .bind(revision.id)
        .execute(&mut *tx)
        .await?;

    if page.url_path != url_path {
        let moved = sqlx::query(
            r#"
            UPDATE pages
            SET url_path = $2 || substr(url_path, char_length($3) + 1), updated_at = now()
            WHERE path LIKE $1 AND path <> $4 AND starts_with(url_path, $3)
            "#,
        )
        .bind(format!("{}%", page.path))
        .bind(&url_path)
        .bind(&page.url_path)
        .bind(&page.path)
        .execute(&mut *tx)
        .await?;
        tracing::info!(
            page_id = page.id,
            from = %page.url_path,
            to = %url_path,
            descendants = moved.rows_affected(),
            "page moved"
        );
    }

    tx.commit().await?;

    tracing::info!(page_id = published.id, revision_id, "page published");
    Ok(published)
}

/// Save `content` as a revision and publish it straight away.
pub async fn save_and_publish(
    pool: &PgPool,
    page_id: i64,
    content: RevisionContent,
) -> Result<Page, StoreError> {
    let revision = save_revision(pool, page_id, content).await?;
    publish_revision(pool, revision.id).await
}

/// Tree columns of every page, for [`tree::repair_plan`].
pub async fn tree_nodes(pool: &PgPool) -> Result<Vec<TreeNode>, sqlx::Error> {
    let rows: Vec<(i64, String, i32, i32, String, String)> = sqlx::query_as(
        "SELECT id, path, depth, numchild, slug, url_path FROM pages ORDER BY path",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, path, depth, numchild, slug, url_path)| TreeNode {
            id,
            path,
            depth,
            numchild,
            slug,
            url_path,
        })
        .collect())
}

/// Apply the corrections from a repair plan in one transaction. Orphans are left alone.
pub async fn apply_tree_fixes(pool: &PgPool, fixes: &[tree::TreeFix]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0;

    for fix in fixes {
        let result = match fix {
            tree::TreeFix::Depth { id, to, .. } => {
                sqlx::query("UPDATE pages SET depth = $2 WHERE id = $1")
                    .bind(id)
                    .bind(to)
                    .execute(&mut *tx)
                    .await?
            }
            tree::TreeFix::NumChild { id, to, .. } => {
                sqlx::query("UPDATE pages SET numchild = $2 WHERE id = $1")
                    .bind(id)
                    .bind(to)
                    .execute(&mut *tx)
                    .await?
            }
            tree::TreeFix::UrlPath { id, to, .. } => {
                sqlx::query("UPDATE pages SET url_path = $2 WHERE id = $1")
                    .bind(id)
                    .bind(to)
                    .execute(&mut *tx)
                    .await?
            }
            tree::TreeFix::Orphan { .. } => continue,
        };
        applied += result.rows_affected();
    }

    tx.commit().await?;
    Ok(applied)
}

async fn lock_page(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Page, StoreError> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE id = $1 FOR UPDATE",
        PAGE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::NotFound("Page", id))
}

async fn lock_page_by_path(tx: &mut Transaction<'_, Postgres>, path: &str) -> Result<Page, StoreError> {
    sqlx::query_as::<_, Page>(&format!(
        "SELECT {} FROM pages WHERE path = $1 FOR UPDATE",
        PAGE_COLUMNS
    ))
    .bind(path)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| StoreError::Tree(TreeError::InvalidPath(path.to_string())))
}

async fn ensure_unique_slug(
    tx: &mut Transaction<'_, Postgres>,
    parent: &Page,
    slug: &str,
    except: Option<i64>,
) -> Result<(), StoreError> {
    let taken: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM pages WHERE path LIKE $1 AND depth = $2 AND slug = $3 AND id <> $4 LIMIT 1",
    )
    .bind(format!("{}%", parent.path))
    .bind(parent.depth + 1)
    .bind(slug)
    .bind(except.unwrap_or(0))
    .fetch_optional(&mut **tx)
    .await?;

    match taken {
        Some(_) => Err(TreeError::DuplicateSlug {
            slug: slug.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}
