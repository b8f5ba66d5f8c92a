//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Page model: tree position, metadata and the live copy of its content
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub path: String,
    pub depth: i32,
    pub numchild: i32,
    pub page_type: String,
    pub title: String,
    pub draft_title: String,
    pub slug: String,
    pub url_path: String,
    pub live: bool,
    pub has_unpublished_changes: bool,
    pub show_in_menus: bool,
    pub seo_title: String,
    pub search_description: String,
    pub content: serde_json::Value,
    pub latest_revision_id: Option<i64>,
    pub live_revision_id: Option<i64>,
    pub first_published_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New page for insertion under a parent (tree columns are computed by the store)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPage {
    pub page_type: String,
    pub title: String,
    pub slug: String,
    pub show_in_menus: bool,
    pub content: serde_json::Value,
}

/// Page revision model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PageRevision {
    pub id: i64,
    pub page_id: i64,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Snapshot stored in a revision: page metadata plus type-specific fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionContent {
    pub title: String,
    pub slug: String,
    pub show_in_menus: bool,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub search_description: String,
    pub fields: serde_json::Value,
}

/// Site model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub hostname: String,
    pub port: i32,
    pub site_name: String,
    pub root_page_id: i64,
    pub is_default_site: bool,
}

/// Per-site settings record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SiteSettingsRecord {
    pub site_id: i64,
    pub content: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Image model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: i64,
    pub title: String,
    /// Path relative to the media root, e.g. `original_images/logo.png`
    pub file: String,
    pub width: i32,
    pub height: i32,
    pub file_size: Option<i64>,
    pub file_hash: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// New image for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImage {
    pub title: String,
    pub file: String,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    pub file_hash: String,
    pub tags: Vec<String>,
}

/// Document model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: i64,
    pub title: String,
    /// Path relative to the media root, e.g. `documents/rules.pdf`
    pub file: String,
    pub file_size: Option<i64>,
    pub file_hash: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// New document for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub file: String,
    pub file_size: i64,
    pub file_hash: String,
    pub tags: Vec<String>,
}

impl Image {
    pub fn filename(&self) -> &str {
        base_name(&self.file)
    }
}

impl Document {
    pub fn filename(&self) -> &str {
        base_name(&self.file)
    }

    /// Lowercase extension without the dot, empty when the file has none.
    pub fn file_extension(&self) -> String {
        let name = self.filename();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
