//! Site-wide settings: one record per site holding footer, contact,
//! sponsor and navigation content.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::blocks::library as lib;
use crate::blocks::{clean, BlockDef, InvalidContent};

static SITE_SETTINGS: Lazy<BlockDef> = Lazy::new(|| {
    BlockDef::structure(
        "SiteSettings",
        vec![
            ("site_name", BlockDef::char(255).with_default("ARC Lebanon")),
            ("site_tagline", BlockDef::char(255).optional()),
            ("site_description", BlockDef::text().optional()),
            ("site_logo", BlockDef::image().optional()),
            (
                "contact_info",
                BlockDef::stream(vec![("contact", lib::contact_info())]).optional(),
            ),
            (
                "sponsors",
                BlockDef::stream(vec![("sponsor", lib::sponsor())]).optional(),
            ),
            (
                "organizers",
                BlockDef::stream(vec![("organizer", lib::organizer())]).optional(),
            ),
            (
                "social_links",
                BlockDef::stream(vec![("social_link", lib::social_link())]).optional(),
            ),
            (
                "copyright_text",
                BlockDef::char(255).with_default("© 2025 ARC Lebanon. All rights reserved."),
            ),
            ("footer_about_text", BlockDef::text().optional()),
            (
                "navigation_items",
                BlockDef::stream(vec![("nav_item", lib::navigation_item())]).optional(),
            ),
            ("show_login_button", BlockDef::boolean(true)),
            (
                "login_button_text",
                BlockDef::char(100).with_default("Login / Register"),
            ),
            ("login_url", BlockDef::url().optional()),
        ],
    )
});

pub fn schema() -> &'static BlockDef {
    &SITE_SETTINGS
}

/// Settings for a site that has never been edited.
pub fn default_content() -> Value {
    schema().normalize(Value::Null)
}

/// Merge `changes` over `current`, then validate and normalize the result.
pub fn apply_changes(current: &Value, changes: Value) -> Result<Value, InvalidContent> {
    let mut merged = match current {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Value::Object(changes) = changes {
        merged.extend(changes);
    }
    clean(schema(), Value::Object(merged), "")
}
