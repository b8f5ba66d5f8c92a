//! `populate-test-data`: fill the HomePage and site settings with sample
//! content so the frontend has something to render.

use anyhow::{bail, Context};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use sqlx::PgPool;
use std::io::Cursor;
use std::path::Path;

use super::fixtures;
use super::media::{import_document, import_image};
use super::{heading, info, success, warning};
use crate::db::{self, models::RevisionContent};
use crate::pages::{self, settings, PageType};

const TEST_TAG: &str = "test-data";

const LOGO_COLORS: &[[u8; 3]] = &[
    [0x1e, 0x3a, 0x8a],
    [0xdc, 0x26, 0x26],
    [0x05, 0x96, 0x69],
    [0xd9, 0x77, 0x06],
];

/// Solid colour PNG standing in for a sponsor logo.
pub fn placeholder_logo(index: usize) -> anyhow::Result<Vec<u8>> {
    let color = LOGO_COLORS[index % LOGO_COLORS.len()];
    let img = RgbImage::from_pixel(400, 200, Rgb(color));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

pub fn placeholder_document(name: &str) -> Vec<u8> {
    format!(
        "{}\n\nPlaceholder created by `manage populate-test-data`. Replace it with the real file.\n",
        name
    )
    .into_bytes()
}

async fn import_rule_documents(pool: &PgPool, media_root: &Path) -> anyhow::Result<Vec<i64>> {
    let tags = vec![TEST_TAG.to_string()];
    let mut ids = Vec::with_capacity(fixtures::RULE_DOCUMENTS.len());
    for &(name, _, _) in fixtures::RULE_DOCUMENTS {
        let file_name = format!("{}.txt", pages::slugify(name));
        let (document, _) = import_document(
            pool,
            media_root,
            &file_name,
            &placeholder_document(name),
            Some(name),
            &tags,
        )
        .await
        .with_context(|| format!("Failed to create document {}", name))?;
        ids.push(document.id);
    }
    Ok(ids)
}

async fn populate_settings(pool: &PgPool, media_root: &Path) -> anyhow::Result<()> {
    let Some(site) = db::sites::default_site(pool).await? else {
        bail!("no default site, run `manage setup-cms` first");
    };

    let tags = vec![TEST_TAG.to_string()];
    let mut logos = Vec::with_capacity(fixtures::SPONSORS.len());
    for (i, name) in fixtures::SPONSORS.iter().enumerate() {
        let file_name = format!("{}-logo.png", pages::slugify(name));
        let (image, _) = import_image(
            pool,
            media_root,
            &file_name,
            &placeholder_logo(i)?,
            Some(format!("{} Logo", name).as_str()),
            &tags,
        )
        .await?;
        logos.push(image.id);
    }

    let current = db::sites::settings_for(pool, site.id).await?;
    let updated = settings::apply_changes(&current, fixtures::site_settings(&logos))?;
    db::sites::save_settings(pool, site.id, &updated).await?;
    Ok(())
}

pub async fn populate_test_data(pool: &PgPool, media_root: &Path) -> anyhow::Result<()> {
    info("Starting CMS test data population...");

    let Some(home) = db::pages::of_type(pool, PageType::Home)
        .await?
        .into_iter()
        .next()
    else {
        bail!("No HomePage found! Please create one first (manage setup-cms).");
    };
    info(&format!("Found existing HomePage: {}", home.title));

    let documents = import_rule_documents(pool, media_root).await?;
    success(&format!("{} rule document(s) ready", documents.len()));

    let mut fields = match home.content.clone() {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    fields.insert("body".to_string(), fixtures::home_body(&documents));

    let published = db::pages::save_and_publish(
        pool,
        home.id,
        RevisionContent {
            title: home.title.clone(),
            slug: home.slug.clone(),
            show_in_menus: home.show_in_menus,
            seo_title: home.seo_title.clone(),
            search_description: home.search_description.clone(),
            fields: Value::Object(fields),
        },
    )
    .await
    .context("Failed to publish HomePage content")?;
    success("HomePage content populated and published");

    match populate_settings(pool, media_root).await {
        Ok(()) => success("Site Settings populated"),
        Err(e) => warning(&format!("Could not update Site Settings: {}", e)),
    }

    heading("Test data population complete!");
    println!("  - HomePage: {} (ID: {})", published.title, published.id);
    println!("  - StreamField blocks: {}", published.content["body"].as_array().map_or(0, Vec::len));
    println!();
    println!("Fetch it at /api/v2/pages/{}/", published.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_logo_is_png() {
        let bytes = placeholder_logo(1).unwrap();
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (400, 200));
    }

    #[test]
    fn test_placeholder_logos_differ() {
        assert_ne!(placeholder_logo(0).unwrap(), placeholder_logo(1).unwrap());
    }

    #[test]
    fn test_placeholder_document_names_itself() {
        let text = String::from_utf8(placeholder_document("Safety Guidelines")).unwrap();
        assert!(text.starts_with("Safety Guidelines\n"));
    }
}
