//! `setup-site` and `setup-cms`: make sure a published HomePage exists and
//! the default site points at it.

use anyhow::{anyhow, Context};
use clap::Args;
use serde_json::json;
use sqlx::PgPool;

use super::{heading, info, success, warning};
use crate::db::{
    self,
    models::{NewPage, Page, RevisionContent, Site},
};
use crate::pages::PageType;

const HOME_TITLE: &str = "ARC Home";

#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    /// Hostname the default site answers on
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    #[arg(long, default_value_t = 8000)]
    pub port: i32,

    #[arg(long, default_value = "ARC CMS")]
    pub site_name: String,
}

async fn require_root(pool: &PgPool) -> anyhow::Result<Page> {
    db::pages::root(pool)
        .await?
        .ok_or_else(|| anyhow!("Root page not found! Run `manage migrate` first."))
}

/// The first HomePage, or a newly created and published one under the root.
pub async fn ensure_home_page(pool: &PgPool, root: &Page, slug: &str) -> anyhow::Result<(Page, bool)> {
    if let Some(home) = db::pages::of_type(pool, PageType::Home).await?.into_iter().next() {
        return Ok((home, false));
    }

    let fields = json!({
        "hero_title": "Welcome to ARC",
        "hero_subtitle": "Building a Better Tomorrow",
    });
    let draft = db::pages::add_child(
        pool,
        root.id,
        NewPage {
            page_type: PageType::Home.api_type().to_string(),
            title: HOME_TITLE.to_string(),
            slug: slug.to_string(),
            show_in_menus: PageType::Home.show_in_menus_default(),
            content: fields.clone(),
        },
    )
    .await
    .context("Failed to create HomePage")?;

    let home = db::pages::save_and_publish(
        pool,
        draft.id,
        RevisionContent {
            title: HOME_TITLE.to_string(),
            slug: slug.to_string(),
            show_in_menus: draft.show_in_menus,
            seo_title: String::new(),
            search_description: String::new(),
            fields,
        },
    )
    .await
    .context("Failed to publish HomePage")?;

    Ok((home, true))
}

async fn point_default_site(pool: &PgPool, args: &SiteArgs, home: &Page) -> anyhow::Result<Site> {
    db::sites::upsert_default(pool, &args.hostname, args.port, &args.site_name, home.id)
        .await
        .context("Failed to save the default site")
}

/// Always (re)configure the default site to serve the HomePage.
pub async fn setup_site(pool: &PgPool, args: &SiteArgs) -> anyhow::Result<()> {
    info("Setting up site...");

    let root = require_root(pool).await?;
    let (home, created) = ensure_home_page(pool, &root, "home").await?;
    if created {
        success(&format!("Created HomePage: {}", home.title));
    } else {
        info(&format!("Found HomePage: {}", home.title));
    }

    match db::sites::default_site(pool).await? {
        Some(site) => info(&format!("Updating existing site: {}", site.site_name)),
        None => info("Creating new site..."),
    }
    let site = point_default_site(pool, args, &home).await?;
    success("Site saved");

    heading("Site Configuration Complete!");
    println!("Site Name: {}", site.site_name);
    println!("Hostname: {}:{}", site.hostname, site.port);
    println!("Root Page: {} (ID: {})", home.title, home.id);
    println!();
    println!("API: http://{}:{}/api/v2/pages/", site.hostname, site.port);
    Ok(())
}

/// First-time setup: leaves an already configured default site alone.
pub async fn setup_cms(pool: &PgPool, args: &SiteArgs) -> anyhow::Result<()> {
    info("Setting up CMS...");

    let root = require_root(pool).await?;
    let (home, created) = ensure_home_page(pool, &root, "arc-home").await?;
    if created {
        success(&format!("Created HomePage: {}", home.title));
    } else {
        info(&format!("HomePage already exists: {}", home.title));
    }

    match db::sites::default_site(pool).await? {
        Some(site) if site.root_page_id == home.id => info("Default site already configured"),
        Some(_) => {
            point_default_site(pool, args, &home).await?;
            success("Updated default site");
        }
        None => {
            point_default_site(pool, args, &home).await?;
            success("Created default site");
        }
    }

    // Touching the settings creates the record with its defaults
    let site = db::sites::default_site(pool)
        .await?
        .ok_or_else(|| anyhow!("Default site disappeared during setup"))?;
    db::sites::settings_for(pool, site.id).await?;

    heading("CMS setup complete!");
    println!("  - Home Page: {}", home.title);
    println!("  - Site: {} ({}:{})", site.site_name, site.hostname, site.port);
    println!();
    println!("Next steps:");
    println!("  1. Load sample content: manage populate-test-data");
    println!(
        "  2. Browse the API at: http://{}:{}/api/v2/pages/",
        site.hostname, site.port
    );
    if site.hostname != args.hostname || site.port != args.port {
        warning("The default site kept its existing hostname and port");
    }
    Ok(())
}
