//! Management commands run through the `manage` binary.

pub mod fixtures;
pub mod media;
pub mod populate;
pub mod site;
pub mod tree;

use anyhow::Context;
use colored::Colorize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::db;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an informational message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

pub fn heading(msg: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", msg.green().bold());
    println!("{}", "=".repeat(60));
}

/// Connect to `DATABASE_URL`; commands cannot run without the database.
pub async fn connect() -> anyhow::Result<Arc<PgPool>> {
    db::init_pool(None)
        .await
        .context("Failed to connect to the database (is DATABASE_URL set?)")
}

/// Create tables and the tree root.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    info("Applying migrations...");
    db::run_migrations(pool)
        .await
        .context("Failed to run migrations")?;
    success("Tables are up to date");

    match db::pages::root(pool).await? {
        Some(root) => info(&format!("Root page exists (ID: {})", root.id)),
        None => {
            let root = db::pages::add_root(pool, "Root").await?;
            success(&format!("Created root page (ID: {})", root.id));
        }
    }
    Ok(())
}
