//! `fix-tree`: recreate a missing root, repair tree bookkeeping columns and
//! re-point the default site at the HomePage.

use sqlx::PgPool;

use super::{info, success, warning};
use crate::db;
use crate::pages::tree::{self, TreeFix};
use crate::pages::PageType;

pub fn describe(fix: &TreeFix) -> String {
    match fix {
        TreeFix::Depth { id, from, to } => format!("page {}: depth {} -> {}", id, from, to),
        TreeFix::NumChild { id, from, to } => format!("page {}: numchild {} -> {}", id, from, to),
        TreeFix::UrlPath { id, from, to } => format!("page {}: url_path {} -> {}", id, from, to),
        TreeFix::Orphan { id, path } => format!("page {}: no parent for path {}", id, path),
    }
}

pub async fn fix_tree(pool: &PgPool, dry_run: bool) -> anyhow::Result<()> {
    info("Fixing page tree...");

    match db::pages::root(pool).await? {
        Some(root) => info(&format!("Root page found: {} (ID: {})", root.title, root.id)),
        None => {
            warning("Root page not found! Creating...");
            let root = db::pages::add_root(pool, "Root").await?;
            success(&format!("Root page created (ID: {})", root.id));
        }
    }

    let nodes = db::pages::tree_nodes(pool).await?;
    let fixes = tree::repair_plan(&nodes);
    let (orphans, repairs): (Vec<&TreeFix>, Vec<&TreeFix>) = fixes
        .iter()
        .partition(|fix| matches!(fix, TreeFix::Orphan { .. }));

    for fix in &repairs {
        info(&describe(fix));
    }
    for orphan in &orphans {
        warning(&describe(orphan));
    }

    if repairs.is_empty() {
        success("Tree structure is consistent");
    } else if dry_run {
        info(&format!("{} fix(es) found, nothing written (dry run)", repairs.len()));
    } else {
        let applied = db::pages::apply_tree_fixes(pool, &fixes).await?;
        success(&format!("Tree structure fixed ({} update(s))", applied));
    }

    let home_pages = db::pages::of_type(pool, PageType::Home).await?;
    if home_pages.is_empty() {
        info("No HomePage found yet - run `manage setup-cms` to create one");
    } else {
        info(&format!("Found {} HomePage(s)", home_pages.len()));
        for home in &home_pages {
            println!("  - {} (ID: {})", home.title, home.id);
        }
    }

    if let Some(site) = db::sites::default_site(pool).await? {
        info(&format!(
            "Default site: {} -> page {}",
            site.site_name, site.root_page_id
        ));
        if let Some(home) = home_pages.first() {
            if site.root_page_id != home.id && !dry_run {
                db::sites::set_root_page(pool, site.id, home.id).await?;
                success(&format!("Site root updated to: {}", home.title));
            }
        }
    }

    success("Tree fixed!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_fixes() {
        assert_eq!(
            describe(&TreeFix::NumChild {
                id: 2,
                from: 0,
                to: 3
            }),
            "page 2: numchild 0 -> 3"
        );
        assert_eq!(
            describe(&TreeFix::UrlPath {
                id: 5,
                from: "/home/old/".into(),
                to: "/home/new/".into()
            }),
            "page 5: url_path /home/old/ -> /home/new/"
        );
        assert_eq!(
            describe(&TreeFix::Orphan {
                id: 9,
                path: "000100050001".into()
            }),
            "page 9: no parent for path 000100050001"
        );
    }
}
