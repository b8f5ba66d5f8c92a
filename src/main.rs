//! ARC CMS - HTTP server entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arc_cms::run().await
}
