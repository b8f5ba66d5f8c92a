//! Management commands for the ARC CMS.
//!
//! ```bash
//! manage migrate
//! manage setup-cms
//! manage populate-test-data
//! manage add-image logo.png --tag sponsors
//! ```

use arc_cms::commands::{self, media, populate, site, tree};
use arc_cms::config::AppConfig;
use arc_cms::logging::{self, LogConfig};
use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "manage")]
#[command(about = "ARC CMS management commands", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update tables and the page tree root
    Migrate,

    /// Repair page tree bookkeeping and point the default site at the HomePage
    FixTree {
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a HomePage if needed and (re)configure the default site
    SetupSite(site::SiteArgs),

    /// First-time setup: HomePage, default site and settings
    SetupCms(site::SiteArgs),

    /// Fill the HomePage and site settings with sample content
    PopulateTestData,

    /// Import image files into the media library
    AddImage(media::ImportArgs),

    /// Import document files into the media library
    AddDocument(media::ImportArgs),

    /// Create missing renditions for stored images
    GenerateRenditions(media::RenditionArgs),
}

async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let pool = commands::connect().await?;
    let media_root = config.media_root.as_path();

    match command {
        Commands::Migrate => commands::migrate(&pool).await,
        Commands::FixTree { dry_run } => tree::fix_tree(&pool, dry_run).await,
        Commands::SetupSite(args) => site::setup_site(&pool, &args).await,
        Commands::SetupCms(args) => site::setup_cms(&pool, &args).await,
        Commands::PopulateTestData => populate::populate_test_data(&pool, media_root).await,
        Commands::AddImage(args) => media::add_images(&pool, media_root, &args).await,
        Commands::AddDocument(args) => media::add_documents(&pool, media_root, &args).await,
        Commands::GenerateRenditions(args) => {
            media::generate_renditions(&pool, media_root, &args).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            commands::error(&format!("Invalid configuration: {:#}", e));
            process::exit(1);
        }
    };
    let _guards = logging::init(&LogConfig::console());

    if let Err(e) = run(cli.command, &config).await {
        commands::error(&format!("{:#}", e));
        process::exit(1);
    }
}
