//! `add-image`, `add-document` and `generate-renditions`.

use anyhow::{bail, Context};
use clap::Args;
use sqlx::PgPool;
use std::path::{Path, PathBuf};

use super::{error, info, success, warning};
use crate::db::{
    self,
    models::{Document, Image, NewDocument, NewImage},
};
use crate::media::rendition::{self, FilterSpec};
use crate::media::storage;

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Files to import
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Title for the record; only valid with a single file
    #[arg(long)]
    pub title: Option<String>,

    /// Tag to attach, may be repeated
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RenditionArgs {
    /// Filter spec such as `max-500x500`; defaults to the standard set
    #[arg(long = "spec")]
    pub specs: Vec<String>,

    /// Only this image
    #[arg(long)]
    pub image: Option<i64>,

    /// Regenerate files that already exist
    #[arg(long)]
    pub force: bool,
}

/// Store an image and create its record and standard renditions. Content that
/// was imported before is returned as is.
pub async fn import_image(
    pool: &PgPool,
    media_root: &Path,
    name: &str,
    bytes: &[u8],
    title: Option<&str>,
    tags: &[String],
) -> anyhow::Result<(Image, bool)> {
    let hash = storage::content_hash(bytes);
    if let Some(existing) = db::media::find_image_by_hash(pool, &hash).await? {
        return Ok((existing, false));
    }

    let (stored, width, height) = storage::store_image_bytes(media_root, name, bytes).await?;
    let new = NewImage {
        title: title.map_or_else(|| storage::title_from_filename(name), str::to_string),
        file: stored.file.clone(),
        width: width as i32,
        height: height as i32,
        file_size: stored.file_size,
        file_hash: stored.file_hash,
        tags: tags.to_vec(),
    };
    let image = match db::media::insert_image(pool, &new).await {
        Ok(image) => image,
        Err(e) => {
            storage::remove(media_root, &stored.file).await.ok();
            return Err(e).context("Failed to save image record");
        }
    };

    rendition::generate(media_root, &image, &rendition::standard_specs(), false)
        .await
        .with_context(|| format!("Failed to generate renditions for {}", image.file))?;
    Ok((image, true))
}

pub async fn import_document(
    pool: &PgPool,
    media_root: &Path,
    name: &str,
    bytes: &[u8],
    title: Option<&str>,
    tags: &[String],
) -> anyhow::Result<(Document, bool)> {
    let hash = storage::content_hash(bytes);
    if let Some(existing) = db::media::find_document_by_hash(pool, &hash).await? {
        return Ok((existing, false));
    }

    let stored = storage::store_document_bytes(media_root, name, bytes).await?;
    let new = NewDocument {
        title: title.map_or_else(|| storage::title_from_filename(name), str::to_string),
        file: stored.file.clone(),
        file_size: stored.file_size,
        file_hash: stored.file_hash,
        tags: tags.to_vec(),
    };
    match db::media::insert_document(pool, &new).await {
        Ok(document) => Ok((document, true)),
        Err(e) => {
            storage::remove(media_root, &stored.file).await.ok();
            Err(e).context("Failed to save document record")
        }
    }
}

async fn read_source(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?
        .to_string();
    Ok((name, bytes))
}

fn check_title(args: &ImportArgs) -> anyhow::Result<()> {
    if args.title.is_some() && args.files.len() > 1 {
        bail!("--title can only be used when importing a single file");
    }
    Ok(())
}

pub async fn add_images(pool: &PgPool, media_root: &Path, args: &ImportArgs) -> anyhow::Result<()> {
    check_title(args)?;
    for path in &args.files {
        let (name, bytes) = read_source(path).await?;
        let (image, created) =
            import_image(pool, media_root, &name, &bytes, args.title.as_deref(), &args.tags)
                .await
                .with_context(|| format!("Failed to import {}", path.display()))?;
        if created {
            success(&format!(
                "Imported image {} (ID: {}, {}x{})",
                image.title, image.id, image.width, image.height
            ));
        } else {
            info(&format!("Already imported as image {} (ID: {})", image.title, image.id));
        }
    }
    Ok(())
}

pub async fn add_documents(pool: &PgPool, media_root: &Path, args: &ImportArgs) -> anyhow::Result<()> {
    check_title(args)?;
    for path in &args.files {
        let (name, bytes) = read_source(path).await?;
        let (document, created) =
            import_document(pool, media_root, &name, &bytes, args.title.as_deref(), &args.tags)
                .await
                .with_context(|| format!("Failed to import {}", path.display()))?;
        if created {
            success(&format!("Imported document {} (ID: {})", document.title, document.id));
        } else {
            info(&format!(
                "Already imported as document {} (ID: {})",
                document.title, document.id
            ));
        }
    }
    Ok(())
}

pub fn parse_specs(raw: &[String]) -> anyhow::Result<Vec<FilterSpec>> {
    if raw.is_empty() {
        return Ok(rendition::standard_specs());
    }
    raw.iter()
        .map(|s| s.parse::<FilterSpec>().map_err(anyhow::Error::from))
        .collect()
}

pub async fn generate_renditions(
    pool: &PgPool,
    media_root: &Path,
    args: &RenditionArgs,
) -> anyhow::Result<()> {
    let specs = parse_specs(&args.specs)?;
    let images = match args.image {
        Some(id) => vec![db::media::get_image(pool, id)
            .await?
            .with_context(|| format!("Image {} does not exist", id))?],
        None => db::media::all_images(pool).await?,
    };

    info(&format!(
        "Generating {} rendition(s) for {} image(s)",
        specs.len(),
        images.len()
    ));

    let mut failed = 0;
    for image in &images {
        match rendition::generate(media_root, image, &specs, args.force).await {
            Ok(done) => success(&format!("{}: {} rendition(s)", image.file, done.len())),
            Err(e) => {
                failed += 1;
                error(&format!("{}: {}", image.file, e));
            }
        }
    }

    if failed > 0 {
        warning("Originals that cannot be read need to be re-imported");
        bail!("{} of {} image(s) failed", failed, images.len());
    }
    Ok(())
}
