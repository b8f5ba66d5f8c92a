use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::MediaError;

pub const IMAGE_DIR: &str = "original_images";
pub const DOCUMENT_DIR: &str = "documents";

const MAX_NAME_CHARS: usize = 100;

/// A file written under the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the media root
    pub file: String,
    pub file_size: i64,
    pub file_hash: String,
}

/// Sniff the image type from its leading bytes.
pub fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Reduce an uploaded file name to a safe one: no directories, spaces become
/// underscores, anything outside `[A-Za-z0-9._-]` is dropped.
pub fn valid_filename(name: &str) -> Result<String, MediaError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() || cleaned == ".." || cleaned.contains("..") {
        return Err(MediaError::UnsafeFileName(name.to_string()));
    }
    Ok(truncate_name(&cleaned))
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < 10 => {
            let keep = MAX_NAME_CHARS - ext.len() - 1;
            format!("{}.{}", stem.chars().take(keep).collect::<String>(), ext)
        }
        _ => name.chars().take(MAX_NAME_CHARS).collect(),
    }
}

/// Default title for a file: its name without extension, separators as spaces.
pub fn title_from_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}

/// Content type for serving a stored file.
pub fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Pick a name in `dir` that does not exist yet, suffixing `_xxxxxxx` on clashes.
async fn available_name(dir: &Path, name: &str) -> String {
    let mut candidate = name.to_string();
    while tokio::fs::try_exists(dir.join(&candidate)).await.unwrap_or(false) {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(7).collect();
        candidate = match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
            None => format!("{}_{}", name, suffix),
        };
    }
    candidate
}

/// Write `bytes` as `subdir/name` under the media root without overwriting.
pub async fn write_bytes(
    media_root: &Path,
    subdir: &str,
    name: &str,
    bytes: &[u8],
) -> Result<StoredFile, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::EmptyFile(name.to_string()));
    }
    let name = valid_filename(name)?;
    let dir: PathBuf = media_root.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;

    let name = available_name(&dir, &name).await;
    tokio::fs::write(dir.join(&name), bytes).await?;

    Ok(StoredFile {
        file: format!("{}/{}", subdir, name),
        file_size: bytes.len() as i64,
        file_hash: sha256_hex(bytes),
    })
}

/// Store image bytes under `original_images/`. The extension follows the
/// sniffed content, not `name`.
pub async fn store_image_bytes(
    media_root: &Path,
    name: &str,
    bytes: &[u8],
) -> Result<(StoredFile, u32, u32), MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::EmptyFile(name.to_string()));
    }
    let mime =
        detect_image_type(bytes).ok_or_else(|| MediaError::UnsupportedImage(name.to_string()))?;

    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let name = format!("{}.{}", stem, extension_for_mime(mime));

    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;

    let stored = write_bytes(media_root, IMAGE_DIR, &name, bytes).await?;
    tracing::info!(file = %stored.file, width, height, "image stored");

    Ok((stored, width, height))
}

/// Store any file under `documents/`.
pub async fn store_document_bytes(
    media_root: &Path,
    name: &str,
    bytes: &[u8],
) -> Result<StoredFile, MediaError> {
    let stored = write_bytes(media_root, DOCUMENT_DIR, name, bytes).await?;
    tracing::info!(file = %stored.file, size = stored.file_size, "document stored");
    Ok(stored)
}

/// SHA-256 of `bytes` as lowercase hex, as stored in `file_hash`.
pub fn content_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

/// Remove a stored file, ignoring files that are already gone.
pub async fn remove(media_root: &Path, file: &str) -> Result<(), MediaError> {
    match tokio::fs::remove_file(media_root.join(file)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_type(b"\x89PNG\r\n"), Some("image/png"));
        assert_eq!(detect_image_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(detect_image_type(b"RIFF\0\0\0\0WEBPVP8"), Some("image/webp"));
        assert_eq!(detect_image_type(b"%PDF-1.4"), None);
        assert_eq!(detect_image_type(b"ab"), None);
    }

    #[test]
    fn test_valid_filename() {
        assert_eq!(valid_filename("Rule Book 2025.pdf").unwrap(), "Rule_Book_2025.pdf");
        assert_eq!(valid_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(valid_filename("C:\\uploads\\logo (1).png").unwrap(), "logo_1.png");
        assert!(valid_filename("..").is_err());
        assert!(valid_filename("***").is_err());
    }

    #[test]
    fn test_long_filenames_keep_extension() {
        let name = format!("{}.pdf", "x".repeat(300));
        let valid = valid_filename(&name).unwrap();
        assert_eq!(valid.chars().count(), MAX_NAME_CHARS);
        assert!(valid.ends_with(".pdf"));
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(title_from_filename("/tmp/team_photo-2025.jpg"), "team photo 2025");
        assert_eq!(title_from_filename("README"), "README");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("documents/rules.pdf"), "application/pdf");
        assert_eq!(content_type_for("documents/data.unknownext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_write_bytes_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_bytes(dir.path(), DOCUMENT_DIR, "rules.txt", b"one").await.unwrap();
        let second = write_bytes(dir.path(), DOCUMENT_DIR, "rules.txt", b"two").await.unwrap();

        assert_eq!(first.file, "documents/rules.txt");
        assert_ne!(first.file, second.file);
        assert!(second.file.starts_with("documents/rules_"));
        assert_eq!(std::fs::read(dir.path().join(&first.file)).unwrap(), b"one");
        assert_eq!(first.file_size, 3);
        assert_eq!(first.file_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_write_bytes_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_bytes(dir.path(), DOCUMENT_DIR, "empty.txt", b"").await;
        assert!(matches!(err, Err(MediaError::EmptyFile(_))));
    }

    #[tokio::test]
    async fn test_store_image_reads_dimensions_and_fixes_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(64, 32, image::Rgb([0, 0, 255])))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let media_root = dir.path().join("media");
        let (stored, width, height) =
            store_image_bytes(&media_root, "upload.jpeg", &png).await.unwrap();
        assert_eq!((width, height), (64, 32));
        assert_eq!(stored.file, "original_images/upload.png");
        assert!(media_root.join(&stored.file).exists());
    }

    #[tokio::test]
    async fn test_store_image_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let result = store_image_bytes(dir.path(), "notes.png", b"just some text").await;
        assert!(matches!(result, Err(MediaError::UnsupportedImage(_))));
    }
}
