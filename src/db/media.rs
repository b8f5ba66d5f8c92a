//! Image and document records.

use sqlx::PgPool;

use super::models::{Document, Image, NewDocument, NewImage};
use crate::media::{MediaIndex, MediaRefs};

const IMAGE_COLUMNS: &str = "id, title, file, width, height, file_size, file_hash, tags, created_at";
const DOCUMENT_COLUMNS: &str = "id, title, file, file_size, file_hash, tags, created_at";

/// Sort column for media listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaOrder {
    pub column: &'static str,
    pub descending: bool,
}

impl Default for MediaOrder {
    fn default() -> Self {
        Self {
            column: "id",
            descending: false,
        }
    }
}

impl MediaOrder {
    fn sql(&self) -> String {
        format!(
            "ORDER BY {} {}, id",
            self.column,
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

/// Load every image and document referenced by `refs` in two queries.
pub async fn load_index(pool: &PgPool, refs: &MediaRefs) -> Result<MediaIndex, sqlx::Error> {
    if refs.is_empty() {
        return Ok(MediaIndex::default());
    }

    let image_ids: Vec<i64> = refs.images.iter().copied().collect();
    let document_ids: Vec<i64> = refs.documents.iter().copied().collect();

    let images = if image_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE id = ANY($1)",
            IMAGE_COLUMNS
        ))
        .bind(&image_ids)
        .fetch_all(pool)
        .await?
    };

    let documents = if document_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ANY($1)",
            DOCUMENT_COLUMNS
        ))
        .bind(&document_ids)
        .fetch_all(pool)
        .await?
    };

    Ok(MediaIndex::new(images, documents))
}

pub async fn get_image(pool: &PgPool, id: i64) -> Result<Option<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!("SELECT {} FROM images WHERE id = $1", IMAGE_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_document(pool: &PgPool, id: i64) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE id = $1",
        DOCUMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_images(
    pool: &PgPool,
    order: MediaOrder,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Image>, i64), sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
        .fetch_one(pool)
        .await?;
    let images = sqlx::query_as::<_, Image>(&format!(
        "SELECT {} FROM images {} LIMIT $1 OFFSET $2",
        IMAGE_COLUMNS,
        order.sql()
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok((images, total))
}

pub async fn list_documents(
    pool: &PgPool,
    order: MediaOrder,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Document>, i64), sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let documents = sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents {} LIMIT $1 OFFSET $2",
        DOCUMENT_COLUMNS,
        order.sql()
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok((documents, total))
}

pub async fn all_images(pool: &PgPool) -> Result<Vec<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!("SELECT {} FROM images ORDER BY id", IMAGE_COLUMNS))
        .fetch_all(pool)
        .await
}

pub async fn find_image_by_hash(pool: &PgPool, hash: &str) -> Result<Option<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(&format!(
        "SELECT {} FROM images WHERE file_hash = $1 ORDER BY id LIMIT 1",
        IMAGE_COLUMNS
    ))
    .bind(hash)
    .fetch_optional(pool)
    .await
}

pub async fn find_document_by_hash(
    pool: &PgPool,
    hash: &str,
) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "SELECT {} FROM documents WHERE file_hash = $1 ORDER BY id LIMIT 1",
        DOCUMENT_COLUMNS
    ))
    .bind(hash)
    .fetch_optional(pool)
    .await
}

pub async fn insert_image(pool: &PgPool, new: &NewImage) -> Result<Image, sqlx::Error> {
    let image = sqlx::query_as::<_, Image>(&format!(
        r#"
        INSERT INTO images (title, file, width, height, file_size, file_hash, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        IMAGE_COLUMNS
    ))
    .bind(&new.title)
    .bind(&new.file)
    .bind(new.width)
    .bind(new.height)
    .bind(new.file_size)
    .bind(&new.file_hash)
    .bind(&new.tags)
    .fetch_one(pool)
    .await?;

    tracing::info!(image_id = image.id, file = %image.file, "image record created");
    Ok(image)
}

pub async fn insert_document(pool: &PgPool, new: &NewDocument) -> Result<Document, sqlx::Error> {
    let document = sqlx::query_as::<_, Document>(&format!(
        r#"
        INSERT INTO documents (title, file, file_size, file_hash, tags)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        DOCUMENT_COLUMNS
    ))
    .bind(&new.title)
    .bind(&new.file)
    .bind(new.file_size)
    .bind(&new.file_hash)
    .bind(&new.tags)
    .fetch_one(pool)
    .await?;

    tracing::info!(document_id = document.id, file = %document.file, "document record created");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_order_sql() {
        assert_eq!(MediaOrder::default().sql(), "ORDER BY id ASC, id");
        let order = MediaOrder {
            column: "title",
            descending: true,
        };
        assert_eq!(order.sql(), "ORDER BY title DESC, id");
    }

    #[tokio::test]
    async fn test_empty_refs_need_no_queries() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/unused")
            .unwrap();
        let index = load_index(&pool, &MediaRefs::default()).await.unwrap();
        assert!(index.image(1).is_none());
    }
}
