//! Images and documents referenced from content blocks.

pub mod rendition;
pub mod storage;

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::db::models::{Document, Image};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid filter spec '{0}'")]
    InvalidFilter(String),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Unsafe file name: {0}")]
    UnsafeFileName(String),

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Image and document ids referenced by a piece of content.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaRefs {
    pub images: BTreeSet<i64>,
    pub documents: BTreeSet<i64>,
}

impl MediaRefs {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.documents.is_empty()
    }
}

/// Media records loaded for one serialization pass, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct MediaIndex {
    images: HashMap<i64, Image>,
    documents: HashMap<i64, Document>,
}

impl MediaIndex {
    pub fn new(images: Vec<Image>, documents: Vec<Document>) -> Self {
        Self {
            images: images.into_iter().map(|i| (i.id, i)).collect(),
            documents: documents.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    pub fn image(&self, id: i64) -> Option<&Image> {
        self.images.get(&id)
    }

    pub fn document(&self, id: i64) -> Option<&Document> {
        self.documents.get(&id)
    }
}
