//! The media library metadata is written to.

use std::fmt;

use plexmeta_core::ItemKind;
use serde::{Deserialize, Serialize};

use crate::MetadataError;

/// One item as the library currently stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub rating_key: String,
    pub section_id: Option<String>,
    pub title: String,
    pub summary: String,
    pub year: Option<i32>,
    /// Season or episode number.
    pub index: Option<u32>,
}

impl fmt::Display for LibraryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({year}) [{}]", self.title, self.rating_key),
            None => write!(f, "{} [{}]", self.title, self.rating_key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Summary,
    ContentRating,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Summary => "summary",
            Self::ContentRating => "contentRating",
        }
    }
}

/// A field value to write. Written fields are always locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub field: Field,
    pub value: String,
}

impl FieldEdit {
    pub fn new(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Items of `kind` whose title matches.
    async fn search(&self, kind: ItemKind, title: &str) -> Result<Vec<LibraryEntry>, MetadataError>;

    async fn season(
        &self,
        show: &LibraryEntry,
        season: u32,
    ) -> Result<Option<LibraryEntry>, MetadataError>;

    async fn episode(
        &self,
        show: &LibraryEntry,
        season: u32,
        episode: u32,
    ) -> Result<Option<LibraryEntry>, MetadataError>;

    /// Write and lock the given fields.
    async fn edit(
        &self,
        entry: &LibraryEntry,
        kind: ItemKind,
        edits: &[FieldEdit],
    ) -> Result<(), MetadataError>;

    async fn upload_poster(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError>;

    async fn upload_art(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError>;
}
