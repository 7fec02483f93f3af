//! Journal entry, photo asset and tag records.
//!
//! # Invariants
//! - `PhotoAsset::content_uri` is globally unique (natural key).
//! - `(Tag::kind, Tag::value)` is globally unique (natural key).
//! - `JournalEntryAggregate::photos` is ordered by `order_index`, dense from 0.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EntryId = Uuid;
pub type PhotoId = Uuid;
pub type TagId = Uuid;

/// Category of a tag. Persisted as the uppercase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagType {
    Person,
    Place,
    Location,
    Keyword,
}

impl TagType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Place => "PLACE",
            Self::Location => "LOCATION",
            Self::Keyword => "KEYWORD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PERSON" => Some(Self::Person),
            "PLACE" => Some(Self::Place),
            "LOCATION" => Some(Self::Location),
            "KEYWORD" => Some(Self::Keyword),
            _ => None,
        }
    }
}

/// One journal entry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub created_at: i64,
    pub updated_at: i64,
    /// Calendar day the entry is about, days since 1970-01-01.
    pub entry_date_epoch_day: i64,
    /// Trimmed; `None` instead of an empty title.
    pub title: Option<String>,
    pub reflection_text: String,
}

/// One photo asset row, keyed naturally by `content_uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAsset {
    pub id: PhotoId,
    pub created_at: i64,
    pub updated_at: i64,
    pub content_uri: String,
    pub taken_at: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub hash: Option<String>,
}

/// One tag row, keyed naturally by `(kind, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(rename = "type")]
    pub kind: TagType,
    pub value: String,
}

/// Caller-side description of a photo to attach to an entry.
///
/// Resolution upserts by the trimmed `content_uri`; `None` metadata fields
/// never overwrite values already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoAssetDraft {
    pub content_uri: String,
    pub taken_at: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub hash: Option<String>,
}

impl PhotoAssetDraft {
    pub fn new(content_uri: impl Into<String>) -> Self {
        Self {
            content_uri: content_uri.into(),
            ..Self::default()
        }
    }
}

/// Caller-side description of a tag to attach to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDraft {
    pub kind: TagType,
    pub value: String,
}

impl TagDraft {
    pub fn new(kind: TagType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Input for creating a full entry aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntryInput {
    pub entry_date_epoch_day: i64,
    pub title: Option<String>,
    pub reflection_text: String,
    /// Attached in this order after de-duplication by content URI.
    pub photos: Vec<PhotoAssetDraft>,
    pub tags: Vec<TagDraft>,
}

/// Input for replacing text and links of an existing entry.
///
/// Photo and tag lists replace the stored links entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntryInput {
    pub entry_id: EntryId,
    pub title: Option<String>,
    pub reflection_text: String,
    pub photos: Vec<PhotoAssetDraft>,
    pub tags: Vec<TagDraft>,
}

/// Photo attached to an entry at a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPhotoAsset {
    pub photo: PhotoAsset,
    pub order_index: i64,
}

/// Entry plus its ordered photos and its tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntryAggregate {
    pub entry: JournalEntry,
    pub photos: Vec<LinkedPhotoAsset>,
    pub tags: Vec<Tag>,
}

impl JournalEntryAggregate {
    /// Content URIs in display order.
    pub fn photo_uris(&self) -> Vec<&str> {
        self.photos
            .iter()
            .map(|linked| linked.photo.content_uri.as_str())
            .collect()
    }
}
