//! Album and album membership records.
//!
//! # Invariants
//! - Every album has an `Owner` member row for `owner_user_id`, written in
//!   the same transaction as the album itself.
//! - A photo belongs to at most one album at a time.

use super::journal::{EntryId, JournalEntry, PhotoAsset, PhotoId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AlbumId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlbumVisibility {
    #[default]
    Private,
    Shared,
}

impl AlbumVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Shared => "SHARED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRIVATE" => Some(Self::Private),
            "SHARED" => Some(Self::Shared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlbumRole {
    Owner,
    Editor,
    Viewer,
}

impl AlbumRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Editor => "EDITOR",
            Self::Viewer => "VIEWER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OWNER" => Some(Self::Owner),
            "EDITOR" => Some(Self::Editor),
            "VIEWER" => Some(Self::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlbumMemberStatus {
    Active,
    Invited,
}

impl AlbumMemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Invited => "INVITED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "INVITED" => Some(Self::Invited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub owner_user_id: String,
    pub visibility: AlbumVisibility,
}

/// Membership row keyed by `(album_id, member_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumMember {
    pub album_id: AlbumId,
    pub member_id: String,
    pub role: AlbumRole,
    pub status: AlbumMemberStatus,
    pub added_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAlbumInput {
    pub name: String,
    pub owner_user_id: String,
    pub visibility: AlbumVisibility,
}

impl CreateAlbumInput {
    /// Private album owned by `owner_user_id`.
    pub fn new(name: impl Into<String>, owner_user_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_user_id: owner_user_id.into(),
            visibility: AlbumVisibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddEntryToAlbumInput {
    pub album_id: AlbumId,
    pub entry_id: EntryId,
    pub added_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPhotoToAlbumInput {
    pub album_id: AlbumId,
    pub photo_id: PhotoId,
    /// Appended after the album's last photo when `None`.
    pub order_index: Option<i64>,
    pub added_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertAlbumMemberInput {
    pub album_id: AlbumId,
    pub member_id: String,
    pub role: AlbumRole,
    pub status: AlbumMemberStatus,
}

/// Entry linked into an album with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAlbumEntry {
    pub entry: JournalEntry,
    pub added_at: i64,
    pub added_by: Option<String>,
}

/// Photo linked directly into an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAlbumPhoto {
    pub photo: PhotoAsset,
    pub order_index: i64,
    pub added_at: i64,
    pub added_by: Option<String>,
}

/// Album plus linked entries (newest first), photos (by position) and
/// members (oldest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumAggregate {
    pub album: Album,
    pub entries: Vec<LinkedAlbumEntry>,
    pub photos: Vec<LinkedAlbumPhoto>,
    pub members: Vec<AlbumMember>,
}
