//! Rows of the many-to-many link tables.
//!
//! All link tables use a composite primary key of the two parent ids and
//! cascade on deletion of either parent.

use super::album::AlbumId;
use super::journal::{EntryId, PhotoId, TagId};

/// `entry_photo`: ordered photos of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPhotoLink {
    pub entry_id: EntryId,
    pub photo_id: PhotoId,
    pub order_index: i64,
}

/// `entry_tag`: unordered tags of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTagLink {
    pub entry_id: EntryId,
    pub tag_id: TagId,
}

/// `photo_tag`: tags attached to a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoTagLink {
    pub photo_id: PhotoId,
    pub tag_id: TagId,
}

/// `album_entry`: entries of an album with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumEntryLink {
    pub album_id: AlbumId,
    pub entry_id: EntryId,
    pub added_at: i64,
    pub added_by: Option<String>,
}

/// `album_photo`: ordered photos of an album; `photo_id` is unique table-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumPhotoLink {
    pub album_id: AlbumId,
    pub photo_id: PhotoId,
    pub order_index: i64,
    pub added_at: i64,
    pub added_by: Option<String>,
}
