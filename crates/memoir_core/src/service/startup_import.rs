//! Startup import of device photo folders into albums and daily entries.
//!
//! # Responsibility
//! - Pull photo metadata from a [`PhotoSource`], optionally restricted to a
//!   folder allow-list.
//! - Mirror every folder as an album and every (folder, local day) pair as a
//!   journal entry, linking each photo into both and tagging it with a
//!   `folder:<name>` keyword.
//!
//! # Invariants
//! - One run is one write transaction; a failure leaves nothing behind.
//! - Album and entry ids derive from folder name and day, so re-running with
//!   the same input writes no new rows.
//! - The local day of a photo uses the UTC offset in effect at its capture
//!   instant.

use crate::config::ImportConfig;
use crate::db::MemoirDb;
use crate::model::album::{AlbumId, AlbumMemberStatus, AlbumRole, AlbumVisibility};
use crate::model::journal::{EntryId, PhotoAssetDraft, PhotoId, TagId, TagType};
use crate::repo::album_repo::upsert_member;
use crate::repo::rows::{
    entry_exists, get_album, get_member, link_photo_tag, next_album_photo_order,
    next_entry_photo_order, touch_album, touch_entry, upsert_photo, upsert_tag, UpsertOutcome,
};
use crate::repo::{now_ms, RepoError, RepoResult};
use chrono::{Local, Offset, TimeZone};
use log::{debug, info};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Member id owning every imported album.
pub const STARTUP_OWNER_USER_ID: &str = "startup-importer";
/// Folder name used when a photo reports none.
pub const UNKNOWN_FOLDER: &str = "Imported";

const ALBUM_ID_PREFIX: &str = "startup-album";
const ENTRY_ID_PREFIX: &str = "startup-entry";
const FOLDER_TAG_PREFIX: &str = "folder:";
const MILLIS_PER_DAY: i64 = 86_400_000;
const IMPORT_NAMESPACE: Uuid = Uuid::from_u128(0x3c0f_5e1a_9d42_4b7e_8a61_2f9d_b4c8_e017);

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("photo source failed: {0}")]
    Source(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Metadata of one device photo as reported by a [`PhotoSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPhoto {
    pub content_uri: String,
    /// Capture time in epoch milliseconds.
    pub taken_at: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// Folder (bucket) display name.
    pub bucket_name: String,
}

impl ImportedPhoto {
    pub fn new(content_uri: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            content_uri: content_uri.into(),
            taken_at: None,
            width: None,
            height: None,
            bucket_name: bucket_name.into(),
        }
    }

    pub fn taken_at(mut self, taken_at: i64) -> Self {
        self.taken_at = Some(taken_at);
        self
    }

    fn folder(&self) -> &str {
        let trimmed = self.bucket_name.trim();
        if trimmed.is_empty() {
            UNKNOWN_FOLDER
        } else {
            trimmed
        }
    }
}

/// Enumerates device photos.
pub trait PhotoSource {
    /// Photos in the given folders; `None` or an empty set means every
    /// folder.
    fn query_photos(
        &self,
        folders: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ImportedPhoto>, ImportError>;
}

impl PhotoSource for Vec<ImportedPhoto> {
    fn query_photos(
        &self,
        folders: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ImportedPhoto>, ImportError> {
        Ok(self
            .iter()
            .filter(|photo| match folders {
                Some(folders) if !folders.is_empty() => folders.contains(photo.bucket_name.trim()),
                _ => true,
            })
            .cloned()
            .collect())
    }
}

impl<S: PhotoSource + ?Sized> PhotoSource for &S {
    fn query_photos(
        &self,
        folders: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ImportedPhoto>, ImportError> {
        (**self).query_photos(folders)
    }
}

/// Counters of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub processed: usize,
    /// Rows without a content URI.
    pub skipped: usize,
    pub created_photos: usize,
    pub updated_photos: usize,
    pub created_albums: usize,
    pub created_entries: usize,
    pub linked_album_photos: usize,
    pub linked_entry_photos: usize,
    pub linked_photo_tags: usize,
}

/// Offset of local time from UTC, in milliseconds, at an epoch instant.
pub type UtcOffsetFn = fn(i64) -> i64;

/// Imports device photos into the journal on startup.
pub struct StartupImporter<'db, S> {
    db: &'db MemoirDb,
    source: S,
    utc_offset: UtcOffsetFn,
}

impl<'db, S: PhotoSource> StartupImporter<'db, S> {
    pub fn new(db: &'db MemoirDb, source: S) -> Self {
        Self {
            db,
            source,
            utc_offset: local_utc_offset_millis,
        }
    }

    /// Replaces the system time zone, mainly for deterministic tests.
    pub fn with_utc_offset(mut self, utc_offset: UtcOffsetFn) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Runs the import when `config.enabled`; otherwise returns an empty
    /// report without touching the source.
    pub fn run(&self, config: &ImportConfig) -> Result<ImportReport, ImportError> {
        if !config.enabled {
            debug!("event=startup_import module=import status=skipped reason=disabled");
            return Ok(ImportReport::default());
        }
        let folders = config.target_folders();
        let photos = self.source.query_photos(folders.as_ref())?;
        self.import(&photos)
    }

    /// Imports `photos` in one transaction.
    pub fn import(&self, photos: &[ImportedPhoto]) -> Result<ImportReport, ImportError> {
        if photos.is_empty() {
            info!("event=startup_import module=import status=ok processed=0");
            return Ok(ImportReport::default());
        }

        let started_at = Instant::now();
        let now = now_ms();
        let mut run = ImportRun {
            now,
            utc_offset: self.utc_offset,
            folder_tags: HashMap::new(),
            report: ImportReport::default(),
        };

        let tx = self.db.write_tx()?;
        for photo in photos {
            run.import_photo(&tx, photo)?;
        }
        tx.commit()?;
        self.db.flush_changes();

        let report = run.report;
        info!(
            "event=startup_import module=import status=ok processed={} skipped={} created_photos={} updated_photos={} created_albums={} created_entries={} linked_album_photos={} linked_entry_photos={} linked_photo_tags={} duration_ms={}",
            report.processed,
            report.skipped,
            report.created_photos,
            report.updated_photos,
            report.created_albums,
            report.created_entries,
            report.linked_album_photos,
            report.linked_entry_photos,
            report.linked_photo_tags,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

struct ImportRun {
    now: i64,
    utc_offset: UtcOffsetFn,
    folder_tags: HashMap<String, TagId>,
    report: ImportReport,
}

impl ImportRun {
    fn import_photo(&mut self, conn: &Connection, photo: &ImportedPhoto) -> RepoResult<()> {
        self.report.processed += 1;
        let content_uri = photo.content_uri.trim();
        if content_uri.is_empty() {
            self.report.skipped += 1;
            return Ok(());
        }

        let draft = PhotoAssetDraft {
            content_uri: content_uri.to_string(),
            taken_at: photo.taken_at,
            width: photo.width,
            height: photo.height,
            hash: None,
        };
        let (photo_id, outcome) = upsert_photo(conn, &draft, self.now)?;
        match outcome {
            UpsertOutcome::Created => self.report.created_photos += 1,
            UpsertOutcome::Updated => self.report.updated_photos += 1,
            UpsertOutcome::Unchanged => {}
        }

        let folder = photo.folder();
        let folder_key = folder.to_lowercase();

        let album_id = album_id_for_folder(&folder_key);
        self.ensure_album(conn, album_id, folder)?;
        if !album_photo_linked(conn, album_id, photo_id)? {
            let order_index = next_album_photo_order(conn, album_id)?;
            conn.execute(
                "INSERT OR REPLACE INTO album_photo (
                    album_id, photo_id, order_index, added_at, added_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    album_id.to_string(),
                    photo_id.to_string(),
                    order_index,
                    self.now,
                    STARTUP_OWNER_USER_ID,
                ],
            )?;
            touch_album(conn, album_id, self.now)?;
            self.report.linked_album_photos += 1;
        }

        let captured_at = photo.taken_at.unwrap_or(self.now);
        let epoch_day = epoch_day_for_millis(captured_at, (self.utc_offset)(captured_at));
        let entry_id = entry_id_for_folder_day(&folder_key, epoch_day);
        self.ensure_entry(conn, entry_id, folder, epoch_day)?;
        if !entry_photo_linked(conn, entry_id, photo_id)? {
            let order_index = next_entry_photo_order(conn, entry_id)?;
            conn.execute(
                "INSERT INTO entry_photo (entry_id, photo_id, order_index) VALUES (?1, ?2, ?3);",
                params![entry_id.to_string(), photo_id.to_string(), order_index],
            )?;
            touch_entry(conn, entry_id, self.now)?;
            self.report.linked_entry_photos += 1;
        }

        let tag_id = match self.folder_tags.get(&folder_key) {
            Some(tag_id) => *tag_id,
            None => {
                let value = format!("{FOLDER_TAG_PREFIX}{folder_key}");
                let tag_id = upsert_tag(conn, TagType::Keyword, &value, self.now)?;
                self.folder_tags.insert(folder_key, tag_id);
                tag_id
            }
        };
        if link_photo_tag(conn, photo_id, tag_id)? {
            self.report.linked_photo_tags += 1;
        }
        Ok(())
    }

    fn ensure_album(
        &mut self,
        conn: &Connection,
        album_id: AlbumId,
        folder: &str,
    ) -> RepoResult<()> {
        match get_album(conn, album_id)? {
            None => {
                conn.execute(
                    "INSERT INTO album (id, created_at, updated_at, name, owner_user_id, visibility)
                     VALUES (?1, ?2, ?2, ?3, ?4, ?5);",
                    params![
                        album_id.to_string(),
                        self.now,
                        folder,
                        STARTUP_OWNER_USER_ID,
                        AlbumVisibility::Private.as_str(),
                    ],
                )?;
                self.report.created_albums += 1;
            }
            Some(album) if album.name != folder => {
                conn.execute(
                    "UPDATE album SET name = ?2, updated_at = ?3 WHERE id = ?1;",
                    params![album_id.to_string(), folder, self.now],
                )?;
            }
            Some(_) => {}
        }

        if get_member(conn, album_id, STARTUP_OWNER_USER_ID)?.is_none() {
            upsert_member(
                conn,
                album_id,
                STARTUP_OWNER_USER_ID,
                AlbumRole::Owner,
                AlbumMemberStatus::Active,
                self.now,
            )?;
        }
        Ok(())
    }

    fn ensure_entry(
        &mut self,
        conn: &Connection,
        entry_id: EntryId,
        folder: &str,
        epoch_day: i64,
    ) -> RepoResult<()> {
        if entry_exists(conn, entry_id)? {
            return Ok(());
        }
        conn.execute(
            "INSERT INTO journal_entry (
                id, created_at, updated_at, entry_date_epoch_day, title, reflection_text
            ) VALUES (?1, ?2, ?2, ?3, ?4, ?5);",
            params![
                entry_id.to_string(),
                self.now,
                epoch_day,
                format!("Imported \u{2022} {folder}"),
                format!("Auto-imported photos from folder {folder}"),
            ],
        )?;
        self.report.created_entries += 1;
        Ok(())
    }
}

fn album_photo_linked(conn: &Connection, album_id: AlbumId, photo_id: PhotoId) -> RepoResult<bool> {
    let linked: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM album_photo WHERE album_id = ?1 AND photo_id = ?2);",
        params![album_id.to_string(), photo_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(linked == 1)
}

fn entry_photo_linked(conn: &Connection, entry_id: EntryId, photo_id: PhotoId) -> RepoResult<bool> {
    let linked: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entry_photo WHERE entry_id = ?1 AND photo_id = ?2);",
        params![entry_id.to_string(), photo_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(linked == 1)
}

fn stable_id(prefix: &str, source: &str) -> Uuid {
    Uuid::new_v5(&IMPORT_NAMESPACE, format!("{prefix}:{source}").as_bytes())
}

/// Album id for a lowercased folder name.
pub fn album_id_for_folder(folder_key: &str) -> AlbumId {
    stable_id(ALBUM_ID_PREFIX, folder_key)
}

/// Entry id for a lowercased folder name and local epoch day.
pub fn entry_id_for_folder_day(folder_key: &str, epoch_day: i64) -> EntryId {
    stable_id(ENTRY_ID_PREFIX, &format!("{folder_key}|{epoch_day}"))
}

/// Local calendar day of `timestamp_ms` given the UTC offset at that instant.
pub fn epoch_day_for_millis(timestamp_ms: i64, utc_offset_ms: i64) -> i64 {
    (timestamp_ms + utc_offset_ms).div_euclid(MILLIS_PER_DAY)
}

/// UTC offset of the system time zone at `timestamp_ms`.
pub fn local_utc_offset_millis(timestamp_ms: i64) -> i64 {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .earliest()
        .map_or(0, |local| {
            i64::from(local.offset().fix().local_minus_utc()) * 1000
        })
}
