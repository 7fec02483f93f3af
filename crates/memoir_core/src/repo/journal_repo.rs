//! Journal entry aggregate repository.
//!
//! # Responsibility
//! - Create and fully replace entry aggregates (entry + ordered photos +
//!   tags) atomically.
//! - Resolve photo and tag drafts to rows by natural key.
//! - Serve point and continuous queries over entries and tagged photos.
//!
//! # Invariants
//! - `entry_photo.order_index` is dense from 0 in de-duplicated input order.
//! - Updates delete and rewrite every photo/tag link of the entry; links are
//!   never patched.
//! - Entry writes never touch `photo_tag`; photo tags come from the
//!   startup importer.

use super::rows::{
    collect_rows, entry_exists, get_entry, parse_entry_row, parse_photo_row,
    parse_uuid, photos_by_ids, tags_by_ids, upsert_photo, upsert_tag, ENTRY_COLUMNS,
    PHOTO_COLUMNS,
};
use super::{ensure_tables, now_ms, RepoResult};
use crate::db::{MemoirDb, Subscription};
use crate::model::journal::{
    CreateEntryInput, EntryId, JournalEntry, JournalEntryAggregate, LinkedPhotoAsset, PhotoAsset,
    PhotoAssetDraft, PhotoId, Tag, TagDraft, TagId, TagType, UpdateEntryInput,
};
use crate::model::links::{EntryPhotoLink, EntryTagLink, PhotoTagLink};
use log::{debug, info};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &[
    "journal_entry",
    "photo_asset",
    "tag",
    "entry_photo",
    "entry_tag",
    "photo_tag",
];
const ENTRY_TABLES: &[&str] = &["journal_entry"];
const SEARCH_TABLES: &[&str] = &["journal_entry", "entry_tag", "entry_photo", "photo_tag", "tag"];
const TAGGED_PHOTO_TABLES: &[&str] = &["photo_asset", "photo_tag", "tag"];

/// Receives every snapshot of an entry list query.
pub type EntrySink = Box<dyn FnMut(Vec<JournalEntry>) + Send>;
/// Receives every snapshot of a photo list query.
pub type PhotoSink = Box<dyn FnMut(Vec<PhotoAsset>) + Send>;

/// Repository interface for the journal entry aggregate.
pub trait JournalingRepository {
    /// Creates entry, photos, tags and links in one transaction.
    fn create_entry_aggregate(&self, input: &CreateEntryInput) -> RepoResult<EntryId>;
    /// Replaces text and all links of an entry. `Ok(false)` when absent.
    fn update_entry_aggregate(&self, input: &UpdateEntryInput) -> RepoResult<bool>;
    /// Loads entry with ordered photos and tags. `Ok(None)` when absent.
    fn get_entry_aggregate(&self, entry_id: EntryId) -> RepoResult<Option<JournalEntryAggregate>>;
    /// All entries, most recently updated first.
    fn list_all_entries(&self) -> RepoResult<Vec<JournalEntry>>;
    /// Entries whose day lies in `[start_epoch_day, end_epoch_day]`.
    fn list_entries_by_date_range(
        &self,
        start_epoch_day: i64,
        end_epoch_day: i64,
    ) -> RepoResult<Vec<JournalEntry>>;
    /// Case-insensitive substring search over text and reachable tags.
    fn search_entries(&self, query: &str) -> RepoResult<Vec<JournalEntry>>;
    /// Photos carrying the exact `(kind, value)` tag.
    fn list_photos_by_tag(&self, kind: TagType, value: &str) -> RepoResult<Vec<PhotoAsset>>;
    /// Tags attached directly to one photo, sorted by type then value.
    fn tags_for_photo(&self, photo_id: PhotoId) -> RepoResult<Vec<Tag>>;
    /// Content URIs of photos linked to any entry dated `epoch_day`.
    fn get_linked_photo_uris_for_epoch_day(&self, epoch_day: i64) -> RepoResult<Vec<String>>;

    fn observe_all_entries(&self, sink: EntrySink) -> RepoResult<Subscription<'_>>;
    fn observe_entries_by_date_range(
        &self,
        start_epoch_day: i64,
        end_epoch_day: i64,
        sink: EntrySink,
    ) -> RepoResult<Subscription<'_>>;
    fn observe_search_entries(&self, query: &str, sink: EntrySink) -> RepoResult<Subscription<'_>>;
    fn observe_photos_by_tag(
        &self,
        kind: TagType,
        value: &str,
        sink: PhotoSink,
    ) -> RepoResult<Subscription<'_>>;
}

/// SQLite-backed journal repository.
pub struct SqliteJournalingRepository<'db> {
    db: &'db MemoirDb,
}

impl<'db> SqliteJournalingRepository<'db> {
    /// Constructs a repository over a migrated database handle.
    pub fn try_new(db: &'db MemoirDb) -> RepoResult<Self> {
        ensure_tables(db.connection(), REQUIRED_TABLES)?;
        Ok(Self { db })
    }
}

impl JournalingRepository for SqliteJournalingRepository<'_> {
    fn create_entry_aggregate(&self, input: &CreateEntryInput) -> RepoResult<EntryId> {
        let started_at = Instant::now();
        let now = now_ms();
        let entry_id = Uuid::new_v4();

        let tx = self.db.write_tx()?;
        tx.execute(
            "INSERT INTO journal_entry (
                id, created_at, updated_at, entry_date_epoch_day, title, reflection_text
            ) VALUES (?1, ?2, ?2, ?3, ?4, ?5);",
            params![
                entry_id.to_string(),
                now,
                input.entry_date_epoch_day,
                sanitize_title(input.title.as_deref()),
                input.reflection_text.trim(),
            ],
        )?;
        let (photo_count, tag_count) =
            write_entry_links(&tx, entry_id, &input.photos, &input.tags, now)?;
        tx.commit()?;
        self.db.flush_changes();

        info!(
            "event=entry_create module=repo status=ok entry_id={entry_id} photos={photo_count} tags={tag_count} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(entry_id)
    }

    fn update_entry_aggregate(&self, input: &UpdateEntryInput) -> RepoResult<bool> {
        let started_at = Instant::now();
        let now = now_ms();
        let entry_id = input.entry_id;

        let tx = self.db.write_tx()?;
        if !entry_exists(&tx, entry_id)? {
            debug!("event=entry_update module=repo status=not_found entry_id={entry_id}");
            return Ok(false);
        }

        tx.execute(
            "UPDATE journal_entry
             SET updated_at = ?2, title = ?3, reflection_text = ?4
             WHERE id = ?1;",
            params![
                entry_id.to_string(),
                now,
                sanitize_title(input.title.as_deref()),
                input.reflection_text.trim(),
            ],
        )?;
        tx.execute(
            "DELETE FROM entry_photo WHERE entry_id = ?1;",
            [entry_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM entry_tag WHERE entry_id = ?1;",
            [entry_id.to_string()],
        )?;
        let (photo_count, tag_count) =
            write_entry_links(&tx, entry_id, &input.photos, &input.tags, now)?;
        tx.commit()?;
        self.db.flush_changes();

        info!(
            "event=entry_update module=repo status=ok entry_id={entry_id} photos={photo_count} tags={tag_count} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(true)
    }

    fn get_entry_aggregate(&self, entry_id: EntryId) -> RepoResult<Option<JournalEntryAggregate>> {
        let conn = self.db.connection();
        let Some(entry) = get_entry(conn, entry_id)? else {
            return Ok(None);
        };

        let photo_links = load_entry_photo_links(conn, entry_id)?;
        let photo_ids: Vec<PhotoId> = photo_links.iter().map(|link| link.photo_id).collect();
        let photos_by_id = photos_by_ids(conn, &photo_ids)?;
        let photos = photo_links
            .iter()
            .filter_map(|link| {
                photos_by_id.get(&link.photo_id).map(|photo| LinkedPhotoAsset {
                    photo: photo.clone(),
                    order_index: link.order_index,
                })
            })
            .collect();

        let tag_links = load_entry_tag_links(conn, entry_id)?;
        let tag_ids: Vec<TagId> = tag_links.iter().map(|link| link.tag_id).collect();
        let tags_by_id = tags_by_ids(conn, &tag_ids)?;
        let tags = tag_links
            .iter()
            .filter_map(|link| tags_by_id.get(&link.tag_id).cloned())
            .collect();

        Ok(Some(JournalEntryAggregate {
            entry,
            photos,
            tags,
        }))
    }

    fn list_all_entries(&self) -> RepoResult<Vec<JournalEntry>> {
        query_all_entries(self.db.connection())
    }

    fn list_entries_by_date_range(
        &self,
        start_epoch_day: i64,
        end_epoch_day: i64,
    ) -> RepoResult<Vec<JournalEntry>> {
        query_entries_by_date_range(self.db.connection(), start_epoch_day, end_epoch_day)
    }

    fn search_entries(&self, query: &str) -> RepoResult<Vec<JournalEntry>> {
        query_search_entries(self.db.connection(), query.trim())
    }

    fn list_photos_by_tag(&self, kind: TagType, value: &str) -> RepoResult<Vec<PhotoAsset>> {
        query_photos_by_tag(self.db.connection(), kind, value)
    }

    fn tags_for_photo(&self, photo_id: PhotoId) -> RepoResult<Vec<Tag>> {
        let conn = self.db.connection();
        let links = collect_rows(
            conn,
            "SELECT photo_id, tag_id FROM photo_tag WHERE photo_id = ?1;",
            [photo_id.to_string()],
            |row| {
                let photo_id: String = row.get("photo_id")?;
                let tag_id: String = row.get("tag_id")?;
                Ok(PhotoTagLink {
                    photo_id: parse_uuid(&photo_id, "photo_tag.photo_id")?,
                    tag_id: parse_uuid(&tag_id, "photo_tag.tag_id")?,
                })
            },
        )?;
        let tag_ids: Vec<TagId> = links.iter().map(|link| link.tag_id).collect();
        let mut tags: Vec<Tag> = tags_by_ids(conn, &tag_ids)?.into_values().collect();
        tags.sort_by(|left, right| {
            left.kind
                .cmp(&right.kind)
                .then_with(|| left.value.cmp(&right.value))
        });
        Ok(tags)
    }

    fn get_linked_photo_uris_for_epoch_day(&self, epoch_day: i64) -> RepoResult<Vec<String>> {
        collect_rows(
            self.db.connection(),
            "SELECT DISTINCT pa.content_uri
             FROM photo_asset pa
             INNER JOIN entry_photo ep ON ep.photo_id = pa.id
             INNER JOIN journal_entry je ON je.id = ep.entry_id
             WHERE je.entry_date_epoch_day = ?1
             ORDER BY pa.content_uri ASC;",
            [epoch_day],
            |row| Ok(row.get::<_, String>(0)?),
        )
    }

    fn observe_all_entries(&self, sink: EntrySink) -> RepoResult<Subscription<'_>> {
        self.db.watch(ENTRY_TABLES, query_all_entries, sink)
    }

    fn observe_entries_by_date_range(
        &self,
        start_epoch_day: i64,
        end_epoch_day: i64,
        sink: EntrySink,
    ) -> RepoResult<Subscription<'_>> {
        self.db.watch(
            ENTRY_TABLES,
            move |conn: &Connection| {
                query_entries_by_date_range(conn, start_epoch_day, end_epoch_day)
            },
            sink,
        )
    }

    fn observe_search_entries(&self, query: &str, sink: EntrySink) -> RepoResult<Subscription<'_>> {
        let query = query.trim().to_string();
        self.db.watch(
            SEARCH_TABLES,
            move |conn: &Connection| query_search_entries(conn, &query),
            sink,
        )
    }

    fn observe_photos_by_tag(
        &self,
        kind: TagType,
        value: &str,
        sink: PhotoSink,
    ) -> RepoResult<Subscription<'_>> {
        let value = value.to_string();
        self.db.watch(
            TAGGED_PHOTO_TABLES,
            move |conn: &Connection| query_photos_by_tag(conn, kind, &value),
            sink,
        )
    }
}

/// Trims a title; blank titles are stored as `None`.
pub fn sanitize_title(title: Option<&str>) -> Option<String> {
    title
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Trims content URIs and keeps the first draft for each URI, in order.
pub fn normalize_photo_drafts(drafts: &[PhotoAssetDraft]) -> Vec<PhotoAssetDraft> {
    let mut seen = HashSet::new();
    drafts
        .iter()
        .filter_map(|draft| {
            let content_uri = draft.content_uri.trim();
            if !seen.insert(content_uri.to_string()) {
                return None;
            }
            Some(PhotoAssetDraft {
                content_uri: content_uri.to_string(),
                ..draft.clone()
            })
        })
        .collect()
}

/// Trims tag values, drops blank ones and keeps the first draft per
/// `(kind, value)`, in order. Values are compared case-sensitively.
pub fn normalize_tag_drafts(drafts: &[TagDraft]) -> Vec<TagDraft> {
    let mut seen = HashSet::new();
    drafts
        .iter()
        .filter_map(|draft| {
            let value = draft.value.trim();
            if value.is_empty() || !seen.insert((draft.kind, value.to_string())) {
                return None;
            }
            Some(TagDraft::new(draft.kind, value))
        })
        .collect()
}

fn write_entry_links(
    conn: &Connection,
    entry_id: EntryId,
    photos: &[PhotoAssetDraft],
    tags: &[TagDraft],
    now: i64,
) -> RepoResult<(usize, usize)> {
    let entry_key = entry_id.to_string();

    let mut photo_ids = Vec::with_capacity(photos.len());
    for draft in normalize_photo_drafts(photos) {
        let (photo_id, _) = upsert_photo(conn, &draft, now)?;
        photo_ids.push(photo_id);
    }
    for (order_index, photo_id) in photo_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO entry_photo (entry_id, photo_id, order_index) VALUES (?1, ?2, ?3);",
            params![entry_key, photo_id.to_string(), order_index as i64],
        )?;
    }

    let normalized_tags = normalize_tag_drafts(tags);
    for draft in &normalized_tags {
        let tag_id = upsert_tag(conn, draft.kind, &draft.value, now)?;
        conn.execute(
            "INSERT INTO entry_tag (entry_id, tag_id) VALUES (?1, ?2);",
            params![entry_key, tag_id.to_string()],
        )?;
    }

    Ok((photo_ids.len(), normalized_tags.len()))
}

fn load_entry_photo_links(conn: &Connection, entry_id: EntryId) -> RepoResult<Vec<EntryPhotoLink>> {
    collect_rows(
        conn,
        "SELECT entry_id, photo_id, order_index
         FROM entry_photo
         WHERE entry_id = ?1
         ORDER BY order_index ASC;",
        [entry_id.to_string()],
        |row| {
            let entry_id: String = row.get("entry_id")?;
            let photo_id: String = row.get("photo_id")?;
            Ok(EntryPhotoLink {
                entry_id: parse_uuid(&entry_id, "entry_photo.entry_id")?,
                photo_id: parse_uuid(&photo_id, "entry_photo.photo_id")?,
                order_index: row.get("order_index")?,
            })
        },
    )
}

fn load_entry_tag_links(conn: &Connection, entry_id: EntryId) -> RepoResult<Vec<EntryTagLink>> {
    // rowid order is insertion order, i.e. the caller's tag order.
    collect_rows(
        conn,
        "SELECT entry_id, tag_id FROM entry_tag WHERE entry_id = ?1 ORDER BY rowid ASC;",
        [entry_id.to_string()],
        |row| {
            let entry_id: String = row.get("entry_id")?;
            let tag_id: String = row.get("tag_id")?;
            Ok(EntryTagLink {
                entry_id: parse_uuid(&entry_id, "entry_tag.entry_id")?,
                tag_id: parse_uuid(&tag_id, "entry_tag.tag_id")?,
            })
        },
    )
}

fn query_all_entries(conn: &Connection) -> RepoResult<Vec<JournalEntry>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ENTRY_COLUMNS}
             FROM journal_entry je
             ORDER BY je.updated_at DESC, je.id ASC;"
        ),
        [],
        parse_entry_row,
    )
}

fn query_entries_by_date_range(
    conn: &Connection,
    start_epoch_day: i64,
    end_epoch_day: i64,
) -> RepoResult<Vec<JournalEntry>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ENTRY_COLUMNS}
             FROM journal_entry je
             WHERE je.entry_date_epoch_day BETWEEN ?1 AND ?2
             ORDER BY je.entry_date_epoch_day DESC, je.updated_at DESC, je.id ASC;"
        ),
        [start_epoch_day, end_epoch_day],
        parse_entry_row,
    )
}

fn query_search_entries(conn: &Connection, query: &str) -> RepoResult<Vec<JournalEntry>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ENTRY_COLUMNS}
             FROM journal_entry je
             WHERE je.reflection_text LIKE '%' || ?1 || '%'
                OR je.title LIKE '%' || ?1 || '%'
                OR EXISTS (
                    SELECT 1
                    FROM entry_tag et
                    INNER JOIN tag t ON t.id = et.tag_id
                    WHERE et.entry_id = je.id
                      AND t.value LIKE '%' || ?1 || '%'
                )
                OR EXISTS (
                    SELECT 1
                    FROM entry_photo ep
                    INNER JOIN photo_tag pt ON pt.photo_id = ep.photo_id
                    INNER JOIN tag t ON t.id = pt.tag_id
                    WHERE ep.entry_id = je.id
                      AND t.value LIKE '%' || ?1 || '%'
                )
             ORDER BY je.updated_at DESC, je.id ASC;"
        ),
        [query],
        parse_entry_row,
    )
}

fn query_photos_by_tag(
    conn: &Connection,
    kind: TagType,
    value: &str,
) -> RepoResult<Vec<PhotoAsset>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {PHOTO_COLUMNS}
             FROM photo_asset pa
             INNER JOIN photo_tag pt ON pt.photo_id = pa.id
             INNER JOIN tag t ON t.id = pt.tag_id
             WHERE t.type = ?1 AND t.value = ?2
             ORDER BY pa.updated_at DESC, pa.id ASC;"
        ),
        params![kind.as_str(), value],
        parse_photo_row,
    )
}

#[cfg(test)]
mod tests {
    use super::{normalize_photo_drafts, normalize_tag_drafts, sanitize_title};
    use crate::model::journal::{PhotoAssetDraft, TagDraft, TagType};

    #[test]
    fn sanitize_title_trims_and_drops_blank() {
        assert_eq!(sanitize_title(Some("  Day one ")).as_deref(), Some("Day one"));
        assert_eq!(sanitize_title(Some("   ")), None);
        assert_eq!(sanitize_title(None), None);
    }

    #[test]
    fn photo_drafts_dedupe_by_trimmed_uri_keeping_first() {
        let mut first = PhotoAssetDraft::new(" content://photos/1 ");
        first.width = Some(100);
        let drafts = vec![
            first,
            PhotoAssetDraft::new("content://photos/2"),
            PhotoAssetDraft::new("content://photos/1"),
        ];

        let normalized = normalize_photo_drafts(&drafts);

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].content_uri, "content://photos/1");
        assert_eq!(normalized[0].width, Some(100));
        assert_eq!(normalized[1].content_uri, "content://photos/2");
    }

    #[test]
    fn tag_drafts_drop_blank_and_dedupe_per_type() {
        let drafts = vec![
            TagDraft::new(TagType::Person, " Sam "),
            TagDraft::new(TagType::Keyword, "Sam"),
            TagDraft::new(TagType::Person, "Sam"),
            TagDraft::new(TagType::Place, "   "),
        ];

        let normalized = normalize_tag_drafts(&drafts);

        assert_eq!(
            normalized,
            vec![
                TagDraft::new(TagType::Person, "Sam"),
                TagDraft::new(TagType::Keyword, "Sam"),
            ]
        );
    }
}
