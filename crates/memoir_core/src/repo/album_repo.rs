//! Album aggregate repository.
//!
//! # Responsibility
//! - Create albums together with their owner membership.
//! - Link and unlink entries, photos and members, bumping the album's
//!   `updated_at` on every link change.
//! - Serve point and continuous queries over albums and their children.
//!
//! # Invariants
//! - `create_album` writes the album and its `Owner`/`Active` member in one
//!   transaction.
//! - Adding a photo already held by another album moves it: the unique index
//!   on `album_photo.photo_id` makes the REPLACE drop the old album's row.
//! - Missing parents yield `Ok(false)`/`Ok(None)`.

use super::journal_repo::{EntrySink, PhotoSink};
use super::rows::{
    album_exists, collect_rows, entry_exists, get_album, get_entry, get_photo,
    next_album_photo_order, parse_album_row, parse_entry_row, parse_member_row, parse_photo_row,
    parse_uuid, photo_exists, touch_album, ALBUM_COLUMNS, ENTRY_COLUMNS, MEMBER_COLUMNS,
    PHOTO_COLUMNS,
};
use super::{ensure_tables, now_ms, RepoError, RepoResult};
use crate::db::{MemoirDb, Subscription};
use crate::model::album::{
    AddEntryToAlbumInput, AddPhotoToAlbumInput, Album, AlbumAggregate, AlbumId, AlbumMember,
    AlbumMemberStatus, AlbumRole, CreateAlbumInput, LinkedAlbumEntry, LinkedAlbumPhoto,
    UpsertAlbumMemberInput,
};
use crate::model::journal::{EntryId, JournalEntry, PhotoAsset, PhotoId};
use crate::model::links::{AlbumEntryLink, AlbumPhotoLink};
use log::{debug, info};
use rusqlite::{params, Connection};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &["album", "album_member", "album_entry", "album_photo"];
const ALBUM_TABLES: &[&str] = &["album"];
const MEMBER_TABLES: &[&str] = &["album_member"];
const ALBUM_ENTRY_TABLES: &[&str] = &["album_entry", "journal_entry"];
const ALBUM_PHOTO_TABLES: &[&str] = &["album_photo", "photo_asset"];

/// Receives every snapshot of an album list query.
pub type AlbumSink = Box<dyn FnMut(Vec<Album>) + Send>;
/// Receives every snapshot of an album member query.
pub type MemberSink = Box<dyn FnMut(Vec<AlbumMember>) + Send>;

/// Repository interface for the album aggregate.
pub trait AlbumRepository {
    /// Creates an album and its owner membership. Blank names are rejected
    /// with [`RepoError::Validation`].
    fn create_album(&self, input: &CreateAlbumInput) -> RepoResult<AlbumId>;
    /// Renames an album. `Ok(false)` when absent or the name is blank.
    fn rename_album(&self, album_id: AlbumId, new_name: &str) -> RepoResult<bool>;
    fn get_album_aggregate(&self, album_id: AlbumId) -> RepoResult<Option<AlbumAggregate>>;
    fn add_entry_to_album(&self, input: &AddEntryToAlbumInput) -> RepoResult<bool>;
    fn remove_entry_from_album(&self, album_id: AlbumId, entry_id: EntryId) -> RepoResult<bool>;
    fn add_photo_to_album(&self, input: &AddPhotoToAlbumInput) -> RepoResult<bool>;
    fn remove_photo_from_album(&self, album_id: AlbumId, photo_id: PhotoId) -> RepoResult<bool>;
    fn upsert_album_member(&self, input: &UpsertAlbumMemberInput) -> RepoResult<bool>;
    fn remove_album_member(&self, album_id: AlbumId, member_id: &str) -> RepoResult<bool>;

    fn list_albums_by_owner(&self, owner_user_id: &str) -> RepoResult<Vec<Album>>;
    fn list_all_albums(&self) -> RepoResult<Vec<Album>>;
    fn list_members_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<AlbumMember>>;
    fn list_entries_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<JournalEntry>>;
    fn list_photos_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<PhotoAsset>>;

    fn observe_albums_by_owner(
        &self,
        owner_user_id: &str,
        sink: AlbumSink,
    ) -> RepoResult<Subscription<'_>>;
    fn observe_all_albums(&self, sink: AlbumSink) -> RepoResult<Subscription<'_>>;
    fn observe_members_for_album(
        &self,
        album_id: AlbumId,
        sink: MemberSink,
    ) -> RepoResult<Subscription<'_>>;
    fn observe_entries_for_album(
        &self,
        album_id: AlbumId,
        sink: EntrySink,
    ) -> RepoResult<Subscription<'_>>;
    fn observe_photos_for_album(
        &self,
        album_id: AlbumId,
        sink: PhotoSink,
    ) -> RepoResult<Subscription<'_>>;
}

/// SQLite-backed album repository.
pub struct SqliteAlbumRepository<'db> {
    db: &'db MemoirDb,
}

impl<'db> SqliteAlbumRepository<'db> {
    /// Constructs a repository over a migrated database handle.
    pub fn try_new(db: &'db MemoirDb) -> RepoResult<Self> {
        ensure_tables(db.connection(), REQUIRED_TABLES)?;
        Ok(Self { db })
    }

    /// Runs `mutate` inside a write transaction after checking that the
    /// album exists, then bumps the album's `updated_at`.
    ///
    /// `mutate` returns `false` to abort without writing (missing child).
    fn mutate_album(
        &self,
        event: &'static str,
        album_id: AlbumId,
        mutate: impl FnOnce(&Connection, i64) -> RepoResult<bool>,
    ) -> RepoResult<bool> {
        let now = now_ms();
        let tx = self.db.write_tx()?;
        if !album_exists(&tx, album_id)? {
            debug!("event={event} module=repo status=not_found album_id={album_id}");
            return Ok(false);
        }
        if !mutate(&tx, now)? {
            debug!("event={event} module=repo status=not_found album_id={album_id}");
            return Ok(false);
        }
        touch_album(&tx, album_id, now)?;
        tx.commit()?;
        self.db.flush_changes();

        info!("event={event} module=repo status=ok album_id={album_id}");
        Ok(true)
    }
}

impl AlbumRepository for SqliteAlbumRepository<'_> {
    fn create_album(&self, input: &CreateAlbumInput) -> RepoResult<AlbumId> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(RepoError::Validation(
                "album name cannot be blank".to_string(),
            ));
        }

        let now = now_ms();
        let album_id = Uuid::new_v4();
        let tx = self.db.write_tx()?;
        insert_album_with_owner(&tx, album_id, name, input, now)?;
        tx.commit()?;
        self.db.flush_changes();

        info!(
            "event=album_create module=repo status=ok album_id={album_id} visibility={}",
            input.visibility.as_str()
        );
        Ok(album_id)
    }

    fn rename_album(&self, album_id: AlbumId, new_name: &str) -> RepoResult<bool> {
        let cleaned = new_name.trim();
        if cleaned.is_empty() {
            debug!("event=album_rename module=repo status=rejected album_id={album_id}");
            return Ok(false);
        }

        let changed = self.db.connection().execute(
            "UPDATE album SET name = ?2, updated_at = ?3 WHERE id = ?1;",
            params![album_id.to_string(), cleaned, now_ms()],
        )?;
        self.db.flush_changes();
        Ok(changed == 1)
    }

    fn get_album_aggregate(&self, album_id: AlbumId) -> RepoResult<Option<AlbumAggregate>> {
        let conn = self.db.connection();
        let Some(album) = get_album(conn, album_id)? else {
            return Ok(None);
        };

        let entries = load_album_entry_links(conn, album_id)?
            .into_iter()
            .filter_map(|link| match get_entry(conn, link.entry_id) {
                Ok(Some(entry)) => Some(Ok(LinkedAlbumEntry {
                    entry,
                    added_at: link.added_at,
                    added_by: link.added_by,
                })),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<RepoResult<Vec<_>>>()?;

        let photos = load_album_photo_links(conn, album_id)?
            .into_iter()
            .filter_map(|link| match get_photo(conn, link.photo_id) {
                Ok(Some(photo)) => Some(Ok(LinkedAlbumPhoto {
                    photo,
                    order_index: link.order_index,
                    added_at: link.added_at,
                    added_by: link.added_by,
                })),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            })
            .collect::<RepoResult<Vec<_>>>()?;

        let members = query_members(conn, album_id)?;

        Ok(Some(AlbumAggregate {
            album,
            entries,
            photos,
            members,
        }))
    }

    fn add_entry_to_album(&self, input: &AddEntryToAlbumInput) -> RepoResult<bool> {
        self.mutate_album("album_add_entry", input.album_id, |conn, now| {
            if !entry_exists(conn, input.entry_id)? {
                return Ok(false);
            }
            conn.execute(
                "INSERT OR REPLACE INTO album_entry (album_id, entry_id, added_at, added_by)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    input.album_id.to_string(),
                    input.entry_id.to_string(),
                    now,
                    input.added_by.as_deref(),
                ],
            )?;
            Ok(true)
        })
    }

    fn remove_entry_from_album(&self, album_id: AlbumId, entry_id: EntryId) -> RepoResult<bool> {
        self.mutate_album("album_remove_entry", album_id, |conn, _| {
            conn.execute(
                "DELETE FROM album_entry WHERE album_id = ?1 AND entry_id = ?2;",
                params![album_id.to_string(), entry_id.to_string()],
            )?;
            Ok(true)
        })
    }

    fn add_photo_to_album(&self, input: &AddPhotoToAlbumInput) -> RepoResult<bool> {
        self.mutate_album("album_add_photo", input.album_id, |conn, now| {
            if !photo_exists(conn, input.photo_id)? {
                return Ok(false);
            }
            let order_index = match input.order_index {
                Some(order_index) => order_index,
                None => next_album_photo_order(conn, input.album_id)?,
            };
            conn.execute(
                "INSERT OR REPLACE INTO album_photo (
                    album_id, photo_id, order_index, added_at, added_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    input.album_id.to_string(),
                    input.photo_id.to_string(),
                    order_index,
                    now,
                    input.added_by.as_deref(),
                ],
            )?;
            Ok(true)
        })
    }

    fn remove_photo_from_album(&self, album_id: AlbumId, photo_id: PhotoId) -> RepoResult<bool> {
        self.mutate_album("album_remove_photo", album_id, |conn, _| {
            conn.execute(
                "DELETE FROM album_photo WHERE album_id = ?1 AND photo_id = ?2;",
                params![album_id.to_string(), photo_id.to_string()],
            )?;
            Ok(true)
        })
    }

    fn upsert_album_member(&self, input: &UpsertAlbumMemberInput) -> RepoResult<bool> {
        self.mutate_album("album_upsert_member", input.album_id, |conn, now| {
            upsert_member(
                conn,
                input.album_id,
                &input.member_id,
                input.role,
                input.status,
                now,
            )?;
            Ok(true)
        })
    }

    fn remove_album_member(&self, album_id: AlbumId, member_id: &str) -> RepoResult<bool> {
        self.mutate_album("album_remove_member", album_id, |conn, _| {
            conn.execute(
                "DELETE FROM album_member WHERE album_id = ?1 AND member_id = ?2;",
                params![album_id.to_string(), member_id],
            )?;
            Ok(true)
        })
    }

    fn list_albums_by_owner(&self, owner_user_id: &str) -> RepoResult<Vec<Album>> {
        query_albums_by_owner(self.db.connection(), owner_user_id)
    }

    fn list_all_albums(&self) -> RepoResult<Vec<Album>> {
        query_all_albums(self.db.connection())
    }

    fn list_members_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<AlbumMember>> {
        query_members(self.db.connection(), album_id)
    }

    fn list_entries_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<JournalEntry>> {
        query_entries_for_album(self.db.connection(), album_id)
    }

    fn list_photos_for_album(&self, album_id: AlbumId) -> RepoResult<Vec<PhotoAsset>> {
        query_photos_for_album(self.db.connection(), album_id)
    }

    fn observe_albums_by_owner(
        &self,
        owner_user_id: &str,
        sink: AlbumSink,
    ) -> RepoResult<Subscription<'_>> {
        let owner_user_id = owner_user_id.to_string();
        self.db.watch(
            ALBUM_TABLES,
            move |conn: &Connection| query_albums_by_owner(conn, &owner_user_id),
            sink,
        )
    }

    fn observe_all_albums(&self, sink: AlbumSink) -> RepoResult<Subscription<'_>> {
        self.db.watch(ALBUM_TABLES, query_all_albums, sink)
    }

    fn observe_members_for_album(
        &self,
        album_id: AlbumId,
        sink: MemberSink,
    ) -> RepoResult<Subscription<'_>> {
        self.db.watch(
            MEMBER_TABLES,
            move |conn: &Connection| query_members(conn, album_id),
            sink,
        )
    }

    fn observe_entries_for_album(
        &self,
        album_id: AlbumId,
        sink: EntrySink,
    ) -> RepoResult<Subscription<'_>> {
        self.db.watch(
            ALBUM_ENTRY_TABLES,
            move |conn: &Connection| query_entries_for_album(conn, album_id),
            sink,
        )
    }

    fn observe_photos_for_album(
        &self,
        album_id: AlbumId,
        sink: PhotoSink,
    ) -> RepoResult<Subscription<'_>> {
        self.db.watch(
            ALBUM_PHOTO_TABLES,
            move |conn: &Connection| query_photos_for_album(conn, album_id),
            sink,
        )
    }
}

fn insert_album_with_owner(
    conn: &Connection,
    album_id: AlbumId,
    name: &str,
    input: &CreateAlbumInput,
    now: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO album (id, created_at, updated_at, name, owner_user_id, visibility)
         VALUES (?1, ?2, ?2, ?3, ?4, ?5);",
        params![
            album_id.to_string(),
            now,
            name,
            input.owner_user_id,
            input.visibility.as_str(),
        ],
    )?;
    upsert_member(
        conn,
        album_id,
        &input.owner_user_id,
        AlbumRole::Owner,
        AlbumMemberStatus::Active,
        now,
    )
}

/// Writes the member row keyed by `(album_id, member_id)`, replacing any
/// existing one.
pub(crate) fn upsert_member(
    conn: &Connection,
    album_id: AlbumId,
    member_id: &str,
    role: AlbumRole,
    status: AlbumMemberStatus,
    now: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO album_member (album_id, member_id, role, status, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            album_id.to_string(),
            member_id,
            role.as_str(),
            status.as_str(),
            now,
        ],
    )?;
    Ok(())
}

fn load_album_entry_links(conn: &Connection, album_id: AlbumId) -> RepoResult<Vec<AlbumEntryLink>> {
    collect_rows(
        conn,
        "SELECT album_id, entry_id, added_at, added_by
         FROM album_entry
         WHERE album_id = ?1
         ORDER BY added_at DESC, entry_id ASC;",
        [album_id.to_string()],
        |row| {
            let album_id: String = row.get("album_id")?;
            let entry_id: String = row.get("entry_id")?;
            Ok(AlbumEntryLink {
                album_id: parse_uuid(&album_id, "album_entry.album_id")?,
                entry_id: parse_uuid(&entry_id, "album_entry.entry_id")?,
                added_at: row.get("added_at")?,
                added_by: row.get("added_by")?,
            })
        },
    )
}

fn load_album_photo_links(conn: &Connection, album_id: AlbumId) -> RepoResult<Vec<AlbumPhotoLink>> {
    collect_rows(
        conn,
        "SELECT album_id, photo_id, order_index, added_at, added_by
         FROM album_photo
         WHERE album_id = ?1
         ORDER BY order_index ASC, photo_id ASC;",
        [album_id.to_string()],
        |row| {
            let album_id: String = row.get("album_id")?;
            let photo_id: String = row.get("photo_id")?;
            Ok(AlbumPhotoLink {
                album_id: parse_uuid(&album_id, "album_photo.album_id")?,
                photo_id: parse_uuid(&photo_id, "album_photo.photo_id")?,
                order_index: row.get("order_index")?,
                added_at: row.get("added_at")?,
                added_by: row.get("added_by")?,
            })
        },
    )
}

fn query_albums_by_owner(conn: &Connection, owner_user_id: &str) -> RepoResult<Vec<Album>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ALBUM_COLUMNS}
             FROM album a
             WHERE a.owner_user_id = ?1
             ORDER BY a.updated_at DESC, a.id ASC;"
        ),
        [owner_user_id],
        parse_album_row,
    )
}

fn query_all_albums(conn: &Connection) -> RepoResult<Vec<Album>> {
    collect_rows(
        conn,
        &format!("SELECT {ALBUM_COLUMNS} FROM album a ORDER BY a.updated_at DESC, a.id ASC;"),
        [],
        parse_album_row,
    )
}

fn query_members(conn: &Connection, album_id: AlbumId) -> RepoResult<Vec<AlbumMember>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS}
             FROM album_member am
             WHERE am.album_id = ?1
             ORDER BY am.added_at ASC, am.member_id ASC;"
        ),
        [album_id.to_string()],
        parse_member_row,
    )
}

fn query_entries_for_album(conn: &Connection, album_id: AlbumId) -> RepoResult<Vec<JournalEntry>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {ENTRY_COLUMNS}
             FROM album_entry ae
             INNER JOIN journal_entry je ON je.id = ae.entry_id
             WHERE ae.album_id = ?1
             ORDER BY ae.added_at DESC, je.id ASC;"
        ),
        [album_id.to_string()],
        parse_entry_row,
    )
}

fn query_photos_for_album(conn: &Connection, album_id: AlbumId) -> RepoResult<Vec<PhotoAsset>> {
    collect_rows(
        conn,
        &format!(
            "SELECT {PHOTO_COLUMNS}
             FROM album_photo ap
             INNER JOIN photo_asset pa ON pa.id = ap.photo_id
             WHERE ap.album_id = ?1
             ORDER BY ap.order_index ASC, pa.id ASC;"
        ),
        [album_id.to_string()],
        parse_photo_row,
    )
}
