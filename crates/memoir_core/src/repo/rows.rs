//! Row decoding and single-table helpers shared by repositories and the
//! startup importer.
//!
//! Helpers take `&Connection` so they run equally on a plain connection or
//! inside a `Transaction` (which derefs to one).

use super::{RepoError, RepoResult};
use crate::model::album::{
    Album, AlbumId, AlbumMember, AlbumMemberStatus, AlbumRole, AlbumVisibility,
};
use crate::model::journal::{
    EntryId, JournalEntry, PhotoAsset, PhotoAssetDraft, PhotoId, Tag, TagId, TagType,
};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) const ENTRY_COLUMNS: &str =
    "je.id, je.created_at, je.updated_at, je.entry_date_epoch_day, je.title, je.reflection_text";
pub(crate) const PHOTO_COLUMNS: &str = "pa.id, pa.created_at, pa.updated_at, pa.content_uri, \
     pa.taken_at, pa.width, pa.height, pa.hash";
pub(crate) const TAG_COLUMNS: &str = "t.id, t.created_at, t.updated_at, t.type, t.value";
pub(crate) const ALBUM_COLUMNS: &str =
    "a.id, a.created_at, a.updated_at, a.name, a.owner_user_id, a.visibility";
pub(crate) const MEMBER_COLUMNS: &str =
    "am.album_id, am.member_id, am.role, am.status, am.added_at";

/// What a natural-key upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn uuid_column(row: &Row<'_>, column: &str, qualified: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, qualified)
}

pub(crate) fn parse_entry_row(row: &Row<'_>) -> RepoResult<JournalEntry> {
    Ok(JournalEntry {
        id: uuid_column(row, "id", "journal_entry.id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        entry_date_epoch_day: row.get("entry_date_epoch_day")?,
        title: row.get("title")?,
        reflection_text: row.get("reflection_text")?,
    })
}

pub(crate) fn parse_photo_row(row: &Row<'_>) -> RepoResult<PhotoAsset> {
    Ok(PhotoAsset {
        id: uuid_column(row, "id", "photo_asset.id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        content_uri: row.get("content_uri")?,
        taken_at: row.get("taken_at")?,
        width: row.get("width")?,
        height: row.get("height")?,
        hash: row.get("hash")?,
    })
}

pub(crate) fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let type_text: String = row.get("type")?;
    let kind = TagType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid tag type `{type_text}` in tag.type"))
    })?;
    Ok(Tag {
        id: uuid_column(row, "id", "tag.id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        kind,
        value: row.get("value")?,
    })
}

pub(crate) fn parse_album_row(row: &Row<'_>) -> RepoResult<Album> {
    let visibility_text: String = row.get("visibility")?;
    let visibility = AlbumVisibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in album.visibility"
        ))
    })?;
    Ok(Album {
        id: uuid_column(row, "id", "album.id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        name: row.get("name")?,
        owner_user_id: row.get("owner_user_id")?,
        visibility,
    })
}

pub(crate) fn parse_member_row(row: &Row<'_>) -> RepoResult<AlbumMember> {
    let role_text: String = row.get("role")?;
    let role = AlbumRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in album_member.role"))
    })?;
    let status_text: String = row.get("status")?;
    let status = AlbumMemberStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in album_member.status"
        ))
    })?;
    Ok(AlbumMember {
        album_id: uuid_column(row, "album_id", "album_member.album_id")?,
        member_id: row.get("member_id")?,
        role,
        status,
        added_at: row.get("added_at")?,
    })
}

/// Runs `sql` with `params` and decodes every row with `parse`.
pub(crate) fn collect_rows<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

fn first_row<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(parse(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn get_entry(conn: &Connection, entry_id: EntryId) -> RepoResult<Option<JournalEntry>> {
    first_row(
        conn,
        &format!("SELECT {ENTRY_COLUMNS} FROM journal_entry je WHERE je.id = ?1;"),
        [entry_id.to_string()],
        parse_entry_row,
    )
}

pub(crate) fn get_photo(conn: &Connection, photo_id: PhotoId) -> RepoResult<Option<PhotoAsset>> {
    first_row(
        conn,
        &format!("SELECT {PHOTO_COLUMNS} FROM photo_asset pa WHERE pa.id = ?1;"),
        [photo_id.to_string()],
        parse_photo_row,
    )
}

pub(crate) fn find_photo_by_uri(
    conn: &Connection,
    content_uri: &str,
) -> RepoResult<Option<PhotoAsset>> {
    first_row(
        conn,
        &format!("SELECT {PHOTO_COLUMNS} FROM photo_asset pa WHERE pa.content_uri = ?1;"),
        [content_uri],
        parse_photo_row,
    )
}

pub(crate) fn get_album(conn: &Connection, album_id: AlbumId) -> RepoResult<Option<Album>> {
    first_row(
        conn,
        &format!("SELECT {ALBUM_COLUMNS} FROM album a WHERE a.id = ?1;"),
        [album_id.to_string()],
        parse_album_row,
    )
}

pub(crate) fn get_member(
    conn: &Connection,
    album_id: AlbumId,
    member_id: &str,
) -> RepoResult<Option<AlbumMember>> {
    first_row(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS} FROM album_member am
             WHERE am.album_id = ?1 AND am.member_id = ?2;"
        ),
        params![album_id.to_string(), member_id],
        parse_member_row,
    )
}

pub(crate) fn entry_exists(conn: &Connection, entry_id: EntryId) -> RepoResult<bool> {
    row_exists(conn, "journal_entry", entry_id)
}

pub(crate) fn photo_exists(conn: &Connection, photo_id: PhotoId) -> RepoResult<bool> {
    row_exists(conn, "photo_asset", photo_id)
}

pub(crate) fn album_exists(conn: &Connection, album_id: AlbumId) -> RepoResult<bool> {
    row_exists(conn, "album", album_id)
}

fn row_exists(conn: &Connection, table: &'static str, id: Uuid) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Loads photos by id, keyed by id. Ids without a row are absent from the map.
pub(crate) fn photos_by_ids(
    conn: &Connection,
    ids: &[PhotoId],
) -> RepoResult<HashMap<PhotoId, PhotoAsset>> {
    let mut found = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(photo) = get_photo(conn, *id)? {
            found.insert(photo.id, photo);
        }
    }
    Ok(found)
}

pub(crate) fn tags_by_ids(conn: &Connection, ids: &[TagId]) -> RepoResult<HashMap<TagId, Tag>> {
    let mut stmt = conn.prepare(&format!("SELECT {TAG_COLUMNS} FROM tag t WHERE t.id = ?1;"))?;
    let mut found = HashMap::with_capacity(ids.len());
    for id in ids {
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let tag = parse_tag_row(row)?;
            found.insert(tag.id, tag);
        }
    }
    Ok(found)
}

/// Resolves one photo draft by its content URI, inserting or merging.
///
/// Non-null draft metadata overwrites stored values; `updated_at` is bumped
/// only when something actually changed.
pub(crate) fn upsert_photo(
    conn: &Connection,
    draft: &PhotoAssetDraft,
    now: i64,
) -> RepoResult<(PhotoId, UpsertOutcome)> {
    let content_uri = draft.content_uri.trim();
    let Some(existing) = find_photo_by_uri(conn, content_uri)? else {
        let photo_id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO photo_asset (
                id, created_at, updated_at, content_uri, taken_at, width, height, hash
            ) VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                photo_id.to_string(),
                now,
                content_uri,
                draft.taken_at,
                draft.width,
                draft.height,
                draft.hash.as_deref(),
            ],
        )?;
        return Ok((photo_id, UpsertOutcome::Created));
    };

    let taken_at = draft.taken_at.or(existing.taken_at);
    let width = draft.width.or(existing.width);
    let height = draft.height.or(existing.height);
    let hash = draft.hash.clone().or_else(|| existing.hash.clone());
    if taken_at == existing.taken_at
        && width == existing.width
        && height == existing.height
        && hash == existing.hash
    {
        return Ok((existing.id, UpsertOutcome::Unchanged));
    }

    conn.execute(
        "UPDATE photo_asset
         SET taken_at = ?2, width = ?3, height = ?4, hash = ?5, updated_at = ?6
         WHERE id = ?1;",
        params![existing.id.to_string(), taken_at, width, height, hash, now],
    )?;
    Ok((existing.id, UpsertOutcome::Updated))
}

/// Resolves one tag by `(kind, value)`, inserting it when missing and
/// bumping `updated_at` when it already exists. `value` must be trimmed.
pub(crate) fn upsert_tag(
    conn: &Connection,
    kind: TagType,
    value: &str,
    now: i64,
) -> RepoResult<TagId> {
    let id_text: String = conn.query_row(
        "INSERT INTO tag (id, created_at, updated_at, type, value)
         VALUES (?1, ?2, ?2, ?3, ?4)
         ON CONFLICT (type, value) DO UPDATE SET updated_at = excluded.updated_at
         RETURNING id;",
        params![Uuid::new_v4().to_string(), now, kind.as_str(), value],
        |row| row.get(0),
    )?;
    parse_uuid(&id_text, "tag.id")
}

/// Next free position after the last photo of an album (0 when empty).
pub(crate) fn next_album_photo_order(conn: &Connection, album_id: AlbumId) -> RepoResult<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(order_index), -1) + 1 FROM album_photo WHERE album_id = ?1;",
        [album_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Next free position after the last photo of an entry (0 when empty).
pub(crate) fn next_entry_photo_order(conn: &Connection, entry_id: EntryId) -> RepoResult<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(order_index), -1) + 1 FROM entry_photo WHERE entry_id = ?1;",
        [entry_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

pub(crate) fn touch_album(conn: &Connection, album_id: AlbumId, now: i64) -> RepoResult<()> {
    conn.execute(
        "UPDATE album SET updated_at = ?2 WHERE id = ?1;",
        params![album_id.to_string(), now],
    )?;
    Ok(())
}

pub(crate) fn touch_entry(conn: &Connection, entry_id: EntryId, now: i64) -> RepoResult<()> {
    conn.execute(
        "UPDATE journal_entry SET updated_at = ?2 WHERE id = ?1;",
        params![entry_id.to_string(), now],
    )?;
    Ok(())
}

/// Links a tag to a photo; returns whether a new link row was written.
pub(crate) fn link_photo_tag(
    conn: &Connection,
    photo_id: PhotoId,
    tag_id: TagId,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO photo_tag (photo_id, tag_id) VALUES (?1, ?2);",
        params![photo_id.to_string(), tag_id.to_string()],
    )?;
    Ok(changed == 1)
}

pub(crate) fn count_rows(conn: &Connection, table: &'static str) -> RepoResult<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))?;
    Ok(count)
}
