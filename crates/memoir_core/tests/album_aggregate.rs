use memoir_core::{
    AddEntryToAlbumInput, AddPhotoToAlbumInput, AlbumId, AlbumMemberStatus, AlbumRepository,
    AlbumRole, AlbumVisibility, CreateAlbumInput, CreateEntryInput, EntryId, JournalingRepository,
    MemoirDb, PhotoAssetDraft, PhotoId, RepoError, SqliteAlbumRepository,
    SqliteJournalingRepository, UpsertAlbumMemberInput,
};
use uuid::Uuid;

fn create_photos(db: &MemoirDb, uris: &[&str]) -> (EntryId, Vec<PhotoId>) {
    let journal = SqliteJournalingRepository::try_new(db).unwrap();
    let entry_id = journal
        .create_entry_aggregate(&CreateEntryInput {
            entry_date_epoch_day: 21_100,
            title: Some("Photo Source".to_string()),
            reflection_text: "Source entry".to_string(),
            photos: uris.iter().map(|uri| PhotoAssetDraft::new(*uri)).collect(),
            tags: Vec::new(),
        })
        .unwrap();
    let aggregate = journal.get_entry_aggregate(entry_id).unwrap().unwrap();
    let photo_ids = aggregate.photos.iter().map(|p| p.photo.id).collect();
    (entry_id, photo_ids)
}

fn add_photo(repo: &SqliteAlbumRepository<'_>, album_id: AlbumId, photo_id: PhotoId) -> bool {
    repo.add_photo_to_album(&AddPhotoToAlbumInput {
        album_id,
        photo_id,
        order_index: None,
        added_by: Some("owner-1".to_string()),
    })
    .unwrap()
}

fn reset_updated_at(db: &MemoirDb, album_id: AlbumId) {
    db.connection()
        .execute(
            "UPDATE album SET updated_at = 0 WHERE id = ?1;",
            [album_id.to_string()],
        )
        .unwrap();
}

fn updated_at(repo: &SqliteAlbumRepository<'_>, album_id: AlbumId) -> i64 {
    repo.get_album_aggregate(album_id)
        .unwrap()
        .unwrap()
        .album
        .updated_at
}

#[test]
fn create_album_writes_single_active_owner_member() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();

    let album_id = repo
        .create_album(&CreateAlbumInput::new("  Vietnam Trip ", "u1"))
        .unwrap();

    let aggregate = repo.get_album_aggregate(album_id).unwrap().unwrap();
    assert_eq!(aggregate.album.name, "Vietnam Trip");
    assert_eq!(aggregate.album.owner_user_id, "u1");
    assert_eq!(aggregate.album.visibility, AlbumVisibility::Private);
    assert_eq!(aggregate.members.len(), 1);
    let owner = &aggregate.members[0];
    assert_eq!(owner.member_id, "u1");
    assert_eq!(owner.role, AlbumRole::Owner);
    assert_eq!(owner.status, AlbumMemberStatus::Active);
    assert!(aggregate.entries.is_empty());
    assert!(aggregate.photos.is_empty());
}

#[test]
fn create_album_keeps_requested_visibility() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();

    let mut input = CreateAlbumInput::new("Shared", "u1");
    input.visibility = AlbumVisibility::Shared;
    let album_id = repo.create_album(&input).unwrap();

    let aggregate = repo.get_album_aggregate(album_id).unwrap().unwrap();
    assert_eq!(aggregate.album.visibility, AlbumVisibility::Shared);
}

#[test]
fn create_album_rejects_blank_name() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();

    let err = repo
        .create_album(&CreateAlbumInput::new("   ", "u1"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(repo.list_all_albums().unwrap().is_empty());
}

#[test]
fn rename_album_trims_and_rejects_blank_or_missing() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let album_id = repo
        .create_album(&CreateAlbumInput::new("Before", "u1"))
        .unwrap();
    reset_updated_at(&db, album_id);

    assert!(repo.rename_album(album_id, "  After ").unwrap());
    let aggregate = repo.get_album_aggregate(album_id).unwrap().unwrap();
    assert_eq!(aggregate.album.name, "After");
    assert!(aggregate.album.updated_at > 0);

    assert!(!repo.rename_album(album_id, "   ").unwrap());
    assert!(!repo.rename_album(Uuid::new_v4(), "Ghost").unwrap());
    assert_eq!(
        repo.get_album_aggregate(album_id).unwrap().unwrap().album.name,
        "After"
    );
}

#[test]
fn get_missing_album_returns_none() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();

    assert!(repo.get_album_aggregate(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn add_and_remove_entry_links() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let (entry_id, _) = create_photos(&db, &[]);
    let album_id = repo
        .create_album(&CreateAlbumInput::new("Family", "owner-1"))
        .unwrap();
    reset_updated_at(&db, album_id);

    let added = repo
        .add_entry_to_album(&AddEntryToAlbumInput {
            album_id,
            entry_id,
            added_by: Some("owner-1".to_string()),
        })
        .unwrap();
    assert!(added);
    assert!(updated_at(&repo, album_id) > 0);

    let aggregate = repo.get_album_aggregate(album_id).unwrap().unwrap();
    assert_eq!(aggregate.entries.len(), 1);
    assert_eq!(aggregate.entries[0].entry.id, entry_id);
    assert_eq!(aggregate.entries[0].added_by.as_deref(), Some("owner-1"));
    assert_eq!(repo.list_entries_for_album(album_id).unwrap().len(), 1);

    reset_updated_at(&db, album_id);
    assert!(repo.remove_entry_from_album(album_id, entry_id).unwrap());
    assert!(updated_at(&repo, album_id) > 0);
    assert!(repo
        .get_album_aggregate(album_id)
        .unwrap()
        .unwrap()
        .entries
        .is_empty());

    // Removing a link that is already gone still reports the album present.
    assert!(repo.remove_entry_from_album(album_id, entry_id).unwrap());
}

#[test]
fn entry_links_require_both_parents() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let (entry_id, _) = create_photos(&db, &[]);
    let album_id = repo
        .create_album(&CreateAlbumInput::new("Family", "owner-1"))
        .unwrap();
    reset_updated_at(&db, album_id);

    let missing_entry = repo
        .add_entry_to_album(&AddEntryToAlbumInput {
            album_id,
            entry_id: Uuid::new_v4(),
            added_by: None,
        })
        .unwrap();
    assert!(!missing_entry);
    assert_eq!(updated_at(&repo, album_id), 0);

    let missing_album = repo
        .add_entry_to_album(&AddEntryToAlbumInput {
            album_id: Uuid::new_v4(),
            entry_id,
            added_by: None,
        })
        .unwrap();
    assert!(!missing_album);
    assert!(!repo
        .remove_entry_from_album(Uuid::new_v4(), entry_id)
        .unwrap());
}

#[test]
fn photos_append_in_order_and_can_be_removed() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let (_, photos) = create_photos(&db, &["content://a/1", "content://a/2", "content://a/3"]);
    let album_id = repo
        .create_album(&CreateAlbumInput::new("Album Photos", "owner-1"))
        .unwrap();

    assert!(add_photo(&repo, album_id, photos[2]));
    assert!(add_photo(&repo, album_id, photos[0]));
    assert!(repo
        .add_photo_to_album(&AddPhotoToAlbumInput {
            album_id,
            photo_id: photos[1],
            order_index: Some(10),
            added_by: None,
        })
        .unwrap());

    let aggregate = repo.get_album_aggregate(album_id).unwrap().unwrap();
    let linked: Vec<(PhotoId, i64)> = aggregate
        .photos
        .iter()
        .map(|p| (p.photo.id, p.order_index))
        .collect();
    assert_eq!(linked, vec![(photos[2], 0), (photos[0], 1), (photos[1], 10)]);
    let listed: Vec<PhotoId> = repo
        .list_photos_for_album(album_id)
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![photos[2], photos[0], photos[1]]);

    reset_updated_at(&db, album_id);
    assert!(repo.remove_photo_from_album(album_id, photos[0]).unwrap());
    assert!(updated_at(&repo, album_id) > 0);
    assert_eq!(repo.list_photos_for_album(album_id).unwrap().len(), 2);

    assert!(!add_photo(&repo, album_id, Uuid::new_v4()));
    assert!(!add_photo(&repo, Uuid::new_v4(), photos[0]));
    assert!(!repo
        .remove_photo_from_album(Uuid::new_v4(), photos[0])
        .unwrap());
}

#[test]
fn adding_photo_to_second_album_moves_it() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let (_, photos) = create_photos(&db, &["content://moving/1"]);
    let first = repo.create_album(&CreateAlbumInput::new("A", "u1")).unwrap();
    let second = repo.create_album(&CreateAlbumInput::new("B", "u1")).unwrap();

    assert!(add_photo(&repo, first, photos[0]));
    reset_updated_at(&db, first);
    reset_updated_at(&db, second);
    assert!(add_photo(&repo, second, photos[0]));

    // Only the receiving album is touched by a move.
    assert_eq!(updated_at(&repo, first), 0);
    assert!(updated_at(&repo, second) > 0);

    let first_aggregate = repo.get_album_aggregate(first).unwrap().unwrap();
    assert!(first_aggregate.photos.is_empty());
    let second_aggregate = repo.get_album_aggregate(second).unwrap().unwrap();
    assert_eq!(second_aggregate.photos.len(), 1);
    assert_eq!(second_aggregate.photos[0].photo.id, photos[0]);
}

#[test]
fn members_upsert_replace_and_remove() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let album_id = repo
        .create_album(&CreateAlbumInput::new("Shared Album", "owner-1"))
        .unwrap();

    let invite = UpsertAlbumMemberInput {
        album_id,
        member_id: "friend-1".to_string(),
        role: AlbumRole::Viewer,
        status: AlbumMemberStatus::Invited,
    };
    assert!(repo.upsert_album_member(&invite).unwrap());
    assert!(repo
        .upsert_album_member(&UpsertAlbumMemberInput {
            role: AlbumRole::Editor,
            status: AlbumMemberStatus::Active,
            ..invite.clone()
        })
        .unwrap());

    let members = repo.list_members_for_album(album_id).unwrap();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .any(|member| member.member_id == "owner-1" && member.role == AlbumRole::Owner));
    let friend = members
        .iter()
        .find(|member| member.member_id == "friend-1")
        .unwrap();
    assert_eq!(friend.role, AlbumRole::Editor);
    assert_eq!(friend.status, AlbumMemberStatus::Active);

    reset_updated_at(&db, album_id);
    assert!(repo.remove_album_member(album_id, "friend-1").unwrap());
    assert!(updated_at(&repo, album_id) > 0);
    assert_eq!(repo.list_members_for_album(album_id).unwrap().len(), 1);

    assert!(!repo
        .upsert_album_member(&UpsertAlbumMemberInput {
            album_id: Uuid::new_v4(),
            ..invite
        })
        .unwrap());
    assert!(!repo.remove_album_member(Uuid::new_v4(), "owner-1").unwrap());
}

#[test]
fn albums_are_listed_by_owner() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();

    repo.create_album(&CreateAlbumInput::new("Owner Album", "owner-a"))
        .unwrap();
    repo.create_album(&CreateAlbumInput::new("Other Album", "owner-b"))
        .unwrap();

    let owned = repo.list_albums_by_owner("owner-a").unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].name, "Owner Album");
    assert_eq!(repo.list_all_albums().unwrap().len(), 2);
    assert!(repo.list_albums_by_owner("nobody").unwrap().is_empty());
}

#[test]
fn all_albums_are_sorted_by_most_recent_update() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteAlbumRepository::try_new(&db).unwrap();
    let older = repo.create_album(&CreateAlbumInput::new("Older", "u1")).unwrap();
    let newer = repo.create_album(&CreateAlbumInput::new("Newer", "u1")).unwrap();
    db.connection()
        .execute_batch(&format!(
            "UPDATE album SET updated_at = 100 WHERE id = '{older}';
             UPDATE album SET updated_at = 200 WHERE id = '{newer}';"
        ))
        .unwrap();

    let ids: Vec<AlbumId> = repo.list_all_albums().unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![newer, older]);
}
