use memoir_core::{
    table_counts, CreateEntryInput, ImportedPhoto, JournalingRepository, MemoirDb,
    PhotoAssetDraft, SqliteJournalingRepository, StartupImporter, TagDraft, TagType,
    UpdateEntryInput,
};
use uuid::Uuid;

fn entry_input(day: i64, reflection: &str) -> CreateEntryInput {
    CreateEntryInput {
        entry_date_epoch_day: day,
        title: None,
        reflection_text: reflection.to_string(),
        photos: Vec::new(),
        tags: Vec::new(),
    }
}

fn count(db: &MemoirDb, table: &str) -> i64 {
    table_counts(db.connection()).unwrap()[table]
}

#[test]
fn create_and_get_preserves_photo_order_after_dedup() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut input = entry_input(19_000, "  Great hike today  ");
    input.title = Some("  Day One ".to_string());
    input.photos = vec![
        PhotoAssetDraft::new("content://photos/3"),
        PhotoAssetDraft::new("content://photos/1"),
        PhotoAssetDraft::new(" content://photos/3 "),
        PhotoAssetDraft::new("content://photos/2"),
    ];
    input.tags = vec![
        TagDraft::new(TagType::Place, "Waterloo Park"),
        TagDraft::new(TagType::Keyword, "hike"),
        TagDraft::new(TagType::Keyword, " hike "),
        TagDraft::new(TagType::Person, "  "),
    ];
    let entry_id = repo.create_entry_aggregate(&input).unwrap();

    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    assert_eq!(aggregate.entry.id, entry_id);
    assert_eq!(aggregate.entry.title.as_deref(), Some("Day One"));
    assert_eq!(aggregate.entry.reflection_text, "Great hike today");
    assert_eq!(aggregate.entry.entry_date_epoch_day, 19_000);
    assert_eq!(
        aggregate.photo_uris(),
        vec![
            "content://photos/3",
            "content://photos/1",
            "content://photos/2"
        ]
    );
    let orders: Vec<i64> = aggregate.photos.iter().map(|p| p.order_index).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let tags: Vec<(TagType, &str)> = aggregate
        .tags
        .iter()
        .map(|tag| (tag.kind, tag.value.as_str()))
        .collect();
    assert_eq!(
        tags,
        vec![(TagType::Place, "Waterloo Park"), (TagType::Keyword, "hike")]
    );
}

#[test]
fn blank_title_is_stored_as_absent() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut input = entry_input(19_000, "text");
    input.title = Some("   ".to_string());
    let entry_id = repo.create_entry_aggregate(&input).unwrap();

    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    assert_eq!(aggregate.entry.title, None);
}

#[test]
fn shared_photo_and_tag_resolve_to_single_rows() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    for day in [19_000, 19_001] {
        let mut input = entry_input(day, "shared");
        input.photos = vec![PhotoAssetDraft::new("content://photos/1")];
        input.tags = vec![TagDraft::new(TagType::Person, "Sam")];
        repo.create_entry_aggregate(&input).unwrap();
    }

    assert_eq!(count(&db, "journal_entry"), 2);
    assert_eq!(count(&db, "photo_asset"), 1);
    assert_eq!(count(&db, "tag"), 1);
    assert_eq!(count(&db, "entry_photo"), 2);
    assert_eq!(count(&db, "entry_tag"), 2);
}

#[test]
fn same_value_with_different_type_is_a_different_tag() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut input = entry_input(19_000, "types");
    input.tags = vec![
        TagDraft::new(TagType::Person, "Paris"),
        TagDraft::new(TagType::Place, "Paris"),
    ];
    let entry_id = repo.create_entry_aggregate(&input).unwrap();

    assert_eq!(count(&db, "tag"), 2);
    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    assert_eq!(aggregate.tags.len(), 2);
}

#[test]
fn later_draft_metadata_merges_into_existing_photo() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut first = entry_input(19_000, "first");
    let mut draft = PhotoAssetDraft::new("content://photos/1");
    draft.width = Some(640);
    first.photos = vec![draft];
    repo.create_entry_aggregate(&first).unwrap();

    let mut second = entry_input(19_001, "second");
    let mut draft = PhotoAssetDraft::new("content://photos/1");
    draft.height = Some(480);
    draft.taken_at = Some(1_700_000_000_000);
    second.photos = vec![draft];
    let entry_id = repo.create_entry_aggregate(&second).unwrap();

    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    let photo = &aggregate.photos[0].photo;
    assert_eq!(photo.width, Some(640));
    assert_eq!(photo.height, Some(480));
    assert_eq!(photo.taken_at, Some(1_700_000_000_000));
    assert_eq!(count(&db, "photo_asset"), 1);
}

#[test]
fn update_replaces_all_links() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut input = entry_input(19_001, "Initial reflection");
    input.title = Some("Initial".to_string());
    input.photos = vec![
        PhotoAssetDraft::new("content://photos/a"),
        PhotoAssetDraft::new("content://photos/b"),
    ];
    input.tags = vec![
        TagDraft::new(TagType::Person, "Sam"),
        TagDraft::new(TagType::Keyword, "old"),
    ];
    let entry_id = repo.create_entry_aggregate(&input).unwrap();

    let updated = repo
        .update_entry_aggregate(&UpdateEntryInput {
            entry_id,
            title: Some("Updated".to_string()),
            reflection_text: "Updated reflection".to_string(),
            photos: vec![PhotoAssetDraft::new("content://photos/c")],
            tags: vec![TagDraft::new(TagType::Keyword, "new")],
        })
        .unwrap();
    assert!(updated);

    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    assert_eq!(aggregate.entry.title.as_deref(), Some("Updated"));
    assert_eq!(aggregate.entry.reflection_text, "Updated reflection");
    assert_eq!(aggregate.photo_uris(), vec!["content://photos/c"]);
    assert_eq!(aggregate.photos[0].order_index, 0);
    assert_eq!(aggregate.tags.len(), 1);
    assert_eq!(aggregate.tags[0].value, "new");
    assert_eq!(count(&db, "entry_photo"), 1);
    assert_eq!(count(&db, "entry_tag"), 1);
    // Replaced photos and tags stay as rows; only links are rewritten.
    assert_eq!(count(&db, "photo_asset"), 3);
}

#[test]
fn update_of_missing_entry_returns_false() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let updated = repo
        .update_entry_aggregate(&UpdateEntryInput {
            entry_id: Uuid::new_v4(),
            title: None,
            reflection_text: "nothing".to_string(),
            photos: vec![PhotoAssetDraft::new("content://photos/x")],
            tags: Vec::new(),
        })
        .unwrap();

    assert!(!updated);
    assert_eq!(count(&db, "photo_asset"), 0);
}

#[test]
fn get_missing_entry_returns_none() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    assert!(repo.get_entry_aggregate(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn failed_create_leaves_no_partial_aggregate() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();
    db.connection()
        .execute_batch(
            "CREATE TEMP TRIGGER reject_entry_tags BEFORE INSERT ON entry_tag
             BEGIN SELECT RAISE(ABORT, 'entry tags disabled'); END;",
        )
        .unwrap();

    let mut input = entry_input(19_000, "doomed");
    input.photos = vec![PhotoAssetDraft::new("content://photos/1")];
    input.tags = vec![TagDraft::new(TagType::Keyword, "boom")];
    assert!(repo.create_entry_aggregate(&input).is_err());

    let counts = table_counts(db.connection()).unwrap();
    assert!(counts.values().all(|count| *count == 0), "{counts:?}");
}

#[test]
fn date_range_is_inclusive_and_sorted_by_day_descending() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    repo.create_entry_aggregate(&entry_input(19_010, "A")).unwrap();
    repo.create_entry_aggregate(&entry_input(19_011, "B")).unwrap();
    repo.create_entry_aggregate(&entry_input(19_020, "C")).unwrap();

    let ranged = repo.list_entries_by_date_range(19_010, 19_011).unwrap();
    let days: Vec<i64> = ranged.iter().map(|e| e.entry_date_epoch_day).collect();
    assert_eq!(days, vec![19_011, 19_010]);

    assert!(repo.list_entries_by_date_range(19_012, 19_019).unwrap().is_empty());
    assert_eq!(repo.list_entries_by_date_range(19_020, 19_020).unwrap().len(), 1);
}

#[test]
fn list_all_entries_returns_every_entry() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    repo.create_entry_aggregate(&entry_input(19_200, "One")).unwrap();
    repo.create_entry_aggregate(&entry_input(19_201, "Two")).unwrap();

    assert_eq!(repo.list_all_entries().unwrap().len(), 2);
}

#[test]
fn search_matches_reflection_title_and_tags() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut beach = entry_input(19_002, "Sunny afternoon at the beach");
    beach.title = Some("Coast".to_string());
    beach.tags = vec![TagDraft::new(TagType::Place, "Santa Cruz")];
    let beach_id = repo.create_entry_aggregate(&beach).unwrap();
    repo.create_entry_aggregate(&entry_input(19_003, "Rainy office day"))
        .unwrap();

    let by_reflection = repo.search_entries("beach").unwrap();
    assert_eq!(by_reflection.len(), 1);
    assert_eq!(by_reflection[0].id, beach_id);

    assert_eq!(repo.search_entries("BEACH").unwrap().len(), 1);
    assert_eq!(repo.search_entries("coast").unwrap().len(), 1);
    assert_eq!(repo.search_entries("santa cruz").unwrap().len(), 1);
    assert!(repo.search_entries("nonexistent").unwrap().is_empty());
}

#[test]
fn blank_search_matches_everything() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    repo.create_entry_aggregate(&entry_input(1, "one")).unwrap();
    repo.create_entry_aggregate(&entry_input(2, "two")).unwrap();

    assert_eq!(repo.search_entries("   ").unwrap().len(), 2);
}

#[test]
fn search_reaches_tags_of_linked_photos() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    StartupImporter::new(&db, Vec::<ImportedPhoto>::new())
        .with_utc_offset(|_| 0)
        .import(&[ImportedPhoto::new("content://photos/lighthouse", "Lighthouse").taken_at(0)])
        .unwrap();

    let mut revisit = entry_input(19_001, "second visit");
    revisit.photos = vec![PhotoAssetDraft::new("content://photos/lighthouse")];
    let revisit_id = repo.create_entry_aggregate(&revisit).unwrap();
    let mut harbour = entry_input(19_002, "harbour walk");
    harbour.photos = vec![PhotoAssetDraft::new("content://photos/harbour")];
    let harbour_id = repo.create_entry_aggregate(&harbour).unwrap();

    let found = repo.search_entries("folder:lighthouse").unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|entry| entry.id == revisit_id));
    assert!(found.iter().all(|entry| entry.id != harbour_id));

    let tagged = repo
        .list_photos_by_tag(TagType::Keyword, "folder:lighthouse")
        .unwrap();
    assert_eq!(tagged.len(), 1);
    let tags = repo.tags_for_photo(tagged[0].id).unwrap();
    let values: Vec<&str> = tags.iter().map(|tag| tag.value.as_str()).collect();
    assert_eq!(values, vec!["folder:lighthouse"]);
}

#[test]
fn replaced_entry_tags_stop_matching_search() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut input = entry_input(19_000, "picnic");
    input.photos = vec![PhotoAssetDraft::new("content://photos/a")];
    input.tags = vec![TagDraft::new(TagType::Person, "Alice")];
    let entry_id = repo.create_entry_aggregate(&input).unwrap();

    repo.update_entry_aggregate(&UpdateEntryInput {
        entry_id,
        title: None,
        reflection_text: "picnic".to_string(),
        photos: input.photos.clone(),
        tags: vec![TagDraft::new(TagType::Person, "Bob")],
    })
    .unwrap();

    let mut shared = entry_input(19_001, "same photo, no tags");
    shared.photos = vec![PhotoAssetDraft::new("content://photos/a")];
    repo.create_entry_aggregate(&shared).unwrap();

    assert!(repo.search_entries("alice").unwrap().is_empty());
    let bob = repo.search_entries("bob").unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].id, entry_id);

    assert_eq!(count(&db, "photo_tag"), 0);
    assert!(repo.list_photos_by_tag(TagType::Person, "Bob").unwrap().is_empty());
    let aggregate = repo.get_entry_aggregate(entry_id).unwrap().unwrap();
    assert!(repo.tags_for_photo(aggregate.photos[0].photo.id).unwrap().is_empty());
}

#[test]
fn linked_photo_uris_for_day_only_include_that_day() {
    let db = MemoirDb::open_in_memory().unwrap();
    let repo = SqliteJournalingRepository::try_new(&db).unwrap();

    let mut today = entry_input(19_100, "Two photos");
    today.photos = vec![
        PhotoAssetDraft::new("content://photos/today-2"),
        PhotoAssetDraft::new("content://photos/today-1"),
    ];
    repo.create_entry_aggregate(&today).unwrap();
    let mut again = entry_input(19_100, "Same photo again");
    again.photos = vec![PhotoAssetDraft::new("content://photos/today-1")];
    repo.create_entry_aggregate(&again).unwrap();
    let mut other = entry_input(19_101, "Other photo");
    other.photos = vec![PhotoAssetDraft::new("content://photos/other-day")];
    repo.create_entry_aggregate(&other).unwrap();

    let uris = repo.get_linked_photo_uris_for_epoch_day(19_100).unwrap();
    assert_eq!(
        uris,
        vec![
            "content://photos/today-1".to_string(),
            "content://photos/today-2".to_string()
        ]
    );
    assert!(repo.get_linked_photo_uris_for_epoch_day(18_000).unwrap().is_empty());
}
