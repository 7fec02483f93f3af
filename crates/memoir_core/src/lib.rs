//! Core persistence for Memoir, a local photo-journaling app.
//! Owns the SQLite schema and the journal entry and album aggregates.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ImportConfig, MemoirConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, MemoirDb, Subscription};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::album::{
    AddEntryToAlbumInput, AddPhotoToAlbumInput, Album, AlbumAggregate, AlbumId, AlbumMember,
    AlbumMemberStatus, AlbumRole, AlbumVisibility, CreateAlbumInput, LinkedAlbumEntry,
    LinkedAlbumPhoto, UpsertAlbumMemberInput,
};
pub use model::journal::{
    CreateEntryInput, EntryId, JournalEntry, JournalEntryAggregate, LinkedPhotoAsset, PhotoAsset,
    PhotoAssetDraft, PhotoId, Tag, TagDraft, TagId, TagType, UpdateEntryInput,
};
pub use repo::album_repo::{AlbumRepository, AlbumSink, MemberSink, SqliteAlbumRepository};
pub use repo::journal_repo::{
    EntrySink, JournalingRepository, PhotoSink, SqliteJournalingRepository,
};
pub use repo::{table_counts, RepoError, RepoResult};
pub use service::self_test::{run_self_test, SelfTestResult, SelfTestSuite};
pub use service::startup_import::{
    ImportError, ImportReport, ImportedPhoto, PhotoSource, StartupImporter,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
