//! Persisted records and aggregate shapes for the journaling core.
//!
//! # Responsibility
//! - Define the plain rows stored in SQLite (entries, photos, tags, albums,
//!   album members and the link tables between them).
//! - Define the draft inputs accepted by repositories and the aggregates
//!   they return.
//!
//! # Invariants
//! - Every root record is identified by a stable UUID.
//! - Timestamps are epoch milliseconds; entry dates are zone-naive epoch days.

pub mod album;
pub mod journal;
pub mod links;
