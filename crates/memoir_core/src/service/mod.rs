//! Use-case services built on the repositories.
//!
//! # Responsibility
//! - Orchestrate multi-aggregate workflows (startup import).
//! - Provide runtime diagnostics over a scratch database.

pub mod startup_import;
