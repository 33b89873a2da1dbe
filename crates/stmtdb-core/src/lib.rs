//! Core types and traits for stmtdb storage backends.
//!
//! This crate provides the `StorageBackend` trait, the records it reads and
//! writes, and the `MarkingRule` applied to transactions during import, so
//! storage implementations can live in separate crates.

pub mod marking;
pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use marking::MarkingRule;
pub use models::read::{Account, AccountInfo, AccountStatement, StatementSummary, Transaction};
pub use models::write::{ImportBatch, NewAccount, NewStatement, NewTransaction};
pub use models::{ImportOutcome, Page};
pub use storage::{StorageBackend, StorageError};
