//! Knowledge base for retrieval-augmented chat.
//!
//! This module provides:
//! - `DocumentStore`: persistence trait, backed by `SqliteDocumentStore`
//! - `DocumentLibrary`: add/list/retrieve operations with embedding
//! - `context_builder`: formatting of ranked documents for the prompt

pub mod context_builder;
mod library;
mod sqlite;
mod store;

pub use library::DocumentLibrary;
pub use sqlite::SqliteDocumentStore;
pub use store::{DocumentPreview, DocumentStore, NewDocument, ScoredDocument, StoredDocument};
