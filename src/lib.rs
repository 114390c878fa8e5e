//! # TAGS - Totally Approachable Graph System
//!
//! An embeddable graph store that keeps nodes and edges in a single SQLite
//! table using a text encoding instead of a multi-table schema.
//!
//! TAGS provides:
//! - Anchors: unique text content with an optional numeric quantity
//! - Relations: named, directed, optionally quantified edges between anchors
//! - A glob-style query language (`*`, `?`, `&#<codepoint>;`) for both
//! - Preface and alias addressing to keep long content and references bounded
//! - Bulk import and export in a tuple interchange format

pub mod escape;
pub mod pattern;
pub mod relation;
pub mod quantity;
pub mod entry;
pub mod config;
pub mod repository;
pub mod storage;
pub mod db;
pub mod ui;

// Re-exports for convenient access
pub use config::{AliasPolicy, StoreOptions};
pub use db::{Db, ImportFailure, ImportReport};
pub use entry::{Anchor, Entry, Relation};
pub use escape::EscapeConfig;
pub use quantity::{Quantity, QuantityBounds, QuantityFilter};
pub use repository::{AnchorSelector, RelationSelector, Repository, Selection};
pub use storage::{DbStats, SqliteRepo};

/// Result type alias for TAGS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TAGS operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
