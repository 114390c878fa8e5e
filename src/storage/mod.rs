//! Storage Layer - SQLite-backed persistence
//!
//! Everything lives in two tables:
//! - a(content, q): anchors, and relations encoded as `name ⇨ from ⇨ to`
//! - config(key, value): the options the store was created with

pub mod query;
pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteRepo};
