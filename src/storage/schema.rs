//! Database schema definitions

pub const CONTENT_COLUMN: &str = "content";
/// Encoded preface of an anchor; NULL on relation rows
pub const PREFACE_COLUMN: &str = "preface";
pub const QUANTITY_COLUMN: &str = "q";

/// Table holding the store options
pub const CONFIG_TABLE: &str = "config";

/// SQL to create the content table
pub const CREATE_CONTENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS a (
    content TEXT UNIQUE NOT NULL,
    preface TEXT,
    q NUMERIC
)
"#;

/// Unique index over anchor prefaces. Relation rows hold NULL and never collide.
pub const CREATE_PREFACE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_a_preface ON a(preface)
"#;

/// SQL to create the config table
pub const CREATE_CONFIG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS config (
    key TEXT UNIQUE NOT NULL,
    value NOT NULL
)
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_CONFIG_TABLE, CREATE_CONTENT_TABLE, CREATE_PREFACE_INDEX]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creates() {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in all_schema_statements() {
            conn.execute(stmt, []).unwrap();
        }
        let index: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = 'idx_a_preface'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(index.contains(PREFACE_COLUMN));
    }
}
