//! SQLite repository implementation

use std::collections::HashMap;
use std::path::Path;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};
use crate::{Result, Error};
use crate::config::{AliasPolicy, StoreOptions};
use crate::entry::{Anchor, Relation};
use crate::pattern::{self, Term};
use crate::quantity::Quantity;
use crate::relation::{self, EndpointRef, Part};
use crate::repository::{AnchorSelector, RelationSelector, Repository, Selection};
use super::query::{self, BuiltQuery, QuerySpec, Target};
use super::schema;

const SELECT_ROWS: &str = "SELECT rowid, content, q FROM a";
const COUNT_ROWS: &str = "SELECT COUNT(*) FROM a";
const DELETE_ROWS: &str = "DELETE FROM a";
const SET_QUANTITY: &str = "UPDATE a SET q = ?";
const ADD_QUANTITY: &str = "UPDATE a SET q = q + ?";

/// A row as stored, before decoding.
#[derive(Debug, Clone)]
struct StoredRow {
    rowid: i64,
    content: String,
    q: Option<Quantity>,
}

/// Endpoint part of a relation selector, translated but not yet resolved.
#[derive(Debug, Clone)]
enum EndpointPattern {
    Any,
    /// `@<digits>`: the anchor with that content, else the row id
    Alias(String),
    Term(Term),
}

#[derive(Debug, Clone)]
struct RelationPatterns {
    name: Part,
    from: EndpointPattern,
    to: EndpointPattern,
}

/// SQLite-backed graph store
pub struct SqliteRepo {
    conn: Connection,
    options: StoreOptions,
}

impl SqliteRepo {
    /// Open a store file with default options for a new store
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &StoreOptions::default())
    }

    /// Open a store file. `options` only apply if the store is created now;
    /// an existing store keeps the options it was created with.
    pub fn open_with(path: &Path, options: &StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::attach(conn, options)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(&StoreOptions::default())
    }

    pub fn open_in_memory_with(options: &StoreOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::attach(conn, options)
    }

    fn attach(conn: Connection, requested: &StoreOptions) -> Result<Self> {
        conn.execute_batch("PRAGMA case_sensitive_like = ON")?;

        let options = match Self::load_options(&conn)? {
            Some(stored) => {
                if stored != *requested {
                    debug!(?stored, "existing store options take precedence over requested ones");
                }
                stored
            }
            None => {
                requested.validate()?;
                Self::initialize_schema(&conn, requested)?;
                info!(
                    preface_length = requested.preface_length,
                    alias_policy = %requested.alias_policy,
                    "created store"
                );
                requested.clone()
            }
        };

        Ok(Self { conn, options })
    }

    fn load_options(conn: &Connection) -> Result<Option<StoreOptions>> {
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [schema::CONFIG_TABLE],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Ok(None);
        }

        let mut stmt = conn.prepare("SELECT key, value FROM config")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, String>>>()?;
        StoreOptions::from_rows(&rows).map(Some)
    }

    /// Create tables, the preface index and the config rows in one transaction
    fn initialize_schema(conn: &Connection, options: &StoreOptions) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        for stmt in schema::all_schema_statements() {
            tx.execute(stmt, [])?;
        }
        for (key, value) in options.to_rows() {
            tx.execute("INSERT INTO config (key, value) VALUES (?1, ?2)", params![key, value])?;
        }
        tx.commit()?;
        Ok(())
    }

    // ========== Statement helpers ==========

    fn select_rows(&self, query: &BuiltQuery) -> Result<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let rows = stmt.query_map(params_from_iter(query.params.iter()), row_to_stored)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_rows(&self, query: &BuiltQuery) -> Result<usize> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let count: i64 = stmt.query_row(params_from_iter(query.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn execute(&self, query: &BuiltQuery) -> Result<usize> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        Ok(stmt.execute(params_from_iter(query.params.iter()))?)
    }

    fn insert(&self, stored: &str, preface: Option<&str>, q: Option<Quantity>) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT INTO a (content, preface, q) VALUES (?1, ?2, ?3)",
            params![stored, preface, q],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::Conflict(stored.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    // ========== Anchor addressing ==========

    fn anchor_target(&self, pattern: &str, wildcards: bool) -> Result<Target> {
        if wildcards {
            if let Some(rowid) = pattern::parse_alias(pattern, &self.options.escape) {
                let found = self.find_endpoint(pattern)?;
                return Ok(Target::Rowid(found.map_or(rowid, |row| row.rowid)));
            }
        }
        Ok(Target::Term(pattern::translate(pattern, wildcards, &self.options.escape)?))
    }

    fn anchor_spec<'a>(&self, prologue: &'a str, selector: &AnchorSelector) -> Result<QuerySpec<'a>> {
        Ok(QuerySpec {
            preface_mode: true,
            quantity: selector.quantity,
            ..QuerySpec::new(prologue, self.anchor_target(&selector.pattern, selector.wildcards)?)
        })
    }

    /// Single anchor by row id or exact preface; never a relation row
    fn find_anchor(&self, target: Target) -> Result<Option<StoredRow>> {
        let spec = QuerySpec {
            preface_mode: true,
            limit: Some(1),
            ..QuerySpec::new(SELECT_ROWS, target)
        };
        let query = query::build(&spec, &self.options);
        let mut stmt = self.conn.prepare(&query.sql)?;
        Ok(stmt
            .query_row(params_from_iter(query.params.iter()), row_to_stored)
            .optional()?)
    }

    /// Anchor named by an endpoint argument. Content wins; `@<digits>` falls
    /// back to the row id only when no anchor has that content.
    fn find_endpoint(&self, endpoint: &str) -> Result<Option<StoredRow>> {
        let escape = &self.options.escape;
        if let Some(row) = self.find_anchor(Target::Term(Term::Exact(escape.encode(endpoint))))? {
            return Ok(Some(row));
        }
        match pattern::parse_alias(endpoint, escape) {
            Some(rowid) => self.find_anchor(Target::Rowid(rowid)),
            None => Ok(None),
        }
    }

    fn endpoint_ref(&self, row: &StoredRow) -> EndpointRef {
        let preface = self.options.stored_preface(&row.content);
        let alias = match self.options.alias_policy {
            AliasPolicy::Never => false,
            // Shorter content is stored whole as its own preface
            AliasPolicy::Long => preface != row.content,
            AliasPolicy::Always => true,
        };
        if alias {
            EndpointRef::Alias(row.rowid)
        } else {
            EndpointRef::Stored(preface)
        }
    }

    fn resolve_ref(&self, endpoint: &EndpointRef) -> Result<Option<StoredRow>> {
        let target = match endpoint {
            EndpointRef::Alias(rowid) => Target::Rowid(*rowid),
            EndpointRef::Stored(preface) => Target::Preface(preface.clone()),
        };
        self.find_anchor(target)
    }

    // ========== Relation addressing ==========

    fn endpoint_pattern(&self, pattern: Option<&str>, wildcards: bool) -> Result<EndpointPattern> {
        let Some(pattern) = pattern else {
            return Ok(EndpointPattern::Any);
        };
        if wildcards && pattern::parse_alias(pattern, &self.options.escape).is_some() {
            return Ok(EndpointPattern::Alias(pattern.to_string()));
        }
        Ok(EndpointPattern::Term(pattern::translate(pattern, wildcards, &self.options.escape)?))
    }

    /// Translate every part of a selector. Fails only on malformed patterns.
    fn relation_patterns(&self, selector: &RelationSelector) -> Result<RelationPatterns> {
        let name = match &selector.name {
            None => Part::Any,
            Some(name) => Part::Term(pattern::translate(name, selector.wildcards, &self.options.escape)?),
        };
        Ok(RelationPatterns {
            name,
            from: self.endpoint_pattern(selector.from.as_deref(), selector.wildcards)?,
            to: self.endpoint_pattern(selector.to.as_deref(), selector.wildcards)?,
        })
    }

    /// Turn an endpoint pattern into the text stored relations hold for it.
    /// `None` when the pattern names an anchor that does not exist.
    fn resolve_endpoint(&self, endpoint: &EndpointPattern) -> Result<Option<Part>> {
        let reference = |row: StoredRow| Part::Term(Term::Exact(self.endpoint_ref(&row).render(&self.options.escape)));
        match endpoint {
            EndpointPattern::Any => Ok(Some(Part::Any)),
            EndpointPattern::Alias(endpoint) => Ok(self.find_endpoint(endpoint)?.map(reference)),
            EndpointPattern::Term(Term::Exact(stored)) => match self.options.alias_policy {
                AliasPolicy::Never => Ok(Some(Part::Term(Term::Exact(self.options.stored_preface(stored))))),
                _ => Ok(self.find_anchor(Target::Term(Term::Exact(stored.clone())))?.map(reference)),
            },
            // LIKE patterns match stored references as they are
            EndpointPattern::Term(like) => Ok(Some(Part::Term(like.clone()))),
        }
    }

    fn relation_target(&self, patterns: &RelationPatterns) -> Result<Option<Target>> {
        let Some(from) = self.resolve_endpoint(&patterns.from)? else {
            return Ok(None);
        };
        let Some(to) = self.resolve_endpoint(&patterns.to)? else {
            return Ok(None);
        };
        Ok(Some(Target::Term(relation::compose_term(
            &patterns.name,
            &from,
            &to,
            &self.options.escape,
        ))))
    }

    /// Query over relation rows, or `None` if nothing can match
    fn relation_spec(&self, prologue: &'static str, selector: &RelationSelector) -> Result<Option<QuerySpec<'static>>> {
        let patterns = self.relation_patterns(selector)?;
        let Some(target) = self.relation_target(&patterns)? else {
            return Ok(None);
        };
        Ok(Some(QuerySpec {
            with_relations: true,
            quantity: selector.quantity,
            ..QuerySpec::new(prologue, target)
        }))
    }

    fn fetch_relations(&self, query: &BuiltQuery) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next()? {
            let stored = row_to_stored(row)?;
            if let Some(relation) = self.resolve_relation(&stored)? {
                relations.push(relation);
            }
        }
        Ok(relations)
    }

    fn resolve_relation(&self, row: &StoredRow) -> Result<Option<Relation>> {
        let escape = &self.options.escape;
        let Some(parts) = relation::decompose(&row.content, escape) else {
            debug!(rowid = row.rowid, "skipping malformed relation row");
            return Ok(None);
        };
        let (Some(from), Some(to)) = (self.resolve_ref(&parts.from)?, self.resolve_ref(&parts.to)?) else {
            debug!(
                name = %parts.name,
                from = %parts.from,
                to = %parts.to,
                "skipping relation with missing endpoint"
            );
            return Ok(None);
        };
        Ok(Some(Relation {
            name: parts.name,
            from: escape.decode(&from.content),
            to: escape.decode(&to.content),
            q: row.q,
        }))
    }
}

impl Repository for SqliteRepo {
    fn options(&self) -> &StoreOptions {
        &self.options
    }

    // ========== Anchor Operations ==========

    fn put_anchor(&mut self, content: &str, q: Option<Quantity>) -> Result<()> {
        let stored = self.options.escape.encode(content);
        let preface = self.options.preface(content);
        self.insert(&stored, Some(&preface), q).map_err(|e| match e {
            Error::Conflict(_) => Error::Conflict(format!("anchor {content:?} or its preface already exists")),
            e => e,
        })?;
        debug!(content, ?q, "put anchor");
        Ok(())
    }

    fn get_anchors(&self, selector: &AnchorSelector, limit: Option<u32>) -> Result<Selection<'_, Anchor>> {
        let spec = QuerySpec {
            ordered: true,
            limit,
            ..self.anchor_spec(SELECT_ROWS, selector)?
        };
        let query = query::build(&spec, &self.options);
        Ok(Selection::new(move || {
            let rows = self.select_rows(&query)?;
            Ok(rows
                .into_iter()
                .map(|row| Anchor {
                    content: self.options.escape.decode(&row.content),
                    q: row.q,
                })
                .collect())
        }))
    }

    fn count_anchors(&self, selector: &AnchorSelector) -> Result<usize> {
        let spec = self.anchor_spec(COUNT_ROWS, selector)?;
        self.count_rows(&query::build(&spec, &self.options))
    }

    fn delete_anchors(&mut self, selector: &AnchorSelector) -> Result<usize> {
        let spec = self.anchor_spec(DELETE_ROWS, selector)?;
        let deleted = self.execute(&query::build(&spec, &self.options))?;
        debug!(pattern = %selector.pattern, deleted, "delete anchors");
        Ok(deleted)
    }

    fn set_anchor_quantity(&mut self, selector: &AnchorSelector, q: Option<Quantity>) -> Result<usize> {
        let spec = QuerySpec {
            prologue_params: vec![q.map_or(Value::Null, Value::from)],
            ..self.anchor_spec(SET_QUANTITY, selector)?
        };
        let updated = self.execute(&query::build(&spec, &self.options))?;
        debug!(pattern = %selector.pattern, ?q, updated, "set anchor quantity");
        Ok(updated)
    }

    fn increment_anchor_quantity(&mut self, selector: &AnchorSelector, delta: Quantity) -> Result<usize> {
        let spec = QuerySpec {
            prologue_params: vec![delta.into()],
            require_quantity: true,
            ..self.anchor_spec(ADD_QUANTITY, selector)?
        };
        let updated = self.execute(&query::build(&spec, &self.options))?;
        debug!(pattern = %selector.pattern, %delta, updated, "increment anchor quantity");
        Ok(updated)
    }

    // ========== Relation Operations ==========

    fn put_relation(&mut self, name: &str, from: &str, to: &str, q: Option<Quantity>) -> Result<()> {
        if from == to {
            return Err(Error::Validation(format!("relation {name:?} links {from:?} to itself")));
        }

        let from_row = self
            .find_endpoint(from)?
            .ok_or_else(|| Error::NotFound(format!("anchor {from:?}")))?;
        let to_row = self
            .find_endpoint(to)?
            .ok_or_else(|| Error::NotFound(format!("anchor {to:?}")))?;
        if from_row.rowid == to_row.rowid {
            return Err(Error::Validation(format!(
                "relation {name:?} links {from:?} and {to:?}, which are the same anchor"
            )));
        }

        let stored = relation::compose(
            name,
            &self.endpoint_ref(&from_row),
            &self.endpoint_ref(&to_row),
            &self.options.escape,
        );
        self.insert(&stored, None, q).map_err(|e| match e {
            Error::Conflict(_) => Error::Conflict(format!("relation {name:?} from {from:?} to {to:?}")),
            e => e,
        })?;
        debug!(name, from, to, ?q, "put relation");
        Ok(())
    }

    fn get_relations(&self, selector: &RelationSelector, limit: Option<u32>) -> Result<Selection<'_, Relation>> {
        let patterns = self.relation_patterns(selector)?;
        let quantity = selector.quantity;
        Ok(Selection::new(move || {
            let Some(target) = self.relation_target(&patterns)? else {
                return Ok(Vec::new());
            };
            let spec = QuerySpec {
                with_relations: true,
                quantity,
                ordered: true,
                limit,
                ..QuerySpec::new(SELECT_ROWS, target)
            };
            self.fetch_relations(&query::build(&spec, &self.options))
        }))
    }

    fn relation_exists(&self, selector: &RelationSelector) -> Result<bool> {
        Ok(!self.get_relations(selector, None)?.fetch()?.is_empty())
    }

    fn delete_relations(&mut self, selector: &RelationSelector) -> Result<usize> {
        let Some(spec) = self.relation_spec(DELETE_ROWS, selector)? else {
            return Ok(0);
        };
        let deleted = self.execute(&query::build(&spec, &self.options))?;
        debug!(name = ?selector.name, from = ?selector.from, to = ?selector.to, deleted, "delete relations");
        Ok(deleted)
    }

    fn set_relation_quantity(&mut self, selector: &RelationSelector, q: Option<Quantity>) -> Result<usize> {
        let Some(spec) = self.relation_spec(SET_QUANTITY, selector)? else {
            return Ok(0);
        };
        let spec = QuerySpec {
            prologue_params: vec![q.map_or(Value::Null, Value::from)],
            ..spec
        };
        let updated = self.execute(&query::build(&spec, &self.options))?;
        debug!(name = ?selector.name, from = ?selector.from, to = ?selector.to, ?q, updated, "set relation quantity");
        Ok(updated)
    }

    fn increment_relation_quantity(&mut self, selector: &RelationSelector, delta: Quantity) -> Result<usize> {
        let Some(spec) = self.relation_spec(ADD_QUANTITY, selector)? else {
            return Ok(0);
        };
        let spec = QuerySpec {
            prologue_params: vec![delta.into()],
            require_quantity: true,
            ..spec
        };
        let updated = self.execute(&query::build(&spec, &self.options))?;
        debug!(name = ?selector.name, from = ?selector.from, to = ?selector.to, %delta, updated, "increment relation quantity");
        Ok(updated)
    }

    /// Get database statistics
    fn stats(&self) -> Result<DbStats> {
        let rows = self.count_rows(&query::build(
            &QuerySpec {
                with_relations: true,
                ..QuerySpec::new(COUNT_ROWS, Target::Any)
            },
            &self.options,
        ))?;
        let anchors = self.count_rows(&query::build(&QuerySpec::new(COUNT_ROWS, Target::Any), &self.options))?;
        Ok(DbStats {
            anchors,
            relations: rows - anchors,
        })
    }
}

fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        rowid: row.get(0)?,
        content: row.get(1)?,
        q: row.get(2)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStats {
    pub anchors: usize,
    pub relations: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Anchors: {}", self.anchors)?;
        writeln!(f, "  Relations: {}", self.relations)
    }
}
