//! Query builder
//!
//! Assembles a statement from a fixed prologue (`SELECT ...`, `DELETE ...`,
//! `UPDATE ... SET ...`) and a structured filter. Every value is bound.

use super::schema::{CONTENT_COLUMN, PREFACE_COLUMN, QUANTITY_COLUMN};
use crate::config::StoreOptions;
use crate::pattern::Term;
use crate::quantity::QuantityFilter;
use rusqlite::types::Value;

/// What the content clause compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Any,
    Rowid(i64),
    /// Encoded preface, compared against the preface column
    Preface(String),
    Term(Term),
}

/// A structured query request.
#[derive(Debug, Clone)]
pub struct QuerySpec<'a> {
    pub prologue: &'a str,
    pub prologue_params: Vec<Value>,
    pub target: Target,
    /// Compare exact terms by their preface instead of the full content
    pub preface_mode: bool,
    /// Include relation rows; when false only anchors match
    pub with_relations: bool,
    pub quantity: QuantityFilter,
    /// Skip rows without a quantity
    pub require_quantity: bool,
    pub ordered: bool,
    pub limit: Option<u32>,
}

impl<'a> QuerySpec<'a> {
    pub fn new(prologue: &'a str, target: Target) -> Self {
        Self {
            prologue,
            prologue_params: Vec::new(),
            target,
            preface_mode: false,
            with_relations: false,
            quantity: QuantityFilter::any(),
            require_quantity: false,
            ordered: false,
            limit: None,
        }
    }
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn build(spec: &QuerySpec<'_>, options: &StoreOptions) -> BuiltQuery {
    let mut conditions: Vec<String> = Vec::new();
    let mut params = spec.prologue_params.clone();

    match &spec.target {
        Target::Any => {}
        Target::Rowid(rowid) => {
            conditions.push("rowid = ?".to_string());
            params.push(Value::Integer(*rowid));
        }
        Target::Preface(preface) => {
            conditions.push(format!("{PREFACE_COLUMN} = ?"));
            params.push(Value::Text(preface.clone()));
        }
        Target::Term(Term::Exact(stored)) if spec.preface_mode => {
            conditions.push(format!("{PREFACE_COLUMN} = ?"));
            params.push(Value::Text(options.stored_preface(stored)));
        }
        Target::Term(Term::Exact(stored)) => {
            conditions.push(format!("{CONTENT_COLUMN} = ?"));
            params.push(Value::Text(stored.clone()));
        }
        Target::Term(Term::Like(pattern)) => {
            conditions.push(format!(
                "{CONTENT_COLUMN} LIKE ? ESCAPE '{}'",
                options.escape.like_escape
            ));
            params.push(Value::Text(pattern.clone()));
        }
    }

    if !spec.with_relations {
        conditions.push(format!("{PREFACE_COLUMN} IS NOT NULL"));
    }

    if spec.require_quantity {
        conditions.push(format!("{QUANTITY_COLUMN} IS NOT NULL"));
    }

    if let Some((condition, values)) = spec.quantity.condition(QUANTITY_COLUMN) {
        conditions.push(condition);
        params.extend(values);
    }

    let mut sql = spec.prologue.to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if spec.ordered {
        sql.push_str(" ORDER BY rowid");
    }
    if let Some(limit) = spec.limit {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(limit.into()));
    }

    BuiltQuery { sql, params }
}
