//! Anchors, relations and the interchange tuple format
//!
//! On the wire an anchor is `[content]` or `[content, q]` and a relation is
//! `[name, from, to, q]`.

use crate::quantity::Quantity;
use crate::{Error, Result};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A node: unique content with an optional quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub content: String,
    pub q: Option<Quantity>,
}

impl Anchor {
    pub fn new(content: impl Into<String>, q: Option<Quantity>) -> Self {
        Self { content: content.into(), q }
    }
}

/// A named, directed edge between two anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub from: String,
    pub to: String,
    pub q: Option<Quantity>,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        q: Option<Quantity>,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            q,
        }
    }
}

/// Either kind of stored entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Anchor(Anchor),
    Relation(Relation),
}

impl Entry {
    /// Parse one interchange item.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::Validation(format!("interchange item {value} is not an array")))?;

        match items.as_slice() {
            [content] => Ok(Entry::Anchor(Anchor::new(text(content)?, None))),
            [content, q] => Ok(Entry::Anchor(Anchor::new(text(content)?, quantity(q)?))),
            [name, from, to, q] => Ok(Entry::Relation(Relation::new(
                text(name)?,
                text(from)?,
                text(to)?,
                quantity(q)?,
            ))),
            _ => Err(Error::Validation(format!(
                "interchange item {value} has {} fields, expected 1, 2 or 4",
                items.len()
            ))),
        }
    }
}

fn text(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Validation(format!("expected a string, got {value}")))
}

fn quantity(value: &Value) -> Result<Option<Quantity>> {
    if value.is_null() {
        return Ok(None);
    }
    if let Some(v) = value.as_i64() {
        return Ok(Some(Quantity::Int(v)));
    }
    match value.as_f64() {
        Some(v) => Ok(Some(Quantity::Float(v))),
        None => Err(Error::Validation(format!("quantity {value} is not a number"))),
    }
}

impl From<Anchor> for Entry {
    fn from(anchor: Anchor) -> Self {
        Entry::Anchor(anchor)
    }
}

impl From<Relation> for Entry {
    fn from(relation: Relation) -> Self {
        Entry::Relation(relation)
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Entry::Anchor(a) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(&a.content)?;
                tuple.serialize_element(&a.q)?;
                tuple.end()
            }
            Entry::Relation(r) => {
                let mut tuple = serializer.serialize_tuple(4)?;
                tuple.serialize_element(&r.name)?;
                tuple.serialize_element(&r.from)?;
                tuple.serialize_element(&r.to)?;
                tuple.serialize_element(&r.q)?;
                tuple.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Entry::from_value(&value).map_err(serde::de::Error::custom)
    }
}
