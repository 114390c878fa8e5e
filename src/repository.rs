//! Repository contract
//!
//! A repository owns the backing connection and every mutation path. Reads
//! return a [`Selection`] that runs its query only when fetched; writes
//! return the number of rows they touched.

use crate::config::StoreOptions;
use crate::entry::{Anchor, Relation};
use crate::quantity::{Quantity, QuantityFilter};
use crate::storage::DbStats;
use crate::Result;

/// Selects anchors by content pattern and quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSelector {
    pub pattern: String,
    /// Interpret `*`, `?`, `&#n;` and `@<rowid>` in the pattern
    pub wildcards: bool,
    pub quantity: QuantityFilter,
}

impl AnchorSelector {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            wildcards: true,
            quantity: QuantityFilter::any(),
        }
    }

    /// Every anchor.
    pub fn all() -> Self {
        Self::new("*")
    }

    /// Exactly the anchor with this content, no wildcards.
    pub fn literal(content: impl Into<String>) -> Self {
        Self {
            wildcards: false,
            ..Self::new(content)
        }
    }

    pub fn with_quantity(mut self, quantity: QuantityFilter) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Selects relations by name and endpoint patterns; an absent part matches
/// anything.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelector {
    pub name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub wildcards: bool,
    pub quantity: QuantityFilter,
}

impl Default for RelationSelector {
    fn default() -> Self {
        Self {
            name: None,
            from: None,
            to: None,
            wildcards: true,
            quantity: QuantityFilter::any(),
        }
    }
}

impl RelationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn literal(mut self) -> Self {
        self.wildcards = false;
        self
    }

    pub fn with_quantity(mut self, quantity: QuantityFilter) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Lazy, restartable query result.
///
/// Nothing runs until [`Selection::fetch`] or [`Selection::iter`]; each call
/// runs the query again against the current state of the store.
pub struct Selection<'r, T> {
    run: Box<dyn Fn() -> Result<Vec<T>> + 'r>,
}

impl<'r, T> Selection<'r, T> {
    pub fn new(run: impl Fn() -> Result<Vec<T>> + 'r) -> Self {
        Self { run: Box::new(run) }
    }

    pub fn fetch(&self) -> Result<Vec<T>> {
        (self.run)()
    }

    pub fn iter(&self) -> Result<std::vec::IntoIter<T>> {
        Ok(self.fetch()?.into_iter())
    }
}

/// Graph store operations over a single backing table.
pub trait Repository {
    fn options(&self) -> &StoreOptions;

    // ========== Anchors ==========

    /// Insert an anchor. Fails with `Conflict` if its preface already exists.
    fn put_anchor(&mut self, content: &str, q: Option<Quantity>) -> Result<()>;

    fn get_anchors(&self, selector: &AnchorSelector, limit: Option<u32>) -> Result<Selection<'_, Anchor>>;

    fn count_anchors(&self, selector: &AnchorSelector) -> Result<usize>;

    fn delete_anchors(&mut self, selector: &AnchorSelector) -> Result<usize>;

    fn set_anchor_quantity(&mut self, selector: &AnchorSelector, q: Option<Quantity>) -> Result<usize>;

    /// Add `delta` to matching quantities. Anchors without a quantity are
    /// left alone.
    fn increment_anchor_quantity(&mut self, selector: &AnchorSelector, delta: Quantity) -> Result<usize>;

    // ========== Relations ==========

    /// Insert a relation between two existing, distinct anchors.
    fn put_relation(&mut self, name: &str, from: &str, to: &str, q: Option<Quantity>) -> Result<()>;

    /// Matching relations with both endpoints resolved. Relations whose
    /// endpoint no longer exists are skipped.
    fn get_relations(&self, selector: &RelationSelector, limit: Option<u32>) -> Result<Selection<'_, Relation>>;

    fn relation_exists(&self, selector: &RelationSelector) -> Result<bool>;

    fn delete_relations(&mut self, selector: &RelationSelector) -> Result<usize>;

    fn set_relation_quantity(&mut self, selector: &RelationSelector, q: Option<Quantity>) -> Result<usize>;

    fn increment_relation_quantity(&mut self, selector: &RelationSelector, delta: Quantity) -> Result<usize>;

    fn stats(&self) -> Result<DbStats>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_selection_is_lazy_and_restartable() {
        let runs = Cell::new(0);
        let selection = Selection::new(|| {
            runs.set(runs.get() + 1);
            Ok(vec![runs.get()])
        });
        assert_eq!(runs.get(), 0);
        assert_eq!(selection.fetch().unwrap(), vec![1]);
        assert_eq!(selection.iter().unwrap().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_selector_builders() {
        let selector = RelationSelector::new().name("R").from("a*").literal();
        assert_eq!(selector.name.as_deref(), Some("R"));
        assert_eq!(selector.from.as_deref(), Some("a*"));
        assert!(selector.to.is_none());
        assert!(!selector.wildcards);

        assert!(AnchorSelector::all().wildcards);
        assert!(!AnchorSelector::literal("x").wildcards);
    }
}
