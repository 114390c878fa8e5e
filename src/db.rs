//! Facade over a repository
//!
//! [`Db`] checks caller arguments before anything reaches storage and adds
//! bulk import and export in the interchange tuple format.

use crate::config::StoreOptions;
use crate::entry::{Anchor, Entry, Relation};
use crate::quantity::Quantity;
use crate::repository::{AnchorSelector, RelationSelector, Repository, Selection};
use crate::storage::{DbStats, SqliteRepo};
use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// A graph store
pub struct Db<R: Repository = SqliteRepo> {
    repo: R,
}

impl Db<SqliteRepo> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SqliteRepo::open(path)?))
    }

    pub fn open_with(path: &Path, options: &StoreOptions) -> Result<Self> {
        Ok(Self::new(SqliteRepo::open_with(path, options)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteRepo::open_in_memory()?))
    }
}

impl<R: Repository> Db<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn options(&self) -> &StoreOptions {
        self.repo.options()
    }

    // ========== Anchors ==========

    pub fn put_anchor(&mut self, content: &str, q: Option<Quantity>) -> Result<()> {
        require_text("anchor", content)?;
        let q = check_quantity(q)?;
        self.repo.put_anchor(content, q)
    }

    pub fn get_anchors(&self, selector: &AnchorSelector, limit: Option<u32>) -> Result<Selection<'_, Anchor>> {
        check_anchor_selector(selector)?;
        self.repo.get_anchors(selector, limit)
    }

    pub fn count_anchors(&self, selector: &AnchorSelector) -> Result<usize> {
        check_anchor_selector(selector)?;
        self.repo.count_anchors(selector)
    }

    pub fn delete_anchors(&mut self, selector: &AnchorSelector) -> Result<usize> {
        check_anchor_selector(selector)?;
        self.repo.delete_anchors(selector)
    }

    pub fn set_anchor_quantity(&mut self, selector: &AnchorSelector, q: Option<Quantity>) -> Result<usize> {
        check_anchor_selector(selector)?;
        let q = check_quantity(q)?;
        self.repo.set_anchor_quantity(selector, q)
    }

    pub fn increment_anchor_quantity(&mut self, selector: &AnchorSelector, delta: Quantity) -> Result<usize> {
        check_anchor_selector(selector)?;
        self.repo.increment_anchor_quantity(selector, delta.validate()?)
    }

    // ========== Relations ==========

    pub fn put_relation(&mut self, name: &str, from: &str, to: &str, q: Option<Quantity>) -> Result<()> {
        require_text("relation name", name)?;
        require_text("relation source", from)?;
        require_text("relation target", to)?;
        if from == to {
            return Err(Error::Validation(format!("relation {name:?} links {from:?} to itself")));
        }
        let q = check_quantity(q)?;
        self.repo.put_relation(name, from, to, q)
    }

    pub fn get_relations(&self, selector: &RelationSelector, limit: Option<u32>) -> Result<Selection<'_, Relation>> {
        check_relation_selector(selector)?;
        self.repo.get_relations(selector, limit)
    }

    pub fn relation_exists(&self, selector: &RelationSelector) -> Result<bool> {
        check_relation_selector(selector)?;
        self.repo.relation_exists(selector)
    }

    /// Delete relations. At least one endpoint must be given.
    pub fn delete_relations(&mut self, selector: &RelationSelector) -> Result<usize> {
        check_relation_selector(selector)?;
        if selector.from.is_none() && selector.to.is_none() {
            return Err(Error::Validation(
                "deleting relations requires a source or target anchor".to_string(),
            ));
        }
        self.repo.delete_relations(selector)
    }

    pub fn set_relation_quantity(&mut self, selector: &RelationSelector, q: Option<Quantity>) -> Result<usize> {
        check_relation_selector(selector)?;
        let q = check_quantity(q)?;
        self.repo.set_relation_quantity(selector, q)
    }

    pub fn increment_relation_quantity(&mut self, selector: &RelationSelector, delta: Quantity) -> Result<usize> {
        check_relation_selector(selector)?;
        self.repo.increment_relation_quantity(selector, delta.validate()?)
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.repo.stats()
    }

    // ========== Import / Export ==========

    /// Insert entries in order. Failing entries are reported, not fatal.
    pub fn import_data<I>(&mut self, entries: I) -> ImportReport
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut report = ImportReport::default();
        for (index, entry) in entries.into_iter().enumerate() {
            self.import_entry(index, entry, &mut report);
        }
        info!(imported = report.imported, failed = report.failures.len(), "import finished");
        report
    }

    /// Import a JSON array of interchange items.
    ///
    /// Fails only if `text` is not a JSON array; malformed items are
    /// reported like any other failing entry.
    pub fn import_json(&mut self, text: &str) -> Result<ImportReport> {
        let items: Vec<serde_json::Value> = serde_json::from_str(text)?;
        let mut report = ImportReport::default();
        for (index, item) in items.iter().enumerate() {
            match Entry::from_value(item) {
                Ok(entry) => self.import_entry(index, entry, &mut report),
                Err(error) => report.fail(index, item.to_string(), error),
            }
        }
        info!(imported = report.imported, failed = report.failures.len(), "import finished");
        Ok(report)
    }

    fn import_entry(&mut self, index: usize, entry: Entry, report: &mut ImportReport) {
        let outcome = match &entry {
            Entry::Anchor(a) => self.put_anchor(&a.content, a.q),
            Entry::Relation(r) => self.put_relation(&r.name, &r.from, &r.to, r.q),
        };
        match outcome {
            Ok(()) => report.imported += 1,
            Err(error) => report.fail(index, format!("{entry:?}"), error),
        }
    }

    /// Everything in the store, or the anchors matching `anchor` and every
    /// relation from or to them. Anchors come first.
    pub fn export(&self, anchor: Option<&str>) -> Result<Vec<Entry>> {
        let anchors = match anchor {
            Some(pattern) => self.get_anchors(&AnchorSelector::new(pattern), None)?.fetch()?,
            None => self.get_anchors(&AnchorSelector::all(), None)?.fetch()?,
        };

        let relations = match anchor {
            None => self.get_relations(&RelationSelector::new(), None)?.fetch()?,
            Some(pattern) => {
                let mut relations = self.get_relations(&RelationSelector::new().from(pattern), None)?.fetch()?;
                for relation in self.get_relations(&RelationSelector::new().to(pattern), None)?.fetch()? {
                    if !relations.contains(&relation) {
                        relations.push(relation);
                    }
                }
                relations
            }
        };

        Ok(anchors
            .into_iter()
            .map(Entry::Anchor)
            .chain(relations.into_iter().map(Entry::Relation))
            .collect())
    }

    pub fn export_json(&self, anchor: Option<&str>) -> Result<String> {
        Ok(serde_json::to_string(&self.export(anchor)?)?)
    }
}

fn require_text(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn check_quantity(q: Option<Quantity>) -> Result<Option<Quantity>> {
    q.map(Quantity::validate).transpose()
}

fn check_anchor_selector(selector: &AnchorSelector) -> Result<()> {
    require_text("anchor pattern", &selector.pattern)
}

fn check_relation_selector(selector: &RelationSelector) -> Result<()> {
    for (what, part) in [
        ("relation name pattern", &selector.name),
        ("relation source pattern", &selector.from),
        ("relation target pattern", &selector.to),
    ] {
        if let Some(part) = part {
            require_text(what, part)?;
        }
    }
    Ok(())
}

/// One entry that could not be imported.
#[derive(Debug)]
pub struct ImportFailure {
    /// Position in the input
    pub index: usize,
    pub item: String,
    pub error: Error,
}

/// Outcome of a bulk import
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, index: usize, item: String, error: Error) {
        warn!(index, %item, %error, "skipping import item");
        self.failures.push(ImportFailure { index, item, error });
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Imported: {}", self.imported)?;
        write!(f, "Failed: {}", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  #{} {}: {}", failure.index, failure.item, failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::QuantityFilter;

    fn sample_db() -> Db {
        let mut db = Db::open_in_memory().unwrap();
        db.put_anchor("a", Some(Quantity::Int(1))).unwrap();
        db.put_anchor("z", Some(Quantity::Int(2))).unwrap();
        db.put_anchor("m", None).unwrap();
        db.put_relation("R", "a", "z", None).unwrap();
        db.put_relation("S", "m", "a", Some(Quantity::Int(4))).unwrap();
        db
    }

    #[test]
    fn test_rejects_empty_arguments() {
        let mut db = Db::open_in_memory().unwrap();
        assert!(matches!(db.put_anchor("", None), Err(Error::Validation(_))));
        assert!(matches!(db.put_relation("", "a", "b", None), Err(Error::Validation(_))));
        assert!(matches!(db.put_relation("R", "", "b", None), Err(Error::Validation(_))));
        assert!(matches!(db.count_anchors(&AnchorSelector::new("")), Err(Error::Validation(_))));
        assert!(matches!(
            db.get_relations(&RelationSelector::new().to(""), None),
            Err(Error::Validation(_))
        ));
        assert_eq!(db.stats().unwrap(), DbStats { anchors: 0, relations: 0 });
    }

    #[test]
    fn test_rejects_non_finite_quantities() {
        let mut db = Db::open_in_memory().unwrap();
        assert!(matches!(db.put_anchor("a", Some(Quantity::Float(f64::NAN))), Err(Error::Validation(_))));
        db.put_anchor("a", None).unwrap();
        assert!(matches!(
            db.increment_anchor_quantity(&AnchorSelector::new("a"), Quantity::Float(f64::INFINITY)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_self_link_rejected_before_lookup() {
        let mut db = Db::open_in_memory().unwrap();
        assert!(matches!(db.put_relation("R", "x", "x", None), Err(Error::Validation(_))));
    }

    #[test]
    fn test_delete_relations_requires_endpoint() {
        let mut db = sample_db();
        let result = db.delete_relations(&RelationSelector::new().name("R"));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(db.delete_relations(&RelationSelector::new().name("R").from("a")).unwrap(), 1);
        assert_eq!(db.stats().unwrap().relations, 1);
    }

    #[test]
    fn test_quantity_passthrough() {
        let mut db = sample_db();
        let selector = AnchorSelector::all().with_quantity(QuantityFilter::exactly(Quantity::Int(2)).unwrap());
        let found = db.get_anchors(&selector, None).unwrap().fetch().unwrap();
        assert_eq!(found, vec![Anchor::new("z", Some(Quantity::Int(2)))]);

        assert_eq!(db.increment_relation_quantity(&RelationSelector::new().name("S"), Quantity::Int(1)).unwrap(), 1);
        assert_eq!(db.set_relation_quantity(&RelationSelector::new().name("R"), Some(Quantity::Int(9))).unwrap(), 1);
        let relations = db.get_relations(&RelationSelector::new(), None).unwrap().fetch().unwrap();
        assert_eq!(relations[0].q, Some(Quantity::Int(9)));
        assert_eq!(relations[1].q, Some(Quantity::Int(5)));
    }

    #[test]
    fn test_export_everything() {
        let db = sample_db();
        let entries = db.export(None).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::Anchor(Anchor::new("a", Some(Quantity::Int(1)))),
                Entry::Anchor(Anchor::new("z", Some(Quantity::Int(2)))),
                Entry::Anchor(Anchor::new("m", None)),
                Entry::Relation(Relation::new("R", "a", "z", None)),
                Entry::Relation(Relation::new("S", "m", "a", Some(Quantity::Int(4)))),
            ]
        );
        assert_eq!(
            db.export_json(None).unwrap(),
            r#"[["a",1],["z",2],["m",null],["R","a","z",null],["S","m","a",4]]"#
        );
    }

    #[test]
    fn test_export_single_anchor() {
        let db = sample_db();
        let entries = db.export(Some("a")).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::Anchor(Anchor::new("a", Some(Quantity::Int(1)))),
                Entry::Relation(Relation::new("R", "a", "z", None)),
                Entry::Relation(Relation::new("S", "m", "a", Some(Quantity::Int(4)))),
            ]
        );
    }

    #[test]
    fn test_export_import_roundtrip() {
        let source = sample_db();
        let text = source.export_json(None).unwrap();

        let mut target = Db::open_in_memory().unwrap();
        let report = target.import_json(&text).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.imported, 5);
        assert_eq!(target.export(None).unwrap(), source.export(None).unwrap());
    }

    #[test]
    fn test_roundtrip_with_alias_shaped_anchor() {
        let mut source = Db::open_in_memory().unwrap();
        for content in ["a", "@1", "z"] {
            source.put_anchor(content, None).unwrap();
        }
        source.put_relation("R", "@1", "z", Some(Quantity::Int(4))).unwrap();
        let expected = Relation::new("R", "@1", "z", Some(Quantity::Int(4)));
        assert!(source.export(None).unwrap().contains(&Entry::Relation(expected.clone())));

        let mut target = Db::open_in_memory().unwrap();
        let report = target.import_json(&source.export_json(None).unwrap()).unwrap();
        assert!(report.is_clean());
        assert_eq!(target.export(None).unwrap(), source.export(None).unwrap());
        assert_eq!(target.export(Some("@1")).unwrap()[1], Entry::Relation(expected));
    }

    #[test]
    fn test_import_collects_failures() {
        let mut db = Db::open_in_memory().unwrap();
        let report = db
            .import_json(r#"[["a"], ["a", 2], ["b", "x"], ["R", "a", "nowhere", null], [1, 2, 3], ["b", 1]]"#)
            .unwrap();

        assert_eq!(report.imported, 2);
        let indexes: Vec<_> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
        assert!(matches!(report.failures[0].error, Error::Conflict(_)));
        assert!(matches!(report.failures[1].error, Error::Validation(_)));
        assert!(matches!(report.failures[2].error, Error::NotFound(_)));
        assert!(report.to_string().contains("Failed: 4"));
    }

    #[test]
    fn test_import_data_entries() {
        let mut db = Db::open_in_memory().unwrap();
        let report = db.import_data(vec![
            Entry::from(Anchor::new("a", None)),
            Entry::from(Anchor::new("b", None)),
            Entry::from(Relation::new("R", "a", "b", Some(Quantity::Float(0.5)))),
            Entry::from(Relation::new("R", "a", "a", None)),
        ]);
        assert_eq!(report.imported, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(db.relation_exists(&RelationSelector::new().from("a").to("b")).unwrap());
    }

    #[test]
    fn test_import_json_requires_array() {
        let mut db = Db::open_in_memory().unwrap();
        assert!(matches!(db.import_json("{}"), Err(Error::Json(_))));
    }
}
