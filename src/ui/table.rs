use crate::entry::{Anchor, Relation};
use crate::quantity::Quantity;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct AnchorRow {
    #[tabled(rename = "Anchor")]
    content: String,
    #[tabled(rename = "Q")]
    q: String,
}

#[derive(Tabled)]
struct RelationRow {
    #[tabled(rename = "Relation")]
    name: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Q")]
    q: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn quantity_cell(q: Option<Quantity>) -> String {
    q.map(|q| q.to_string()).unwrap_or_default()
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn anchors_table(anchors: &[Anchor]) -> String {
    let rows: Vec<AnchorRow> = anchors
        .iter()
        .map(|a| AnchorRow {
            content: a.content.clone(),
            q: quantity_cell(a.q),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn relations_table(relations: &[Relation]) -> String {
    let rows: Vec<RelationRow> = relations
        .iter()
        .map(|r| RelationRow {
            name: r.name.clone(),
            from: r.from.clone(),
            to: r.to.clone(),
            q: quantity_cell(r.q),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table() {
        let table = stats_table(&[("Anchors", "2"), ("Relations", "1")]);
        assert!(table.contains("Anchors"));
        assert!(table.contains("Metric"));
        assert!(TableBuilder::new().build().is_empty());
    }

    #[test]
    fn test_relations_table() {
        let table = relations_table(&[Relation::new("likes", "a", "z", Some(Quantity::Int(3)))]);
        assert!(table.contains("likes"));
        assert!(table.contains("From"));
        assert!(table.contains('3'));
    }

    #[test]
    fn test_anchors_table_blank_quantity() {
        let table = anchors_table(&[Anchor::new("a", None)]);
        assert!(table.contains("Anchor"));
        assert!(!table.contains("None"));
    }
}
