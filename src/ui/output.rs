use crate::entry::{Anchor, Relation};
use crate::quantity::Quantity;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::TAG, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().label.clone()),
        label.style(theme().muted.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

fn quantity(q: Option<Quantity>) -> String {
    match q {
        Some(q) => format!(" {}", q.to_string().style(theme().quantity.clone())),
        None => String::new(),
    }
}

/// `⚓ content 3`
pub fn anchor_line(anchor: &Anchor) {
    println!(
        "{} {}{}",
        Icons::ANCHOR,
        anchor.content.style(theme().anchor.clone()),
        quantity(anchor.q)
    );
}

/// `🔗 from -[name]-> to 3`
pub fn relation_line(relation: &Relation) {
    println!(
        "{} {} {} {}{}",
        Icons::LINK,
        relation.from.style(theme().anchor.clone()),
        format!("-[{}]->", relation.name).style(theme().relation.clone()),
        relation.to.style(theme().anchor.clone()),
        quantity(relation.q)
    );
}
