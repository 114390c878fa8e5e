//! Relation codec
//!
//! A relation is stored as `name ⇨ from ⇨ to`: the encoded name followed by
//! two endpoint references. A reference is either the preface of the
//! endpoint's stored content or an alias (`@<rowid>`).

use crate::escape::EscapeConfig;
use crate::pattern::{self, LIKE_ANY_RUN, Term};
use std::fmt;

/// Reference to an anchor inside a stored relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointRef {
    /// Row id of the anchor
    Alias(i64),
    /// Preface of the anchor's stored content, never decoded
    Stored(String),
}

impl EndpointRef {
    /// Storage form of this reference.
    pub fn render(&self, config: &EscapeConfig) -> String {
        match self {
            EndpointRef::Alias(rowid) => format!("{}{}", config.alias_marker, rowid),
            EndpointRef::Stored(preface) => preface.clone(),
        }
    }

    /// Parse a stored reference.
    ///
    /// Encoded content never starts with a raw alias marker, so a raw marker
    /// followed by digits is always an alias.
    pub fn parse(part: &str, config: &EscapeConfig) -> Self {
        match pattern::parse_alias(part, config) {
            Some(rowid) => EndpointRef::Alias(rowid),
            None => EndpointRef::Stored(part.to_string()),
        }
    }
}

impl fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRef::Alias(rowid) => write!(f, "@{}", rowid),
            EndpointRef::Stored(preface) => write!(f, "{}", preface),
        }
    }
}

/// A decomposed relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationParts {
    /// Decoded relation name
    pub name: String,
    pub from: EndpointRef,
    pub to: EndpointRef,
}

/// Compose the stored content of a relation.
pub fn compose(name: &str, from: &EndpointRef, to: &EndpointRef, config: &EscapeConfig) -> String {
    let d = config.delimiter;
    format!("{}{d}{}{d}{}", config.encode(name), from.render(config), to.render(config))
}

/// Split stored relation content into its parts.
///
/// Returns `None` unless the content has exactly three delimiter-separated
/// parts.
pub fn decompose(stored: &str, config: &EscapeConfig) -> Option<RelationParts> {
    let mut parts = stored.split(config.delimiter);
    let name = parts.next()?;
    let from = parts.next()?;
    let to = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(RelationParts {
        name: config.decode(name),
        from: EndpointRef::parse(from, config),
        to: EndpointRef::parse(to, config),
    })
}

/// One part of a relation selector after translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Any,
    Term(Term),
}

/// Combine three translated parts into a single term over relation rows.
///
/// When every part is exact the result is exact. Otherwise the fragments are
/// joined into one `LIKE` pattern; literal fragments carry no delimiter, so
/// the two delimiters in the pattern always align with the stored ones.
pub fn compose_term(name: &Part, from: &Part, to: &Part, config: &EscapeConfig) -> Term {
    let d = config.delimiter;
    match (name, from, to) {
        (Part::Term(Term::Exact(n)), Part::Term(Term::Exact(f)), Part::Term(Term::Exact(t))) => {
            Term::Exact(format!("{n}{d}{f}{d}{t}"))
        }
        _ => {
            let fragment = |part: &Part| match part {
                Part::Any => LIKE_ANY_RUN.to_string(),
                Part::Term(term) => term.to_like(config),
            };
            Term::Like(format!("{}{d}{}{d}{}", fragment(name), fragment(from), fragment(to)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_decompose() {
        let config = EscapeConfig::default();
        let from = EndpointRef::Stored("a".into());
        let to = EndpointRef::Alias(7);
        let stored = compose("likes", &from, &to, &config);
        assert_eq!(stored, "likes\u{21e8}a\u{21e8}@7");

        let parts = decompose(&stored, &config).unwrap();
        assert_eq!(parts.name, "likes");
        assert_eq!(parts.from, from);
        assert_eq!(parts.to, to);
    }

    #[test]
    fn test_name_with_reserved_characters() {
        let config = EscapeConfig::default();
        let stored = compose(
            "@x\u{21e8}y",
            &EndpointRef::Stored("a".into()),
            &EndpointRef::Stored("b".into()),
            &config,
        );
        assert_eq!(stored, "&#64;x&#8680;y\u{21e8}a\u{21e8}b");
        assert_eq!(decompose(&stored, &config).unwrap().name, "@x\u{21e8}y");
    }

    #[test]
    fn test_escaped_alias_marker_is_stored_ref() {
        let config = EscapeConfig::default();
        assert_eq!(
            EndpointRef::parse("&#64;12", &config),
            EndpointRef::Stored("&#64;12".into())
        );
        assert_eq!(EndpointRef::parse("@12", &config), EndpointRef::Alias(12));
    }

    #[test]
    fn test_decompose_requires_three_parts() {
        let config = EscapeConfig::default();
        assert!(decompose("plain", &config).is_none());
        assert!(decompose("a\u{21e8}b", &config).is_none());
        assert!(decompose("a\u{21e8}b\u{21e8}c\u{21e8}d", &config).is_none());
    }

    #[test]
    fn test_compose_term_exact() {
        let config = EscapeConfig::default();
        let term = compose_term(
            &Part::Term(Term::Exact("r".into())),
            &Part::Term(Term::Exact("a".into())),
            &Part::Term(Term::Exact("b_c".into())),
            &config,
        );
        assert_eq!(term, Term::Exact("r\u{21e8}a\u{21e8}b_c".into()));
    }

    #[test]
    fn test_compose_term_like() {
        let config = EscapeConfig::default();
        let term = compose_term(
            &Part::Any,
            &Part::Term(Term::Exact("a_b".into())),
            &Part::Term(Term::Like("z%".into())),
            &config,
        );
        assert_eq!(term, Term::Like("%\u{21e8}a\\_b\u{21e8}z%".into()));
    }
}
