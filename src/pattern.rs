//! Wildcard translator
//!
//! Query terms use two wildcards (`*` any run, `?` any single character) and
//! one escape convention: `&#<codepoint>;` stands for the literal character.
//! A term is translated into either an exact storage form or a `LIKE`
//! pattern that matches stored (encoded) content.

use crate::escape::{self, EscapeConfig, Reference, ESCAPE_INTRODUCER};
use crate::{Error, Result};

/// Backend wildcard matching any run of characters
pub const LIKE_ANY_RUN: char = '%';
/// Backend wildcard matching exactly one character
pub const LIKE_ANY_ONE: char = '_';

/// A translated query term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Storage form to compare with `=`
    Exact(String),
    /// Pattern to compare with `LIKE ... ESCAPE`
    Like(String),
}

impl Term {
    /// This term as a `LIKE` pattern fragment.
    pub fn to_like(&self, config: &EscapeConfig) -> String {
        match self {
            Term::Exact(stored) => escape_like(stored, config),
            Term::Like(pattern) => pattern.clone(),
        }
    }
}

/// Translate a query term.
///
/// With `wildcards` off, the term is raw content and always yields
/// [`Term::Exact`]. Otherwise wildcards become backend wildcards and escape
/// references become literal characters. Everything else is literal content,
/// a leading prefix marker included, so a wildcard-free term addresses the
/// same anchor it would name on write.
pub fn translate(term: &str, wildcards: bool, config: &EscapeConfig) -> Result<Term> {
    if !wildcards {
        return Ok(Term::Exact(config.encode(term)));
    }

    let mut literal = String::with_capacity(term.len());
    let mut like = String::with_capacity(term.len());
    let mut has_wildcards = false;
    let mut position = 0usize;
    let mut rest = term;

    while let Some(c) = rest.chars().next() {
        if c == ESCAPE_INTRODUCER {
            match escape::scan_reference(rest) {
                Reference::Valid(ch, len) => {
                    literal.push(ch);
                    push_like(&mut like, ch, position == 0, config);
                    position += 1;
                    rest = &rest[len..];
                    continue;
                }
                Reference::Invalid(len) => {
                    return Err(Error::Validation(format!(
                        "malformed pattern {term:?}: invalid character reference {:?}",
                        &rest[..len]
                    )));
                }
                Reference::None => {}
            }
        }

        if c == config.any_run {
            like.push(LIKE_ANY_RUN);
            has_wildcards = true;
        } else if c == config.any_one {
            like.push(LIKE_ANY_ONE);
            has_wildcards = true;
        } else {
            literal.push(c);
            push_like(&mut like, c, position == 0, config);
        }
        position += 1;
        rest = &rest[c.len_utf8()..];
    }

    if has_wildcards {
        Ok(Term::Like(like))
    } else {
        Ok(Term::Exact(config.encode(&literal)))
    }
}

/// Append the storage form of a literal character, LIKE-escaped.
fn push_like(like: &mut String, c: char, first: bool, config: &EscapeConfig) {
    let mut stored = String::new();
    escape::push_char(&mut stored, c, config.must_escape(c, first));
    like.push_str(&escape_like(&stored, config));
}

/// Escape backend wildcards and the escape character in literal text.
pub fn escape_like(text: &str, config: &EscapeConfig) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == LIKE_ANY_RUN || c == LIKE_ANY_ONE || c == config.like_escape {
            out.push(config.like_escape);
        }
        out.push(c);
    }
    out
}

/// Recognize an alias address (`@<digits>`) and return its row id.
pub fn parse_alias(term: &str, config: &EscapeConfig) -> Option<i64> {
    let digits = term.strip_prefix(config.alias_marker)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::strategy;
    use proptest::prelude::*;

    fn like(term: &str) -> Term {
        translate(term, true, &EscapeConfig::default()).unwrap()
    }

    #[test]
    fn test_wildcards_translate() {
        assert_eq!(like("*"), Term::Like("%".into()));
        assert_eq!(like("a*"), Term::Like("a%".into()));
        assert_eq!(like("?b?"), Term::Like("_b_".into()));
    }

    #[test]
    fn test_no_wildcards_is_exact() {
        assert_eq!(like("abc"), Term::Exact("abc".into()));
        assert_eq!(like("a&b"), Term::Exact("a&#38;b".into()));
    }

    #[test]
    fn test_backend_wildcards_are_literal() {
        assert_eq!(like("100%*"), Term::Like("100\\%%".into()));
        assert_eq!(like("snake_case?"), Term::Like("snake\\_case_".into()));
        assert_eq!(like("back\\slash*"), Term::Like("back\\\\slash%".into()));
    }

    #[test]
    fn test_escaped_wildcard_is_literal() {
        assert_eq!(like("&#42;*"), Term::Like("*%".into()));
        assert_eq!(like("&#42;"), Term::Exact("*".into()));
        assert_eq!(like("&#63;x"), Term::Exact("?x".into()));
    }

    #[test]
    fn test_escaped_delimiter_matches_storage_form() {
        assert_eq!(like("a&#8680;b"), Term::Exact("a&#8680;b".into()));
        assert_eq!(like("\u{21e8}*"), Term::Like("&#8680;%".into()));
    }

    #[test]
    fn test_leading_prefix_marker_is_content() {
        assert_eq!(like("@home"), Term::Exact("&#64;home".into()));
        assert_eq!(like("\u{220a}*"), Term::Like("&#8714;%".into()));
        assert_eq!(like("&#8714;*"), Term::Like("&#8714;%".into()));
        assert_eq!(like("x\u{220a}*"), Term::Like("x\u{220a}%".into()));
        assert_eq!(like("*@"), Term::Like("%@".into()));
    }

    #[test]
    fn test_invalid_reference_rejected() {
        let result = translate("a&#1114112;*", true, &EscapeConfig::default());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_incomplete_reference_is_literal() {
        assert_eq!(like("&#x*"), Term::Like("&#38;#x%".into()));
    }

    #[test]
    fn test_literal_mode() {
        let config = EscapeConfig::default();
        assert_eq!(translate("a*?", false, &config).unwrap(), Term::Exact("a*?".into()));
        assert_eq!(translate("@1", false, &config).unwrap(), Term::Exact("&#64;1".into()));
        assert_eq!(translate("&#42;", false, &config).unwrap(), Term::Exact("&#38;#42;".into()));
    }

    #[test]
    fn test_exact_to_like() {
        let config = EscapeConfig::default();
        assert_eq!(Term::Exact("a_b".into()).to_like(&config), "a\\_b");
        assert_eq!(Term::Like("a%".into()).to_like(&config), "a%");
    }

    #[test]
    fn test_parse_alias() {
        let config = EscapeConfig::default();
        assert_eq!(parse_alias("@12", &config), Some(12));
        assert_eq!(parse_alias("@", &config), None);
        assert_eq!(parse_alias("@1x", &config), None);
        assert_eq!(parse_alias("12", &config), None);
        assert_eq!(parse_alias("@99999999999999999999", &config), None);
    }

    /// Replace every character with its numeric reference.
    fn spelled_out(content: &str) -> String {
        content.chars().map(|c| format!("&#{};", c as u32)).collect()
    }

    proptest! {
        #[test]
        fn prop_literal_term_is_storage_form(content in strategy::content()) {
            let config = EscapeConfig::default();
            prop_assert_eq!(translate(&content, false, &config).unwrap(), Term::Exact(config.encode(&content)));
        }

        #[test]
        fn prop_escaped_term_is_storage_form(content in strategy::content()) {
            let config = EscapeConfig::default();
            let term = translate(&spelled_out(&content), true, &config).unwrap();
            prop_assert_eq!(term, Term::Exact(config.encode(&content)));
        }

        #[test]
        fn prop_wildcard_free_term_matches_literal(content in strategy::content()) {
            let config = EscapeConfig::default();
            let content = content.replace(['&', '*', '?'], "");
            prop_assert_eq!(translate(&content, true, &config).unwrap(), translate(&content, false, &config).unwrap());
        }
    }
}
