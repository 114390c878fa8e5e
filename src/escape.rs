//! Escaping codec - canonical text <-> storage-safe text
//!
//! Three classes of reserved characters exist:
//! - delimiter (`⇨`): separates the parts of a relation, escaped everywhere
//! - prefix markers (`@` alias, `∊` type): escaped only as the first character
//! - wildcards (`*`, `?`): stored verbatim, escaped only inside query terms
//!
//! Escapes use numeric character references (`&#8680;`), so `&` itself is
//! always escaped to keep [`EscapeConfig::decode`] an exact inverse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Introduces a numeric character reference.
pub const ESCAPE_INTRODUCER: char = '&';

/// Characters that may never be chosen as reserved characters.
const FORBIDDEN: &[char] = &['&', '#', ';', '%', '_', '\'', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Reserved character set of a store.
///
/// Written to the store's configuration table at creation time and loaded
/// back on every open, so stores carry their own escaping rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeConfig {
    /// Relation part separator
    pub delimiter: char,
    /// Marks an alias reference (`@12`)
    pub alias_marker: char,
    /// Marks a type anchor
    pub type_marker: char,
    /// Query wildcard: zero or more characters
    pub any_run: char,
    /// Query wildcard: exactly one character
    pub any_one: char,
    /// Escape character used in `LIKE ... ESCAPE` clauses
    pub like_escape: char,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            delimiter: '\u{21e8}',
            alias_marker: '\u{0040}',
            type_marker: '\u{220a}',
            any_run: '*',
            any_one: '?',
            like_escape: '\\',
        }
    }
}

impl EscapeConfig {
    /// Check that the reserved characters are distinct and usable.
    pub fn validate(&self) -> Result<()> {
        let chars = self.reserved();
        for (i, c) in chars.iter().enumerate() {
            if FORBIDDEN.contains(c) {
                return Err(Error::Config(format!("character {c:?} cannot be reserved")));
            }
            if chars[i + 1..].contains(c) {
                return Err(Error::Config(format!("character {c:?} is reserved twice")));
            }
        }
        Ok(())
    }

    fn reserved(&self) -> [char; 6] {
        [
            self.delimiter,
            self.alias_marker,
            self.type_marker,
            self.any_run,
            self.any_one,
            self.like_escape,
        ]
    }

    pub fn is_prefix_marker(&self, c: char) -> bool {
        c == self.alias_marker || c == self.type_marker
    }

    /// Whether `c` must be escaped when stored, given its position.
    pub fn must_escape(&self, c: char, first: bool) -> bool {
        c == ESCAPE_INTRODUCER || c == self.delimiter || (first && self.is_prefix_marker(c))
    }

    /// Encode content into its storage form.
    pub fn encode(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        for (i, c) in content.chars().enumerate() {
            push_char(&mut out, c, self.must_escape(c, i == 0));
        }
        out
    }

    /// Decode a storage form back into content.
    pub fn decode(&self, stored: &str) -> String {
        let mut out = String::with_capacity(stored.len());
        let mut rest = stored;
        while let Some(pos) = rest.find(ESCAPE_INTRODUCER) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match scan_reference(tail) {
                Reference::Valid(c, len) => {
                    out.push(c);
                    rest = &tail[len..];
                }
                _ => {
                    out.push(ESCAPE_INTRODUCER);
                    rest = &tail[ESCAPE_INTRODUCER.len_utf8()..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Append `c` to `out`, as a numeric character reference if `escaped`.
pub(crate) fn push_char(out: &mut String, c: char, escaped: bool) {
    if escaped {
        // Writing to a String cannot fail
        let _ = write!(out, "&#{};", c as u32);
    } else {
        out.push(c);
    }
}

/// Result of scanning for `&#<digits>;` at the start of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reference {
    /// Well-formed reference: character and byte length consumed
    Valid(char, usize),
    /// Well-formed syntax naming an invalid code point
    Invalid(usize),
    /// Not a reference at all
    None,
}

pub(crate) fn scan_reference(s: &str) -> Reference {
    let Some(body) = s.strip_prefix("&#") else {
        return Reference::None;
    };
    let Some(end) = body.find(';') else {
        return Reference::None;
    };
    let digits = &body[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Reference::None;
    }
    let len = 2 + end + 1;
    match digits.parse::<u32>().ok().and_then(char::from_u32) {
        Some(c) => Reference::Valid(c, len),
        None => Reference::Invalid(len),
    }
}

#[cfg(test)]
pub(crate) mod strategy {
    use proptest::prelude::*;

    /// Short strings mixing reserved characters with ordinary text.
    pub(crate) fn content() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                prop::sample::select(vec![
                    '&', '#', ';', '\u{21e8}', '@', '\u{220a}', '*', '?', '%', '_', '\\', '4', '2',
                ]),
                prop::char::range('a', 'e'),
                prop::char::range('\u{3b1}', '\u{3b5}'),
            ],
            0..12,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }
}
