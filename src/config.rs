//! Configuration: per-store options and the CLI config file
//!
//! Store options are written into the database when it is created and read
//! back on every open. The `tags.toml` file only supplies defaults for stores
//! the CLI creates and the database path.

use crate::escape::EscapeConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Version of the on-disk layout written to new stores.
pub const FORMAT_VERSION: u32 = 1;

pub const DEFAULT_PREFACE_LENGTH: usize = 256;

/// When relation endpoints are stored as aliases instead of prefaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasPolicy {
    /// Always store the endpoint preface
    #[default]
    Never,
    /// Alias endpoints whose stored content is longer than the preface
    Long,
    /// Always store `@<rowid>`
    Always,
}

impl AliasPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasPolicy::Never => "never",
            AliasPolicy::Long => "long",
            AliasPolicy::Always => "always",
        }
    }
}

impl FromStr for AliasPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "never" => Ok(AliasPolicy::Never),
            "long" => Ok(AliasPolicy::Long),
            "always" => Ok(AliasPolicy::Always),
            _ => Err(Error::Config(format!("unknown alias policy: {}", s))),
        }
    }
}

impl fmt::Display for AliasPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options fixed for the lifetime of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub escape: EscapeConfig,
    /// Preface length in stored characters
    pub preface_length: usize,
    pub alias_policy: AliasPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            escape: EscapeConfig::default(),
            preface_length: DEFAULT_PREFACE_LENGTH,
            alias_policy: AliasPolicy::default(),
        }
    }
}

impl StoreOptions {
    pub fn validate(&self) -> Result<()> {
        self.escape.validate()?;
        if self.preface_length == 0 {
            return Err(Error::Config("preface length must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Storage form of the preface of `content`: the first
    /// `preface_length` characters of the content, encoded.
    ///
    /// Content no longer than the preface length has a preface equal to its
    /// own storage form.
    pub fn preface(&self, content: &str) -> String {
        let cut = match content.char_indices().nth(self.preface_length) {
            Some((end, _)) => &content[..end],
            None => content,
        };
        self.escape.encode(cut)
    }

    /// Preface of content given in its storage form.
    pub fn stored_preface(&self, stored: &str) -> String {
        self.preface(&self.escape.decode(stored))
    }

    /// Rows for the store's configuration table.
    pub fn to_rows(&self) -> Vec<(&'static str, String)> {
        let e = &self.escape;
        vec![
            ("char_delimiter", e.delimiter.to_string()),
            ("char_alias", e.alias_marker.to_string()),
            ("char_type", e.type_marker.to_string()),
            ("char_any_run", e.any_run.to_string()),
            ("char_any_one", e.any_one.to_string()),
            ("char_like_escape", e.like_escape.to_string()),
            ("preface_length", self.preface_length.to_string()),
            ("alias_policy", self.alias_policy.to_string()),
            ("format_version", FORMAT_VERSION.to_string()),
        ]
    }

    /// Rebuild options from the store's configuration table.
    pub fn from_rows(rows: &HashMap<String, String>) -> Result<Self> {
        let version: u32 = parse_value(rows, "format_version")?;
        if version != FORMAT_VERSION {
            return Err(Error::Config(format!("unsupported store format version {version}")));
        }

        let options = Self {
            escape: EscapeConfig {
                delimiter: char_value(rows, "char_delimiter")?,
                alias_marker: char_value(rows, "char_alias")?,
                type_marker: char_value(rows, "char_type")?,
                any_run: char_value(rows, "char_any_run")?,
                any_one: char_value(rows, "char_any_one")?,
                like_escape: char_value(rows, "char_like_escape")?,
            },
            preface_length: parse_value(rows, "preface_length")?,
            alias_policy: parse_value(rows, "alias_policy")?,
        };
        options.validate()?;
        Ok(options)
    }
}

fn raw_value<'r>(rows: &'r HashMap<String, String>, key: &str) -> Result<&'r str> {
    rows.get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("store configuration is missing {key}")))
}

fn char_value(rows: &HashMap<String, String>, key: &str) -> Result<char> {
    let value = raw_value(rows, key)?;
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Config(format!("{key} must be a single character, got {value:?}"))),
    }
}

fn parse_value<T: FromStr>(rows: &HashMap<String, String>, key: &str) -> Result<T> {
    let value = raw_value(rows, key)?;
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid value {value:?} for {key}")))
}

// ========== CLI config file ==========

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TagsConfig {
    pub database: Option<String>,
    pub preface_length: Option<usize>,
    pub alias: Option<AliasPolicy>,
}

impl TagsConfig {
    /// Options for a store created with this configuration.
    pub fn store_options(&self) -> StoreOptions {
        let defaults = StoreOptions::default();
        StoreOptions {
            preface_length: self.preface_length.unwrap_or(defaults.preface_length),
            alias_policy: self.alias.unwrap_or(defaults.alias_policy),
            ..defaults
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("tags.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("tags.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<TagsConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TagsConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &TagsConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preface() {
        let options = StoreOptions { preface_length: 3, ..Default::default() };
        assert_eq!(options.preface("ab"), "ab");
        assert_eq!(options.preface("abc"), "abc");
        assert_eq!(options.preface("abcdef"), "abc");
        assert_eq!(
            options.preface("\u{21e8}\u{21e8}\u{21e8}\u{21e8}"),
            "&#8680;&#8680;&#8680;"
        );
    }

    #[test]
    fn test_preface_counts_content_characters() {
        let options = StoreOptions { preface_length: 4, ..Default::default() };
        assert_eq!(options.preface("a&b"), "a&#38;b");
        assert_eq!(options.preface("a&c"), "a&#38;c");
        assert_eq!(options.preface("@x&yz"), "&#64;x&#38;y");
        assert_eq!(options.stored_preface("&#64;x&#38;yz"), "&#64;x&#38;y");
    }

    #[test]
    fn test_rows_roundtrip() {
        let options = StoreOptions {
            preface_length: 12,
            alias_policy: AliasPolicy::Long,
            ..Default::default()
        };
        let rows: HashMap<String, String> = options
            .to_rows()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(StoreOptions::from_rows(&rows).unwrap(), options);
    }

    #[test]
    fn test_rows_rejected() {
        let mut rows: HashMap<String, String> = StoreOptions::default()
            .to_rows()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        rows.insert("format_version".into(), "99".into());
        assert!(matches!(StoreOptions::from_rows(&rows), Err(Error::Config(_))));

        rows.insert("format_version".into(), FORMAT_VERSION.to_string());
        rows.insert("char_alias".into(), "@@".into());
        assert!(matches!(StoreOptions::from_rows(&rows), Err(Error::Config(_))));

        rows.remove("char_alias");
        assert!(matches!(StoreOptions::from_rows(&rows), Err(Error::Config(_))));
    }

    #[test]
    fn test_alias_policy_parse() {
        assert_eq!("LONG".parse::<AliasPolicy>().unwrap(), AliasPolicy::Long);
        assert!("sometimes".parse::<AliasPolicy>().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.toml");
        let config = TagsConfig {
            database: Some("graph.db".into()),
            preface_length: Some(64),
            alias: Some(AliasPolicy::Always),
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.database.as_deref(), Some("graph.db"));
        let options = loaded.store_options();
        assert_eq!(options.preface_length, 64);
        assert_eq!(options.alias_policy, AliasPolicy::Always);

        assert!(load_config(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }
}
