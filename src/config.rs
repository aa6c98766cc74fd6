// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that borg-space uses to simplify
//! the process of deserialization. The settings file is a TOML document that
//! lives at `$XDG_CONFIG_HOME/borg-space/settings.toml` by default.
//!
//! # General Layout
//!
//! All top-level keys may be written with spaces, e.g., `"default repository"`,
//! or in snake case, e.g., `default_repository`. Unknown keys are rejected.
//! The `repositories` table maps names to repository entries:
//!
//! ```toml
//! "default repository" = "home"
//!
//! [repositories]
//! cache = ""                                       # self alias
//! rsync = "rsync@sol"                              # single spec
//! mirrors = ["primary@neptune~root", "cache"]      # list of specs
//! offsite = { config = "offsite", host = "mars" }  # structured spec
//! home = { children = ["rsync", "offsite"] }       # composite
//! ```

use crate::report::ReportStyle;

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

const DEFAULT_COMPACT_FORMAT: &str = "{name}: {size:{fmt}}";
const DEFAULT_TABLE_FORMAT: &str =
    "{host:8} {user:8} {config:8} {size:<8.2b}  {last_create:ddd, MMM DD}";
const DEFAULT_TABLE_HEADER: &str = "HOST     USER     CONFIG   SIZE      LAST BACK UP";
const DEFAULT_SIZE_FORMAT: &str = ".2b";
const DEFAULT_DATE_FORMAT: &str = "D MMMM YYYY";

/// Settings file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Repository to report on when none are requested.
    #[serde(alias = "default repository")]
    pub default_repository: Option<String>,

    /// Report style to use when none is requested.
    #[serde(alias = "report style")]
    pub report_style: Option<ReportStyle>,

    /// Template for compact report lines.
    #[serde(alias = "compact format")]
    pub compact_format: Option<String>,

    /// Template for table report lines.
    #[serde(alias = "table format")]
    pub table_format: Option<String>,

    /// Header line of table report. Empty string disables it.
    #[serde(alias = "table header")]
    pub table_header: Option<String>,

    /// Fields shown by hierarchical reports.
    #[serde(alias = "report fields")]
    pub report_fields: Option<FieldList>,

    #[serde(alias = "tree report fields")]
    pub tree_report_fields: Option<FieldList>,

    #[serde(alias = "nestedtext report fields")]
    pub nestedtext_report_fields: Option<FieldList>,

    #[serde(alias = "json report fields")]
    pub json_report_fields: Option<FieldList>,

    /// Format spec applied to repository sizes.
    #[serde(alias = "size format")]
    pub size_format: Option<String>,

    #[serde(alias = "nestedtext size format")]
    pub nestedtext_size_format: Option<String>,

    /// Arrow style date format, e.g., `D MMMM YYYY`.
    #[serde(alias = "date format")]
    pub date_format: Option<String>,

    /// Named repository aliases and composites.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

impl Settings {
    /// Load settings from file.
    ///
    /// A missing settings file is not an error, default settings are used
    /// instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadSettings`] if settings file exists but
    ///   cannot be read.
    /// - Return [`ConfigError::Deserialize`] if settings file is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::ReadSettings {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn report_style(&self) -> ReportStyle {
        self.report_style.unwrap_or_default()
    }

    pub fn compact_format(&self) -> &str {
        self.compact_format.as_deref().unwrap_or(DEFAULT_COMPACT_FORMAT)
    }

    pub fn table_format(&self) -> &str {
        self.table_format.as_deref().unwrap_or(DEFAULT_TABLE_FORMAT)
    }

    pub fn table_header(&self) -> &str {
        self.table_header.as_deref().unwrap_or(DEFAULT_TABLE_HEADER)
    }

    pub fn size_format(&self) -> &str {
        self.size_format.as_deref().unwrap_or(DEFAULT_SIZE_FORMAT)
    }

    pub fn nestedtext_size_format(&self) -> &str {
        self.nestedtext_size_format
            .as_deref()
            .unwrap_or_else(|| self.size_format())
    }

    pub fn date_format(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }

    /// Fields shown by any hierarchical report without its own listing.
    pub fn report_fields(&self) -> Vec<String> {
        self.report_fields
            .as_ref()
            .map(FieldList::to_vec)
            .unwrap_or_else(|| vec!["size".into()])
    }

    pub fn tree_report_fields(&self) -> Vec<String> {
        self.fields_or_default(self.tree_report_fields.as_ref())
    }

    pub fn nestedtext_report_fields(&self) -> Vec<String> {
        self.fields_or_default(self.nestedtext_report_fields.as_ref())
    }

    pub fn json_report_fields(&self) -> Vec<String> {
        self.fields_or_default(self.json_report_fields.as_ref())
    }

    fn fields_or_default(&self, fields: Option<&FieldList>) -> Vec<String> {
        fields
            .map(FieldList::to_vec)
            .unwrap_or_else(|| self.report_fields())
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

/// Listing of report fields.
///
/// Either a whitespace separated string, or an array of field names.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    Text(String),
    List(Vec<String>),
}

impl FieldList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Text(text) => text.split_whitespace().map(str::to_owned).collect(),
            Self::List(list) => list.clone(),
        }
    }
}

/// Value of a named entry in the `repositories` table.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum RepositoryEntry {
    /// Whitespace separated specs. Empty string means self alias.
    Text(String),

    /// Listing of specs, either textual or structured.
    List(Vec<SpecEntry>),

    /// Composite built from other catalog entries.
    Composite(CompositeEntry),

    /// Single structured spec.
    Structured(StructuredSpec),
}

/// Single spec inside a listing.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum SpecEntry {
    Text(String),
    Structured(StructuredSpec),
}

/// Spec written as a table of its components.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredSpec {
    pub config: String,
    pub host: Option<String>,
    pub user: Option<String>,
}

/// Composite repository layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeEntry {
    pub children: ChildList,
}

/// Listing of composite children.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChildList {
    Text(String),
    List(Vec<String>),
}

impl ChildList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Text(text) => text.split_whitespace().map(str::to_owned).collect(),
            Self::List(list) => list.clone(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Settings file exists, but cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    ReadSettings {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            "default repository" = "home"
            "report style" = "nt"
            size_format = ".3s"
            "report fields" = "size last_create"

            [repositories]
            cache = ""
            rsync = "rsync@sol"
            mirrors = ["primary@neptune~root", { config = "backup", user = "root" }]
            offsite = { config = "offsite", host = "mars" }
            home = { children = ["rsync", "offsite"] }
            work = { children = "mirrors cache" }
        "#
        .parse()?;

        let mut repositories = BTreeMap::new();
        repositories.insert("cache".into(), RepositoryEntry::Text("".into()));
        repositories.insert("rsync".into(), RepositoryEntry::Text("rsync@sol".into()));
        repositories.insert(
            "mirrors".into(),
            RepositoryEntry::List(vec![
                SpecEntry::Text("primary@neptune~root".into()),
                SpecEntry::Structured(StructuredSpec {
                    config: "backup".into(),
                    host: None,
                    user: Some("root".into()),
                }),
            ]),
        );
        repositories.insert(
            "offsite".into(),
            RepositoryEntry::Structured(StructuredSpec {
                config: "offsite".into(),
                host: Some("mars".into()),
                user: None,
            }),
        );
        repositories.insert(
            "home".into(),
            RepositoryEntry::Composite(CompositeEntry {
                children: ChildList::List(vec!["rsync".into(), "offsite".into()]),
            }),
        );
        repositories.insert(
            "work".into(),
            RepositoryEntry::Composite(CompositeEntry {
                children: ChildList::Text("mirrors cache".into()),
            }),
        );

        let expect = Settings {
            default_repository: Some("home".into()),
            report_style: Some(ReportStyle::NestedText),
            size_format: Some(".3s".into()),
            report_fields: Some(FieldList::Text("size last_create".into())),
            repositories,
            ..Default::default()
        };

        assert_eq!(result, expect);
        assert_eq!(result.nestedtext_size_format(), ".3s");
        assert_eq!(result.tree_report_fields(), vec!["size", "last_create"]);

        Ok(())
    }

    #[test]
    fn reject_unknown_keys() {
        let result = r#"
            "default repository" = "home"
            "favorite color" = "blue"
        "#
        .parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn reject_unknown_structured_spec_keys() {
        let result = r#"
            [repositories]
            home = { config = "home", port = "22" }
        "#
        .parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn defaults_apply_without_settings() {
        let settings = Settings::default();
        assert_eq!(settings.report_style(), ReportStyle::Compact);
        assert_eq!(settings.compact_format(), DEFAULT_COMPACT_FORMAT);
        assert_eq!(settings.size_format(), ".2b");
        assert_eq!(settings.nestedtext_size_format(), ".2b");
        assert_eq!(settings.date_format(), "D MMMM YYYY");
        assert_eq!(settings.json_report_fields(), vec!["size"]);
    }

    #[sealed_test]
    fn missing_settings_file_uses_defaults() -> anyhow::Result<()> {
        let settings = Settings::load("no-such-settings.toml")?;
        assert_eq!(settings, Settings::default());
        Ok(())
    }

    #[sealed_test]
    fn load_settings_file() -> anyhow::Result<()> {
        std::fs::write("settings.toml", "\"default repository\" = \"cache\"\n")?;
        let settings = Settings::load("settings.toml")?;
        assert_eq!(settings.default_repository.as_deref(), Some("cache"));
        Ok(())
    }
}
