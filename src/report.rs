// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Size reports.
//!
//! Join resolved repositories with their fetched size records into
//! __report rows__, and render those rows in one of the available report
//! styles:
//!
//! - __compact__: one templated line per repository.
//! - __table__: header line, then one templated line per repository.
//! - __tree__: host, user, then config as a drawn tree.
//! - __nestedtext__: same hierarchy as tree, as NestedText.
//! - __json__: same hierarchy as tree, as JSON.
//!
//! Rows keep the order of the repositories they came from. A repository
//! whose record could not be fetched still gets a row, marked with the
//! reason it failed.

pub mod format;
pub mod tree;

use crate::{
    config::Settings,
    record::{Size, SizeRecord},
    report::{
        format::{format_size, format_value, lookup, BraceTemplate, Render},
        tree::{Hierarchy, Leaf},
    },
    resolve::ResolvedRepository,
    store::StoreError,
};

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::HashMap, str::FromStr};

/// Available report styles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    #[default]
    Compact,

    #[serde(alias = "normal")]
    Table,

    Tree,

    #[serde(alias = "nt")]
    NestedText,

    Json,
}

impl FromStr for ReportStyle {
    type Err = ReportError;

    fn from_str(style: &str) -> Result<Self, Self::Err> {
        match style.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "table" | "normal" => Ok(Self::Table),
            "tree" => Ok(Self::Tree),
            "nestedtext" | "nt" => Ok(Self::NestedText),
            "json" => Ok(Self::Json),
            _ => Err(ReportError::UnknownStyle {
                style: style.into(),
            }),
        }
    }
}

/// Typed value of a report field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Size(Option<Size>),
    Date(Option<DateTime<FixedOffset>>),
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub spec: String,
    pub full_spec: String,
    pub config: String,
    pub host: String,
    pub user: String,

    /// Size format spec in effect.
    pub fmt: String,

    pub size: Option<Size>,
    pub last_create: Option<DateTime<FixedOffset>>,
    pub last_prune: Option<DateTime<FixedOffset>>,
    pub last_compact: Option<DateTime<FixedOffset>>,
    pub last_squeeze: Option<DateTime<FixedOffset>>,

    /// Reason record could not be fetched.
    pub error: Option<String>,
}

impl ReportRow {
    /// Look up field by name.
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let value = match name {
            "name" => FieldValue::Text(&self.name),
            "spec" => FieldValue::Text(&self.spec),
            "full_spec" => FieldValue::Text(&self.full_spec),
            "config" => FieldValue::Text(&self.config),
            "host" => FieldValue::Text(&self.host),
            "user" => FieldValue::Text(&self.user),
            "fmt" => FieldValue::Text(&self.fmt),
            "size" => FieldValue::Size(self.size),
            "last_create" => FieldValue::Date(self.last_create),
            "last_prune" => FieldValue::Date(self.last_prune),
            "last_compact" => FieldValue::Date(self.last_compact),
            "last_squeeze" => FieldValue::Date(self.last_squeeze),
            _ => return None,
        };

        Some(value)
    }

    /// Record for this row could not be fetched.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Join repositories with their records.
#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler<'a> {
    settings: &'a Settings,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Build one row per repository, in order.
    ///
    /// Records are keyed by full spec. Repositories without a record, or whose
    /// record failed, get a row marked with an error.
    pub fn assemble(
        &self,
        repos: &[ResolvedRepository],
        records: &HashMap<String, Result<SizeRecord, StoreError>>,
    ) -> Vec<ReportRow> {
        repos
            .iter()
            .map(|repo| {
                let full_spec = repo.full_spec();
                let mut row = ReportRow {
                    name: repo.name().into(),
                    spec: repo.spec().into(),
                    full_spec: full_spec.clone(),
                    config: repo.config().into(),
                    host: repo.host().into(),
                    user: repo.user().into(),
                    fmt: self.settings.size_format().into(),
                    size: None,
                    last_create: None,
                    last_prune: None,
                    last_compact: None,
                    last_squeeze: None,
                    error: None,
                };

                match records.get(&full_spec) {
                    Some(Ok(record)) => {
                        row.size = Some(record.size);
                        row.last_create = record.last_create;
                        row.last_prune = record.last_prune;
                        row.last_compact = record.last_compact;
                        row.last_squeeze = record.last_squeeze();
                    }
                    Some(Err(StoreError::RecordUnavailable { reason, .. })) => {
                        row.error = Some(reason.to_string());
                    }
                    Some(Err(err)) => row.error = Some(err.to_string()),
                    None => row.error = Some("record was never fetched".into()),
                }

                row
            })
            .collect()
    }
}

/// Render report rows in a given style.
#[derive(Debug, Clone)]
pub struct Reporter<'a, R = BraceTemplate>
where
    R: Render,
{
    settings: &'a Settings,
    renderer: R,
}

impl<'a> Reporter<'a> {
    /// Construct new reporter rendering templates through [`BraceTemplate`].
    pub fn new(settings: &'a Settings) -> Self {
        Self::with_renderer(settings, BraceTemplate::new(settings.date_format()))
    }
}

impl<'a, R> Reporter<'a, R>
where
    R: Render,
{
    /// Construct new reporter with custom template renderer.
    pub fn with_renderer(settings: &'a Settings, renderer: R) -> Self {
        Self { settings, renderer }
    }

    /// Render rows in style.
    ///
    /// # Errors
    ///
    /// - Return [`ReportError::UnknownField`] if a template or field listing
    ///   names an unknown field.
    /// - Return [`ReportError::InvalidFormat`] if a format spec is malformed.
    /// - Return [`ReportError::UnbalancedBraces`] if a template is malformed.
    pub fn render(&self, rows: &[ReportRow], style: ReportStyle) -> Result<String> {
        match style {
            ReportStyle::Compact => self.lines(rows, self.settings.compact_format(), None),
            ReportStyle::Table => self.lines(
                rows,
                self.settings.table_format(),
                Some(self.settings.table_header()).filter(|header| !header.is_empty()),
            ),
            ReportStyle::Tree => self.tree(rows),
            ReportStyle::NestedText => self.nestedtext(rows),
            ReportStyle::Json => self.json(rows),
        }
    }

    fn lines(&self, rows: &[ReportRow], template: &str, header: Option<&str>) -> Result<String> {
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.extend(header.map(str::to_owned));
        for row in rows {
            let line = match &row.error {
                Some(error) => format!("{}: error: {error}", row.name),
                None => self.renderer.render(template, row)?,
            };
            lines.push(line);
        }

        Ok(lines.join("\n"))
    }

    fn tree(&self, rows: &[ReportRow]) -> Result<String> {
        let fields = self.settings.tree_report_fields();
        let squeeze = fields == ["size"];
        let size_format = self.settings.size_format();

        let mut hierarchy = Hierarchy::new();
        for row in rows {
            let leaf = match (&row.error, squeeze) {
                (Some(error), true) => Leaf::Squeezed(format!("{}: error: {error}", row.config)),
                (Some(error), false) => Leaf::Fields(vec![("error".into(), error.clone())]),
                (None, true) => Leaf::Squeezed(format!(
                    "{}: {}",
                    row.config,
                    self.field_text(row, "size", size_format)?
                )),
                (None, false) => Leaf::Fields(self.fields_text(row, &fields, size_format)?),
            };
            hierarchy.insert(&row.host, &row.user, &row.config, leaf);
        }

        tree::render_tree(&hierarchy)
    }

    fn nestedtext(&self, rows: &[ReportRow]) -> Result<String> {
        let fields = self.settings.nestedtext_report_fields();
        let size_format = self.settings.nestedtext_size_format();

        let mut hierarchy = Hierarchy::new();
        for row in rows {
            let leaf = match &row.error {
                Some(error) => vec![("error".into(), error.clone())],
                None => self.fields_text(row, &fields, size_format)?,
            };
            hierarchy.insert(&row.host, &row.user, &row.config, leaf);
        }

        Ok(tree::render_nestedtext(&hierarchy))
    }

    fn json(&self, rows: &[ReportRow]) -> Result<String> {
        let fields = self.settings.json_report_fields();

        let mut hierarchy = Hierarchy::new();
        for row in rows {
            let mut leaf = Map::new();
            match &row.error {
                Some(error) => {
                    leaf.insert("error".into(), Value::String(error.clone()));
                }
                None => {
                    for field in &fields {
                        leaf.insert(field.clone(), json_value(row, field)?);
                    }
                }
            }
            hierarchy.insert(&row.host, &row.user, &row.config, Value::Object(leaf));
        }

        Ok(serde_json::to_string_pretty(&hierarchy.into_json())?)
    }

    fn fields_text(
        &self,
        row: &ReportRow,
        fields: &[String],
        size_format: &str,
    ) -> Result<Vec<(String, String)>> {
        fields
            .iter()
            .map(|field| Ok((field.clone(), self.field_text(row, field, size_format)?)))
            .collect()
    }

    fn field_text(&self, row: &ReportRow, field: &str, size_format: &str) -> Result<String> {
        let date_format = self.settings.date_format();
        match lookup(row, field)? {
            FieldValue::Size(Some(size)) => format_size(size, size_format),
            FieldValue::Date(Some(date)) if date_format.is_empty() => Ok(date.to_rfc3339()),
            value => format_value(&value, "", date_format),
        }
    }
}

fn json_value(row: &ReportRow, field: &str) -> Result<Value> {
    Ok(match lookup(row, field)? {
        FieldValue::Text(text) => Value::String(text.into()),
        FieldValue::Size(size) => size.map_or(Value::Null, |size| Value::from(size.bytes())),
        FieldValue::Date(date) => date.map_or(Value::Null, |date| Value::String(date.to_rfc3339())),
    })
}

/// Report error types.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Template or field listing names unknown field.
    #[error("unknown report field {field:?}")]
    UnknownField { field: String },

    /// Template has unbalanced braces.
    #[error("unbalanced braces in template {template:?}")]
    UnbalancedBraces { template: String },

    /// Format spec is malformed, or does not fit value.
    #[error("invalid format spec {spec:?}")]
    InvalidFormat { spec: String },

    /// Report style is not known.
    #[error("unknown report style {style:?}, choose from compact, table, tree, nestedtext, nt, or json")]
    UnknownStyle { style: String },

    /// JSON report cannot be encoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Tree report cannot be drawn.
    #[error(transparent)]
    Tree(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = ReportError> = std::result::Result<T, E>;
