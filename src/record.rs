// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Size records.
//!
//! A __size record__ is one timestamped observation of how much storage a
//! repository consumes, along with the last time each maintenance operation
//! ran on it.
//!
//! # Latest Record Document
//!
//! Emborg leaves a small `key: value` document behind for each of its
//! configurations after every run:
//!
//! ```text
//! repository size: 2.83 GB
//! create last run: 2023-04-08T02:00:13.532614-07:00
//! prune last run: 2023-04-02T02:15:02.381003-07:00
//! compact last run: 2023-04-02T02:16:44.108733-07:00
//! ```
//!
//! Only `repository size` is required. Unknown keys are ignored.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

const SIZE_KEY: &str = "repository size";
const CREATE_KEY: &str = "create last run";
const PRUNE_KEY: &str = "prune last run";
const COMPACT_KEY: &str = "compact last run";

/// Quantity of bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(u64);

impl Size {
    pub fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl Display for Size {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} B", self.0)
    }
}

impl FromStr for Size {
    type Err = RecordError;

    /// Parse byte count with optional scale factor, e.g., `2.83 GB`,
    /// `1.5GiB`, `52428800`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || RecordError::InvalidSize { value: text.into() };
        let value = text.trim();
        let value = value.strip_suffix('B').unwrap_or(value).trim_end();

        let (value, base) = match value.strip_suffix('i') {
            Some(value) => (value, 1024_f64),
            None => (value, 1000_f64),
        };
        let (number, exponent) = match value.chars().last().and_then(scale_exponent) {
            Some(exponent) => (value[..value.len() - 1].trim_end(), exponent),
            None if base == 1024_f64 => return Err(invalid()),
            None => (value, 0),
        };

        let number: f64 = number.parse().map_err(|_| invalid())?;
        if !number.is_finite() || number < 0.0 {
            return Err(invalid());
        }

        Ok(Self((number * base.powi(exponent)).round() as u64))
    }
}

fn scale_exponent(prefix: char) -> Option<i32> {
    match prefix {
        'k' | 'K' => Some(1),
        'M' => Some(2),
        'G' => Some(3),
        'T' => Some(4),
        'P' => Some(5),
        'E' => Some(6),
        'Z' => Some(7),
        'Y' => Some(8),
        _ => None,
    }
}

/// One historical observation of repository size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    /// When the observation was made.
    pub timestamp: DateTime<FixedOffset>,

    pub size: Size,

    #[serde(default)]
    pub last_create: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub last_prune: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub last_compact: Option<DateTime<FixedOffset>>,
}

impl SizeRecord {
    /// Parse latest record document produced by Emborg.
    ///
    /// # Errors
    ///
    /// - Return [`RecordError::Empty`] if document has no content.
    /// - Return [`RecordError::MissingSize`] if document lacks repository
    ///   size.
    /// - Return [`RecordError::InvalidSize`] if repository size cannot be
    ///   parsed.
    /// - Return [`RecordError::InvalidDate`] if a timestamp cannot be parsed.
    pub fn from_latest(content: &str, timestamp: DateTime<FixedOffset>) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(RecordError::Empty);
        }

        let mut size = None;
        let mut record = Self {
            timestamp,
            size: Size::default(),
            last_create: None,
            last_prune: None,
            last_compact: None,
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let date = || {
                parse_timestamp(value).ok_or_else(|| RecordError::InvalidDate {
                    key: key.into(),
                    value: value.into(),
                })
            };

            match key {
                SIZE_KEY => size = Some(value.parse::<Size>()?),
                CREATE_KEY => record.last_create = Some(date()?),
                PRUNE_KEY => record.last_prune = Some(date()?),
                COMPACT_KEY => record.last_compact = Some(date()?),
                _ => continue,
            }
        }

        record.size = size.ok_or(RecordError::MissingSize)?;
        Ok(record)
    }

    /// Later of last prune and last compact.
    pub fn last_squeeze(&self) -> Option<DateTime<FixedOffset>> {
        self.last_prune.max(self.last_compact)
    }
}

/// Parse timestamp in RFC 3339 form, or as local `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date);
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|date| date.fixed_offset())
}

/// Size record error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Latest record document has no content.
    #[error("record is empty")]
    Empty,

    /// Latest record document does not report repository size.
    #[error("record does not contain \"repository size\"")]
    MissingSize,

    /// Repository size cannot be parsed.
    #[error("invalid repository size {value:?}")]
    InvalidSize { value: String },

    /// Timestamp cannot be parsed.
    #[error("invalid date {value:?} for {key:?}")]
    InvalidDate { key: String, value: String },
}

/// Friendly result alias :3
type Result<T, E = RecordError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-04-08T12:00:00-07:00").unwrap()
    }

    #[test_case("52428800", 52_428_800; "plain bytes")]
    #[test_case("512 B", 512; "bytes with unit")]
    #[test_case("2.83 GB", 2_830_000_000; "si scale factor")]
    #[test_case("1.5GiB", 1_610_612_736; "binary scale factor")]
    #[test_case("12kB", 12_000; "lowercase kilo")]
    #[test]
    fn parse_size(text: &str, bytes: u64) {
        assert_eq!(text.parse::<Size>().unwrap(), Size::new(bytes));
    }

    #[test_case("lots"; "not a number")]
    #[test_case("-3 MB"; "negative")]
    #[test_case("3 Xi"; "unknown binary prefix")]
    #[test]
    fn reject_invalid_size(text: &str) {
        assert_eq!(
            text.parse::<Size>(),
            Err(RecordError::InvalidSize { value: text.into() })
        );
    }

    #[test]
    fn parse_latest_document() -> anyhow::Result<()> {
        let content = indoc! {r#"
            repository size: 2.83 GB
            create last run: 2023-04-08T02:00:13-07:00
            prune last run: 2023-04-02T02:15:02-07:00
            compact last run: 2023-04-03T02:16:44-07:00
            check last run: 2023-04-01T02:16:44-07:00
        "#};
        let record = SizeRecord::from_latest(content, now())?;

        let expect = SizeRecord {
            timestamp: now(),
            size: Size::new(2_830_000_000),
            last_create: parse_timestamp("2023-04-08T02:00:13-07:00"),
            last_prune: parse_timestamp("2023-04-02T02:15:02-07:00"),
            last_compact: parse_timestamp("2023-04-03T02:16:44-07:00"),
        };
        assert_eq!(record, expect);
        assert_eq!(record.last_squeeze(), expect.last_compact);

        Ok(())
    }

    #[test]
    fn squeeze_uses_whichever_ran() -> anyhow::Result<()> {
        let record = SizeRecord::from_latest(
            "repository size: 1 MB\nprune last run: 2023-04-02T02:15:02-07:00\n",
            now(),
        )?;
        assert_eq!(record.last_squeeze(), record.last_prune);
        assert_eq!(record.last_create, None);
        Ok(())
    }

    #[test]
    fn reject_empty_document() {
        assert_eq!(SizeRecord::from_latest("\n  \n", now()), Err(RecordError::Empty));
    }

    #[test]
    fn reject_document_without_size() {
        assert_eq!(
            SizeRecord::from_latest("create last run: 2023-04-08T02:00:13-07:00\n", now()),
            Err(RecordError::MissingSize)
        );
    }

    #[test]
    fn reject_bad_date() {
        assert_eq!(
            SizeRecord::from_latest("repository size: 1 MB\nprune last run: yesterday\n", now()),
            Err(RecordError::InvalidDate {
                key: "prune last run".into(),
                value: "yesterday".into(),
            })
        );
    }

    #[test]
    fn parse_naive_local_timestamp() {
        assert!(parse_timestamp("2023-04-08 02:00:13").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }
}
