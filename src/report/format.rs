// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Field formatting and template rendering.
//!
//! Report rows only carry typed values. This module turns them into text,
//! either one value at a time through a format spec, or a whole row at once
//! through a template.
//!
//! # Format Specs
//!
//! - Text: `[align][width]`, e.g., `<8`.
//! - Size: `[align][width][.precision][type]`, where type is `b` for binary
//!   scale factors (KiB, MiB, ...), `s` for SI scale factors (kB, MB, ...),
//!   or `d` for a plain byte count. SI is used when type is left out.
//! - Date: Arrow style tokens, e.g., `ddd, MMM DD` or `D MMMM YYYY`. Text in
//!   square brackets is kept as is.
//!
//! Align is one of `<`, `>`, or `^`.
//!
//! # Templates
//!
//! Templates hold `{field}` or `{field:spec}` placeholders. A spec may refer
//! to other fields itself, e.g., `{size:{fmt}}`. Use `{{` and `}}` for
//! literal braces.

use crate::{
    record::Size,
    report::{FieldValue, ReportError, ReportRow},
};

use chrono::{DateTime, FixedOffset};

const BINARY_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

// Longer tokens must come before their prefixes.
const DATE_TOKENS: [(&str, &str); 24] = [
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DDDD", "%j"),
    ("DDD", "%-j"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
    ("ZZ", "%:z"),
    ("Z", "%z"),
];

/// Render whole report rows from templates.
pub trait Render {
    /// Substitute fields of row into template.
    fn render(&self, template: &str, row: &ReportRow) -> Result<String>;
}

/// Brace placeholder template renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceTemplate {
    date_format: String,
}

impl BraceTemplate {
    /// Construct new renderer.
    ///
    /// Date format applies to date fields whose placeholder has no spec.
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    fn placeholder(&self, text: &str, row: &ReportRow, template: &str) -> Result<String> {
        let (field, spec) = text.split_once(':').unwrap_or((text, ""));
        let value = lookup(row, field.trim())?;

        // INVARIANT: Nested placeholders in spec are plain substitutions.
        let spec = substitute(spec, template, &|name: &str| {
            lookup(row, name.trim()).and_then(|value| format_value(&value, "", &self.date_format))
        })?;

        format_value(&value, &spec, &self.date_format)
    }
}

impl Render for BraceTemplate {
    fn render(&self, template: &str, row: &ReportRow) -> Result<String> {
        substitute(template, template, &|text: &str| {
            self.placeholder(text, row, template)
        })
    }
}

pub(crate) fn lookup<'a>(row: &'a ReportRow, field: &str) -> Result<FieldValue<'a>> {
    row.field(field).ok_or_else(|| ReportError::UnknownField {
        field: field.into(),
    })
}

// Replace each top-level placeholder of text through the given closure.
fn substitute(
    text: &str,
    template: &str,
    replace: &dyn Fn(&str) -> Result<String>,
) -> Result<String> {
    let unbalanced = || ReportError::UnbalancedBraces {
        template: template.into(),
    };

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(next) = rest.strip_prefix("{{") {
            out.push('{');
            rest = next;
        } else if let Some(next) = rest.strip_prefix("}}") {
            out.push('}');
            rest = next;
        } else if rest.starts_with('{') {
            let end = closing_brace(rest).ok_or_else(unbalanced)?;
            out.push_str(&replace(&rest[1..end])?);
            rest = &rest[end + 1..];
        } else if rest.starts_with('}') {
            return Err(unbalanced());
        } else {
            let end = rest.find(['{', '}']).unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        }
    }

    Ok(out)
}

// Byte index of brace closing the one that text starts with.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    for (index, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }

    None
}

/// Format any field value through spec.
///
/// # Errors
///
/// - Return [`ReportError::InvalidFormat`] if spec does not fit value type.
pub fn format_value(value: &FieldValue<'_>, spec: &str, date_format: &str) -> Result<String> {
    match value {
        FieldValue::Text(text) => format_text(text, spec),
        FieldValue::Size(Some(size)) => format_size(*size, spec),
        FieldValue::Size(None) => Ok("unknown".into()),
        FieldValue::Date(Some(date)) if spec.is_empty() => Ok(format_date(date, date_format)),
        FieldValue::Date(Some(date)) => Ok(format_date(date, spec)),
        FieldValue::Date(None) => Ok("never".into()),
    }
}

/// Format text through `[align][width]` spec.
///
/// # Errors
///
/// - Return [`ReportError::InvalidFormat`] if spec is malformed.
pub fn format_text(text: &str, spec: &str) -> Result<String> {
    let parsed = FormatSpec::parse(spec)?;
    if parsed.precision.is_some() || parsed.kind.is_some() {
        return Err(ReportError::InvalidFormat { spec: spec.into() });
    }

    Ok(parsed.pad(text, '<'))
}

/// Format size through `[align][width][.precision][type]` spec.
///
/// # Errors
///
/// - Return [`ReportError::InvalidFormat`] if spec is malformed.
pub fn format_size(size: Size, spec: &str) -> Result<String> {
    let parsed = FormatSpec::parse(spec)?;
    let (units, base) = match parsed.kind {
        Some('d') => return Ok(parsed.pad(&size.bytes().to_string(), '>')),
        Some('b') => (&BINARY_UNITS, 1024_f64),
        Some('s') | None => (&SI_UNITS, 1000_f64),
        Some(_) => return Err(ReportError::InvalidFormat { spec: spec.into() }),
    };

    let mut value = size.bytes() as f64;
    let mut unit = 0;
    while value >= base && unit < units.len() - 1 {
        value /= base;
        unit += 1;
    }

    let text = if unit == 0 {
        format!("{} {}", size.bytes(), units[0])
    } else {
        let precision = parsed.precision.unwrap_or(2);
        format!("{value:.precision$} {}", units[unit])
    };

    Ok(parsed.pad(&text, '>'))
}

/// Format date through Arrow style format.
pub fn format_date(date: &DateTime<FixedOffset>, format: &str) -> String {
    date.format(&to_strftime(format)).to_string()
}

/// Translate Arrow style date tokens into strftime specifiers.
pub fn to_strftime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;
    while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end].replace('%', "%%"));
                rest = &rest[end + 1..];
                continue;
            }
        }

        if let Some((token, specifier)) = DATE_TOKENS.iter().find(|(token, _)| rest.starts_with(token)) {
            out.push_str(specifier);
            rest = &rest[token.len()..];
            continue;
        }

        match c {
            '%' => out.push_str("%%"),
            c => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

/// Parsed `[align][width][.precision][type]` spec.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    align: Option<char>,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self> {
        let invalid = || ReportError::InvalidFormat { spec: spec.into() };
        let mut parsed = Self::default();
        let mut rest = spec.trim();

        if let Some(align) = rest.chars().next().filter(|c| matches!(c, '<' | '>' | '^')) {
            parsed.align = Some(align);
            rest = &rest[1..];
        }

        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            parsed.width = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];
        }

        if let Some(after) = rest.strip_prefix('.') {
            let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                return Err(invalid());
            }
            parsed.precision = Some(after[..digits].parse().map_err(|_| invalid())?);
            rest = &after[digits..];
        }

        let mut chars = rest.chars();
        parsed.kind = chars.next();
        if chars.next().is_some() {
            return Err(invalid());
        }

        Ok(parsed)
    }

    fn pad(&self, text: &str, default_align: char) -> String {
        let len = text.chars().count();
        if len >= self.width {
            return text.to_string();
        }

        let fill = self.width - len;
        match self.align.unwrap_or(default_align) {
            '>' => format!("{}{text}", " ".repeat(fill)),
            '^' => format!(
                "{}{text}{}",
                " ".repeat(fill / 2),
                " ".repeat(fill - fill / 2)
            ),
            _ => format!("{text}{}", " ".repeat(fill)),
        }
    }
}

/// Friendly result alias :3
type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn stamp() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-04-08T02:05:09-07:00").unwrap()
    }

    fn row() -> ReportRow {
        ReportRow {
            name: "home".into(),
            spec: "home".into(),
            full_spec: "home@earth~ada".into(),
            config: "home".into(),
            host: "earth".into(),
            user: "ada".into(),
            fmt: ".1b".into(),
            size: Some(Size::new(3 * 1024 * 1024)),
            last_create: Some(stamp()),
            last_prune: None,
            last_compact: None,
            last_squeeze: None,
            error: None,
        }
    }

    #[test_case(512, "", "512 B"; "bytes stay whole")]
    #[test_case(1_500_000, ".2s", "1.50 MB"; "si scale")]
    #[test_case(1_500_000, "", "1.50 MB"; "si by default")]
    #[test_case(1_610_612_736, ".1b", "1.5 GiB"; "binary scale")]
    #[test_case(1_610_612_736, "d", "1610612736"; "plain count")]
    #[test_case(2048, "<10.0b", "2 KiB     "; "left aligned")]
    #[test_case(2048, "10.0b", "     2 KiB"; "right aligned by default")]
    #[test]
    fn size_formatting(bytes: u64, spec: &str, expect: &str) {
        assert_eq!(format_size(Size::new(bytes), spec).unwrap(), expect);
    }

    #[test_case(".x"; "missing precision digits")]
    #[test_case("q"; "unknown type")]
    #[test_case("8.2bb"; "trailing garbage")]
    #[test]
    fn size_formatting_rejects_bad_spec(spec: &str) {
        assert!(matches!(
            format_size(Size::new(1), spec),
            Err(ReportError::InvalidFormat { spec: bad }) if bad == spec
        ));
    }

    #[test_case("D MMMM YYYY", "8 April 2023"; "default format")]
    #[test_case("ddd, MMM DD", "Sat, Apr 08"; "table format")]
    #[test_case("YYYY-MM-DD HH:mm:ss ZZ", "2023-04-08 02:05:09 -07:00"; "numeric format")]
    #[test_case("[at] h A", "at 2 AM"; "bracket literal")]
    #[test]
    fn date_formatting(format: &str, expect: &str) {
        assert_eq!(format_date(&stamp(), format), expect);
    }

    #[test]
    fn text_alignment() -> anyhow::Result<()> {
        assert_eq!(format_text("ada", "<6")?, "ada   ");
        assert_eq!(format_text("ada", ">6")?, "   ada");
        assert_eq!(format_text("ada", "^7")?, "  ada  ");
        assert_eq!(format_text("ada", "6")?, "ada   ");
        assert_eq!(format_text("toolongname", "4")?, "toolongname");
        Ok(())
    }

    #[test]
    fn render_nested_spec() -> anyhow::Result<()> {
        let template = BraceTemplate::new("D MMMM YYYY");
        assert_eq!(template.render("{name}: {size:{fmt}}", &row())?, "home: 3.0 MiB");
        Ok(())
    }

    #[test]
    fn render_dates_and_escapes() -> anyhow::Result<()> {
        let template = BraceTemplate::new("D MMMM YYYY");
        assert_eq!(
            template.render("{{{config}}} {last_create} {last_prune} {last_create:ddd}", &row())?,
            "{home} 8 April 2023 never Sat"
        );
        Ok(())
    }

    #[test]
    fn render_rejects_unknown_field() {
        let template = BraceTemplate::new("");
        assert!(matches!(
            template.render("{color}", &row()),
            Err(ReportError::UnknownField { field }) if field == "color"
        ));
    }

    #[test]
    fn render_rejects_unbalanced_braces() {
        let template = BraceTemplate::new("");
        assert!(matches!(
            template.render("{name", &row()),
            Err(ReportError::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            template.render("name}", &row()),
            Err(ReportError::UnbalancedBraces { .. })
        ));
    }
}
