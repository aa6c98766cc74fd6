// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Size history graphs.
//!
//! Each repository with recorded history becomes a __trace__: its recorded
//! sizes over time. Traces are ordered by last recorded size, largest
//! first, so the legend of a plot reads from biggest to smallest.

use crate::{
    record::Size,
    report::{format::format_size, ReportError},
    resolve::ResolvedRepository,
    store::{RecordStore, RemoteReader},
};

use chrono::{DateTime, FixedOffset};
use std::{fmt::Write as _, fs::write, path::{Path, PathBuf}};
use tracing::{info, warn};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 500.0;
const LEFT: f64 = 90.0;
const RIGHT: f64 = 20.0;
const TOP: f64 = 20.0;
const BOTTOM: f64 = 40.0;
const LINEAR_TICKS: usize = 5;
const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

/// Recorded size history of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub name: String,

    /// Most recently recorded size.
    pub last: Size,

    /// Recorded sizes, oldest first.
    pub points: Vec<(DateTime<FixedOffset>, Size)>,
}

/// Load history of each repository into traces, largest last size first.
///
/// Repositories without usable history are skipped.
pub fn collect_traces<R>(store: &RecordStore<R>, repos: &[ResolvedRepository]) -> Vec<Trace>
where
    R: RemoteReader,
{
    let mut traces = repos
        .iter()
        .filter_map(|repo| {
            let history = match store.history(repo) {
                Ok(history) => history,
                Err(err) => {
                    warn!("skip {}: {err}", repo.as_full_spec());
                    return None;
                }
            };

            let points = history
                .into_iter()
                .map(|record| (record.timestamp, record.size))
                .collect::<Vec<_>>();
            let (_, last) = *points.last()?;
            Some(Trace {
                name: repo.name().into(),
                last,
                points,
            })
        })
        .collect::<Vec<_>>();

    traces.sort_by(|a, b| b.last.cmp(&a.last));
    traces
}

/// Textual summary of traces, one line each.
///
/// Traces without points are left out.
///
/// # Errors
///
/// - Return [`GraphError::NoHistory`] if no trace has points.
pub fn summarize(traces: &[Trace]) -> Result<String> {
    let mut lines = Vec::with_capacity(traces.len());
    for trace in traces {
        let (Some((first, _)), Some((last, _))) = (trace.points.first(), trace.points.last()) else {
            continue;
        };

        lines.push(format!(
            "{}: {} ({} records, {} to {})",
            trace.name,
            format_size(trace.last, ".2s")?,
            trace.points.len(),
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d"),
        ));
    }

    if lines.is_empty() {
        return Err(GraphError::NoHistory);
    }

    Ok(lines.join("\n"))
}

/// Draw traces into a document.
pub trait Plot {
    /// Render traces.
    fn plot(&self, traces: &[Trace]) -> Result<String>;

    /// Render traces into file at path.
    ///
    /// # Errors
    ///
    /// - Return [`GraphError::WriteGraph`] if file cannot be written.
    fn plot_to(&self, traces: &[Trace], path: &Path) -> Result<()> {
        let document = self.plot(traces)?;
        write(path, document).map_err(|source| GraphError::WriteGraph {
            source,
            path: path.to_path_buf(),
        })?;
        info!("wrote graph to {:?}", path.display());
        Ok(())
    }
}

/// SVG line plot of traces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SvgPlot {
    log_y: bool,
}

impl SvgPlot {
    pub fn new(log_y: bool) -> Self {
        Self { log_y }
    }
}

impl Plot for SvgPlot {
    fn plot(&self, traces: &[Trace]) -> Result<String> {
        let frame = Frame::fit(traces, self.log_y).ok_or(GraphError::NoHistory)?;

        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
        )?;
        writeln!(svg, r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#)?;
        writeln!(
            svg,
            r#"<path d="M{LEFT},{TOP} V{} H{}" fill="none" stroke="black"/>"#,
            HEIGHT - BOTTOM,
            WIDTH - RIGHT
        )?;

        for value in frame.y_ticks() {
            let y = frame.y(value);
            let label = format_size(frame.size(value), ".1s")?;
            writeln!(
                svg,
                r##"<line x1="{LEFT}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="#dddddd"/>"##,
                WIDTH - RIGHT
            )?;
            writeln!(
                svg,
                r#"<text x="{}" y="{:.1}" text-anchor="end">{label}</text>"#,
                LEFT - 6.0,
                y + 4.0
            )?;
        }

        for (date, anchor) in [(frame.start, "start"), (frame.end, "end")] {
            writeln!(
                svg,
                r#"<text x="{:.1}" y="{}" text-anchor="{anchor}">{}</text>"#,
                frame.x(&date),
                HEIGHT - BOTTOM + 18.0,
                date.format("%Y-%m-%d")
            )?;
        }

        let drawn = traces.iter().filter(|trace| !trace.points.is_empty());
        for (index, trace) in drawn.enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            let points = trace
                .points
                .iter()
                .map(|(date, size)| format!("{:.1},{:.1}", frame.x(date), frame.y(frame.value(*size))))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                svg,
                r#"<polyline points="{points}" fill="none" stroke="{color}" stroke-width="1.5"/>"#
            )?;

            let y = TOP + 16.0 * (index as f64 + 1.0);
            writeln!(
                svg,
                r#"<text x="{}" y="{y}" fill="{color}">{} ({})</text>"#,
                LEFT + 10.0,
                escape(&trace.name),
                format_size(trace.last, ".2s")?
            )?;
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

// Data to canvas mapping.
#[derive(Debug, Clone, Copy)]
struct Frame {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    low: f64,
    high: f64,
    log_y: bool,
}

impl Frame {
    fn fit(traces: &[Trace], log_y: bool) -> Option<Self> {
        let points = traces.iter().flat_map(|trace| trace.points.iter());
        let start = points.clone().map(|(date, _)| *date).min()?;
        let end = points.clone().map(|(date, _)| *date).max()?;
        let smallest = points.clone().map(|(_, size)| *size).min()?;
        let largest = points.map(|(_, size)| *size).max()?;

        let mut frame = Self {
            start,
            end,
            low: 0.0,
            high: 0.0,
            log_y,
        };

        if log_y {
            frame.low = frame.value(smallest).floor();
            frame.high = frame.value(largest).ceil().max(frame.low + 1.0);
        } else {
            frame.high = (largest.bytes() as f64).max(1.0);
        }

        Some(frame)
    }

    fn value(&self, size: Size) -> f64 {
        if self.log_y {
            (size.bytes().max(1) as f64).log10()
        } else {
            size.bytes() as f64
        }
    }

    // Inverse of value.
    fn size(&self, value: f64) -> Size {
        let bytes = if self.log_y { 10_f64.powf(value) } else { value };
        Size::new(bytes.round() as u64)
    }

    fn x(&self, date: &DateTime<FixedOffset>) -> f64 {
        let span = (self.end - self.start).num_seconds();
        if span == 0 {
            return LEFT + (WIDTH - LEFT - RIGHT) / 2.0;
        }

        let offset = (*date - self.start).num_seconds();
        LEFT + offset as f64 / span as f64 * (WIDTH - LEFT - RIGHT)
    }

    fn y(&self, value: f64) -> f64 {
        let fraction = (value - self.low) / (self.high - self.low);
        HEIGHT - BOTTOM - fraction * (HEIGHT - TOP - BOTTOM)
    }

    // Tick positions in plotted units.
    fn y_ticks(&self) -> Vec<f64> {
        if self.log_y {
            return (self.low as i32..=self.high as i32)
                .map(f64::from)
                .collect();
        }

        (0..LINEAR_TICKS)
            .map(|step| self.low + (self.high - self.low) * step as f64 / (LINEAR_TICKS - 1) as f64)
            .collect()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Graph error types.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// None of the repositories have recorded history.
    #[error("no recorded size history to graph, use --record to start one")]
    NoHistory,

    /// Graph document cannot be written.
    #[error("failed to write graph to {:?}", path.display())]
    WriteGraph {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Graph document cannot be built.
    #[error(transparent)]
    Format(#[from] std::fmt::Error),

    /// Size cannot be formatted.
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Friendly result alias :3
type Result<T, E = GraphError> = std::result::Result<T, E>;
