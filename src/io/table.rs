//! Whitespace-separated table format for [`MultiPoisson`] models.
//!
//! ```text
//! # comment
//! sr1   sr2   lumi      <- optional header of bin labels
//! 3     5               <- observed counts
//! 0.11  0.09  20.1      <- response draw 1 (trailing per-draw luminosity)
//! 1.2   2.4             <- background draw 1
//! ...
//! ```
//!
//! Without a header the bin count is the number of tokens on the counts line.

use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::models::{CountingModel, Draw, MultiPoisson};

/// Header labels that mark a trailing per-draw luminosity column.
const LUMI_LABELS: [&str; 3] = ["lumi", "luminosity", "l"];

/// A non-blank, non-comment line: 1-based line number and its tokens.
#[derive(Debug, Clone)]
pub(crate) struct Row<'a> {
    pub line: usize,
    pub tokens: Vec<&'a str>,
}

/// Column layout resolved from the optional header.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub labels: Vec<String>,
    pub lumi_column: bool,
}

impl Layout {
    pub fn nbins(&self) -> usize {
        self.labels.len()
    }
}

/// Parsed table: header layout, observed counts, and the remaining data rows.
pub(crate) struct Preamble<'a> {
    pub layout: Layout,
    pub counts: Vec<u64>,
    pub rows: Vec<Row<'a>>,
}

pub fn read_table(path: &Path) -> Result<MultiPoisson, AppError> {
    let text = read_text(path)?;
    parse_table(&text).map_err(|e| in_file(path, e))
}

/// Parse a table into a model. Every row after the counts is one half of a
/// `(response, background)` pair.
pub fn parse_table(text: &str) -> Result<MultiPoisson, AppError> {
    let Preamble { layout, counts, rows } = parse_preamble(text)?;
    let nbins = layout.nbins();

    if rows.is_empty() {
        return Err(AppError::format("Table has counts but no response/background lines."));
    }
    if rows.len() % 2 != 0 {
        let last = &rows[rows.len() - 1];
        return Err(AppError::format(format!(
            "line {}: response line has no matching background line.",
            last.line
        )));
    }

    let mut draws = Vec::with_capacity(rows.len() / 2);
    for pair in rows.chunks(2) {
        let (resp_row, bkg_row) = (&pair[0], &pair[1]);
        let response_width = if layout.lumi_column { nbins + 1 } else { nbins };
        let mut response = parse_values(resp_row, response_width, "response")?;
        if layout.lumi_column {
            let lumi = response.pop().unwrap_or(1.0);
            for r in &mut response {
                *r *= lumi;
            }
        }
        let background = parse_values(bkg_row, nbins, "background")?;
        draws.push(Draw::new(response, background));
    }

    tracing::debug!(nbins, draws = draws.len(), lumi_column = layout.lumi_column, "table parsed");
    MultiPoisson::with_labels(layout.labels, counts, draws)
}

/// Headered table text for `model`. Floats use shortest round-trip formatting.
pub fn format_table(model: &MultiPoisson) -> String {
    let mut out = String::new();
    out.push_str(&model.labels().join(" "));
    out.push('\n');
    out.push_str(&join(model.counts()));
    out.push('\n');
    for draw in model.draws() {
        out.push_str(&join(&draw.response));
        out.push('\n');
        out.push_str(&join(&draw.background));
        out.push('\n');
    }
    out
}

pub fn write_table(path: &Path, model: &MultiPoisson) -> Result<(), AppError> {
    fs::write(path, format_table(model))
        .map_err(|e| AppError::io(format!("Failed to write table '{}': {e}", path.display())))
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

pub(crate) fn read_text(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|e| AppError::io(format!("Failed to read '{}': {e}", path.display())))
}

/// Prefix a parse error with the file it came from.
pub(crate) fn in_file(path: &Path, e: AppError) -> AppError {
    AppError::new(e.kind(), format!("{}: {}", path.display(), e.message()))
}

pub(crate) fn content_rows(text: &str) -> Vec<Row<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim().trim_start_matches('\u{feff}');
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            Some(Row {
                line: i + 1,
                tokens: trimmed.split_whitespace().collect(),
            })
        })
        .collect()
}

/// Header (if any) and counts line; shared by both input formats.
pub(crate) fn parse_preamble(text: &str) -> Result<Preamble<'_>, AppError> {
    let mut rows = content_rows(text).into_iter();
    let first = rows
        .next()
        .ok_or_else(|| AppError::format("Input is empty; expected a counts line."))?;

    let (layout, counts_row) = if first.tokens.iter().any(|t| t.parse::<f64>().is_err()) {
        let layout = layout_from_header(&first)?;
        let counts_row = rows.next().ok_or_else(|| {
            AppError::format(format!("line {}: header is not followed by a counts line.", first.line))
        })?;
        (layout, counts_row)
    } else {
        let labels = (1..=first.tokens.len()).map(|i| format!("bin{i}")).collect();
        (
            Layout {
                labels,
                lumi_column: false,
            },
            first,
        )
    };

    let counts = parse_counts(&counts_row, layout.nbins())?;
    Ok(Preamble {
        layout,
        counts,
        rows: rows.collect(),
    })
}

fn layout_from_header(header: &Row<'_>) -> Result<Layout, AppError> {
    let mut labels: Vec<String> = header.tokens.iter().map(|t| t.to_string()).collect();
    let lumi_column = labels
        .last()
        .is_some_and(|l| LUMI_LABELS.contains(&l.to_ascii_lowercase().as_str()));
    if lumi_column {
        labels.pop();
    }
    if labels.is_empty() {
        return Err(AppError::format(format!(
            "line {}: header names no bins besides the luminosity column.",
            header.line
        )));
    }
    Ok(Layout { labels, lumi_column })
}

fn check_width(row: &Row<'_>, expected: usize, what: &str) -> Result<(), AppError> {
    if row.tokens.len() != expected {
        return Err(AppError::format(format!(
            "line {}: {what} line has {} values; expected {expected}.",
            row.line,
            row.tokens.len()
        )));
    }
    Ok(())
}

pub(crate) fn parse_counts(row: &Row<'_>, nbins: usize) -> Result<Vec<u64>, AppError> {
    check_width(row, nbins, "counts")?;
    row.tokens
        .iter()
        .map(|tok| {
            let v: f64 = tok
                .parse()
                .map_err(|_| AppError::format(format!("line {}: count '{tok}' is not a number.", row.line)))?;
            if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v > u64::MAX as f64 {
                return Err(AppError::format(format!(
                    "line {}: count '{tok}' is not a non-negative integer.",
                    row.line
                )));
            }
            Ok(v as u64)
        })
        .collect()
}

pub(crate) fn parse_values(row: &Row<'_>, expected: usize, what: &str) -> Result<Vec<f64>, AppError> {
    check_width(row, expected, what)?;
    row.tokens
        .iter()
        .map(|tok| {
            let v: f64 = tok
                .parse()
                .map_err(|_| AppError::format(format!("line {}: {what} value '{tok}' is not a number.", row.line)))?;
            if !v.is_finite() {
                return Err(AppError::format(format!("line {}: {what} value '{tok}' is not finite.", row.line)));
            }
            Ok(v)
        })
        .collect()
}
