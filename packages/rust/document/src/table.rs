//! Pipe-table extraction.
//!
//! The corpus leans on small Markdown tables for anything tabular:
//! advancement rows, language families, benefit thresholds. Cell text is
//! kept verbatim except where a caller asks for link or bold stripping.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::text::{slugify, strip_bold, strip_markdown_links};

/// One row of a threshold table: the value that must be reached and the
/// benefit gained at that value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenefitRow {
    pub threshold: i64,
    pub benefit: String,
}

/// A table found under a `####`..`######` heading, rows keyed by the raw
/// header text.
#[derive(Debug, Clone, Serialize)]
pub struct HeadingTable {
    pub name: String,
    pub headers: Vec<String>,
    pub data: Vec<Map<String, Value>>,
}

static TABLE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{4,6}\s+(.+?)\s*$").expect("valid regex"));

static LEADING_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?(\d+)").expect("valid regex"));

/// Split a pipe-delimited line into trimmed cells, dropping the empties
/// produced by the outer pipes.
pub fn row_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// True for the `| --- | --- |` divider between header and data rows.
pub fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-') && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Rows of a table keyed by snake_case header names.
///
/// Short rows are padded with empty strings so every row carries every
/// key; columns with blank headers are dropped.
pub fn keyed_rows(table: &str) -> Vec<Map<String, Value>> {
    let mut lines = table.trim().lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let keys: Vec<String> = row_cells(header_line)
        .iter()
        .map(|header| slugify(header).replace('-', "_"))
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        if is_separator_row(line) {
            continue;
        }
        let cells = row_cells(line);
        let mut row = Map::new();
        for (i, key) in keys.iter().enumerate() {
            if key.is_empty() {
                continue;
            }
            let cell = cells.get(i).cloned().unwrap_or_default();
            row.insert(key.clone(), Value::String(cell));
        }
        rows.push(row);
    }
    rows
}

/// The first pipe table under a heading whose text starts with `name`.
pub fn named_table(content: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?s)#{{1,6}}\s+{}.*?\n\n((?:\|[^\n]+\n?)+)",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).expect("valid regex");
    re.captures(content).map(|caps| caps[1].to_string())
}

/// Every pipe table living directly under a `####`..`######` heading.
pub fn heading_tables(content: &str) -> Vec<HeadingTable> {
    let headings: Vec<(String, usize, usize)> = TABLE_HEADING_RE
        .captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).expect("match");
            (caps[1].to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut tables = Vec::new();
    for (i, (name, _, body_start)) in headings.iter().enumerate() {
        let body_end = headings.get(i + 1).map_or(content.len(), |next| next.1);
        let section = &content[*body_start..body_end];
        let rows: Vec<&str> = section
            .lines()
            .filter(|line| line.contains('|') && !line.trim_start().starts_with('>'))
            .collect();
        if rows.len() < 2 {
            continue;
        }

        let headers = row_cells(rows[0]);
        let data_start = if is_separator_row(rows[1]) { 2 } else { 1 };
        let mut data = Vec::new();
        for line in &rows[data_start..] {
            let cells = row_cells(line);
            if cells.len() != headers.len() {
                continue;
            }
            let mut row = Map::new();
            for (header, cell) in headers.iter().zip(&cells) {
                row.insert(header.clone(), Value::String(cell.clone()));
            }
            data.push(row);
        }
        tables.push(HeadingTable { name: name.clone(), headers, data });
    }
    tables
}

/// Interpret a two-column table as threshold/benefit pairs.
///
/// Rows whose first cell does not open with an integer (headers,
/// dividers) are dropped; benefit text keeps its wording with links and
/// bold unwrapped.
pub fn benefit_rows(table: &str) -> Vec<BenefitRow> {
    let mut rows = Vec::new();
    for line in table.lines() {
        if !line.contains('|') || is_separator_row(line) {
            continue;
        }
        let cells = row_cells(line);
        if cells.len() < 2 {
            continue;
        }
        let first = strip_bold(&cells[0]);
        let Some(caps) = LEADING_INT_RE.captures(first.trim()) else {
            continue;
        };
        let Ok(threshold) = caps[1].parse() else {
            continue;
        };
        rows.push(BenefitRow {
            threshold,
            benefit: strip_markdown_links(&strip_bold(&cells[1])),
        });
    }
    rows
}
