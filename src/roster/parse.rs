// src/roster/parse.rs

use csv::{ReaderBuilder, Trim};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// One CSV data row keyed by normalized header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Value of `column` (normalized before lookup); `""` when absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .get(&normalize_header(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    TooFewFields { expected: usize, found: usize },
    TooManyFields { expected: usize, found: usize },
    DuplicateHeader(String),
}

/// A row-level problem. Never fatal: the row is kept, padded or truncated,
/// and parsing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line in the source text, when the reader knows it.
    pub line: Option<u64>,
    pub kind: IssueKind,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(l) = self.line {
            write!(f, "line {}: ", l)?;
        }
        match &self.kind {
            IssueKind::TooFewFields { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            IssueKind::TooManyFields { expected, found } => {
                write!(f, "expected {} fields, found {} (extra dropped)", expected, found)
            }
            IssueKind::DuplicateHeader(h) => write!(f, "duplicate header {:?} ignored", h),
        }
    }
}

/// Output of [`parse_records`].
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    pub issues: Vec<ParseIssue>,
}

/// Header tokens are compared trimmed and lower-cased.
pub fn normalize_header(raw: &str) -> String {
    clean_str(raw).to_lowercase()
}

/// Trim whitespace, and a stray UTF-8 BOM left on the first header.
fn clean_str(raw: &str) -> &str {
    raw.trim().trim_start_matches('\u{feff}').trim()
}

/// Parse CSV text whose first line is the header into records.
///
/// Blank lines, and lines whose every field is blank, produce no record.
/// Short rows are padded with `""`, long rows truncated; both are reported as
/// issues.
pub fn parse_records(text: &str) -> ParsedCsv {
    let mut out = ParsedCsv::default();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    // Input is already UTF-8 in memory and the reader is flexible, so the
    // reader has no decode or field-count errors left to report.
    let header = rdr.headers().cloned().unwrap_or_default();

    // header → column position; first occurrence wins
    let mut slots: Vec<Option<String>> = Vec::new();
    for raw in header.iter() {
        let name = normalize_header(raw);
        if name.is_empty() || out.headers.contains(&name) {
            if !name.is_empty() {
                out.issues.push(ParseIssue {
                    line: Some(1),
                    kind: IssueKind::DuplicateHeader(name),
                });
            }
            slots.push(None);
        } else {
            out.headers.push(name.clone());
            slots.push(Some(name));
        }
    }

    let expected = slots.len();
    for row in rdr.records().flatten() {

        if row.iter().all(|v| clean_str(v).is_empty()) {
            continue;
        }

        let line = row.position().map(|p| p.line());
        let found = row.len();
        if found < expected {
            out.issues.push(ParseIssue {
                line,
                kind: IssueKind::TooFewFields { expected, found },
            });
        } else if found > expected {
            out.issues.push(ParseIssue {
                line,
                kind: IssueKind::TooManyFields { expected, found },
            });
        }

        let mut fields = BTreeMap::new();
        for (i, slot) in slots.iter().enumerate() {
            if let Some(name) = slot {
                let value = row.get(i).map(clean_str).unwrap_or("");
                fields.insert(name.clone(), value.to_string());
            }
        }
        out.records.push(Record { fields });
    }

    for issue in &out.issues {
        warn!(%issue, "CSV parse issue");
    }
    debug!(
        headers = out.headers.len(),
        records = out.records.len(),
        issues = out.issues.len(),
        "parsed CSV"
    );
    out
}
