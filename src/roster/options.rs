// src/roster/options.rs

use std::collections::HashSet;

use super::{collate, parse::Record};

/// Distinct non-empty values of `column`, optionally in Spanish collation
/// order. Unsorted output keeps first-seen order. A column no record has
/// yields an empty set.
pub fn option_set(records: &[Record], column: &str, sort: bool) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut values: Vec<String> = records
        .iter()
        .map(|r| r.get(column))
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .map(str::to_string)
        .collect();
    if sort {
        values.sort_by(|a, b| collate::compare(a, b));
    }
    values
}
