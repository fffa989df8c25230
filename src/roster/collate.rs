// src/roster/collate.rs
//
// Spanish-aware ordering for dropdown values. Three levels, compared in turn:
// base letters (accents folded, ñ its own letter after n), then accents, then
// case with lower case first. At the first level whitespace sorts before
// punctuation and symbols, those before digits, digits before letters.

use std::{cmp::Ordering, iter};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Base letter of `c` and whether it carried a diacritic.
fn fold(c: char) -> (char, bool) {
    match c {
        'ñ' | 'Ñ' => return ('ñ', false),
        'ø' | 'Ø' => return ('o', true),
        'đ' | 'Đ' => return ('d', true),
        'ł' | 'Ł' => return ('l', true),
        _ => {}
    }
    let mut parts = iter::once(c).nfd();
    let base = parts.next().unwrap_or(c);
    let marked = parts.any(is_combining_mark);
    (base.to_lowercase().next().unwrap_or(base), marked)
}

/// Primary weight: character class first, then the base letter, with ñ
/// slotted between n and o.
fn primary(c: char) -> u64 {
    let (base, _) = fold(c);
    let class: u64 = if base.is_whitespace() {
        0
    } else if base.is_alphabetic() {
        3
    } else if base.is_numeric() {
        2
    } else {
        1
    };
    let weight = match base {
        'ñ' => ('n' as u64) * 2 + 1,
        b => (b as u64) * 2,
    };
    (class << 32) | weight
}

fn secondary(c: char) -> bool {
    fold(c).1
}

fn tertiary(c: char) -> bool {
    c.is_uppercase()
}

/// Compare two strings the way a Spanish-locale `localeCompare` orders them.
pub fn compare(a: &str, b: &str) -> Ordering {
    let by = |f: &dyn Fn(char) -> u64| a.chars().map(f).cmp(b.chars().map(f));
    by(&primary)
        .then_with(|| by(&|c| secondary(c) as u64))
        .then_with(|| by(&|c| tertiary(c) as u64))
        .then_with(|| a.cmp(b))
}
