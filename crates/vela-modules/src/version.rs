//! Module version ordering
//!
//! Module versions are free-form strings. They are ordered segment by
//! segment: numeric segments compare numerically, anything else compares
//! lexicographically.

use std::cmp::Ordering;
use std::fmt;

/// One segment of a version string (`1`, `2`, `Final` in `1.2.Final`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSegment<'a> {
    /// Segment made only of ASCII digits
    Numeric(u64),

    /// Any other segment
    Text(&'a str),
}

impl<'a> VersionSegment<'a> {
    fn parse(s: &'a str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return VersionSegment::Numeric(n);
            }
        }
        VersionSegment::Text(s)
    }
}

impl fmt::Display for VersionSegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSegment::Numeric(n) => write!(f, "{}", n),
            VersionSegment::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Split a version string into its segments
pub fn segments(version: &str) -> impl Iterator<Item = VersionSegment<'_>> {
    version.split(['.', '-']).map(VersionSegment::parse)
}

/// Compare two version strings
///
/// `1.2` < `1.10`, `1.0` < `1.0.1`, `1.0.a` < `1.0.b`. A numeric segment
/// compared against a text segment falls back to comparing their text.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (&l, &r) {
                    (VersionSegment::Numeric(x), VersionSegment::Numeric(y)) => x.cmp(y),
                    _ => l.to_string().cmp(&r.to_string()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Return both versions, lowest first
pub fn order_versions<'a>(a: &'a str, b: &'a str) -> [&'a str; 2] {
    if compare_versions(a, b) == Ordering::Greater {
        [b, a]
    } else {
        [a, b]
    }
}
