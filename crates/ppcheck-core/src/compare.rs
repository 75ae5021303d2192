//! Line-by-line comparison of actual and expected result lines.
//!
//! Lines are compared positionally. Expected text is literal except for the
//! marker `capacity=*`, which matches `capacity=` followed by one or more
//! ASCII digits. Matching is anchored at both ends.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stand-in for a line one side does not have.
pub const MISSING: &str = "<missing>";

/// Wildcard marker allowed in expected lines.
pub const WILDCARD_MARKER: &str = "capacity=*";

const WILDCARD_PATTERN: &str = "capacity=[0-9]+";

/// A line that did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// 1-based line number.
    pub line: usize,
    pub actual: String,
    pub expected: String,
}

/// Whether `actual` satisfies the `expected` line.
pub fn line_matches(actual: &str, expected: &str) -> bool {
    if !expected.contains(WILDCARD_MARKER) {
        return actual == expected;
    }

    let pattern = regex::escape(expected).replace(&regex::escape(WILDCARD_MARKER), WILDCARD_PATTERN);
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => re.is_match(actual),
        Err(_) => false,
    }
}

/// Compare two line sequences; an empty result means they match.
pub fn compare<A, E>(actual: &[A], expected: &[E]) -> Vec<Mismatch>
where
    A: AsRef<str>,
    E: AsRef<str>,
{
    let len = actual.len().max(expected.len());
    (0..len)
        .filter_map(|i| {
            let act = actual.get(i).map(|l| l.as_ref().trim()).unwrap_or(MISSING);
            let exp = expected.get(i).map(|l| l.as_ref().trim()).unwrap_or(MISSING);
            if line_matches(act, exp) {
                None
            } else {
                Some(Mismatch {
                    line: i + 1,
                    actual: act.to_string(),
                    expected: exp.to_string(),
                })
            }
        })
        .collect()
}
