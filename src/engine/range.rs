//! Page range text parsing
//!
//! Turns user text such as `"1-3,5,10-12"` into zero-based page indices.
//! Parsing is lenient: malformed or out-of-range tokens are dropped and
//! counted instead of failing the whole specifier.

use std::collections::BTreeSet;

/// Result of parsing a range specifier against a page count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSelection {
    /// Zero-based page indices, all `< page_count`
    pub indices: BTreeSet<usize>,
    /// Tokens that were malformed or selected no page
    pub dropped: usize,
}

/// Parse a comma-separated list of 1-based pages and inclusive ranges.
///
/// Supports:
/// - `N` (single page)
/// - `A-B` (inclusive range, endpoints in either order, clamped to the document)
///
/// Whitespace anywhere in the text is ignored, as are empty tokens.
pub fn parse_range(spec: &str, page_count: usize) -> RangeSelection {
    let compact: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    let mut selection = RangeSelection::default();
    let max = page_count as i64;

    for token in compact.split(',') {
        if token.is_empty() {
            continue;
        }

        // 1-based inclusive bounds already clamped to the document
        let bounds = match token.split_once('-') {
            Some((a, b)) => {
                parse_span(a, b).map(|(a, b)| (a.min(b).max(1), a.max(b).min(max)))
            }
            None => token
                .parse::<i64>()
                .ok()
                .filter(|v| (1..=max).contains(v))
                .map(|v| (v, v)),
        };

        match bounds {
            Some((lo, hi)) if lo <= hi => {
                selection
                    .indices
                    .extend((lo as usize - 1)..=(hi as usize - 1));
            }
            _ => selection.dropped += 1,
        }
    }

    selection
}

/// Both halves of `A-B` must be integers; `"-5"`, `"1-"` and `"1-2-3"` are not.
fn parse_span(a: &str, b: &str) -> Option<(i64, i64)> {
    Some((a.parse().ok()?, b.parse().ok()?))
}
