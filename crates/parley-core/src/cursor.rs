//! # Pagination Cursors
//!
//! Parsing of the header-based pagination metadata returned by
//! `GET /comments`.
//!
//! ## Cursor Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cursor Header Handling                             │
//! │                                                                         │
//! │  x-next-cursor: "eyJpZCI6..."        → Cursor::Opaque   (?cursor=...)   │
//! │  x-next-cursor: "2024-05-01T10:00Z"  → Cursor::Before   (?before=...)   │
//! │  x-next-cursor: "" / missing / junk  → None                             │
//! │                                                                         │
//! │  x-has-more: "true" | "1"            → more available                   │
//! │  x-has-more: anything else / missing → no more pages                    │
//! │                                                                         │
//! │  has_more = flag AND cursor present                                     │
//! │  (a "more" flag without a usable cursor cannot be followed)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Opaque cursors are passed back to the server byte-for-byte; the client
//! never inspects or rewrites them.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{Item, Page};

/// Longest cursor value accepted from a response header.
pub const MAX_CURSOR_LENGTH: usize = 512;

// =============================================================================
// Cursor
// =============================================================================

/// Position to resume pagination from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Server-issued opaque continuation token (preferred).
    Opaque(String),

    /// Legacy timestamp cursor: load items created before this instant.
    Before(DateTime<Utc>),
}

impl Cursor {
    /// Parses a cursor from its wire form.
    ///
    /// Returns `None` for empty, oversized, or non-printable values so that a
    /// malformed header reads as "no more pages".
    pub fn parse(value: &str) -> Option<Cursor> {
        let value = value.trim();

        if value.is_empty() || value.len() > MAX_CURSOR_LENGTH {
            return None;
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return None;
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Some(Cursor::Before(ts.with_timezone(&Utc)));
        }

        Some(Cursor::Opaque(value.to_string()))
    }

    /// Returns the query parameter name and value for this cursor.
    pub fn query_pair(&self) -> (&'static str, String) {
        match self {
            Cursor::Opaque(token) => ("cursor", token.clone()),
            Cursor::Before(ts) => {
                // Millisecond form unless that would drop sub-ms precision.
                let format = if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
                    SecondsFormat::Millis
                } else {
                    SecondsFormat::AutoSi
                };
                ("before", ts.to_rfc3339_opts(format, true))
            }
        }
    }

    /// Returns true for timestamp cursors.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Cursor::Before(_))
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (_, value) = self.query_pair();
        write!(f, "{}", value)
    }
}

// =============================================================================
// Header Parsing
// =============================================================================

/// Interprets the `x-has-more` header.
pub fn parse_has_more(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) => v.eq_ignore_ascii_case("true") || v == "1",
        None => false,
    }
}

/// Builds a page from response items and raw pagination headers.
pub fn page_from_headers(
    items: Vec<Item>,
    next_cursor: Option<&str>,
    has_more: Option<&str>,
) -> Page {
    let cursor = next_cursor.and_then(Cursor::parse);
    let more = parse_has_more(has_more) && cursor.is_some();

    Page {
        items,
        next_cursor: if more { cursor } else { None },
        has_more: more,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_opaque_cursor() {
        assert_eq!(
            Cursor::parse("eyJpZCI6IjQyIn0="),
            Some(Cursor::Opaque("eyJpZCI6IjQyIn0=".to_string()))
        );
        assert_eq!(
            Cursor::parse("  abc123  "),
            Some(Cursor::Opaque("abc123".to_string()))
        );
    }

    #[test]
    fn test_legacy_cursor_keeps_sub_millisecond_precision() {
        for wire in ["2024-05-01T10:00:00.123456Z", "2024-05-01T10:00:00.123456789Z"] {
            let cursor = Cursor::parse(wire).unwrap();
            assert_eq!(cursor.query_pair(), ("before", wire.to_string()));
            assert_eq!(Cursor::parse(&cursor.to_string()), Some(cursor));
        }
    }

    #[test]
    fn test_parse_legacy_cursor() {
        let cursor = Cursor::parse("2024-05-01T10:00:00Z").unwrap();
        assert!(cursor.is_legacy());
        assert_eq!(
            cursor,
            Cursor::Before(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            cursor.query_pair(),
            ("before", "2024-05-01T10:00:00.000Z".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Cursor::parse(""), None);
        assert_eq!(Cursor::parse("   "), None);
        assert_eq!(Cursor::parse("has space"), None);
        assert_eq!(Cursor::parse("tab\there"), None);
        assert_eq!(Cursor::parse("naïve"), None);
        assert_eq!(Cursor::parse(&"a".repeat(MAX_CURSOR_LENGTH + 1)), None);
    }

    #[test]
    fn test_parse_has_more() {
        assert!(parse_has_more(Some("true")));
        assert!(parse_has_more(Some("TRUE")));
        assert!(parse_has_more(Some(" 1 ")));
        assert!(!parse_has_more(Some("false")));
        assert!(!parse_has_more(Some("0")));
        assert!(!parse_has_more(Some("yes")));
        assert!(!parse_has_more(None));
    }

    #[test]
    fn test_page_requires_cursor_and_flag() {
        let page = page_from_headers(Vec::new(), Some("next-1"), Some("true"));
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(Cursor::Opaque("next-1".into())));

        // Flag without cursor cannot be followed.
        let page = page_from_headers(Vec::new(), None, Some("true"));
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);

        // Garbage cursor.
        let page = page_from_headers(Vec::new(), Some("not a cursor"), Some("1"));
        assert!(!page.has_more);

        // Cursor without flag: exhausted.
        let page = page_from_headers(Vec::new(), Some("next-1"), None);
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }
}
