//! # Validation Module
//!
//! Input validation for everything a caller hands to the session core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host application                                             │
//! │  └── Basic form checks, immediate user feedback                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any token or network call)               │
//! │  ├── Thread key format + entropy heuristics                            │
//! │  ├── Comment body length                                               │
//! │  ├── Reaction kind format                                              │
//! │  └── Page size clamping (never rejects)                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Comments service                                             │
//! │  └── Moderation, rate limits, tenant rules                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Entropy Checks?
//! Thread keys double as capability names: anyone who can guess a key can
//! read the discussion. Keys like `my-blog-post` or `1234567890123456` are
//! rejected locally so they never reach the service.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::keys::{is_synthetic_key, SYNTHETIC_KEY_PREFIX};
use crate::{MAX_BODY_LENGTH, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum thread key length (characters).
pub const MIN_THREAD_KEY_LENGTH: usize = 16;

/// Maximum thread key length (characters).
pub const MAX_THREAD_KEY_LENGTH: usize = 128;

/// Minimum number of distinct characters in a thread key.
const MIN_DISTINCT_CHARS: usize = 8;

/// Minimum Shannon entropy per character (bits).
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Longest allowed run of one repeated character (`0000` is fine, `00000` is not).
const MAX_REPEAT_RUN: usize = 4;

/// Longest allowed ascending run (`1234` is fine, `12345` is not).
const MAX_SEQUENTIAL_RUN: usize = 4;

/// Maximum reaction kind length.
const MAX_REACTION_LENGTH: usize = 32;

// =============================================================================
// Thread Key Validation
// =============================================================================

/// Validates a thread (resource) key.
///
/// ## Rules
/// - Must not be empty
/// - 16 to 128 characters
/// - Only ASCII letters, digits, `-`, `_`, `.`, `:`
/// - Must not use the reserved `sys:` prefix
/// - At least two character classes (lowercase, uppercase, digit)
/// - At least 8 distinct characters and 3.0 bits of entropy per character
/// - No run of more than 4 identical or 4 ascending characters
///
/// ## Example
/// ```rust
/// use parley_core::validation::validate_thread_key;
///
/// assert!(validate_thread_key("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_thread_key("my-blog-post-about-rust").is_err());
/// ```
pub fn validate_thread_key(key: &str) -> ValidationResult<()> {
    let field = "thread_key";
    let key = key.trim();

    if key.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let len = key.chars().count();
    if len < MIN_THREAD_KEY_LENGTH {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: MIN_THREAD_KEY_LENGTH,
        });
    }
    if len > MAX_THREAD_KEY_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_THREAD_KEY_LENGTH,
        });
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, digits, '-', '_', '.' and ':'".to_string(),
        });
    }

    if is_synthetic_key(key) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("the '{}' prefix is reserved", SYNTHETIC_KEY_PREFIX),
        });
    }

    let low_entropy = |reason: &str| ValidationError::LowEntropy {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if character_classes(key) < 2 {
        return Err(low_entropy("must mix letters and digits or letter cases"));
    }

    if distinct_chars(key) < MIN_DISTINCT_CHARS {
        return Err(low_entropy("too few distinct characters"));
    }

    if shannon_entropy(key) < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(low_entropy("character distribution is too uniform"));
    }

    if longest_repeat_run(key) > MAX_REPEAT_RUN {
        return Err(low_entropy("contains a long run of repeated characters"));
    }

    if longest_sequential_run(key) > MAX_SEQUENTIAL_RUN {
        return Err(low_entropy("contains a long ascending sequence"));
    }

    Ok(())
}

/// Counts how many of {lowercase, uppercase, digit} appear.
fn character_classes(s: &str) -> usize {
    let lower = s.chars().any(|c| c.is_ascii_lowercase());
    let upper = s.chars().any(|c| c.is_ascii_uppercase());
    let digit = s.chars().any(|c| c.is_ascii_digit());
    [lower, upper, digit].iter().filter(|&&b| b).count()
}

fn distinct_chars(s: &str) -> usize {
    let mut seen: Vec<char> = s.chars().collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }

    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn longest_repeat_run(s: &str) -> usize {
    longest_run(s, |prev, cur| prev == cur)
}

/// Longest run of alphanumerics where each char is the previous one plus one.
fn longest_sequential_run(s: &str) -> usize {
    longest_run(s, |prev, cur| {
        prev.is_ascii_alphanumeric() && cur.is_ascii_alphanumeric() && cur as u32 == prev as u32 + 1
    })
}

fn longest_run(s: &str, continues: impl Fn(char, char) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    let mut prev: Option<char> = None;

    for c in s.chars() {
        current = match prev {
            Some(p) if continues(p, c) => current + 1,
            _ => 1,
        };
        best = best.max(current);
        prev = Some(c);
    }

    best
}

// =============================================================================
// Content Validators
// =============================================================================

/// Validates a comment body.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_BODY_LENGTH` (4000) characters
///
/// ## Returns
/// The trimmed body.
pub fn validate_body(body: &str) -> ValidationResult<String> {
    let body = body.trim();

    if body.is_empty() {
        return Err(ValidationError::Required {
            field: "body".to_string(),
        });
    }

    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "body".to_string(),
            max: MAX_BODY_LENGTH,
        });
    }

    Ok(body.to_string())
}

/// Validates a reaction kind (e.g. `like`, `laugh`, `👍`).
///
/// ## Rules
/// - Must not be empty
/// - At most 32 characters
/// - No whitespace or control characters
pub fn validate_reaction_kind(kind: &str) -> ValidationResult<()> {
    if kind.is_empty() {
        return Err(ValidationError::Required {
            field: "reaction".to_string(),
        });
    }

    if kind.chars().count() > MAX_REACTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reaction".to_string(),
            max: MAX_REACTION_LENGTH,
        });
    }

    if kind.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: "reaction".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a comment id passed to report/react.
pub fn validate_comment_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "comment_id".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Helpers
// =============================================================================

/// Clamps a requested page size into `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`.
///
/// Out-of-range values are never rejected.
pub fn clamp_page_size(requested: i64) -> u32 {
    requested.clamp(MIN_PAGE_SIZE as i64, MAX_PAGE_SIZE as i64) as u32
}

// =============================================================================
// Unit Tests
// =============================================================================
