//! # Error Types
//!
//! Domain-specific error types for parley-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  parley-core errors (this file)                                        │
//! │  ├── CoreError        - Comment list / reaction rule violations        │
//! │  └── ValidationError  - Caller input rejected before any network call  │
//! │                                                                         │
//! │  parley-sync errors (separate crate)                                   │
//! │  ├── AuthError        - Token negotiation failures                     │
//! │  └── SyncError        - Everything a session call can return           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → host application      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Comment model errors.
///
/// Raised by the optimistic list when the caller asks for something the
/// current list state cannot satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No item with this id is listed.
    #[error("Comment not found: {0}")]
    NotFound(String),

    /// The item is a pending entry that the server has not confirmed yet.
    ///
    /// ## When This Occurs
    /// - Reacting to a comment that is still being submitted
    /// - Reporting a comment that only exists locally
    #[error("Comment {0} is not confirmed by the server yet")]
    Unconfirmed(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements and are
/// always raised before any token negotiation or network request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (illegal characters, unparseable value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is guessable (too few distinct characters, sequential, etc.).
    #[error("{field} is not random enough: {reason}")]
    LowEntropy { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
