//! # parley-core: Pure Comment Model for Parley
//!
//! This crate holds the data model and rules of the Parley comments client
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Parley Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Host application (UI)                        │   │
//! │  │    Thread view ──► Composer ──► Reaction bar ──► Report menu   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    parley-sync (I/O layer)                      │   │
//! │  │    CommentsSession, TokenManager, ThreadFeed, HTTP client      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ parley-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   list    │  │  cursor   │  │ validation│  │   │
//! │  │   │   Item    │  │ pending / │  │ headers → │  │ key       │  │   │
//! │  │   │   Actor   │  │ confirmed │  │   Page    │  │ entropy   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO ASYNC • CLOCK PASSED IN             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Wire types (Item, Actor, ModerationSettings, Page)
//! - [`list`] - Optimistic comment list with pending entries
//! - [`reactions`] - Viewer reaction bookkeeping
//! - [`cursor`] - Pagination cursor and header parsing
//! - [`keys`] - Synthetic thread keys for non-content operations
//! - [`validation`] - Caller input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use parley_core::CommentList;
//!
//! let mut list = CommentList::new();
//! let temp_id = list.insert_pending(None, "Hello", Utc::now());
//! assert_eq!(list.position(&temp_id), Some(0));
//!
//! // Submission failed: the list is back to where it was.
//! list.rollback_pending(&temp_id);
//! assert!(list.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cursor;
pub mod error;
pub mod keys;
pub mod list;
pub mod reactions;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cursor::{page_from_headers, Cursor};
pub use error::{CoreError, CoreResult, ValidationError};
pub use keys::{credential_fingerprint, synthetic_thread_key, KeyPurpose};
pub use list::{CommentList, Entry, EntryState};
pub use reactions::ReactionChange;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest page size a list request may ask for.
pub const MIN_PAGE_SIZE: u32 = 1;

/// Largest page size a list request may ask for.
///
/// Larger requests are clamped rather than rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller has no preference.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Maximum comment body length in characters, after trimming.
pub const MAX_BODY_LENGTH: usize = 4000;
