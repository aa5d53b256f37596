//! # parley-sync: Session & Sync Core for Parley
//!
//! Everything in the Parley client that touches the network or holds
//! session state: token negotiation, cursor pagination, optimistic writes and
//! deferred identity sync.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Session Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CommentsSession (one per install)                │  │
//! │  │                                                                  │  │
//! │  │  Built from ParleyConfig; shares one TokenManager everywhere    │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  TokenManager  │  │PaginationEngine│  │  MutationEngine        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ thread + meta  │  │ one page per   │  │ optimistic post,       │    │
//! │  │ caches, single-│  │ call, opaque   │  │ immediate reactions,   │    │
//! │  │ flight, binding│  │ cursors        │  │ reports                │    │
//! │  │ cooldown       │  │                │  │                        │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          │ token_acquired                                               │
//! │          ▼                                                              │
//! │  ┌────────────────┐  ┌─────────────────────────────────────────────┐   │
//! │  │  IdentitySync  │  │  ThreadFeed (one per view)                   │   │
//! │  │ deferred,      │  │  CommentList + cursor, generation discard    │   │
//! │  │ coalesced      │  │                                              │   │
//! │  └────────────────┘  └─────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  CommentsApi: the network seam. HttpCommentsApi speaks HTTP via reqwest.│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Session
//! - [`session`] - `CommentsSession`, the object hosts hold on to
//! - [`feed`] - `ThreadFeed` view sessions
//! - [`config`] - Configuration (service URL, credential, auth, feed)
//! - [`error`] - Sync error types
//!
//! ### Auth
//! - [`credential`] - Install credential and client metadata headers
//! - [`token_cache`] - Bearer tokens and the per-scope cache
//! - [`token_manager`] - Negotiation, single-flight and cooldown
//!
//! ### Engines
//! - [`pagination`] - Cursor pages
//! - [`mutation`] - Optimistic post, react and report
//! - [`identity`] - Deferred profile upserts
//!
//! ### Network
//! - [`api`] - `CommentsApi` trait and wire types
//! - [`http`] - reqwest implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_sync::{CommentsSession, ParleyConfig};
//!
//! let config = ParleyConfig::load_or_default(None);
//! let session = CommentsSession::from_config(&config)?;
//!
//! let feed = session.feed("Xk29pQm7ZrT4wLs8")?;
//! feed.load_initial().await?;
//! feed.post("First!").await?;
//!
//! println!("{:?}", session.status());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Session
pub mod config;
pub mod error;
pub mod feed;
pub mod session;

// Auth
pub mod credential;
pub mod token_cache;
pub mod token_manager;

// Engines
pub mod identity;
pub mod mutation;
pub mod pagination;

// Network
pub mod api;
pub mod http;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::CommentsApi;
pub use config::{AuthSettings, CredentialSettings, FeedSettings, ParleyConfig, ServiceSettings};
pub use credential::{BindingProofs, Credential};
pub use error::{ApiError, AuthError, SyncError, SyncResult};
pub use feed::{LoadOutcome, ThreadFeed};
pub use http::HttpCommentsApi;
pub use identity::{IdentifyOutcome, IdentitySync};
pub use mutation::MutationEngine;
pub use pagination::PaginationEngine;
pub use session::{CommentsSession, SessionStatus};
pub use token_cache::BearerToken;
pub use token_manager::{Scope, TokenListener, TokenManager, TokenStatus, TokenTarget};
