//! # Domain Types
//!
//! Core domain types shared by the session core and host applications.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │     Actor       │   │      Page       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  items          │       │
//! │  │  author_id      │   │  display_name   │   │  next_cursor    │       │
//! │  │  body           │   │  avatar_url     │   │  has_more       │       │
//! │  │  created_at     │   └─────────────────┘   └─────────────────┘       │
//! │  │  reactions      │                                                    │
//! │  └─────────────────┘   ┌─────────────────┐   ┌─────────────────┐       │
//! │                        │ModerationStatus │   │ ReportOutcome   │       │
//! │  ┌─────────────────┐   │  ─────────────  │   │  ─────────────  │       │
//! │  │ModerationSettings│  │  Approved       │   │  duplicate      │       │
//! │  │  snapshot       │   │  Pending        │   └─────────────────┘       │
//! │  └─────────────────┘   │  Rejected       │                              │
//! │                        │  Unconfirmed    │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Every type here is exchanged with the comments service as camelCase JSON.
//! Missing optional fields deserialize to their defaults so older servers that
//! omit reaction data still parse.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cursor::Cursor;

// =============================================================================
// Moderation Status
// =============================================================================

/// Moderation state of a comment as reported by the server.
///
/// `Unconfirmed` never comes from the server: it marks a pending entry that
/// only exists locally until the create call is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    /// Visible to everyone.
    #[default]
    Approved,
    /// Waiting for a moderator.
    Pending,
    /// Hidden by moderation.
    Rejected,
    /// Local pending entry, not yet acknowledged by the server.
    Unconfirmed,
    /// A status this client version does not know about.
    #[serde(other)]
    Unknown,
}

impl ModerationStatus {
    /// Returns true if the comment should be rendered to other viewers.
    pub fn is_visible(&self) -> bool {
        matches!(self, ModerationStatus::Approved | ModerationStatus::Unconfirmed)
    }
}

// =============================================================================
// Item
// =============================================================================

/// A posted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Server id, or a `tmp-` id for pending entries.
    pub id: String,

    /// Author identifier.
    #[serde(default)]
    pub author_id: String,

    /// Author display name, if the author has one.
    #[serde(default)]
    pub author_name: Option<String>,

    /// Comment text.
    pub body: String,

    /// Creation time (server time once confirmed).
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Moderation state.
    #[serde(default)]
    pub moderation_status: ModerationStatus,

    /// Whether the item was flagged by moderation.
    #[serde(default)]
    pub flagged: bool,

    /// Reaction counts keyed by reaction kind.
    #[serde(default)]
    pub reaction_counts: BTreeMap<String, u64>,

    /// The viewer's own reaction, if any.
    #[serde(default)]
    pub viewer_reaction: Option<String>,
}

impl Item {
    /// Total number of reactions across all kinds.
    pub fn reaction_total(&self) -> u64 {
        self.reaction_counts
            .values()
            .fold(0u64, |total, n| total.saturating_add(*n))
    }

    /// Count for a single reaction kind.
    pub fn reaction_count(&self, kind: &str) -> u64 {
        self.reaction_counts.get(kind).copied().unwrap_or(0)
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Description of the person using the host application.
///
/// Sent as `externalUser` during token negotiation and upserted through the
/// profile endpoint by the identity sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Host application's user id.
    pub id: String,

    /// Name shown next to the actor's comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Actor {
    /// Creates an actor with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            display_name: None,
            avatar_url: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the avatar URL.
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

// =============================================================================
// Moderation Settings
// =============================================================================

/// Snapshot of the tenant's moderation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct ModerationSettings {
    /// Automatic moderation is applied to new comments.
    pub moderation_enabled: bool,

    /// New comments stay `pending` until a moderator approves them.
    pub require_approval: bool,

    /// Server-side body length limit, if stricter than the client default.
    pub max_body_length: Option<u32>,

    /// Reactions can be added.
    pub reactions_enabled: bool,

    /// Comments can be reported.
    pub reporting_enabled: bool,

    /// Reaction kinds the tenant accepts. Empty means any.
    pub allowed_reactions: Vec<String>,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        ModerationSettings {
            moderation_enabled: false,
            require_approval: false,
            max_body_length: None,
            reactions_enabled: true,
            reporting_enabled: true,
            allowed_reactions: Vec::new(),
        }
    }
}

impl ModerationSettings {
    /// Returns true if `kind` may be used as a reaction.
    pub fn allows_reaction(&self, kind: &str) -> bool {
        self.reactions_enabled
            && (self.allowed_reactions.is_empty()
                || self.allowed_reactions.iter().any(|k| k == kind))
    }
}

// =============================================================================
// Report Outcome
// =============================================================================

/// Result of reporting a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportOutcome {
    /// The viewer had already reported this comment.
    pub duplicate: bool,
}

// =============================================================================
// Page
// =============================================================================

/// One page of comments plus the position to resume from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Items in server order (newest first).
    pub items: Vec<Item>,

    /// Cursor for the next page. `None` when there is nothing more to load.
    pub next_cursor: Option<Cursor>,

    /// Whether the server reported more items.
    pub has_more: bool,
}

impl Page {
    /// An empty, exhausted page.
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
