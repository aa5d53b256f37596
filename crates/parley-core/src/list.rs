//! # Optimistic Comment List
//!
//! The list a view shows for one thread: confirmed items from the server plus
//! pending entries for submissions that have not been acknowledged yet.
//!
//! ## Pending Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pending Entry State Machine                          │
//! │                                                                         │
//! │   draft ──insert_pending()──► PENDING (tmp-<uuid>, Unconfirmed, index 0)│
//! │                                  │                                      │
//! │              server ack          │          any failure                 │
//! │        ┌─────────────────────────┴──────────────────────┐               │
//! │        ▼                                                ▼               │
//! │   CONFIRMED                                       ROLLED BACK           │
//! │   confirm_pending(): server item takes            rollback_pending():   │
//! │   the pending entry's index; any other            entry removed, list   │
//! │   copy of the server id is dropped                is as it was before   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The list is newest-first, so a new submission appears at the top.
//! Pending entries are never carried across a reload: `clear()` drops them
//! along with everything else.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::reactions::ReactionChange;
use crate::types::{Actor, Item, ModerationStatus};

/// Prefix of temporary ids given to pending entries.
pub const TEMP_ID_PREFIX: &str = "tmp-";

// =============================================================================
// Entry
// =============================================================================

/// Whether an entry came from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Received from (or acknowledged by) the server.
    Confirmed,
    /// Local placeholder for an in-flight submission.
    Pending,
}

/// One row of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The comment as currently displayed.
    pub item: Item,
    /// Confirmation state.
    pub state: EntryState,
}

impl Entry {
    /// Returns true for local placeholders.
    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }
}

// =============================================================================
// Comment List
// =============================================================================

/// Ordered comments for one thread, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentList {
    entries: Vec<Entry>,
}

impl CommentList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, pending included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in display order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// All items in display order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.entries.iter().map(|e| &e.item)
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.item.id == id)
    }

    /// Index of the entry with this id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.item.id == id)
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Drops every entry, pending ones included.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // =========================================================================
    // Server Pages
    // =========================================================================

    /// Appends a page of confirmed items, skipping ids already listed.
    ///
    /// Returns how many items were added.
    pub fn append_page(&mut self, items: Vec<Item>) -> usize {
        let mut added = 0;
        for item in items {
            if self.position(&item.id).is_some() {
                continue;
            }
            self.entries.push(Entry {
                item,
                state: EntryState::Confirmed,
            });
            added += 1;
        }
        added
    }

    /// Replaces a confirmed item with a fresher server copy.
    ///
    /// The server copy wins completely, including reaction counts that were
    /// adjusted locally. Returns false if the id is not listed or is pending.
    pub fn upsert_confirmed(&mut self, item: Item) -> bool {
        match self.entries.iter_mut().find(|e| e.item.id == item.id) {
            Some(entry) if !entry.is_pending() => {
                entry.item = item;
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // Optimistic Writes
    // =========================================================================

    /// Inserts a pending entry at the top of the list and returns its
    /// temporary id.
    pub fn insert_pending(
        &mut self,
        author: Option<&Actor>,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> String {
        let temp_id = format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4());

        let item = Item {
            id: temp_id.clone(),
            author_id: author.map(|a| a.id.clone()).unwrap_or_default(),
            author_name: author.and_then(|a| a.display_name.clone()),
            body: body.into(),
            created_at: now,
            moderation_status: ModerationStatus::Unconfirmed,
            flagged: false,
            reaction_counts: Default::default(),
            viewer_reaction: None,
        };

        self.entries.insert(
            0,
            Entry {
                item,
                state: EntryState::Pending,
            },
        );

        temp_id
    }

    /// Replaces the pending entry `temp_id` in place with the server item.
    ///
    /// Any other entry already carrying the server id (for example one that
    /// arrived through a concurrent page load) is removed so the comment is
    /// listed exactly once. Returns false if the pending entry is gone, which
    /// happens when the list was cleared while the submission was in flight.
    pub fn confirm_pending(&mut self, temp_id: &str, confirmed: Item) -> bool {
        let Some(mut pos) = self.pending_position(temp_id) else {
            return false;
        };

        if let Some(dup) = self.position(&confirmed.id) {
            self.entries.remove(dup);
            if dup < pos {
                pos -= 1;
            }
        }

        self.entries[pos] = Entry {
            item: confirmed,
            state: EntryState::Confirmed,
        };
        true
    }

    /// Removes the pending entry `temp_id`.
    pub fn rollback_pending(&mut self, temp_id: &str) -> bool {
        match self.pending_position(temp_id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    fn pending_position(&self, temp_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_pending() && e.item.id == temp_id)
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Applies the viewer's reaction change to a confirmed item.
    pub fn set_viewer_reaction(
        &mut self,
        id: &str,
        reaction: Option<&str>,
    ) -> CoreResult<ReactionChange> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.item.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if entry.is_pending() {
            return Err(CoreError::Unconfirmed(id.to_string()));
        }

        Ok(entry.item.set_viewer_reaction(reaction))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn server_item(id: &str, minute: u32) -> Item {
        Item {
            id: id.to_string(),
            author_id: "u-server".into(),
            author_name: None,
            body: format!("body of {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
            moderation_status: ModerationStatus::Approved,
            flagged: false,
            reaction_counts: Default::default(),
            viewer_reaction: None,
        }
    }

    fn list_of(ids: &[&str]) -> CommentList {
        let mut list = CommentList::new();
        list.append_page(ids.iter().map(|id| server_item(id, 0)).collect());
        list
    }

    #[test]
    fn test_append_page_skips_duplicates() {
        let mut list = list_of(&["c3", "c2"]);
        let added = list.append_page(vec![server_item("c2", 0), server_item("c1", 0)]);
        assert_eq!(added, 1);
        let ids: Vec<_> = list.items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c2", "c1"]);
    }

    #[test]
    fn test_pending_entry_is_inserted_at_top() {
        let mut list = list_of(&["c2", "c1"]);
        let author = Actor::new("u-me").with_display_name("Me");
        let temp_id = list.insert_pending(Some(&author), "Hello", Utc::now());

        assert!(temp_id.starts_with(TEMP_ID_PREFIX));
        assert_eq!(list.position(&temp_id), Some(0));
        let entry = list.get(&temp_id).unwrap();
        assert!(entry.is_pending());
        assert_eq!(entry.item.moderation_status, ModerationStatus::Unconfirmed);
        assert_eq!(entry.item.author_name.as_deref(), Some("Me"));
        assert_eq!(list.pending_count(), 1);
    }

    #[test]
    fn test_confirm_replaces_in_place() {
        let mut list = list_of(&["c2", "c1"]);
        let temp_id = list.insert_pending(None, "Hello", Utc::now());

        let confirmed = server_item("c3", 5);
        assert!(list.confirm_pending(&temp_id, confirmed.clone()));

        assert_eq!(list.position("c3"), Some(0));
        assert_eq!(list.get(&temp_id), None);
        assert_eq!(list.pending_count(), 0);
        assert_eq!(list.get("c3").unwrap().item, confirmed);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_confirm_removes_duplicate_from_concurrent_page() {
        let mut list = list_of(&["c2"]);
        let temp_id = list.insert_pending(None, "Hello", Utc::now());
        // A page load raced the submission and already brought c3 in.
        list.append_page(vec![server_item("c3", 5)]);
        assert_eq!(list.len(), 3);

        assert!(list.confirm_pending(&temp_id, server_item("c3", 5)));
        let ids: Vec<_> = list.items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c2"]);
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let mut list = list_of(&["c2", "c1"]);
        let before = list.clone();

        let temp_id = list.insert_pending(None, "Hello", Utc::now());
        assert!(list.rollback_pending(&temp_id));
        assert_eq!(list, before);
        assert!(!list.rollback_pending(&temp_id));
    }

    #[test]
    fn test_confirm_after_clear_is_ignored() {
        let mut list = list_of(&["c1"]);
        let temp_id = list.insert_pending(None, "Hello", Utc::now());
        list.clear();
        assert!(!list.confirm_pending(&temp_id, server_item("c9", 0)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_reaction_rules() {
        let mut list = list_of(&["c1"]);
        let temp_id = list.insert_pending(None, "Hello", Utc::now());

        let change = list.set_viewer_reaction("c1", Some("like")).unwrap();
        assert_eq!(change.current.as_deref(), Some("like"));
        assert_eq!(list.get("c1").unwrap().item.reaction_count("like"), 1);

        assert_eq!(
            list.set_viewer_reaction(&temp_id, Some("like")),
            Err(CoreError::Unconfirmed(temp_id.clone()))
        );
        assert_eq!(
            list.set_viewer_reaction("missing", None),
            Err(CoreError::NotFound("missing".into()))
        );
    }

    #[test]
    fn test_server_refresh_supersedes_local_reaction() {
        let mut list = list_of(&["c1"]);
        list.set_viewer_reaction("c1", Some("like")).unwrap();

        let mut refreshed = server_item("c1", 0);
        refreshed.reaction_counts.insert("like".into(), 7);
        refreshed.viewer_reaction = Some("like".into());
        assert!(list.upsert_confirmed(refreshed));

        let item = &list.get("c1").unwrap().item;
        assert_eq!(item.reaction_count("like"), 7);
        assert_eq!(item.reaction_total(), 7);
    }
}
