//! # Reaction Counters
//!
//! Local adjustment of an item's reaction buckets when the viewer changes
//! their own reaction.
//!
//! ## Adjustment Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  viewer: like → laugh                                                   │
//! │                                                                         │
//! │   before:  like 3 │ laugh 1 │ total 4                                   │
//! │   after:   like 2 │ laugh 2 │ total 4      (one bucket down, one up)    │
//! │                                                                         │
//! │  viewer: laugh → none                                                   │
//! │                                                                         │
//! │   after:   like 2 │ laugh 1 │ total 3      (empty buckets are removed)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The adjustment is applied before the network call returns and is not
//! reverted if that call fails; the next server refresh replaces the whole
//! item, counts included.

use crate::types::Item;

/// The viewer's reaction before and after a local adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionChange {
    /// Reaction before the change.
    pub previous: Option<String>,
    /// Reaction after the change.
    pub current: Option<String>,
}

impl ReactionChange {
    /// Returns true if nothing changed.
    pub fn is_noop(&self) -> bool {
        self.previous == self.current
    }
}

impl Item {
    /// Sets (or clears, with `None`) the viewer's reaction and adjusts the
    /// affected buckets.
    pub fn set_viewer_reaction(&mut self, reaction: Option<&str>) -> ReactionChange {
        let previous = self.viewer_reaction.clone();

        if previous.as_deref() == reaction {
            return ReactionChange {
                current: previous.clone(),
                previous,
            };
        }

        if let Some(old) = previous.as_deref() {
            if let Some(count) = self.reaction_counts.get_mut(old) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.reaction_counts.remove(old);
                }
            }
        }

        if let Some(new) = reaction {
            let count = self.reaction_counts.entry(new.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        }

        self.viewer_reaction = reaction.map(str::to_string);

        ReactionChange {
            previous,
            current: self.viewer_reaction.clone(),
        }
    }
}
