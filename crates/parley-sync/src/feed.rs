//! # Thread Feed
//!
//! View session for one thread: the optimistic [`CommentList`] a UI renders,
//! plus the cursor needed to page further back.
//!
//! ## Generations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  generation 3 ── load_more() ─────── fetching ───────────┐              │
//! │                                                          │              │
//! │  switch_resource("other") ──► generation 4               │              │
//! │    list cleared, cursor dropped                          ▼              │
//! │                                               result for gen 3 arrives  │
//! │                                               ──► Superseded, discarded │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is cancelled. A result is applied only if the generation it was
//! started under is still current. `refresh` and `switch_resource` both start
//! a new generation.
//!
//! A failed page load leaves the loaded items alone and records the error in
//! [`ThreadFeed::last_error`] so the UI can offer a retry.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use parley_core::validation::validate_thread_key;
use parley_core::{CommentList, Cursor, Item, Page, ReactionChange, ReportOutcome};

use crate::error::SyncResult;
use crate::mutation::{lock_list, MutationEngine};
use crate::pagination::PaginationEngine;

/// What a page load did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was merged; `added` new items were listed.
    Loaded { added: usize },
    /// Nothing left to load; no network call was made.
    Exhausted,
    /// Another `load_more` is already running.
    Busy,
    /// The feed moved on while the page was loading; the page was dropped.
    Superseded,
}

#[derive(Debug)]
struct FeedState {
    resource_key: String,
    generation: u64,
    loaded: bool,
    loading_more: bool,
    next_cursor: Option<Cursor>,
    has_more: bool,
    last_error: Option<String>,
}

impl FeedState {
    fn new(resource_key: String) -> Self {
        FeedState {
            resource_key,
            generation: 0,
            loaded: false,
            loading_more: false,
            next_cursor: None,
            has_more: false,
            last_error: None,
        }
    }
}

/// Clears `loading_more` when a `load_more` call ends, including when its
/// future is dropped before the page arrives.
struct LoadingMore<'a> {
    state: &'a Mutex<FeedState>,
    generation: u64,
}

impl Drop for LoadingMore<'_> {
    fn drop(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.generation == self.generation {
            state.loading_more = false;
        }
    }
}

/// The comment list and paging state for one thread view.
pub struct ThreadFeed {
    pagination: PaginationEngine,
    mutation: MutationEngine,
    page_size: i64,
    list: Arc<Mutex<CommentList>>,
    state: Mutex<FeedState>,
}

impl ThreadFeed {
    /// Creates an empty feed for `resource_key`. Nothing is fetched yet.
    pub fn new(
        pagination: PaginationEngine,
        mutation: MutationEngine,
        resource_key: &str,
        page_size: u32,
    ) -> SyncResult<Self> {
        let resource_key = resource_key.trim();
        validate_thread_key(resource_key)?;

        Ok(ThreadFeed {
            pagination,
            mutation,
            page_size: i64::from(page_size),
            list: Arc::new(Mutex::new(CommentList::new())),
            state: Mutex::new(FeedState::new(resource_key.to_string())),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// The thread this feed shows.
    pub fn resource_key(&self) -> String {
        self.lock().resource_key.clone()
    }

    /// A copy of the list, pending entries included.
    pub fn snapshot(&self) -> CommentList {
        lock_list(&self.list).clone()
    }

    /// Items in display order.
    pub fn items(&self) -> Vec<Item> {
        lock_list(&self.list).items().cloned().collect()
    }

    /// Returns true if `load_more` would fetch another page.
    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    /// Cursor of the next page.
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.lock().next_cursor.clone()
    }

    /// The last page load failure, cleared by the next successful load.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    // =========================================================================
    // Paging
    // =========================================================================

    /// Loads the first page unless it is already loaded.
    pub async fn load_initial(&self) -> SyncResult<LoadOutcome> {
        if self.lock().loaded {
            return Ok(LoadOutcome::Loaded { added: 0 });
        }
        self.reload().await
    }

    /// Reloads the first page.
    ///
    /// The list is rebuilt from the server: local reaction state and pending
    /// entries are dropped and paging starts over. A post still in flight
    /// comes back through a later page load.
    pub async fn refresh(&self) -> SyncResult<LoadOutcome> {
        self.reload().await
    }

    async fn reload(&self) -> SyncResult<LoadOutcome> {
        let (resource_key, generation) = {
            let mut state = self.lock();
            state.generation += 1;
            state.loading_more = false;
            (state.resource_key.clone(), state.generation)
        };

        let result = self
            .pagination
            .list_page(&resource_key, self.page_size, None)
            .await;

        self.apply(generation, result, |list, items| {
            list.clear();
            list.append_page(items)
        })
    }

    /// Loads the page after the last one loaded.
    pub async fn load_more(&self) -> SyncResult<LoadOutcome> {
        let next = {
            let mut state = self.lock();
            if !state.loaded {
                None
            } else if state.loading_more {
                return Ok(LoadOutcome::Busy);
            } else {
                let cursor = match (&state.next_cursor, state.has_more) {
                    (Some(cursor), true) => cursor.clone(),
                    _ => return Ok(LoadOutcome::Exhausted),
                };
                state.loading_more = true;
                Some((state.resource_key.clone(), state.generation, cursor))
            }
        };

        // Nothing loaded yet: the first page comes first.
        let Some((resource_key, generation, cursor)) = next else {
            return self.reload().await;
        };
        let _busy = LoadingMore {
            state: &self.state,
            generation,
        };

        let result = self
            .pagination
            .list_page(&resource_key, self.page_size, Some(&cursor))
            .await;

        self.apply(generation, result, |list, items| list.append_page(items))
    }

    /// Merges a page into the list if `generation` is still current.
    fn apply(
        &self,
        generation: u64,
        result: SyncResult<Page>,
        merge: impl FnOnce(&mut CommentList, Vec<Item>) -> usize,
    ) -> SyncResult<LoadOutcome> {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(
                resource_key = %state.resource_key,
                generation,
                current = state.generation,
                "Discarding superseded page"
            );
            return Ok(LoadOutcome::Superseded);
        }
        state.loading_more = false;

        match result {
            Ok(page) => {
                let added = merge(&mut lock_list(&self.list), page.items);
                state.loaded = true;
                state.has_more = page.has_more;
                state.next_cursor = page.next_cursor;
                state.last_error = None;

                debug!(
                    resource_key = %state.resource_key,
                    added,
                    has_more = state.has_more,
                    "Merged page into feed"
                );
                Ok(LoadOutcome::Loaded { added })
            }
            Err(err) => {
                warn!(
                    resource_key = %state.resource_key,
                    error = %err,
                    "Page load failed, keeping loaded items"
                );
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Points the feed at another thread.
    ///
    /// The list, pending entries included, and the cursor are dropped, and
    /// any load still running for the old thread will be discarded.
    pub fn switch_resource(&self, resource_key: &str) -> SyncResult<()> {
        let resource_key = resource_key.trim();
        validate_thread_key(resource_key)?;

        let mut state = self.lock();
        let generation = state.generation + 1;
        *state = FeedState::new(resource_key.to_string());
        state.generation = generation;
        lock_list(&self.list).clear();

        info!(resource_key, generation, "Feed switched resource");
        Ok(())
    }

    /// Replaces a listed item with a server copy obtained elsewhere.
    pub fn apply_server_item(&self, item: Item) -> bool {
        lock_list(&self.list).upsert_confirmed(item)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Posts to the current thread with an optimistic entry.
    pub async fn post(&self, body: &str) -> SyncResult<Item> {
        let resource_key = self.resource_key();
        self.mutation.post(&self.list, &resource_key, body).await
    }

    /// Sets or clears the viewer's reaction on a listed comment.
    pub async fn react(
        &self,
        comment_id: &str,
        reaction: Option<&str>,
    ) -> SyncResult<ReactionChange> {
        self.mutation.react(&self.list, comment_id, reaction).await
    }

    /// Reports a listed comment.
    pub async fn report(&self, comment_id: &str, reason: Option<&str>) -> SyncResult<ReportOutcome> {
        self.mutation.report(comment_id, reason).await
    }
}

impl std::fmt::Debug for ThreadFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ThreadFeed")
            .field("resource_key", &state.resource_key)
            .field("generation", &state.generation)
            .field("has_more", &state.has_more)
            .field("len", &lock_list(&self.list).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, SyncError};
    use crate::test_support::{manager_with, raw_page, StubApi};
    use std::time::Duration;

    const KEY: &str = "Xk29pQm7ZrT4wLs8";
    const OTHER: &str = "Qr7Tn2Wm9Zx4Kp6B";

    fn feed(api: &StubApi) -> ThreadFeed {
        let tokens = manager_with(api);
        let api_arc: Arc<dyn crate::api::CommentsApi> = Arc::new(api.clone());
        ThreadFeed::new(
            PaginationEngine::new(api_arc.clone(), tokens.clone()),
            MutationEngine::new(api_arc, tokens),
            KEY,
            2,
        )
        .unwrap()
    }

    fn ids(feed: &ThreadFeed) -> Vec<String> {
        feed.items().into_iter().map(|i| i.id).collect()
    }

    fn two_pages(api: &StubApi) {
        api.set_page(KEY, None, raw_page(&["c4", "c3"], Some("page-2"), Some("true")));
        api.set_page(KEY, Some("page-2"), raw_page(&["c2", "c1"], None, Some("false")));
    }

    #[test]
    fn test_rejects_invalid_key() {
        let api = StubApi::new();
        let tokens = manager_with(&api);
        let api_arc: Arc<dyn crate::api::CommentsApi> = Arc::new(api.clone());
        let result = ThreadFeed::new(
            PaginationEngine::new(api_arc.clone(), tokens.clone()),
            MutationEngine::new(api_arc, tokens),
            "post-1",
            30,
        );
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn test_pages_through_thread() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);

        assert_eq!(feed.load_initial().await.unwrap(), LoadOutcome::Loaded { added: 2 });
        assert!(feed.has_more());
        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Loaded { added: 2 });
        assert_eq!(ids(&feed), ["c4", "c3", "c2", "c1"]);

        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Exhausted);
        assert_eq!(api.list_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_load_initial_is_idempotent() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);

        feed.load_initial().await.unwrap();
        assert_eq!(feed.load_initial().await.unwrap(), LoadOutcome::Loaded { added: 0 });
        assert_eq!(api.list_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_items_and_records_error() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();

        api.push_list_error(ApiError::Transport("connection reset".into()));
        assert!(feed.load_more().await.is_err());
        assert_eq!(ids(&feed), ["c4", "c3"]);
        assert!(feed.last_error().is_some());
        assert!(feed.has_more());

        // Retry resumes from the same cursor.
        feed.load_more().await.unwrap();
        assert_eq!(feed.last_error(), None);
        assert_eq!(ids(&feed), ["c4", "c3", "c2", "c1"]);
    }

    #[tokio::test]
    async fn test_switch_discards_in_flight_page() {
        let api = StubApi::new().with_list_delay(Duration::from_millis(50));
        two_pages(&api);
        api.set_page(OTHER, None, raw_page(&["o1"], None, None));
        let feed = feed(&api);

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            feed.switch_resource(OTHER).unwrap();
        };
        let (outcome, ()) = tokio::join!(feed.load_initial(), switch);

        assert_eq!(outcome.unwrap(), LoadOutcome::Superseded);
        assert!(feed.items().is_empty());
        assert_eq!(feed.next_cursor(), None);

        feed.load_initial().await.unwrap();
        assert_eq!(ids(&feed), ["o1"]);
        assert_eq!(feed.resource_key(), OTHER);
    }

    #[tokio::test]
    async fn test_switch_drops_pending_entries() {
        let api = StubApi::new().with_create_delay(Duration::from_millis(50));
        let feed = feed(&api);

        let switch = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(feed.snapshot().pending_count(), 1);
            feed.switch_resource(OTHER).unwrap();
        };
        let (posted, ()) = tokio::join!(feed.post("hello"), switch);

        // The post still went to the old thread, but is not shown in the new one.
        assert_eq!(posted.unwrap().body, "hello");
        assert_eq!(api.create_calls()[0].thread_key, KEY);
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_supersedes_local_reactions() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();
        feed.load_more().await.unwrap();

        feed.react("c3", Some("like")).await.unwrap();
        assert_eq!(feed.snapshot().get("c3").unwrap().item.reaction_count("like"), 1);

        feed.refresh().await.unwrap();
        let list = feed.snapshot();
        assert_eq!(list.get("c3").unwrap().item.viewer_reaction, None);
        assert_eq!(list.get("c3").unwrap().item.reaction_count("like"), 0);
        // Paging starts over.
        assert_eq!(ids(&feed), ["c4", "c3"]);
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn test_refresh_drops_pending_entries() {
        let api = StubApi::new().with_create_delay(Duration::from_millis(50));
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();

        let refresh = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(feed.snapshot().pending_count(), 1);
            feed.refresh().await.unwrap();
            feed.snapshot()
        };
        let (posted, after_refresh) = tokio::join!(feed.post("hello"), refresh);

        assert_eq!(after_refresh.pending_count(), 0);
        // Confirmation finds no pending entry to replace.
        assert_eq!(posted.unwrap().body, "hello");
        assert_eq!(ids(&feed), ["c4", "c3"]);
    }

    #[tokio::test]
    async fn test_abandoned_load_more_does_not_block_later_ones() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();

        let api = api.with_list_delay(Duration::from_millis(50));
        let abandoned = tokio::time::timeout(Duration::from_millis(5), feed.load_more()).await;
        assert!(abandoned.is_err());

        assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Loaded { added: 2 });
        assert_eq!(ids(&feed), ["c4", "c3", "c2", "c1"]);
        assert_eq!(api.list_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_apply_server_item() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();

        let mut fresh = feed.snapshot().get("c4").unwrap().item.clone();
        fresh.body = "edited".into();
        assert!(feed.apply_server_item(fresh));
        assert_eq!(feed.snapshot().get("c4").unwrap().item.body, "edited");
    }

    #[tokio::test]
    async fn test_report_through_feed() {
        let api = StubApi::new();
        two_pages(&api);
        let feed = feed(&api);
        feed.load_initial().await.unwrap();

        let outcome = feed.report("c4", Some("spam")).await.unwrap();
        assert!(!outcome.duplicate);
        assert_eq!(api.report_calls()[0].request.comment_id, "c4");
    }
}
