//! # Pagination Engine
//!
//! Stateless page reads: one call, one page. Cursor bookkeeping across calls
//! belongs to the caller ([`ThreadFeed`](crate::feed::ThreadFeed) does it for
//! a view), which must drop its cursor when the resource changes.
//!
//! ```text
//! list_page(key, size, cursor)
//!   │
//!   ├── validate key (no network on failure)
//!   ├── clamp size into 1..=100
//!   ├── thread token for key ──► AuthError surfaces as SyncError::Auth
//!   ├── GET /comments?thread=key&limit=size[&cursor=|&before=]
//!   └── headers → Page { items, next_cursor, has_more }
//!                 (missing/garbage metadata ⇒ has_more = false)
//! ```
//!
//! No retries. A 401 drops the thread token before the error is returned so
//! the caller's retry negotiates a fresh one.

use std::sync::Arc;

use tracing::debug;

use parley_core::validation::{clamp_page_size, validate_thread_key};
use parley_core::{page_from_headers, Cursor, Page};

use crate::api::{CommentsApi, ListQuery};
use crate::error::{ApiError, SyncResult};
use crate::token_manager::{Scope, TokenManager, TokenTarget};

/// Reads pages of a thread.
#[derive(Clone)]
pub struct PaginationEngine {
    api: Arc<dyn CommentsApi>,
    tokens: TokenManager,
}

impl PaginationEngine {
    /// Creates an engine sharing `tokens` with the rest of the session.
    pub fn new(api: Arc<dyn CommentsApi>, tokens: TokenManager) -> Self {
        PaginationEngine { api, tokens }
    }

    /// Fetches one page of `resource_key`.
    ///
    /// `cursor` is passed to the service unmodified. `page_size` is clamped,
    /// never rejected.
    pub async fn list_page(
        &self,
        resource_key: &str,
        page_size: i64,
        cursor: Option<&Cursor>,
    ) -> SyncResult<Page> {
        let resource_key = resource_key.trim();
        validate_thread_key(resource_key)?;
        let limit = clamp_page_size(page_size);

        let token = self
            .tokens
            .get_token(&TokenTarget::thread(resource_key))
            .await?;

        let query = ListQuery {
            thread_key: resource_key.to_string(),
            limit,
            cursor: cursor.map(Cursor::query_pair),
        };

        let raw = match self.api.list_comments(&token, &query).await {
            Ok(raw) => raw,
            Err(err) => {
                if matches!(err, ApiError::Unauthorized(_)) {
                    self.tokens.invalidate(Scope::Thread);
                }
                return Err(err.into());
            }
        };

        let page = page_from_headers(
            raw.items,
            raw.next_cursor.as_deref(),
            raw.has_more.as_deref(),
        );

        debug!(
            resource_key,
            limit,
            count = page.items.len(),
            has_more = page.has_more,
            "Loaded comment page"
        );

        Ok(page)
    }
}
