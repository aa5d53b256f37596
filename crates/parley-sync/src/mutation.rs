//! # Optimistic Mutation Engine
//!
//! Writes that show up in the list before the service confirms them.
//!
//! ## Submission State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   draft ──validate──► PENDING ──token + POST /comments──┬──► CONFIRMED  │
//! │     │                 (tmp id,                          │   (replaced   │
//! │     │                  index 0)                         │    in place)  │
//! │     │                                                   │               │
//! │     └── invalid: error,                                 └──► ROLLED     │
//! │         list untouched                        any failure    BACK       │
//! │                                               (auth, net,   (removed,   │
//! │                                                validation)   error      │
//! │                                                              returned)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reactions
//! Not staged. The viewer's bucket change is applied to the list right away
//! and the network call follows; a failed call is logged and returned but
//! the local change stays until the next server refresh replaces the item.
//!
//! ## Reports
//! One call, one boolean: `duplicate` tells the viewer they had already
//! reported the comment.
//!
//! The list lock is a `std::sync::Mutex` and is released before every
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use parley_core::list::TEMP_ID_PREFIX;
use parley_core::validation::{
    validate_body, validate_comment_id, validate_reaction_kind, validate_thread_key,
};
use parley_core::{CommentList, CoreError, Item, KeyPurpose, ReactionChange, ReportOutcome};

use crate::api::{CommentsApi, CreateCommentRequest, ReactRequest, ReportRequest};
use crate::error::{ApiError, SyncError, SyncResult};
use crate::token_manager::{Scope, TokenManager, TokenTarget};

pub(crate) fn lock_list(list: &Mutex<CommentList>) -> MutexGuard<'_, CommentList> {
    list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Applies writes to a shared [`CommentList`] and the service.
#[derive(Clone)]
pub struct MutationEngine {
    api: Arc<dyn CommentsApi>,
    tokens: TokenManager,
}

impl MutationEngine {
    /// Creates an engine sharing `tokens` with the rest of the session.
    pub fn new(api: Arc<dyn CommentsApi>, tokens: TokenManager) -> Self {
        MutationEngine { api, tokens }
    }

    /// Maps a collaborator error, dropping the scope's token on a 401.
    fn api_failure(&self, scope: Scope, err: ApiError) -> SyncError {
        if matches!(err, ApiError::Unauthorized(_)) {
            self.tokens.invalidate(scope);
        }
        err.into()
    }

    // =========================================================================
    // Post
    // =========================================================================

    /// Submits a new comment to `resource_key` with an optimistic entry.
    ///
    /// Returns the confirmed item. On failure the pending entry is removed
    /// and the error returned; nothing is retried.
    pub async fn post(
        &self,
        list: &Mutex<CommentList>,
        resource_key: &str,
        body: &str,
    ) -> SyncResult<Item> {
        let resource_key = resource_key.trim();
        validate_thread_key(resource_key)?;
        let body = validate_body(body)?;

        let author = self.tokens.actor();
        let temp_id = lock_list(list).insert_pending(author.as_ref(), body.clone(), Utc::now());
        debug!(%temp_id, resource_key, "Inserted pending comment");

        match self.submit(resource_key, body).await {
            Ok(confirmed) => {
                let placed = lock_list(list).confirm_pending(&temp_id, confirmed.clone());
                if placed {
                    info!(comment_id = %confirmed.id, "Comment confirmed");
                } else {
                    debug!(comment_id = %confirmed.id, "Comment confirmed after list reset");
                }
                Ok(confirmed)
            }
            Err(err) => {
                lock_list(list).rollback_pending(&temp_id);
                warn!(%temp_id, error = %err, "Comment submission failed, rolled back");
                Err(err)
            }
        }
    }

    async fn submit(&self, resource_key: &str, body: String) -> SyncResult<Item> {
        let token = self
            .tokens
            .get_token(&TokenTarget::thread(resource_key))
            .await?;

        let request = CreateCommentRequest {
            thread_key: resource_key.to_string(),
            body,
        };

        self.api
            .create_comment(&token, &request)
            .await
            .map_err(|e| self.api_failure(Scope::Thread, e))
    }

    // =========================================================================
    // React
    // =========================================================================

    /// Sets (`Some`) or clears (`None`) the viewer's reaction on a confirmed
    /// comment.
    ///
    /// The list is updated before the network call. A network failure is
    /// returned but does not revert the list.
    pub async fn react(
        &self,
        list: &Mutex<CommentList>,
        comment_id: &str,
        reaction: Option<&str>,
    ) -> SyncResult<ReactionChange> {
        validate_comment_id(comment_id)?;
        if let Some(kind) = reaction {
            validate_reaction_kind(kind)?;
        }

        let change = lock_list(list).set_viewer_reaction(comment_id, reaction)?;
        if change.is_noop() {
            return Ok(change);
        }

        let request = ReactRequest {
            comment_id: comment_id.to_string(),
            reaction: change.current.clone(),
        };

        if let Err(err) = self.send_reaction(&request).await {
            warn!(
                comment_id,
                error = %err,
                "Reaction not delivered, keeping local count"
            );
            return Err(err);
        }

        debug!(comment_id, reaction = ?change.current, "Reaction delivered");
        Ok(change)
    }

    async fn send_reaction(&self, request: &ReactRequest) -> SyncResult<()> {
        let token = self.tokens.get_token(&TokenTarget::Meta).await?;
        let thread_key = self.tokens.credential().synthetic_key(KeyPurpose::Reactions);
        self.api
            .react(&token, &thread_key, request)
            .await
            .map_err(|e| self.api_failure(Scope::Meta, e))
    }

    // =========================================================================
    // Report
    // =========================================================================

    /// Reports a confirmed comment.
    pub async fn report(&self, comment_id: &str, reason: Option<&str>) -> SyncResult<ReportOutcome> {
        validate_comment_id(comment_id)?;
        if comment_id.starts_with(TEMP_ID_PREFIX) {
            return Err(CoreError::Unconfirmed(comment_id.to_string()).into());
        }

        let token = self.tokens.get_token(&TokenTarget::Meta).await?;
        let thread_key = self.tokens.credential().synthetic_key(KeyPurpose::Reporting);
        let request = ReportRequest {
            comment_id: comment_id.to_string(),
            reason: reason.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string),
        };

        let outcome = self
            .api
            .report_comment(&token, &thread_key, &request)
            .await
            .map_err(|e| self.api_failure(Scope::Meta, e))?;

        info!(comment_id, duplicate = outcome.duplicate, "Comment reported");
        Ok(outcome)
    }
}
