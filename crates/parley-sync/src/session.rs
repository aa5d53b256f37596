//! # Comments Session
//!
//! The explicit session object a host creates once and keeps for as long as
//! the user is signed in. It wires one [`TokenManager`] into every engine so
//! that tokens, cooldown and the remembered actor are shared.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CommentsSession                                 │
//! │                                                                         │
//! │   ParleyConfig ──► Credential ──► TokenManager ◄── IdentitySync         │
//! │                                        ▲   ▲        (listener)          │
//! │                         ┌──────────────┘   └──────────────┐             │
//! │                  PaginationEngine                  MutationEngine       │
//! │                         └──────────── ThreadFeed ─────────┘             │
//! │                                                                         │
//! │   CommentsApi (HttpCommentsApi in production, stub in tests)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use tracing::info;

use parley_core::{
    Actor, CommentList, Cursor, Item, KeyPurpose, ModerationSettings, Page, ReactionChange,
    ReportOutcome,
};

use crate::api::CommentsApi;
use crate::config::ParleyConfig;
use crate::credential::Credential;
use crate::error::{ApiError, SyncResult};
use crate::feed::ThreadFeed;
use crate::http::HttpCommentsApi;
use crate::identity::{IdentifyOutcome, IdentitySync};
use crate::mutation::MutationEngine;
use crate::pagination::PaginationEngine;
use crate::token_manager::{Scope, TokenManager, TokenStatus, TokenTarget};

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Token caches and cooldown.
    pub tokens: TokenStatus,
    /// The actor attached to negotiations.
    pub actor: Option<Actor>,
    /// An identity is waiting for a token.
    pub identity_pending: bool,
}

/// Shared state for one signed-in install.
pub struct CommentsSession {
    api: Arc<dyn CommentsApi>,
    tokens: TokenManager,
    pagination: PaginationEngine,
    mutation: MutationEngine,
    identity: Arc<IdentitySync>,
    page_size: u32,
}

impl CommentsSession {
    /// Builds a session talking HTTP to the configured service.
    pub fn from_config(config: &ParleyConfig) -> SyncResult<Self> {
        config.validate()?;
        let api = HttpCommentsApi::new(&config.service.base_url, config.request_timeout())?;
        Self::with_api(Arc::new(api), config)
    }

    /// Builds a session over any [`CommentsApi`].
    pub fn with_api(api: Arc<dyn CommentsApi>, config: &ParleyConfig) -> SyncResult<Self> {
        let credential = Credential::from_settings(&config.credential)?;
        info!(?credential, "Creating comments session");

        let tokens = TokenManager::new(api.clone(), credential, &config.auth);
        Ok(CommentsSession {
            pagination: PaginationEngine::new(api.clone(), tokens.clone()),
            mutation: MutationEngine::new(api.clone(), tokens.clone()),
            identity: IdentitySync::new(api.clone(), tokens.clone()),
            api,
            tokens,
            page_size: config.feed.page_size,
        })
    }

    /// The shared token manager.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn pagination(&self) -> &PaginationEngine {
        &self.pagination
    }

    pub fn mutation(&self) -> &MutationEngine {
        &self.mutation
    }

    pub fn identity(&self) -> &IdentitySync {
        &self.identity
    }

    /// Opens a view session on `resource_key` using the configured page size.
    pub fn feed(&self, resource_key: &str) -> SyncResult<ThreadFeed> {
        ThreadFeed::new(
            self.pagination.clone(),
            self.mutation.clone(),
            resource_key,
            self.page_size,
        )
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// One page of `resource_key`; see [`PaginationEngine::list_page`].
    pub async fn list_page(
        &self,
        resource_key: &str,
        page_size: i64,
        cursor: Option<&Cursor>,
    ) -> SyncResult<Page> {
        self.pagination.list_page(resource_key, page_size, cursor).await
    }

    /// Posts into a caller-owned list; see [`MutationEngine::post`].
    pub async fn post(
        &self,
        list: &Mutex<CommentList>,
        resource_key: &str,
        body: &str,
    ) -> SyncResult<Item> {
        self.mutation.post(list, resource_key, body).await
    }

    /// Reacts in a caller-owned list; see [`MutationEngine::react`].
    pub async fn react(
        &self,
        list: &Mutex<CommentList>,
        comment_id: &str,
        reaction: Option<&str>,
    ) -> SyncResult<ReactionChange> {
        self.mutation.react(list, comment_id, reaction).await
    }

    pub async fn report(&self, comment_id: &str, reason: Option<&str>) -> SyncResult<ReportOutcome> {
        self.mutation.report(comment_id, reason).await
    }

    /// Tells the service who the current actor is. Never fails.
    pub async fn identify(&self, actor: Actor) -> IdentifyOutcome {
        self.identity.identify(actor).await
    }

    /// Moderation settings for this install.
    pub async fn fetch_settings(&self) -> SyncResult<ModerationSettings> {
        let token = self.tokens.get_token(&TokenTarget::Meta).await?;
        let thread_key = self.tokens.credential().synthetic_key(KeyPurpose::Settings);

        match self.api.fetch_settings(&token, &thread_key).await {
            Ok(settings) => Ok(settings),
            Err(err) => {
                if matches!(err, ApiError::Unauthorized(_)) {
                    self.tokens.invalidate(Scope::Meta);
                }
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            tokens: self.tokens.status(),
            actor: self.tokens.actor(),
            identity_pending: self.identity.pending().is_some(),
        }
    }

    /// Drops both token caches, the remembered actor and any queued
    /// identity. The binding cooldown survives.
    pub fn sign_out(&self) {
        self.identity.clear();
        self.tokens.sign_out();
    }
}

impl std::fmt::Debug for CommentsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentsSession")
            .field("tokens", &self.tokens)
            .field("page_size", &self.page_size)
            .finish()
    }
}
