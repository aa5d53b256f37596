//! # Deferred Identity Sync
//!
//! Tells the service who the current actor is, without ever failing or
//! blocking the caller's main flow.
//!
//! ## Replay Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  identify(actor)                                                        │
//! │    │                                                                    │
//! │    ├── cooldown active ─────────────► Suppressed  (not even queued)     │
//! │    │                                                                    │
//! │    ├── pending := actor  (last write wins)                              │
//! │    │                                                                    │
//! │    ├── replay in flight ────────────► Coalesced   (the running replay   │
//! │    │                                               picks it up)         │
//! │    ├── no valid token ──────────────► Deferred    (replayed when the    │
//! │    │                                               TokenManager reports │
//! │    │                                               a new token)         │
//! │    └── token available ─► replay ──► Synced | Failed(reason)            │
//! │                                                                         │
//! │  replay: while pending.take() is Some(actor) { upsert(actor) }          │
//! │          one replay at a time, in its own task; failures are logged     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, info, warn};

use parley_core::{Actor, KeyPurpose};

use crate::api::{CommentsApi, ProfileUpsert};
use crate::error::{ApiError, SyncError, SyncResult};
use crate::token_manager::{Scope, TokenListener, TokenManager, TokenTarget};

/// What `identify` did with the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// The profile was upserted.
    Synced,
    /// No token yet; the actor is queued.
    Deferred,
    /// A replay was already running; it will send this actor.
    Coalesced,
    /// Binding cooldown active; nothing was queued.
    Suppressed,
    /// The upsert failed. Logged, never raised.
    Failed(String),
}

impl IdentifyOutcome {
    /// Returns true for `Failed`.
    pub fn is_failure(&self) -> bool {
        matches!(self, IdentifyOutcome::Failed(_))
    }
}

#[derive(Debug, Default)]
struct State {
    pending: Option<Actor>,
    replaying: bool,
}

/// Queues and replays profile upserts.
pub struct IdentitySync {
    api: Arc<dyn CommentsApi>,
    tokens: TokenManager,
    state: Mutex<State>,
    this: Weak<IdentitySync>,
}

impl IdentitySync {
    /// Creates the sync and subscribes it to token negotiations.
    pub fn new(api: Arc<dyn CommentsApi>, tokens: TokenManager) -> Arc<Self> {
        let sync = Arc::new_cyclic(|this| IdentitySync {
            api,
            tokens: tokens.clone(),
            state: Mutex::new(State::default()),
            this: this.clone(),
        });

        let listener: Weak<dyn TokenListener> = Arc::downgrade(&sync) as Weak<dyn TokenListener>;
        tokens.add_listener(listener);
        sync
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `actor` as the current actor and syncs it when possible.
    ///
    /// Never fails; the outcome says what happened.
    pub async fn identify(&self, actor: Actor) -> IdentifyOutcome {
        if self.tokens.cooldown_active() {
            debug!(actor_id = %actor.id, "Identity sync suppressed by binding cooldown");
            return IdentifyOutcome::Suppressed;
        }

        self.tokens.remember_actor(actor.clone());

        {
            let mut state = self.lock();
            state.pending = Some(actor);

            if state.replaying {
                debug!("Identity replay in flight, coalescing");
                return IdentifyOutcome::Coalesced;
            }

            if self.tokens.any_valid_token().is_none() {
                debug!("No token yet, deferring identity sync");
                return IdentifyOutcome::Deferred;
            }

            state.replaying = true;
        }

        // The replay runs in its own task so a caller that stops waiting
        // cannot strand the replaying flag or the actor it took.
        let Some(this) = self.this.upgrade() else {
            self.lock().replaying = false;
            return IdentifyOutcome::Failed("identity sync is shutting down".into());
        };
        match tokio::spawn(async move { this.replay().await }).await {
            Ok(outcome) => outcome,
            Err(e) => IdentifyOutcome::Failed(format!("identity replay task failed: {e}")),
        }
    }

    /// The actor waiting to be sent, if any.
    pub fn pending(&self) -> Option<Actor> {
        self.lock().pending.clone()
    }

    /// Drops the queued actor.
    pub fn clear(&self) {
        self.lock().pending = None;
    }

    /// Sends queued actors until none is left. The caller must have set
    /// `replaying`.
    async fn replay(&self) -> IdentifyOutcome {
        let mut guard = ReplayGuard {
            sync: self,
            armed: true,
        };
        let mut outcome = IdentifyOutcome::Synced;

        loop {
            let actor = {
                let mut state = self.lock();
                match state.pending.take() {
                    Some(actor) => actor,
                    None => {
                        state.replaying = false;
                        guard.armed = false;
                        return outcome;
                    }
                }
            };

            outcome = match self.upsert(&actor).await {
                Ok(()) => {
                    info!(actor_id = %actor.id, "Identity synced");
                    IdentifyOutcome::Synced
                }
                Err(err) => {
                    warn!(actor_id = %actor.id, error = %err, "Identity sync failed");
                    IdentifyOutcome::Failed(err.to_string())
                }
            };
        }
    }

    async fn upsert(&self, actor: &Actor) -> SyncResult<()> {
        let (scope, token) = match self.tokens.any_valid_token() {
            Some(found) => found,
            None => (Scope::Meta, self.tokens.get_token(&TokenTarget::Meta).await?),
        };

        let thread_key = self.tokens.credential().synthetic_key(KeyPurpose::Identity);
        match self
            .api
            .upsert_profile(&token, &thread_key, &ProfileUpsert::from(actor))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                if matches!(err, ApiError::Unauthorized(_)) {
                    self.tokens.invalidate(scope);
                }
                Err(SyncError::from(err))
            }
        }
    }
}

/// Clears `replaying` if a replay ends without draining the queue.
struct ReplayGuard<'a> {
    sync: &'a IdentitySync,
    armed: bool,
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sync.lock().replaying = false;
        }
    }
}

impl TokenListener for IdentitySync {
    fn token_acquired(&self, _scope: Scope) {
        {
            let mut state = self.lock();
            if state.replaying || state.pending.is_none() {
                return;
            }
            state.replaying = true;
        }

        let Some(this) = self.this.upgrade() else {
            return;
        };

        debug!("Token acquired, replaying deferred identity");
        tokio::spawn(async move {
            let outcome = this.replay().await;
            if outcome.is_failure() {
                debug!(?outcome, "Deferred identity replay finished with failure");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manager_with, StubApi};
    use std::time::Duration;

    fn setup(api: &StubApi) -> (TokenManager, Arc<IdentitySync>) {
        let tokens = manager_with(api);
        let sync = IdentitySync::new(Arc::new(api.clone()), tokens.clone());
        (tokens, sync)
    }

    fn actor(id: &str, name: &str) -> Actor {
        Actor::new(id).with_display_name(name)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_deferred_actors_coalesce_into_one_upsert() {
        let api = StubApi::new();
        let (tokens, sync) = setup(&api);

        assert_eq!(sync.identify(actor("u1", "First")).await, IdentifyOutcome::Deferred);
        assert_eq!(sync.identify(actor("u2", "Second")).await, IdentifyOutcome::Deferred);
        assert!(api.upsert_calls().is_empty());

        tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;

        let upserts = api.upsert_calls();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].request.display_name.as_deref(), Some("Second"));
        assert!(upserts[0].thread_key.starts_with("sys:identity:"));
        assert_eq!(sync.pending(), None);
        // The negotiation carried the latest actor too.
        assert_eq!(
            api.token_requests()[0].external_user.as_ref().map(|a| a.id.as_str()),
            Some("u2")
        );
    }

    #[tokio::test]
    async fn test_syncs_immediately_with_token() {
        let api = StubApi::new();
        let (tokens, sync) = setup(&api);
        let token = tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;

        assert_eq!(sync.identify(actor("u1", "Ada")).await, IdentifyOutcome::Synced);
        let upserts = api.upsert_calls();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].bearer, token.value());
    }

    #[tokio::test]
    async fn test_thread_token_is_accepted() {
        let api = StubApi::new();
        let (tokens, sync) = setup(&api);
        tokens
            .get_token(&TokenTarget::thread("Xk29pQm7ZrT4wLs8"))
            .await
            .unwrap();
        settle().await;

        assert_eq!(sync.identify(actor("u1", "Ada")).await, IdentifyOutcome::Synced);
        assert_eq!(api.token_calls(), 1);
    }

    #[tokio::test]
    async fn test_identify_during_replay_is_coalesced() {
        let api = StubApi::new().with_upsert_delay(Duration::from_millis(50));
        let (tokens, sync) = setup(&api);
        tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;

        let second = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mid = sync.identify(actor("u2", "Second")).await;
            let late = sync.identify(actor("u3", "Third")).await;
            (mid, late)
        };
        let (first, (mid, late)) = tokio::join!(sync.identify(actor("u1", "First")), second);

        assert_eq!(first, IdentifyOutcome::Synced);
        assert_eq!(mid, IdentifyOutcome::Coalesced);
        assert_eq!(late, IdentifyOutcome::Coalesced);

        // u1, then only the latest of the coalesced actors.
        let names: Vec<_> = api
            .upsert_calls()
            .into_iter()
            .map(|c| c.request.display_name.unwrap_or_default())
            .collect();
        assert_eq!(names, ["First", "Third"]);
    }

    #[tokio::test]
    async fn test_abandoned_identify_does_not_block_later_ones() {
        let api = StubApi::new().with_upsert_delay(Duration::from_millis(50));
        let (tokens, sync) = setup(&api);
        tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(5), sync.identify(actor("u1", "First")))
                .await;
        assert!(abandoned.is_err());

        // The abandoned upsert still completes in the background.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(api.upsert_calls().len(), 1);

        assert_eq!(sync.identify(actor("u2", "Second")).await, IdentifyOutcome::Synced);
        let names: Vec<_> = api
            .upsert_calls()
            .into_iter()
            .map(|c| c.request.display_name.unwrap_or_default())
            .collect();
        assert_eq!(names, ["First", "Second"]);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_identify() {
        let api = StubApi::new();
        api.push_token(Err(ApiError::InvalidBinding));
        let (tokens, sync) = setup(&api);
        assert!(tokens.get_token(&TokenTarget::Meta).await.is_err());

        assert_eq!(sync.identify(actor("u1", "Ada")).await, IdentifyOutcome::Suppressed);
        assert_eq!(sync.pending(), None);
        assert_eq!(tokens.actor(), None);
        assert!(api.upsert_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_reported_not_raised() {
        let api = StubApi::new();
        api.push_upsert(Err(ApiError::Transport("connection reset".into())));
        let (tokens, sync) = setup(&api);
        tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;

        let outcome = sync.identify(actor("u1", "Ada")).await;
        assert!(outcome.is_failure());

        // Next identify works normally.
        assert_eq!(sync.identify(actor("u1", "Ada")).await, IdentifyOutcome::Synced);
    }

    #[tokio::test]
    async fn test_clear_drops_pending() {
        let api = StubApi::new();
        let (tokens, sync) = setup(&api);

        sync.identify(actor("u1", "Ada")).await;
        sync.clear();
        tokens.get_token(&TokenTarget::Meta).await.unwrap();
        settle().await;
        assert!(api.upsert_calls().is_empty());
    }
}
