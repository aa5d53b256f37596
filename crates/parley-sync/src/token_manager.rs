//! # Token Manager
//!
//! Exchanges the install credential for short-lived, scope-bound bearer
//! tokens. It is the only writer of the two token caches and the cooldown
//! window.
//!
//! ## Token Acquisition Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    get_token(target)                                    │
//! │                                                                         │
//! │   ┌──────────────┐  valid + same binding                                │
//! │   │ scope cache  │────────────────────────────► return cached token     │
//! │   └──────┬───────┘                                                      │
//! │          │ miss / expired / other resource (entry cleared)              │
//! │          ▼                                                              │
//! │   ┌──────────────┐  same target in flight                               │
//! │   │  in-flight   │────────────────────────────► await shared future     │
//! │   └──────┬───────┘                                                      │
//! │          │ none                                                         │
//! │          ▼                                                              │
//! │   ┌──────────────┐  active                                              │
//! │   │  cooldown    │────────────────────────────► Err(InvalidBinding)     │
//! │   └──────┬───────┘                              (no network call)       │
//! │          │ clear                                                        │
//! │          ▼                                                              │
//! │   spawn negotiation task, register it as in flight, await it            │
//! │          │                                                              │
//! │          ├── Ok(grant)           → store in cache, notify listeners     │
//! │          ├── InvalidBinding      → start cooldown (60s default)         │
//! │          └── other failure       → surfaced unchanged, no cooldown      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Single-Flight
//! The negotiation runs in its own task and is shared through
//! `futures_util::future::Shared`, so every concurrent caller for the same
//! target awaits the same outbound request, and the result still lands in the
//! cache if all of them stop waiting. Thread negotiations are keyed by the
//! resource key: a caller for a different resource starts its own.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use parley_core::{Actor, KeyPurpose};

use crate::api::{CommentsApi, TokenRequest};
use crate::config::AuthSettings;
use crate::credential::Credential;
use crate::error::{ApiError, AuthError};
use crate::token_cache::{ceil_secs, BearerToken, CooldownWindow, TokenCache};

// =============================================================================
// Scope & Target
// =============================================================================

/// Which operation family a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Content access for one resource.
    Thread,
    /// Identity, settings, reporting, reactions.
    Meta,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Thread => write!(f, "thread"),
            Scope::Meta => write!(f, "meta"),
        }
    }
}

/// What a token is requested for. A thread token always names its resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenTarget {
    /// Thread scope, bound to this resource key.
    Thread(String),
    /// Meta scope.
    Meta,
}

impl TokenTarget {
    /// Thread target for `resource_key`.
    pub fn thread(resource_key: impl Into<String>) -> Self {
        TokenTarget::Thread(resource_key.into())
    }

    /// Scope of this target.
    pub fn scope(&self) -> Scope {
        match self {
            TokenTarget::Thread(_) => Scope::Thread,
            TokenTarget::Meta => Scope::Meta,
        }
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Observer of successful negotiations.
///
/// Called outside the manager's lock, from the negotiation task.
/// Implementations must not block.
pub trait TokenListener: Send + Sync {
    /// A token for `scope` was just stored.
    fn token_acquired(&self, scope: Scope);
}

// =============================================================================
// Status Snapshot
// =============================================================================

/// Point-in-time view of one scope's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStatus {
    /// A usable token is cached.
    pub has_valid_token: bool,
    /// Plan tier of the cached token.
    pub plan: Option<String>,
    /// Seconds before the cached token's declared expiry.
    pub remaining_secs: u64,
    /// Resource the thread token is bound to.
    pub bound_to: Option<String>,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    /// Thread scope.
    pub thread: ScopeStatus,
    /// Meta scope.
    pub meta: ScopeStatus,
    /// Seconds left in the binding cooldown, if active.
    pub cooldown_remaining_secs: Option<u64>,
}

// =============================================================================
// Internal State
// =============================================================================

type SharedNegotiation = Shared<BoxFuture<'static, Result<BearerToken, AuthError>>>;

struct InFlight {
    id: u64,
    future: SharedNegotiation,
}

struct State {
    thread: TokenCache<String>,
    meta: TokenCache<()>,
    cooldown: CooldownWindow,
    in_flight: HashMap<TokenTarget, InFlight>,
    next_flight_id: u64,
    /// Bumped by `sign_out`; negotiations started before it do not store.
    epoch: u64,
    actor: Option<Actor>,
}

impl State {
    fn cached(&mut self, target: &TokenTarget, now: Instant) -> Option<BearerToken> {
        match target {
            TokenTarget::Thread(key) => self.thread.get(key, now),
            TokenTarget::Meta => self.meta.get(&(), now),
        }
    }

    fn store(&mut self, target: &TokenTarget, token: BearerToken) {
        match target {
            TokenTarget::Thread(key) => self.thread.store(key.clone(), token),
            TokenTarget::Meta => self.meta.store((), token),
        }
    }
}

struct Inner {
    api: Arc<dyn CommentsApi>,
    credential: Credential,
    expiry_skew: Duration,
    cooldown: Duration,
    state: Mutex<State>,
    listeners: Mutex<Vec<Weak<dyn TokenListener>>>,
}

// =============================================================================
// Token Manager
// =============================================================================

/// Negotiates and caches bearer tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    /// Creates a manager with empty caches.
    pub fn new(api: Arc<dyn CommentsApi>, credential: Credential, settings: &AuthSettings) -> Self {
        let skew = settings.expiry_skew();
        TokenManager {
            inner: Arc::new(Inner {
                api,
                credential,
                expiry_skew: skew,
                cooldown: settings.binding_cooldown(),
                state: Mutex::new(State {
                    thread: TokenCache::new("thread", skew),
                    meta: TokenCache::new("meta", skew),
                    cooldown: CooldownWindow::default(),
                    in_flight: HashMap::new(),
                    next_flight_id: 0,
                    epoch: 0,
                    actor: None,
                }),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is plain data; a panic elsewhere cannot leave it torn.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The credential this manager negotiates with.
    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    /// Registers a listener for successful negotiations.
    ///
    /// Only a weak reference is kept.
    pub fn add_listener(&self, listener: Weak<dyn TokenListener>) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    // =========================================================================
    // Token Acquisition
    // =========================================================================

    /// Returns a token for `target`, negotiating if needed.
    ///
    /// ## Errors
    /// - [`AuthError::InvalidBinding`] while the cooldown window is active
    ///   (no network call) or when this negotiation was rejected
    /// - [`AuthError::Negotiation`] for every other negotiation failure
    pub async fn get_token(&self, target: &TokenTarget) -> Result<BearerToken, AuthError> {
        let flight = {
            let mut state = self.lock();
            let now = Instant::now();

            if let Some(token) = state.cached(target, now) {
                debug!(
                    scope = %target.scope(),
                    remaining_secs = token.remaining_secs(now),
                    "Using cached token"
                );
                return Ok(token);
            }

            if let Some(flight) = state.in_flight.get(target) {
                debug!(scope = %target.scope(), "Joining in-flight negotiation");
                flight.future.clone()
            } else {
                if let Some(remaining) = state.cooldown.remaining(now) {
                    debug!(
                        scope = %target.scope(),
                        remaining_secs = ceil_secs(remaining),
                        "Negotiation suppressed by binding cooldown"
                    );
                    return Err(AuthError::InvalidBinding {
                        retry_after_secs: ceil_secs(remaining),
                    });
                }

                let id = state.next_flight_id;
                state.next_flight_id += 1;

                let request = TokenRequest {
                    api_key: self.inner.credential.api_key().to_string(),
                    thread_key: Some(match target {
                        TokenTarget::Thread(key) => key.clone(),
                        TokenTarget::Meta => self.inner.credential.synthetic_key(KeyPurpose::Meta),
                    }),
                    external_user: state.actor.clone(),
                };

                let future = self.spawn_negotiation(target.clone(), request, id, state.epoch);
                state.in_flight.insert(
                    target.clone(),
                    InFlight {
                        id,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        flight.await
    }

    /// Starts the negotiation task and wraps its handle in a shareable future.
    fn spawn_negotiation(
        &self,
        target: TokenTarget,
        request: TokenRequest,
        id: u64,
        epoch: u64,
    ) -> SharedNegotiation {
        let manager = self.clone();
        let handle =
            tokio::spawn(async move { manager.negotiate(target, request, id, epoch).await });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(AuthError::Negotiation(format!(
                    "negotiation task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared()
    }

    /// Performs one negotiation and records its outcome.
    async fn negotiate(
        &self,
        target: TokenTarget,
        request: TokenRequest,
        id: u64,
        epoch: u64,
    ) -> Result<BearerToken, AuthError> {
        let scope = target.scope();
        info!(%scope, credential = ?self.inner.credential, "Negotiating access token");

        let result = self
            .inner
            .api
            .negotiate_token(&self.inner.credential, &request)
            .await;

        let (outcome, current) = {
            let mut state = self.lock();
            let now = Instant::now();

            if state.in_flight.get(&target).map(|f| f.id) == Some(id) {
                state.in_flight.remove(&target);
            }
            let current = state.epoch == epoch;

            let outcome = match result {
                Ok(grant) => {
                    let token = BearerToken::new(
                        grant.access_token,
                        now,
                        Duration::from_secs(grant.expires_in),
                        grant.plan,
                    );
                    if current {
                        state.store(&target, token.clone());
                    }
                    info!(
                        %scope,
                        plan = token.plan().unwrap_or("-"),
                        expires_in_secs = token.remaining_secs(now),
                        stored = current,
                        "Access token negotiated"
                    );
                    Ok(token)
                }
                Err(ApiError::InvalidBinding) => {
                    state.cooldown.start(now, self.inner.cooldown);
                    let retry_after_secs = self.inner.cooldown.as_secs();
                    warn!(
                        %scope,
                        cooldown_secs = retry_after_secs,
                        "Binding proof rejected, suspending token negotiation"
                    );
                    Err(AuthError::InvalidBinding { retry_after_secs })
                }
                Err(e) => {
                    warn!(%scope, error = %e, "Token negotiation failed");
                    Err(AuthError::Negotiation(e.to_string()))
                }
            };
            (outcome, current)
        };

        if outcome.is_ok() && current {
            self.notify(scope);
        }

        outcome
    }

    fn notify(&self, scope: Scope) {
        let listeners: Vec<Arc<dyn TokenListener>> = {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in listeners {
            listener.token_acquired(scope);
        }
    }

    // =========================================================================
    // Cache Queries
    // =========================================================================

    /// Any token (either scope) valid right now, meta preferred.
    ///
    /// Never negotiates.
    pub fn any_valid_token(&self) -> Option<(Scope, BearerToken)> {
        let state = self.lock();
        let now = Instant::now();
        if let Some(token) = state.meta.peek_valid(now) {
            return Some((Scope::Meta, token.clone()));
        }
        state
            .thread
            .peek_valid(now)
            .map(|token| (Scope::Thread, token.clone()))
    }

    /// Returns true if a valid token for `scope` is cached.
    pub fn has_valid_token(&self, scope: Scope) -> bool {
        let state = self.lock();
        let now = Instant::now();
        match scope {
            Scope::Thread => state.thread.peek_valid(now).is_some(),
            Scope::Meta => state.meta.peek_valid(now).is_some(),
        }
    }

    /// Returns true while negotiation is suspended.
    pub fn cooldown_active(&self) -> bool {
        self.lock().cooldown.is_active(Instant::now())
    }

    /// Snapshot of both caches and the cooldown window.
    pub fn status(&self) -> TokenStatus {
        let state = self.lock();
        let now = Instant::now();

        let scope_status = |token: Option<&BearerToken>, bound_to: Option<String>| ScopeStatus {
            has_valid_token: token.is_some(),
            plan: token.and_then(|t| t.plan().map(str::to_string)),
            remaining_secs: token.map(|t| t.remaining_secs(now)).unwrap_or(0),
            bound_to,
        };

        let thread_token = state.thread.peek_valid(now);
        TokenStatus {
            thread: scope_status(
                thread_token,
                thread_token.and(state.thread.binding().cloned()),
            ),
            meta: scope_status(state.meta.peek_valid(now), None),
            cooldown_remaining_secs: state.cooldown.remaining(now).map(ceil_secs),
        }
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drops the cached token for `scope`, e.g. after a 401.
    pub fn invalidate(&self, scope: Scope) {
        let mut state = self.lock();
        match scope {
            Scope::Thread => state.thread.invalidate(),
            Scope::Meta => state.meta.invalidate(),
        }
        debug!(%scope, "Token invalidated");
    }

    /// Drops both caches and forgets the remembered actor. In-flight
    /// negotiations still answer their callers but no longer store.
    ///
    /// The cooldown window is kept.
    pub fn sign_out(&self) {
        let mut state = self.lock();
        state.thread.invalidate();
        state.meta.invalidate();
        state.in_flight.clear();
        state.actor = None;
        state.epoch += 1;
        info!("Signed out, token caches cleared");
    }

    // =========================================================================
    // Actor
    // =========================================================================

    /// Remembers the actor to attach to subsequent negotiations.
    pub fn remember_actor(&self, actor: Actor) {
        self.lock().actor = Some(actor);
    }

    /// The remembered actor.
    pub fn actor(&self) -> Option<Actor> {
        self.lock().actor.clone()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("credential", &self.inner.credential)
            .field("expiry_skew", &self.inner.expiry_skew)
            .field("status", &self.status())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
