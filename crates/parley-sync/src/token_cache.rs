//! # Token Cache
//!
//! One generic cache type, instantiated twice by the token manager:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Token Caches                                    │
//! │                                                                         │
//! │  TokenCache<String>  "thread"   bound to the resource key it was        │
//! │                                 issued for; a different key clears it   │
//! │                                                                         │
//! │  TokenCache<()>      "meta"     identity, settings, reports, reactions  │
//! │                                                                         │
//! │  Keeping the two apart means switching between content and meta calls  │
//! │  never evicts the other scope's token.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is checked `skew` early so a request never races the real expiry.
//! All times come from `tokio::time::Instant` so tests can pause the clock.

use std::time::Duration;

use tokio::time::Instant;

/// Longest lifetime honoured from a token grant.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// Bearer Token
// =============================================================================

/// A short-lived access token.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    expires_at: Instant,
    plan: Option<String>,
}

impl BearerToken {
    /// Creates a token that expires `expires_in` after `issued_at`.
    ///
    /// Lifetimes above [`MAX_TOKEN_LIFETIME`] are capped.
    pub fn new(
        value: impl Into<String>,
        issued_at: Instant,
        expires_in: Duration,
        plan: Option<String>,
    ) -> Self {
        let lifetime = expires_in.min(MAX_TOKEN_LIFETIME);
        BearerToken {
            value: value.into(),
            expires_at: issued_at.checked_add(lifetime).unwrap_or(issued_at),
            plan,
        }
    }

    /// The token value for the `Authorization` header.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Server-declared expiry.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Plan tier granted with the token.
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Returns true if the token is still usable at `now`, treating it as
    /// expired `skew` before the declared expiry.
    pub fn is_valid_at(&self, now: Instant, skew: Duration) -> bool {
        now.checked_add(skew)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Whole seconds left before the declared expiry.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.expires_at.saturating_duration_since(now).as_secs()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("plan", &self.plan)
            .finish()
    }
}

// =============================================================================
// Token Cache
// =============================================================================

#[derive(Debug, Clone)]
struct CacheEntry<B> {
    token: BearerToken,
    binding: B,
}

/// Holds at most one token together with what it is bound to.
#[derive(Debug)]
pub struct TokenCache<B> {
    name: &'static str,
    skew: Duration,
    entry: Option<CacheEntry<B>>,
}

impl<B: PartialEq + std::fmt::Debug> TokenCache<B> {
    /// Creates an empty cache.
    pub fn new(name: &'static str, skew: Duration) -> Self {
        TokenCache {
            name,
            skew,
            entry: None,
        }
    }

    /// Cache name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the cached token if it is valid at `now` and bound to
    /// `binding`. A stale or differently bound entry is cleared.
    pub fn get(&mut self, binding: &B, now: Instant) -> Option<BearerToken> {
        let entry = self.entry.as_ref()?;

        if entry.binding != *binding {
            tracing::debug!(
                cache = self.name,
                cached = ?entry.binding,
                requested = ?binding,
                "Token bound to another resource, discarding"
            );
            self.entry = None;
            return None;
        }

        if !entry.token.is_valid_at(now, self.skew) {
            tracing::debug!(cache = self.name, "Cached token expired, discarding");
            self.entry = None;
            return None;
        }

        Some(entry.token.clone())
    }

    /// Returns the cached token if it is valid at `now`, whatever it is
    /// bound to. Does not clear anything.
    pub fn peek_valid(&self, now: Instant) -> Option<&BearerToken> {
        self.entry
            .as_ref()
            .map(|e| &e.token)
            .filter(|t| t.is_valid_at(now, self.skew))
    }

    /// Binding of the cached entry, valid or not.
    pub fn binding(&self) -> Option<&B> {
        self.entry.as_ref().map(|e| &e.binding)
    }

    /// Stores a freshly negotiated token.
    pub fn store(&mut self, binding: B, token: BearerToken) {
        self.entry = Some(CacheEntry { token, binding });
    }

    /// Drops the cached token.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

// =============================================================================
// Cooldown Window
// =============================================================================

/// Suspends all negotiation after a binding rejection.
#[derive(Debug, Clone, Default)]
pub struct CooldownWindow {
    until: Option<Instant>,
}

impl CooldownWindow {
    /// Starts (or extends) the window to `now + duration`.
    pub fn start(&mut self, now: Instant, duration: Duration) {
        self.until = Some(now + duration);
    }

    /// Time left in the window, or `None` if it is not active.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Returns true while negotiation is suspended.
    pub fn is_active(&self, now: Instant) -> bool {
        self.remaining(now).is_some()
    }
}

/// Whole seconds, rounded up so that an active window never reports zero.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
