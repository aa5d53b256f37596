//! # Sync Error Types
//!
//! Error types for session and synchronization operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │      Auth       │  │     Transport           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  InvalidBinding │  │  Transport (incl.       │ │
//! │  │  InvalidUrl     │  │  Negotiation    │  │    timeouts)            │ │
//! │  │  ConfigLoad/Save│  │  Unauthorized   │  │  Rejected {status}      │ │
//! │  └─────────────────┘  └─────────────────┘  │  Decode                 │ │
//! │                                            └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Validation    │  │      Core       │   Collaborator level:        │
//! │  │                 │  │                 │   ApiError is what a         │
//! │  │  Caller input   │  │  NotFound       │   CommentsApi returns; the   │
//! │  │  rejected before│  │  Unconfirmed    │   engines map it into        │
//! │  │  any network    │  │                 │   AuthError / SyncError.     │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate retries automatically; the predicates on
//! [`SyncError`] are for the caller's retry decision.

use parley_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for network collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Auth Error
// =============================================================================

/// Token negotiation failures.
///
/// `Clone` so that one shared negotiation result can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The service rejected the client's binding proof.
    ///
    /// Negotiation for every scope is suspended until the cooldown window
    /// ends. UIs should show a dedicated remediation screen for this one.
    #[error("Client binding rejected; token negotiation suspended for {retry_after_secs}s")]
    InvalidBinding { retry_after_secs: u64 },

    /// Negotiation failed for any other reason (bad credential, network).
    /// No cooldown is set; safe to retry.
    #[error("Token negotiation failed: {0}")]
    Negotiation(String),

    /// A content or meta call was answered with 401; the cached token for
    /// that scope has been dropped.
    #[error("Access token rejected: {0}")]
    Unauthorized(String),
}

impl AuthError {
    /// Returns true for the binding rejection.
    pub fn is_invalid_binding(&self) -> bool {
        matches!(self, AuthError::InvalidBinding { .. })
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Errors returned by a [`CommentsApi`](crate::api::CommentsApi)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Token endpoint answered `{ "error": "invalid_binding" }`.
    #[error("Binding proof rejected by the service")]
    InvalidBinding,

    /// HTTP 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success status.
    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection failure or timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be parsed.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::Transport(format!("invalid endpoint: {}", err))
    }
}

// =============================================================================
// Sync Error
// =============================================================================

/// Everything a session call can fail with.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Service base URL does not parse or has the wrong scheme.
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// Token negotiation or token use failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    // =========================================================================
    // Input / Model Errors
    // =========================================================================
    /// Caller input failed local checks; no network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The comment list cannot satisfy the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network failure or collaborator timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Invalid response: {0}")]
    Decode(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (task failure, poisoned state).
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            // Only the token endpoint reports binding failures; anywhere else
            // it is just a refusal.
            ApiError::InvalidBinding => SyncError::Rejected {
                status: 403,
                message: "invalid_binding".to_string(),
            },
            ApiError::Unauthorized(msg) => SyncError::Auth(AuthError::Unauthorized(msg)),
            ApiError::Status { status, message } => SyncError::Rejected { status, message },
            ApiError::Transport(msg) => SyncError::Transport(msg),
            ApiError::Decode(msg) => SyncError::Decode(msg),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry affordances)
// =============================================================================

impl SyncError {
    /// Returns true if the caller may reasonably offer a retry.
    ///
    /// ## Retryable
    /// - Transport failures and timeouts
    /// - 5xx and 429 responses
    /// - Auth failures other than a binding rejection
    ///
    /// ## Not Retryable
    /// - Binding rejection (wait out the cooldown)
    /// - Validation and configuration errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Rejected { status, .. } => *status >= 500 || *status == 429,
            SyncError::Auth(auth) => !auth.is_invalid_binding(),
            _ => false,
        }
    }

    /// Returns true for any auth failure.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    /// Returns true if the service rejected the client's binding proof.
    pub fn is_invalid_binding(&self) -> bool {
        matches!(self, SyncError::Auth(auth) if auth.is_invalid_binding())
    }

    /// Returns true for network/parsing failures unrelated to auth.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Rejected { .. } | SyncError::Decode(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
