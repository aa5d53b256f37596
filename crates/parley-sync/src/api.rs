//! # Network Collaborator
//!
//! The [`CommentsApi`] trait is the seam between the session core and the
//! comments service. [`HttpCommentsApi`](crate::http::HttpCommentsApi) talks
//! HTTP; tests plug in a scripted stub.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /token              {apiKey, threadKey?, externalUser?}           │
//! │                           → {access_token, expires_in, plan?}           │
//! │  GET  /comments           ?thread=&limit=&cursor=|before=               │
//! │                           → [Item], x-next-cursor, x-has-more           │
//! │  POST /comments           {threadKey, body} → Item                      │
//! │  POST /comments/report    {commentId, reason?} → {duplicate} | row echo │
//! │  POST /comments/react     {commentId, reaction|null}                    │
//! │  POST /profile/upsert     {displayName?, avatarUrl?}                    │
//! │  GET  /comments/settings  → ModerationSettings                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call except `/token` carries `Authorization: Bearer <token>`.
//! Non-content calls (report, react, profile, settings) name their synthetic
//! thread key in the `thread` query parameter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::{Actor, Item, ModerationSettings, ReportOutcome};

use crate::credential::Credential;
use crate::error::{ApiError, ApiResult};
use crate::token_cache::BearerToken;

// =============================================================================
// Wire Types
// =============================================================================

/// Body of `POST /token`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Install credential.
    pub api_key: String,

    /// Resource (or synthetic) key the token is requested for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_key: Option<String>,

    /// Current actor, if one has been identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user: Option<Actor>,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("api_key", &"<redacted>")
            .field("thread_key", &self.thread_key)
            .field("external_user", &self.external_user)
            .finish()
    }
}

/// Response of `POST /token`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    /// Bearer token value.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Plan tier.
    #[serde(default)]
    pub plan: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("plan", &self.plan)
            .finish()
    }
}

/// Query of `GET /comments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Resource key.
    pub thread_key: String,
    /// Page size, already clamped.
    pub limit: u32,
    /// `("cursor", token)` or `("before", iso8601)`.
    pub cursor: Option<(&'static str, String)>,
}

/// Body and pagination headers of a `GET /comments` response, unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    /// Items in server order.
    pub items: Vec<Item>,
    /// `x-next-cursor` header.
    pub next_cursor: Option<String>,
    /// `x-has-more` header.
    pub has_more: Option<String>,
}

/// Body of `POST /comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub thread_key: String,
    pub body: String,
}

/// Body of `POST /comments/report`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub comment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body of `POST /comments/react`. `reaction: null` clears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactRequest {
    pub comment_id: String,
    pub reaction: Option<String>,
}

/// Body of `POST /profile/upsert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Actor> for ProfileUpsert {
    fn from(actor: &Actor) -> Self {
        ProfileUpsert {
            display_name: actor.display_name.clone(),
            avatar_url: actor.avatar_url.clone(),
        }
    }
}

/// Interprets a `POST /comments/report` response body.
///
/// The service answers either `{ "duplicate": bool }` or, for a fresh report,
/// an echo of the created report row.
pub fn parse_report_response(body: &Value) -> ApiResult<ReportOutcome> {
    match body {
        Value::Object(map) => match map.get("duplicate") {
            Some(Value::Bool(duplicate)) => Ok(ReportOutcome {
                duplicate: *duplicate,
            }),
            Some(other) => Err(ApiError::Decode(format!(
                "report: duplicate must be a boolean, got {}",
                other
            ))),
            None => Ok(ReportOutcome { duplicate: false }),
        },
        other => Err(ApiError::Decode(format!(
            "report: expected an object, got {}",
            other
        ))),
    }
}

// =============================================================================
// Collaborator Trait
// =============================================================================

/// Operations the session core needs from the comments service.
///
/// Implementations enforce their own timeouts and report them as
/// [`ApiError::Transport`].
#[async_trait]
pub trait CommentsApi: Send + Sync {
    /// `POST /token`. A binding rejection must come back as
    /// [`ApiError::InvalidBinding`].
    async fn negotiate_token(
        &self,
        credential: &Credential,
        request: &TokenRequest,
    ) -> ApiResult<TokenGrant>;

    /// `GET /comments`.
    async fn list_comments(&self, token: &BearerToken, query: &ListQuery) -> ApiResult<RawPage>;

    /// `POST /comments`.
    async fn create_comment(
        &self,
        token: &BearerToken,
        request: &CreateCommentRequest,
    ) -> ApiResult<Item>;

    /// `POST /comments/report`.
    async fn report_comment(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReportRequest,
    ) -> ApiResult<ReportOutcome>;

    /// `POST /comments/react`.
    async fn react(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReactRequest,
    ) -> ApiResult<()>;

    /// `POST /profile/upsert`.
    async fn upsert_profile(
        &self,
        token: &BearerToken,
        thread_key: &str,
        profile: &ProfileUpsert,
    ) -> ApiResult<()>;

    /// `GET /comments/settings`.
    async fn fetch_settings(
        &self,
        token: &BearerToken,
        thread_key: &str,
    ) -> ApiResult<ModerationSettings>;
}
