//! HTTP implementation of [`CommentsApi`] over `reqwest`.
//!
//! Timeouts are enforced by the underlying client and surface as
//! [`ApiError::Transport`], same as any other connection failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use parley_core::{Item, ModerationSettings, ReportOutcome};

use crate::api::{
    parse_report_response, CommentsApi, CreateCommentRequest, ListQuery, ProfileUpsert,
    RawPage, ReactRequest, ReportRequest, TokenGrant, TokenRequest,
};
use crate::credential::Credential;
use crate::error::{ApiError, ApiResult, SyncError, SyncResult};
use crate::token_cache::BearerToken;

/// Pagination header carrying the next cursor.
pub const HEADER_NEXT_CURSOR: &str = "x-next-cursor";
/// Pagination header carrying the "more available" flag.
pub const HEADER_HAS_MORE: &str = "x-has-more";

/// Error code the token endpoint uses for a rejected binding proof.
const INVALID_BINDING_CODE: &str = "invalid_binding";

/// Error body shape shared by all endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Comments service client.
#[derive(Debug, Clone)]
pub struct HttpCommentsApi {
    client: Client,
    base_url: Url,
}

impl HttpCommentsApi {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        // Url::join drops the last path segment unless it ends with '/'.
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpCommentsApi { client, base_url })
    }

    /// Resolves an endpoint path against the base URL.
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authed(&self, builder: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        builder.bearer_auth(token.value())
    }

    /// Turns a non-success response into an [`ApiError`].
    async fn error_from(response: Response) -> ApiError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();

        let code = body.as_ref().and_then(|b| b.error.clone());
        if code.as_deref() == Some(INVALID_BINDING_CODE) {
            return ApiError::InvalidBinding;
        }

        let message = body
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("").to_string()
                } else {
                    text
                }
            });

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// Sends a request and returns the response if it succeeded.
    async fn send(builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl CommentsApi for HttpCommentsApi {
    #[instrument(skip_all, fields(thread_key = ?request.thread_key))]
    async fn negotiate_token(
        &self,
        credential: &Credential,
        request: &TokenRequest,
    ) -> ApiResult<TokenGrant> {
        let mut builder = self.client.post(self.endpoint("token")?).json(request);
        for (name, value) in credential.client_headers() {
            builder = builder.header(name, value);
        }

        let response = Self::send(builder).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip_all, fields(thread_key = %query.thread_key, limit = query.limit))]
    async fn list_comments(&self, token: &BearerToken, query: &ListQuery) -> ApiResult<RawPage> {
        let mut url = self.endpoint("comments")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("thread", &query.thread_key);
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some((name, value)) = &query.cursor {
                pairs.append_pair(name, value);
            }
        }

        let response = Self::send(self.authed(self.client.get(url), token)).await?;

        let next_cursor = header_value(&response, HEADER_NEXT_CURSOR);
        let has_more = header_value(&response, HEADER_HAS_MORE);
        let items: Vec<Item> = response.json().await?;

        debug!(count = items.len(), ?next_cursor, ?has_more, "Fetched comment page");

        Ok(RawPage {
            items,
            next_cursor,
            has_more,
        })
    }

    #[instrument(skip_all, fields(thread_key = %request.thread_key))]
    async fn create_comment(
        &self,
        token: &BearerToken,
        request: &CreateCommentRequest,
    ) -> ApiResult<Item> {
        let builder = self.client.post(self.endpoint("comments")?).json(request);
        let response = Self::send(self.authed(builder, token)).await?;
        Ok(response.json().await?)
    }

    #[instrument(skip_all, fields(comment_id = %request.comment_id))]
    async fn report_comment(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReportRequest,
    ) -> ApiResult<ReportOutcome> {
        let builder = self
            .client
            .post(self.endpoint("comments/report")?)
            .query(&[("thread", thread_key)])
            .json(request);
        let response = Self::send(self.authed(builder, token)).await?;
        let body: Value = response.json().await?;
        parse_report_response(&body)
    }

    #[instrument(skip_all, fields(comment_id = %request.comment_id))]
    async fn react(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReactRequest,
    ) -> ApiResult<()> {
        let builder = self
            .client
            .post(self.endpoint("comments/react")?)
            .query(&[("thread", thread_key)])
            .json(request);
        Self::send(self.authed(builder, token)).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn upsert_profile(
        &self,
        token: &BearerToken,
        thread_key: &str,
        profile: &ProfileUpsert,
    ) -> ApiResult<()> {
        let builder = self
            .client
            .post(self.endpoint("profile/upsert")?)
            .query(&[("thread", thread_key)])
            .json(profile);
        Self::send(self.authed(builder, token)).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn fetch_settings(
        &self,
        token: &BearerToken,
        thread_key: &str,
    ) -> ApiResult<ModerationSettings> {
        let builder = self
            .client
            .get(self.endpoint("comments/settings")?)
            .query(&[("thread", thread_key)]);
        let response = Self::send(self.authed(builder, token)).await?;
        Ok(response.json().await?)
    }
}
