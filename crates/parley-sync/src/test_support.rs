//! Scripted [`CommentsApi`] stub and fixtures for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use parley_core::{Item, ModerationSettings, ModerationStatus, ReportOutcome};

use crate::api::{
    CommentsApi, CreateCommentRequest, ListQuery, ProfileUpsert, RawPage, ReactRequest,
    ReportRequest, TokenGrant, TokenRequest,
};
use crate::config::AuthSettings;
use crate::credential::Credential;
use crate::error::{ApiError, ApiResult};
use crate::token_cache::BearerToken;
use crate::token_manager::TokenManager;

pub const TEST_API_KEY: &str = "pk_test_123";

pub fn credential() -> Credential {
    Credential::new(TEST_API_KEY, "linux", "com.example.reader", "1.0.0")
}

pub fn manager_with(api: &StubApi) -> TokenManager {
    TokenManager::new(Arc::new(api.clone()), credential(), &AuthSettings::default())
}

pub fn grant(value: &str, expires_in: u64) -> TokenGrant {
    TokenGrant {
        access_token: value.to_string(),
        expires_in,
        plan: Some("pro".to_string()),
    }
}

pub fn item(id: &str, minute: u32) -> Item {
    Item {
        id: id.to_string(),
        author_id: "u-server".to_string(),
        author_name: None,
        body: format!("body of {id}"),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
        moderation_status: ModerationStatus::Approved,
        flagged: false,
        reaction_counts: Default::default(),
        viewer_reaction: None,
    }
}

pub fn raw_page(ids: &[&str], next_cursor: Option<&str>, has_more: Option<&str>) -> RawPage {
    RawPage {
        items: ids.iter().map(|id| item(id, 0)).collect(),
        next_cursor: next_cursor.map(str::to_string),
        has_more: has_more.map(str::to_string),
    }
}

/// A call that carried a bearer token.
#[derive(Debug, Clone)]
pub struct Recorded<T> {
    pub bearer: String,
    pub thread_key: String,
    pub request: T,
}

#[derive(Default)]
struct Script {
    token_delay: Duration,
    list_delay: Duration,
    create_delay: Duration,
    upsert_delay: Duration,

    tokens: VecDeque<ApiResult<TokenGrant>>,
    token_requests: Vec<TokenRequest>,
    token_counter: usize,

    pages: HashMap<(String, Option<String>), RawPage>,
    list_errors: VecDeque<ApiError>,
    list_calls: Vec<Recorded<ListQuery>>,

    creates: VecDeque<ApiResult<Item>>,
    create_calls: Vec<Recorded<CreateCommentRequest>>,

    reacts: VecDeque<ApiResult<()>>,
    react_calls: Vec<Recorded<ReactRequest>>,

    reports: VecDeque<ApiResult<ReportOutcome>>,
    report_calls: Vec<Recorded<ReportRequest>>,

    upserts: VecDeque<ApiResult<()>>,
    upsert_calls: Vec<Recorded<ProfileUpsert>>,

    settings: Option<ApiResult<ModerationSettings>>,
    settings_calls: Vec<Recorded<()>>,
}

/// Call-counting, scripted collaborator. Clones share state.
///
/// Unscripted calls succeed: tokens are `tok-<n>` with a 900s lifetime,
/// created comments are `srv-<n>` echoing the submitted body.
#[derive(Clone, Default)]
pub struct StubApi {
    script: Arc<Mutex<Script>>,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }

    pub fn with_token_delay(self, delay: Duration) -> Self {
        self.with(|s| s.token_delay = delay);
        self
    }

    pub fn with_list_delay(self, delay: Duration) -> Self {
        self.with(|s| s.list_delay = delay);
        self
    }

    pub fn with_create_delay(self, delay: Duration) -> Self {
        self.with(|s| s.create_delay = delay);
        self
    }

    pub fn with_upsert_delay(self, delay: Duration) -> Self {
        self.with(|s| s.upsert_delay = delay);
        self
    }

    // -- scripting ------------------------------------------------------------

    pub fn push_token(&self, result: ApiResult<TokenGrant>) {
        self.with(|s| s.tokens.push_back(result));
    }

    pub fn set_page(&self, thread: &str, cursor: Option<&str>, page: RawPage) {
        self.with(|s| {
            s.pages
                .insert((thread.to_string(), cursor.map(str::to_string)), page)
        });
    }

    pub fn push_list_error(&self, err: ApiError) {
        self.with(|s| s.list_errors.push_back(err));
    }

    pub fn push_create(&self, result: ApiResult<Item>) {
        self.with(|s| s.creates.push_back(result));
    }

    pub fn push_react(&self, result: ApiResult<()>) {
        self.with(|s| s.reacts.push_back(result));
    }

    pub fn push_report(&self, result: ApiResult<ReportOutcome>) {
        self.with(|s| s.reports.push_back(result));
    }

    pub fn push_upsert(&self, result: ApiResult<()>) {
        self.with(|s| s.upserts.push_back(result));
    }

    pub fn set_settings(&self, result: ApiResult<ModerationSettings>) {
        self.with(|s| s.settings = Some(result));
    }

    // -- inspection -----------------------------------------------------------

    pub fn token_calls(&self) -> usize {
        self.with(|s| s.token_requests.len())
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.with(|s| s.token_requests.clone())
    }

    pub fn list_calls(&self) -> Vec<Recorded<ListQuery>> {
        self.with(|s| s.list_calls.clone())
    }

    pub fn create_calls(&self) -> Vec<Recorded<CreateCommentRequest>> {
        self.with(|s| s.create_calls.clone())
    }

    pub fn react_calls(&self) -> Vec<Recorded<ReactRequest>> {
        self.with(|s| s.react_calls.clone())
    }

    pub fn report_calls(&self) -> Vec<Recorded<ReportRequest>> {
        self.with(|s| s.report_calls.clone())
    }

    pub fn upsert_calls(&self) -> Vec<Recorded<ProfileUpsert>> {
        self.with(|s| s.upsert_calls.clone())
    }

    pub fn settings_calls(&self) -> Vec<Recorded<()>> {
        self.with(|s| s.settings_calls.clone())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn recorded<T>(token: &BearerToken, thread_key: &str, request: T) -> Recorded<T> {
    Recorded {
        bearer: token.value().to_string(),
        thread_key: thread_key.to_string(),
        request,
    }
}

#[async_trait]
impl CommentsApi for StubApi {
    async fn negotiate_token(
        &self,
        _credential: &Credential,
        request: &TokenRequest,
    ) -> ApiResult<TokenGrant> {
        let delay = self.with(|s| {
            s.token_requests.push(request.clone());
            s.token_delay
        });
        pause(delay).await;
        self.with(|s| {
            s.token_counter += 1;
            let n = s.token_counter;
            s.tokens
                .pop_front()
                .unwrap_or_else(|| Ok(grant(&format!("tok-{n}"), 900)))
        })
    }

    async fn list_comments(&self, token: &BearerToken, query: &ListQuery) -> ApiResult<RawPage> {
        let delay = self.with(|s| {
            s.list_calls
                .push(recorded(token, &query.thread_key, query.clone()));
            s.list_delay
        });
        pause(delay).await;
        self.with(|s| {
            if let Some(err) = s.list_errors.pop_front() {
                return Err(err);
            }
            let cursor = query.cursor.as_ref().map(|(_, value)| value.clone());
            Ok(s.pages
                .get(&(query.thread_key.clone(), cursor))
                .cloned()
                .unwrap_or_default())
        })
    }

    async fn create_comment(
        &self,
        token: &BearerToken,
        request: &CreateCommentRequest,
    ) -> ApiResult<Item> {
        let (delay, n) = self.with(|s| {
            s.create_calls
                .push(recorded(token, &request.thread_key, request.clone()));
            (s.create_delay, s.create_calls.len())
        });
        pause(delay).await;
        self.with(|s| {
            s.creates.pop_front().unwrap_or_else(|| {
                let mut created = item(&format!("srv-{n}"), 30);
                created.body = request.body.clone();
                Ok(created)
            })
        })
    }

    async fn report_comment(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReportRequest,
    ) -> ApiResult<ReportOutcome> {
        self.with(|s| {
            s.report_calls
                .push(recorded(token, thread_key, request.clone()));
            s.reports
                .pop_front()
                .unwrap_or(Ok(ReportOutcome { duplicate: false }))
        })
    }

    async fn react(
        &self,
        token: &BearerToken,
        thread_key: &str,
        request: &ReactRequest,
    ) -> ApiResult<()> {
        self.with(|s| {
            s.react_calls.push(recorded(token, thread_key, request.clone()));
            s.reacts.pop_front().unwrap_or(Ok(()))
        })
    }

    async fn upsert_profile(
        &self,
        token: &BearerToken,
        thread_key: &str,
        profile: &ProfileUpsert,
    ) -> ApiResult<()> {
        let delay = self.with(|s| {
            s.upsert_calls.push(recorded(token, thread_key, profile.clone()));
            s.upsert_delay
        });
        pause(delay).await;
        self.with(|s| s.upserts.pop_front().unwrap_or(Ok(())))
    }

    async fn fetch_settings(
        &self,
        token: &BearerToken,
        thread_key: &str,
    ) -> ApiResult<ModerationSettings> {
        self.with(|s| {
            s.settings_calls.push(recorded(token, thread_key, ()));
            s.settings
                .clone()
                .unwrap_or_else(|| Ok(ModerationSettings::default()))
        })
    }
}
