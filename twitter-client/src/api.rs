use archiver_core::{ApiConfig, CoreError, FetchError, Fetcher, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// `max_results` bounds accepted by the user timeline endpoint.
const MIN_PAGE_SIZE: usize = 5;
const MAX_PAGE_SIZE: usize = 100;

const TWEET_FIELDS: &str = "created_at,author_id,conversation_id,lang,public_metrics";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct UserLookupResponse {
    pub data: Option<UserData>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    pub title: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub meta: TimelineMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineMeta {
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
}

#[derive(Debug)]
pub struct TwitterApiClient {
    http_client: Client,
    config: ApiConfig,
    user_cache: Mutex<HashMap<String, UserData>>,
}

impl TwitterApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            config,
            user_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.config.api_base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| CoreError::Internal {
                message: format!("API base {} cannot hold a path", self.config.api_base),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Response, CoreError> {
        let endpoint = url.path().to_string();
        let start_time = Instant::now();

        debug!("Making timeline API request: GET {}", endpoint);
        let response = match self
            .http_client
            .get(url)
            .bearer_auth(&self.config.bearer_token)
            .query(query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::Fetch(FetchError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        debug!(
            "GET {} returned {} in {:?}",
            endpoint,
            status,
            start_time.elapsed()
        );
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let fetch_error = match status.as_u16() {
            401 => FetchError::AuthenticationFailed {
                reason: format!("{} rejected the bearer token", endpoint),
            },
            403 => FetchError::Forbidden { resource: endpoint },
            404 => FetchError::EndpointUnavailable { endpoint },
            429 => {
                let retry_after = retry_after_secs(response.headers());
                warn!("Rate limited, retry after {} seconds", retry_after);
                FetchError::RateLimitExceeded { retry_after }
            }
            code if status.is_server_error() => FetchError::ServerError { status_code: code },
            code => FetchError::InvalidResponse {
                details: format!("unexpected status {} from {}", code, endpoint),
            },
        };
        Err(CoreError::Fetch(fetch_error))
    }

    /// Resolves a handle to its account record via `GET /2/users/by/username/{username}`.
    pub async fn lookup_user(&self, username: &str) -> Result<UserData, CoreError> {
        let url = self.endpoint(&["2", "users", "by", "username", username])?;
        let response = match self.get(url, &[]).await {
            Err(CoreError::Fetch(FetchError::EndpointUnavailable { .. })) => {
                return Err(user_not_found(username));
            }
            other => other?,
        };

        let lookup: UserLookupResponse = response.json().await.map_err(|e| {
            error!("Failed to parse user lookup: {}", e);
            CoreError::Fetch(FetchError::InvalidResponse {
                details: format!("Failed to parse user lookup for {}", username),
            })
        })?;

        match lookup.data {
            Some(user) => {
                debug!("Resolved {} to user id {}", user.username, user.id);
                Ok(user)
            }
            None => {
                for problem in &lookup.errors {
                    warn!(
                        "User lookup problem: {} ({})",
                        problem.title.as_deref().unwrap_or("unknown"),
                        problem.detail.as_deref().unwrap_or("no detail")
                    );
                }
                Err(user_not_found(username))
            }
        }
    }

    async fn resolve_user(&self, username: &str) -> Result<UserData, CoreError> {
        if let Some(user) = self.cached_user(username) {
            return Ok(user);
        }

        let user = self.lookup_user(username).await?;
        self.user_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(username.to_string(), user.clone());
        Ok(user)
    }

    fn cached_user(&self, username: &str) -> Option<UserData> {
        self.user_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(username)
            .cloned()
    }

    /// Pages through the user's timeline until `limit` posts are collected or
    /// the source runs out.
    pub async fn get_user_timeline(
        &self,
        user: &UserData,
        limit: usize,
    ) -> Result<Vec<Post>, CoreError> {
        let url = self.endpoint(&["2", "users", user.id.as_str(), "tweets"])?;
        let mut posts = Vec::with_capacity(limit.min(MAX_PAGE_SIZE));
        let mut pagination_token: Option<String> = None;

        while posts.len() < limit {
            let page_size = (limit - posts.len()).clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
            let mut query = vec![
                ("max_results", page_size.to_string()),
                ("tweet.fields", TWEET_FIELDS.to_string()),
            ];
            if let Some(token) = &pagination_token {
                query.push(("pagination_token", token.clone()));
            }

            let response = self.get(url.clone(), &query).await?;
            let page: TimelinePage = response.json().await.map_err(|e| {
                error!("Failed to parse timeline page: {}", e);
                CoreError::Fetch(FetchError::InvalidResponse {
                    details: format!("Failed to parse timeline for {}", user.username),
                })
            })?;

            let page_len = page.data.len();
            for record in page.data.into_iter().take(limit - posts.len()) {
                posts.push(post_from_record(&user.username, record)?);
            }

            match page.meta.next_token {
                Some(token) if page_len > 0 => pagination_token = Some(token),
                _ => break,
            }
        }

        info!("Retrieved {} posts from @{}", posts.len(), user.username);
        Ok(posts)
    }
}

#[async_trait]
impl Fetcher for TwitterApiClient {
    async fn fetch(&self, username: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        let user = self.resolve_user(username).await?;
        self.get_user_timeline(&user, limit as usize).await
    }
}

fn user_not_found(username: &str) -> CoreError {
    CoreError::Fetch(FetchError::UserNotFound {
        username: username.to_string(),
    })
}

/// Seconds to wait after a 429, from `retry-after` or the epoch in `x-rate-limit-reset`.
fn retry_after_secs(headers: &HeaderMap) -> u64 {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };

    if let Some(seconds) = header_u64("retry-after") {
        return seconds;
    }
    if let Some(reset_at) = header_u64("x-rate-limit-reset") {
        let now = Utc::now().timestamp().max(0) as u64;
        return reset_at.saturating_sub(now).max(1);
    }
    DEFAULT_RETRY_AFTER_SECS
}

/// Turns one raw tweet object into a [`Post`], keeping every field it carries.
pub fn post_from_record(username: &str, record: Map<String, Value>) -> Result<Post, FetchError> {
    let id = match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(FetchError::InvalidResponse {
                details: "tweet without an id".to_string(),
            })
        }
    };

    let created_at = record
        .get("created_at")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::InvalidResponse {
            details: format!("tweet {} has no created_at", id),
        })?;
    let datestamp = DateTime::parse_from_rfc3339(created_at)
        .map_err(|e| FetchError::InvalidResponse {
            details: format!("tweet {} has malformed created_at {:?}: {}", id, created_at, e),
        })?
        .with_timezone(&Utc)
        .date_naive();

    Ok(Post::from_record(id, username, datestamp, record))
}
