use crate::error::{RepoSnapshotError, Result};
use crate::github::types::{ApiRepository, GitHubError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const GITHUB_API_BASE: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Wait used when an exhausted quota carries no reset header
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-snapshot"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            token,
            base_url: GITHUB_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        request
    }

    /// Fetch every repository of an organization, one page at a time.
    ///
    /// A rate-limited response (see [`rate_limit_backoff`]) sleeps until the
    /// quota refills and retries the same page. Any other failure status,
    /// including a 403 with quota left, is returned as `GitHubApi`.
    pub async fn fetch_org_repos(&self, org: &str) -> Result<Vec<ApiRepository>> {
        info!("Fetching repos from {}", org);

        let mut all_repos = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/orgs/{}/repos?per_page={}&page={}",
                self.base_url, org, PER_PAGE, page
            );

            let response = self.get(&url).send().await?;
            let status = response.status();

            if let Some(wait) = rate_limit_backoff(status, response.headers(), unix_now()) {
                warn!("Rate limited. Sleeping {}s...", wait.as_secs());
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            let repos: Vec<ApiRepository> = response.json().await?;

            if repos.is_empty() {
                break;
            }

            debug!("{}: page {} returned {} repos", org, page, repos.len());
            all_repos.extend(repos);
            page += 1;
        }

        Ok(all_repos)
    }

    /// Check rate limit status
    pub async fn check_rate_limit(&self) -> Result<RateLimit> {
        let url = format!("{}/rate_limit", self.base_url);

        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let data: serde_json::Value = response.json().await?;
        let core = &data["resources"]["core"];

        Ok(RateLimit {
            limit: core["limit"].as_u64().unwrap_or(0),
            remaining: core["remaining"].as_u64().unwrap_or(0),
            reset: core["reset"].as_u64().unwrap_or(0),
        })
    }
}

#[derive(Debug)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

/// Turn a failed response into `GitHubApi`, preferring the API's message
async fn api_error(response: reqwest::Response) -> RepoSnapshotError {
    let status = response.status().as_u16();
    let message = match response.text().await {
        Ok(body) => match serde_json::from_str::<GitHubError>(&body) {
            Ok(gh_err) => gh_err.message,
            Err(_) => body,
        },
        Err(e) => e.to_string(),
    };

    RepoSnapshotError::GitHubApi { status, message }
}

/// Wait before retrying, if `status` + `headers` describe a rate limit.
///
/// GitHub signals a primary limit with 403/429 and
/// `x-ratelimit-remaining: 0`, a secondary limit with `retry-after`.
/// A 403 with quota left (SSO enforcement, forbidden org) is not a rate
/// limit and yields `None`.
pub fn rate_limit_backoff(
    status: StatusCode,
    headers: &HeaderMap,
    now: u64,
) -> Option<Duration> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    let retry_after = header(RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok());
    if let Some(retry_after) = retry_after {
        return Some(Duration::from_secs(retry_after.max(1)));
    }

    if header(RATE_LIMIT_REMAINING_HEADER).as_deref() == Some("0") {
        let reset = header(RATE_LIMIT_RESET_HEADER).and_then(|v| v.parse::<u64>().ok());
        return Some(rate_limit_wait(reset, now));
    }

    None
}

/// How long to sleep after a rate-limited response. `reset` is the epoch
/// second at which the quota refills; the wait is never shorter than 1s.
pub fn rate_limit_wait(reset: Option<u64>, now: u64) -> Duration {
    let reset = reset.unwrap_or(now + DEFAULT_RATE_LIMIT_WAIT_SECS);
    Duration::from_secs(reset.saturating_sub(now).max(1))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
