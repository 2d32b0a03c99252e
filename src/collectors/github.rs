//! Fetch repository metadata from GitHub
//!
//! Retrieves repository facts plus derived activity metrics: 30-day
//! commit frequency and 90-day issue/PR rates. GitHub data is cached for
//! 24 hours since the unauthenticated rate limit is only 60 requests/hour.

use crate::cache::CacheStore;
use crate::config::NetworkConfig;
use crate::error::{HealthError, Result};
use crate::types::RepositoryMetadata;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const REPO_CACHE_TTL: u64 = 86400;

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    html_url: String,
    stargazers_count: u32,
    forks_count: u32,
    open_issues_count: u32,
    subscribers_count: Option<u32>,
    archived: bool,
    fork: bool,
    created_at: String,
    pushed_at: String,
    license: Option<GitHubLicense>,
    #[serde(default)]
    topics: Vec<String>,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubLicense {
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubIssue {
    state: String,
    created_at: String,
    closed_at: Option<String>,
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct ActivityMetrics {
    commit_frequency_30d: f64,
    issue_close_rate_90d: f64,
    pr_merge_rate_90d: f64,
    avg_issue_close_time_days: f64,
    avg_pr_merge_time_days: f64,
    open_pull_requests: u32,
}

/// Extract owner and repo name from a GitHub URL.
///
/// Handles https, git, and ssh forms, with or without a `.git` suffix.
pub fn extract_owner_repo(url: &str) -> Result<(String, String)> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");

    let path = if let Some(rest) = trimmed.split("github.com:").nth(1) {
        // SSH format: git@github.com:owner/repo
        rest
    } else if let Some(rest) = trimmed.split("github.com/").nth(1) {
        rest
    } else {
        return Err(HealthError::parse(format!("Invalid GitHub URL: {}", url)));
    };

    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(HealthError::parse(format!("Invalid GitHub URL: {}", url))),
    }
}

/// Fetch metadata for a GitHub repository.
///
/// Returns `RepositoryNotFound` for missing repos and `RateLimitExceeded`
/// with a reset hint when the API quota runs out. Secondary metric
/// fetches degrade to zeroed rates instead of failing the whole call.
pub async fn fetch_repository_metadata(
    owner: &str,
    repo: &str,
    config: &NetworkConfig,
    cache: Option<&CacheStore>,
) -> Result<RepositoryMetadata> {
    let cache_key = format!("github:repo:{}/{}", owner, repo);
    if let Some(cache) = cache {
        if let Some(cached) = cache.get::<RepositoryMetadata>(&cache_key) {
            debug!("Cache hit for {}", cache_key);
            return Ok(cached);
        }
    }

    debug!("Fetching GitHub metadata for {}/{}", owner, repo);

    let client = build_client(config)?;
    let repo_url = format!("{}/repos/{}/{}", GITHUB_API, owner, repo);

    let response = client.get(&repo_url).send().await?;
    check_github_status(&response, &format!("{}/{}", owner, repo))?;
    let repo_data: GitHubRepo = response.json().await?;

    // Secondary fetches; each failure just costs us that metric
    let contributors = fetch_contributors_count(&client, &repo_url)
        .await
        .unwrap_or_else(|e| {
            debug!("Contributors fetch failed for {}/{}: {}", owner, repo, e);
            0
        });
    let activity = fetch_activity_metrics(&client, &repo_url)
        .await
        .unwrap_or_else(|e| {
            debug!("Activity fetch failed for {}/{}: {}", owner, repo, e);
            ActivityMetrics::default()
        });

    let metadata = RepositoryMetadata {
        url: repo_data.html_url,
        stars: repo_data.stargazers_count,
        forks: repo_data.forks_count,
        open_issues: repo_data.open_issues_count,
        open_pull_requests: activity.open_pull_requests,
        watchers: repo_data.subscribers_count.unwrap_or(0),
        contributors_count: contributors,
        last_commit_date: parse_datetime(&repo_data.pushed_at).ok(),
        created_date: parse_datetime(&repo_data.created_at).ok(),
        is_archived: repo_data.archived,
        is_fork: repo_data.fork,
        license: repo_data.license.and_then(|l| l.spdx_id).filter(|id| id != "NOASSERTION"),
        topics: repo_data.topics,
        default_branch: repo_data.default_branch.unwrap_or_else(|| "main".to_string()),
        commit_frequency_30d: activity.commit_frequency_30d,
        issue_close_rate_90d: activity.issue_close_rate_90d,
        pr_merge_rate_90d: activity.pr_merge_rate_90d,
        avg_issue_close_time_days: activity.avg_issue_close_time_days,
        avg_pr_merge_time_days: activity.avg_pr_merge_time_days,
    };

    if let Some(cache) = cache {
        cache.set(&cache_key, &metadata, REPO_CACHE_TTL);
    }

    Ok(metadata)
}

fn check_github_status(response: &reqwest::Response, identifier: &str) -> Result<()> {
    match response.status().as_u16() {
        404 => Err(HealthError::RepositoryNotFound(identifier.to_string())),
        403 => {
            let remaining = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("1");
            if remaining == "0" {
                let retry_after = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<i64>().ok())
                    .map(|reset| {
                        let now = Utc::now().timestamp();
                        std::time::Duration::from_secs(reset.saturating_sub(now).max(0) as u64)
                    });
                Err(HealthError::RateLimitExceeded {
                    service: "GitHub".to_string(),
                    retry_after,
                })
            } else {
                Err(HealthError::api("GitHub", "Access forbidden"))
            }
        }
        status if status >= 400 => Err(HealthError::api("GitHub", format!("HTTP {}", status))),
        _ => Ok(()),
    }
}

/// Build HTTP client with GitHub headers and optional token auth
fn build_client(config: &NetworkConfig) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/vnd.github.v3+json"),
    );

    if let Some(token) = &config.github_token {
        if let Ok(value) = format!("token {}", token).parse() {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .default_headers(headers)
        .build()
        .map_err(|e| HealthError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Contributors count from Link header pagination.
///
/// With per_page=1 the "last" page number equals the contributor count.
async fn fetch_contributors_count(client: &Client, repo_url: &str) -> Result<u32> {
    let url = format!("{}/contributors?per_page=1&anon=false", repo_url);
    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Ok(0);
    }

    if let Some(link) = response
        .headers()
        .get("link")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(last_page) = extract_last_page(link) {
            return Ok(last_page);
        }
    }

    // No Link header means everything fit on one page
    let contributors: Vec<serde_json::Value> = response.json().await.unwrap_or_default();
    Ok(contributors.len() as u32)
}

/// Extract the last page number from a Link header
fn extract_last_page(link_header: &str) -> Option<u32> {
    for link in link_header.split(',') {
        if link.contains("rel=\"last\"") {
            if let Some(page_str) = link
                .split("page=")
                .last()
                .and_then(|s| s.split('>').next())
            {
                return page_str.parse().ok();
            }
        }
    }
    None
}

/// Derived activity rates from the commits and issues endpoints
async fn fetch_activity_metrics(client: &Client, repo_url: &str) -> Result<ActivityMetrics> {
    let mut metrics = ActivityMetrics::default();

    // Commit frequency over the last 30 days
    let since = (Utc::now() - Duration::days(30)).to_rfc3339();
    let commits_url = format!("{}/commits?since={}&per_page=100", repo_url, since);
    if let Ok(response) = client.get(&commits_url).send().await {
        if response.status().is_success() {
            let commits: Vec<serde_json::Value> = response.json().await.unwrap_or_default();
            metrics.commit_frequency_30d = commits.len() as f64 / 30.0;
        }
    }

    // Issue and PR rates over the last 90 days. The issues endpoint
    // returns both; PRs carry a pull_request key.
    let since = (Utc::now() - Duration::days(90)).to_rfc3339();
    let issues_url = format!("{}/issues?state=all&since={}&per_page=100", repo_url, since);
    let response = client.get(&issues_url).send().await?;
    if !response.status().is_success() {
        return Ok(metrics);
    }

    let items: Vec<GitHubIssue> = response.json().await.unwrap_or_default();

    let mut issues_total = 0u32;
    let mut issues_closed = 0u32;
    let mut prs_total = 0u32;
    let mut prs_closed = 0u32;
    let mut issue_close_days = Vec::new();
    let mut pr_close_days = Vec::new();

    for item in &items {
        let closed = item.state == "closed";
        let close_days = item.closed_at.as_deref().and_then(|closed_at| {
            let opened = parse_datetime(&item.created_at).ok()?;
            let closed = parse_datetime(closed_at).ok()?;
            Some((closed - opened).num_seconds() as f64 / 86400.0)
        });

        if item.pull_request.is_some() {
            prs_total += 1;
            if closed {
                prs_closed += 1;
                if let Some(days) = close_days {
                    pr_close_days.push(days);
                }
            } else {
                metrics.open_pull_requests += 1;
            }
        } else {
            issues_total += 1;
            if closed {
                issues_closed += 1;
                if let Some(days) = close_days {
                    issue_close_days.push(days);
                }
            }
        }
    }

    if issues_total > 0 {
        metrics.issue_close_rate_90d = issues_closed as f64 / issues_total as f64;
    }
    if prs_total > 0 {
        metrics.pr_merge_rate_90d = prs_closed as f64 / prs_total as f64;
    }
    if !issue_close_days.is_empty() {
        metrics.avg_issue_close_time_days =
            issue_close_days.iter().sum::<f64>() / issue_close_days.len() as f64;
    }
    if !pr_close_days.is_empty() {
        metrics.avg_pr_merge_time_days =
            pr_close_days.iter().sum::<f64>() / pr_close_days.len() as f64;
    }

    Ok(metrics)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HealthError::parse(format!("Invalid GitHub datetime: {}", e)))
}
