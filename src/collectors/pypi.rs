//! Fetch package metadata from PyPI
//!
//! Uses the PyPI JSON API for package information and pypistats.org for
//! monthly download counts. Responses are cached to keep repeat scans
//! cheap.

use crate::cache::CacheStore;
use crate::config::NetworkConfig;
use crate::error::{HealthError, Result};
use crate::types::RegistryMetadata;
use crate::validation::validate_response_size;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const PYPI_API: &str = "https://pypi.org/pypi";
const PYPISTATS_API: &str = "https://pypistats.org/api/packages";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Package metadata is cached for an hour; releases are infrequent
const PACKAGE_CACHE_TTL: u64 = 3600;
/// Download stats update daily, so they can live longer
const DOWNLOADS_CACHE_TTL: u64 = 21600;

/// Response from the PyPI JSON API
#[derive(Debug, Deserialize)]
struct PyPiResponse {
    info: PyPiInfo,
    #[serde(default)]
    releases: HashMap<String, Vec<PyPiReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct PyPiInfo {
    name: String,
    version: String,
    summary: Option<String>,
    author: Option<String>,
    author_email: Option<String>,
    license: Option<String>,
    requires_python: Option<String>,
    requires_dist: Option<Vec<String>>,
    project_urls: Option<HashMap<String, String>>,
    classifiers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PyPiReleaseFile {
    upload_time_iso_8601: Option<String>,
    upload_time: Option<String>,
    #[serde(default)]
    yanked: bool,
}

#[derive(Debug, Deserialize)]
struct PyPiStatsResponse {
    data: PyPiStatsData,
}

#[derive(Debug, Deserialize)]
struct PyPiStatsData {
    #[serde(default)]
    last_month: u64,
}

/// Fetch metadata for a package from PyPI.
///
/// Returns `PackageNotFound` for unknown packages and `RateLimitExceeded`
/// when PyPI throttles us.
pub async fn fetch_registry_metadata(
    name: &str,
    version: Option<&str>,
    config: &NetworkConfig,
    cache: Option<&CacheStore>,
) -> Result<RegistryMetadata> {
    let cache_key = format!("pypi:pkg:{}:{}", name, version.unwrap_or("latest"));
    if let Some(cache) = cache {
        if let Some(cached) = cache.get::<RegistryMetadata>(&cache_key) {
            debug!("Cache hit for {}", cache_key);
            return Ok(cached);
        }
    }

    debug!("Fetching PyPI metadata for {}", name);

    let client = build_client(config)?;
    let encoded = urlencoding::encode(name);
    let url = match version {
        Some(version) => format!("{}/{}/{}/json", PYPI_API, encoded, version),
        None => format!("{}/{}/json", PYPI_API, encoded),
    };

    let response = retry_request(&client, &url, config).await?;

    match response.status().as_u16() {
        404 => return Err(HealthError::PackageNotFound(name.to_string())),
        429 => {
            return Err(HealthError::RateLimitExceeded {
                service: "PyPI".to_string(),
                retry_after: None,
            })
        }
        status if status >= 400 => {
            return Err(HealthError::api("PyPI", format!("HTTP {}: {}", status, name)));
        }
        _ => {}
    }

    validate_response_size(response.content_length())?;

    let data: PyPiResponse = response.json().await?;
    let mut metadata = parse_response(data);

    // Monthly downloads come from a separate service; a failure there is
    // just missing data, never an error.
    metadata.downloads_last_month = fetch_download_stats(name, config, cache).await;

    if let Some(cache) = cache {
        cache.set(&cache_key, &metadata, PACKAGE_CACHE_TTL);
    }

    Ok(metadata)
}

/// Fetch monthly download statistics from pypistats.org.
///
/// Returns 0 when stats are unavailable for any reason.
pub async fn fetch_download_stats(
    name: &str,
    config: &NetworkConfig,
    cache: Option<&CacheStore>,
) -> u64 {
    let cache_key = format!("pypistats:downloads:{}", name);
    if let Some(cache) = cache {
        if let Some(cached) = cache.get::<u64>(&cache_key) {
            return cached;
        }
    }

    let Ok(client) = build_client(config) else {
        return 0;
    };
    let url = format!("{}/{}/recent", PYPISTATS_API, urlencoding::encode(name));

    let downloads = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response
            .json::<PyPiStatsResponse>()
            .await
            .map(|r| r.data.last_month)
            .unwrap_or(0),
        Ok(response) => {
            debug!("pypistats returned HTTP {} for {}", response.status(), name);
            0
        }
        Err(e) => {
            debug!("pypistats request failed for {}: {}", name, e);
            0
        }
    };

    if let Some(cache) = cache {
        cache.set(&cache_key, &downloads, DOWNLOADS_CACHE_TTL);
    }

    downloads
}

fn parse_response(data: PyPiResponse) -> RegistryMetadata {
    let release_date = release_date_for(&data.releases, &data.info.version);
    let first_release_date = first_release(&data.releases);
    let yanked_releases = data
        .releases
        .values()
        .filter(|files| files.first().map(|f| f.yanked).unwrap_or(false))
        .count() as u32;

    RegistryMetadata {
        name: data.info.name,
        version: data.info.version,
        summary: data.info.summary.unwrap_or_default(),
        author: data.info.author.unwrap_or_default(),
        author_email: data.info.author_email,
        license: data.info.license.filter(|l| !l.is_empty()),
        requires_python: data.info.requires_python,
        requires_dist: data.info.requires_dist.unwrap_or_default(),
        project_urls: data.info.project_urls.unwrap_or_default(),
        classifiers: data.info.classifiers.unwrap_or_default(),
        downloads_last_month: 0,
        release_date,
        first_release_date,
        total_releases: data.releases.len() as u32,
        yanked_releases,
    }
}

fn release_date_for(
    releases: &HashMap<String, Vec<PyPiReleaseFile>>,
    version: &str,
) -> Option<DateTime<Utc>> {
    releases
        .get(version)?
        .iter()
        .find_map(|f| parse_upload_time(f))
}

fn first_release(releases: &HashMap<String, Vec<PyPiReleaseFile>>) -> Option<DateTime<Utc>> {
    releases
        .values()
        .flatten()
        .filter_map(parse_upload_time)
        .min()
}

fn parse_upload_time(file: &PyPiReleaseFile) -> Option<DateTime<Utc>> {
    let raw = file
        .upload_time_iso_8601
        .as_deref()
        .or(file.upload_time.as_deref())?;
    // Older entries come without an explicit offset
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .ok()
}

/// Build HTTP client with proper configuration
fn build_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
        .map_err(|e| HealthError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Retry a request with exponential backoff
async fn retry_request(
    client: &Client,
    url: &str,
    config: &NetworkConfig,
) -> Result<reqwest::Response> {
    let mut attempts = 0;
    let mut delay: Duration = config.request_delay();

    loop {
        match client.get(url).send().await {
            Ok(response) => {
                if response.status().as_u16() == 429 && attempts < config.max_retries {
                    warn!("Rate limited by PyPI, retrying after {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                    delay *= 2;
                    continue;
                }
                return Ok(response);
            }
            Err(e) => {
                if attempts >= config.max_retries {
                    return Err(HealthError::network(format!("Request failed: {}", e)));
                }
                warn!("Request failed, retrying: {}", e);
                tokio::time::sleep(delay).await;
                attempts += 1;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release_file(time: &str, yanked: bool) -> PyPiReleaseFile {
        PyPiReleaseFile {
            upload_time_iso_8601: Some(time.to_string()),
            upload_time: None,
            yanked,
        }
    }

    #[test]
    fn test_parse_response_extracts_dates_and_yanks() {
        let mut releases = HashMap::new();
        releases.insert(
            "1.0.0".to_string(),
            vec![release_file("2021-03-01T10:00:00Z", false)],
        );
        releases.insert(
            "1.1.0".to_string(),
            vec![release_file("2023-06-15T08:30:00Z", false)],
        );
        releases.insert(
            "1.0.1".to_string(),
            vec![release_file("2021-05-01T09:00:00Z", true)],
        );

        let data = PyPiResponse {
            info: PyPiInfo {
                name: "example".to_string(),
                version: "1.1.0".to_string(),
                summary: Some("An example".to_string()),
                author: Some("Someone".to_string()),
                author_email: None,
                license: Some(String::new()),
                requires_python: None,
                requires_dist: None,
                project_urls: None,
                classifiers: None,
            },
            releases,
        };

        let meta = parse_response(data);
        assert_eq!(meta.total_releases, 3);
        assert_eq!(meta.yanked_releases, 1);
        // Empty license strings are treated as absent
        assert_eq!(meta.license, None);
        assert_eq!(
            meta.release_date.unwrap().to_rfc3339(),
            "2023-06-15T08:30:00+00:00"
        );
        assert_eq!(
            meta.first_release_date.unwrap().to_rfc3339(),
            "2021-03-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_upload_time_without_offset() {
        let file = PyPiReleaseFile {
            upload_time_iso_8601: None,
            upload_time: Some("2020-01-15T12:00:00".to_string()),
            yanked: false,
        };
        assert!(parse_upload_time(&file).is_some());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_requests_metadata() {
        let config = NetworkConfig::default();
        match fetch_registry_metadata("requests", None, &config, None).await {
            Ok(metadata) => {
                assert_eq!(metadata.name.to_lowercase(), "requests");
                assert!(metadata.total_releases > 0);
            }
            Err(e) => {
                // Network errors are acceptable in tests
                eprintln!("Test skipped due to: {}", e);
            }
        }
    }
}
