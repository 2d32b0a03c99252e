//! Scan for known vulnerabilities via the OSV database
//!
//! Queries the OSV API for all advisories affecting a package, then
//! marks which of them are already fixed in the version under
//! evaluation. That open/fixed flag depends on the resolved version, so
//! it is computed here on every scan and never cached (the field is
//! serde-skipped on the model).

use crate::cache::CacheStore;
use crate::config::NetworkConfig;
use crate::error::{HealthError, Result};
use crate::types::{PackageIdentifier, Severity, Vulnerability};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const OSV_API: &str = "https://api.osv.dev/v1/query";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const VULN_CACHE_TTL: u64 = 3600;

#[derive(Debug, Deserialize)]
struct OsvResponse {
    #[serde(default)]
    vulns: Vec<OsvVuln>,
}

#[derive(Debug, Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
    details: Option<String>,
    published: Option<String>,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
    #[serde(default)]
    references: Vec<OsvReference>,
    database_specific: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type")]
    kind: Option<String>,
    score: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    #[serde(default)]
    ranges: Vec<OsvRange>,
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OsvReference {
    url: Option<String>,
}

/// Query OSV for all known vulnerabilities of a package.
///
/// When the identifier carries a resolved version, each advisory's
/// fixed-in-installed flag is evaluated against it; without a version
/// every advisory is reported open.
pub async fn scan_vulnerabilities(
    package: &PackageIdentifier,
    config: &NetworkConfig,
    cache: Option<&CacheStore>,
) -> Result<Vec<Vulnerability>> {
    let name = package.normalized_name();

    // Cached entries hold only the static advisory data; the open/fixed
    // flag is recomputed below for the version at hand.
    let cache_key = format!("osv:vulns:{}", name);
    let cached: Option<Vec<Vulnerability>> = cache.and_then(|c| c.get(&cache_key));

    let mut vulns = match cached {
        Some(vulns) => {
            debug!("Cache hit for {}", cache_key);
            vulns
        }
        None => {
            let fetched = query_osv(&name, config).await?;
            if let Some(cache) = cache {
                cache.set(&cache_key, &fetched, VULN_CACHE_TTL);
            }
            fetched
        }
    };

    if let Some(version) = &package.version {
        for vuln in &mut vulns {
            vuln.is_fixed_in_installed_version = vuln
                .fixed_version
                .as_deref()
                .map(|fixed| version_at_least(version, fixed))
                .unwrap_or(false);
        }
    }

    Ok(vulns)
}

async fn query_osv(name: &str, config: &NetworkConfig) -> Result<Vec<Vulnerability>> {
    debug!("Querying OSV for {}", name);

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
        .map_err(|e| HealthError::network(format!("Failed to build HTTP client: {}", e)))?;

    let body = json!({
        "package": {
            "name": name,
            "ecosystem": "PyPI",
        }
    });

    let response = client.post(OSV_API).json(&body).send().await?;

    match response.status().as_u16() {
        429 => {
            return Err(HealthError::RateLimitExceeded {
                service: "OSV".to_string(),
                retry_after: None,
            })
        }
        status if status >= 400 => {
            return Err(HealthError::api("OSV", format!("HTTP {}", status)));
        }
        _ => {}
    }

    let data: OsvResponse = response.json().await?;
    Ok(data.vulns.into_iter().map(convert_vuln).collect())
}

fn convert_vuln(osv: OsvVuln) -> Vulnerability {
    let severity = parse_severity(&osv);
    let cvss_score = cvss_score(&osv);
    let fixed_version = extract_fixed_version(&osv);
    let affected_versions = summarize_affected(&osv);

    let published = osv
        .published
        .as_deref()
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let title = osv
        .summary
        .clone()
        .or_else(|| osv.details.as_ref().map(|d| truncate(d, 80)))
        .unwrap_or_else(|| osv.id.clone());

    Vulnerability {
        id: osv.id,
        severity,
        title,
        description: osv.details.unwrap_or_default(),
        affected_versions,
        fixed_version,
        published,
        references: osv
            .references
            .into_iter()
            .filter_map(|r| r.url)
            .collect(),
        cvss_score,
        is_fixed_in_installed_version: false,
    }
}

/// Map an OSV advisory to a severity level.
///
/// Prefers the database-specific label, falls back to bucketing the CVSS
/// score, and bottoms out at Low for anything unrecognized.
fn parse_severity(osv: &OsvVuln) -> Severity {
    if let Some(label) = osv
        .database_specific
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(|s| s.as_str())
    {
        return match label.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MODERATE" | "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            "INFO" | "INFORMATIONAL" => Severity::Info,
            other => {
                warn!("Unrecognized OSV severity label: {}", other);
                Severity::Low
            }
        };
    }

    if let Some(score) = cvss_score(osv) {
        return if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else {
            Severity::Low
        };
    }

    Severity::Low
}

/// Numeric CVSS base score from the severity entries.
///
/// OSV carries vector strings like `CVSS:3.1/AV:N/...`; plain numeric
/// scores appear in some databases too.
fn cvss_score(osv: &OsvVuln) -> Option<f64> {
    for entry in &osv.severity {
        let Some(score) = entry.score.as_deref() else {
            continue;
        };
        if let Ok(value) = score.parse::<f64>() {
            return Some(value);
        }
        if entry
            .kind
            .as_deref()
            .map(|k| k.starts_with("CVSS"))
            .unwrap_or(false)
        {
            // Vector string without a numeric score; nothing to extract
            continue;
        }
    }
    None
}

/// First fixed version from the range events
fn extract_fixed_version(osv: &OsvVuln) -> Option<String> {
    for affected in &osv.affected {
        for range in &affected.ranges {
            for event in &range.events {
                if let Some(fixed) = event.get("fixed").and_then(|f| f.as_str()) {
                    return Some(fixed.to_string());
                }
            }
        }
    }
    None
}

/// Human-readable affected range: introduced..fixed or version list
fn summarize_affected(osv: &OsvVuln) -> String {
    for affected in &osv.affected {
        for range in &affected.ranges {
            let introduced = range
                .events
                .iter()
                .find_map(|e| e.get("introduced").and_then(|v| v.as_str()));
            let fixed = range
                .events
                .iter()
                .find_map(|e| e.get("fixed").and_then(|v| v.as_str()));
            match (introduced, fixed) {
                (Some(intro), Some(fixed)) => return format!(">={},<{}", intro, fixed),
                (Some(intro), None) => return format!(">={}", intro),
                _ => {}
            }
        }
        if !affected.versions.is_empty() {
            return affected.versions.join(", ");
        }
    }
    "*".to_string()
}

/// Lenient dotted-numeric version comparison: true when `version` is at
/// least `other`. Non-numeric components compare lexicographically.
fn version_at_least(version: &str, other: &str) -> bool {
    let a = split_components(version);
    let b = split_components(other);
    let len = a.len().max(b.len());

    for i in 0..len {
        let x = a.get(i);
        let y = b.get(i);
        match (x, y) {
            (Some(x), Some(y)) => match compare_component(x, y) {
                std::cmp::Ordering::Greater => return true,
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal => {}
            },
            // 2.1 vs 2.1.0 count as equal; extra zero components don't
            // change the ordering
            (Some(x), None) => return compare_component(x, "0") != std::cmp::Ordering::Less,
            (None, Some(y)) => return compare_component("0", y) != std::cmp::Ordering::Less,
            (None, None) => break,
        }
    }
    true
}

fn split_components(version: &str) -> Vec<&str> {
    version.split(['.', '-', '+']).collect()
}

fn compare_component(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
