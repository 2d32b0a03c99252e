//! Core data types for package health reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Letter grades for package health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
            Self::D => write!(f, "D"),
            Self::F => write!(f, "F"),
        }
    }
}

/// Confidence in a calculated score, based on which data sources were available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Vulnerability severity levels, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "info" => Ok(Self::Info),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Package maintenance classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceStatus {
    /// Regular updates, responsive maintainer
    Active,
    /// Mature, infrequent but intentional updates
    Stable,
    /// Occasional updates, slow response
    Slow,
    /// Rare updates, unclear maintenance
    Minimal,
    /// No updates, unresponsive
    Abandoned,
    /// Explicitly marked as archived
    Archived,
    /// Officially deprecated
    Deprecated,
}

impl MaintenanceStatus {
    /// Whether this status warrants attention on its own
    pub fn is_concerning(&self) -> bool {
        matches!(self, Self::Abandoned | Self::Archived | Self::Deprecated)
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Stable => write!(f, "stable"),
            Self::Slow => write!(f, "slow"),
            Self::Minimal => write!(f, "minimal"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Archived => write!(f, "archived"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// Estimated effort to migrate to an alternative package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationEffort {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for MigrationEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Uniquely identifies a package with optional version and extras.
///
/// Equality and hashing are case-insensitive on the name, so `Requests`
/// and `requests` refer to the same package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentifier {
    pub name: String,
    pub version: Option<String>,
    #[serde(default)]
    pub extras: Vec<String>,
}

impl PackageIdentifier {
    /// Create an identifier with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            extras: Vec::new(),
        }
    }

    /// Create an identifier with a pinned version
    pub fn with_version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
            extras: Vec::new(),
        }
    }

    /// Normalized package name: lowercase, with runs of `-`, `_`, `.`
    /// collapsed to a single hyphen.
    pub fn normalized_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut prev_sep = false;
        for c in self.name.chars() {
            if matches!(c, '-' | '_' | '.') {
                if !prev_sep {
                    out.push('-');
                }
                prev_sep = true;
            } else {
                out.extend(c.to_lowercase());
                prev_sep = false;
            }
        }
        out
    }
}

impl PartialEq for PackageIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.name.to_lowercase() == other.name.to_lowercase()
            && self.version == other.version
            && self.extras == other.extras
    }
}

impl Eq for PackageIdentifier {}

impl Hash for PackageIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
        self.version.hash(state);
        self.extras.hash(state);
    }
}

impl std::fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(version) = &self.version {
            write!(f, "=={}", version)?;
        }
        Ok(())
    }
}

/// Security vulnerability information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    /// CVE-2024-XXXX, GHSA-XXXX, or PYSEC-XXXX identifier
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Version specifier describing affected versions
    pub affected_versions: String,
    pub fixed_version: Option<String>,
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub references: Vec<String>,
    pub cvss_score: Option<f64>,
    /// True if the version under evaluation already contains the fix.
    /// Computed at scan time against the resolved version; never persisted,
    /// so deserialized vulnerabilities default to open.
    #[serde(skip)]
    pub is_fixed_in_installed_version: bool,
}

impl Vulnerability {
    /// Whether this vulnerability still affects the evaluated version
    pub fn is_open(&self) -> bool {
        !self.is_fixed_in_installed_version
    }

    /// Whether any fixed version has been published
    pub fn has_fix(&self) -> bool {
        self.fixed_version.is_some()
    }
}

impl std::fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_fixed_in_installed_version {
            " [FIXED]"
        } else {
            ""
        };
        write!(f, "{} ({}){}: {}", self.id, self.severity, status, self.title)
    }
}

/// Metadata retrieved from the package registry (PyPI)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub name: String,
    pub version: String,
    pub summary: String,
    pub author: String,
    pub author_email: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,
    #[serde(default)]
    pub requires_dist: Vec<String>,
    #[serde(default)]
    pub project_urls: HashMap<String, String>,
    #[serde(default)]
    pub classifiers: Vec<String>,
    #[serde(default)]
    pub downloads_last_month: u64,
    pub release_date: Option<DateTime<Utc>>,
    pub first_release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_releases: u32,
    #[serde(default)]
    pub yanked_releases: u32,
}

impl RegistryMetadata {
    /// The project home page URL, if declared
    pub fn home_page(&self) -> Option<&str> {
        self.project_urls
            .get("Homepage")
            .or_else(|| self.project_urls.get("Home"))
            .map(String::as_str)
    }

    /// The source repository URL, located via a fixed key-priority list
    pub fn repository_url(&self) -> Option<&str> {
        for key in ["Repository", "Source", "Source Code", "Code"] {
            if let Some(url) = self.project_urls.get(key) {
                return Some(url);
            }
        }
        self.home_page()
    }

    /// Whether classifiers indicate the package is deprecated
    pub fn is_deprecated(&self) -> bool {
        const DEPRECATED_CLASSIFIERS: [&str; 2] = [
            "Development Status :: 7 - Inactive",
            "Development Status :: 1 - Planning",
        ];
        self.classifiers
            .iter()
            .any(|c| DEPRECATED_CLASSIFIERS.contains(&c.as_str()))
    }
}

/// Metadata from the source repository (GitHub)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub url: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub forks: u32,
    #[serde(default)]
    pub open_issues: u32,
    #[serde(default)]
    pub open_pull_requests: u32,
    #[serde(default)]
    pub watchers: u32,
    #[serde(default)]
    pub contributors_count: u32,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_fork: bool,
    pub license: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub default_branch: String,

    // Derived activity metrics
    /// Commits per day over the last 30 days
    #[serde(default)]
    pub commit_frequency_30d: f64,
    /// Fraction of issues closed over the last 90 days (0-1)
    #[serde(default)]
    pub issue_close_rate_90d: f64,
    /// Fraction of pull requests merged over the last 90 days (0-1)
    #[serde(default)]
    pub pr_merge_rate_90d: f64,
    #[serde(default)]
    pub avg_issue_close_time_days: f64,
    #[serde(default)]
    pub avg_pr_merge_time_days: f64,
}

/// Composite health score for a package.
///
/// Built once per evaluation from point-in-time inputs; a re-check
/// produces a new score rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    /// Overall weighted score (0-100)
    pub overall: f64,
    pub grade: HealthGrade,

    // Component scores (0-100)
    pub security_score: f64,
    pub maintenance_score: f64,
    pub community_score: f64,
    pub popularity_score: f64,
    /// Informational only; not part of the weighted overall
    pub code_quality_score: f64,
    /// Informational only; not part of the weighted overall
    pub license_score: f64,

    pub maintenance_status: MaintenanceStatus,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub positive_factors: Vec<String>,

    pub confidence: ConfidenceLevel,
    pub calculated_at: DateTime<Utc>,
}

impl HealthScore {
    /// True if grade is A or B
    pub fn is_healthy(&self) -> bool {
        matches!(self.grade, HealthGrade::A | HealthGrade::B)
    }

    /// True if grade is D or F
    pub fn is_concerning(&self) -> bool {
        matches!(self.grade, HealthGrade::D | HealthGrade::F)
    }

    pub fn has_vulnerabilities(&self) -> bool {
        !self.vulnerabilities.is_empty()
    }

    /// Vulnerabilities affecting the evaluated version
    pub fn open_vulnerabilities(&self) -> Vec<&Vulnerability> {
        self.vulnerabilities.iter().filter(|v| v.is_open()).collect()
    }

    /// Vulnerabilities already fixed in the evaluated version
    pub fn fixed_vulnerabilities(&self) -> Vec<&Vulnerability> {
        self.vulnerabilities
            .iter()
            .filter(|v| v.is_fixed_in_installed_version)
            .collect()
    }

    pub fn has_open_vulnerabilities(&self) -> bool {
        self.vulnerabilities.iter().any(|v| v.is_open())
    }
}

impl std::fmt::Display for HealthScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1})", self.grade, self.overall)
    }
}

/// A recommended alternative package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativePackage {
    pub package: PackageIdentifier,
    pub health_score: f64,
    pub migration_effort: MigrationEffort,
    pub rationale: String,
    /// How similar the API is (0-1)
    #[serde(default)]
    pub api_compatibility: f64,
}

impl std::fmt::Display for AlternativePackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (score: {:.0}, effort: {})",
            self.package.name, self.health_score, self.migration_effort
        )
    }
}

/// Complete health report for a dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub package: PackageIdentifier,
    pub health: HealthScore,
    pub registry: Option<RegistryMetadata>,
    pub repository: Option<RepositoryMetadata>,
    #[serde(default)]
    pub alternatives: Vec<AlternativePackage>,
    /// Latest registry version if it differs from the resolved one
    pub update_available: Option<String>,
    #[serde(default = "default_true")]
    pub is_direct: bool,
}

fn default_true() -> bool {
    true
}

impl DependencyReport {
    /// Whether this dependency warrants a closer look
    pub fn needs_attention(&self) -> bool {
        self.health.is_concerning()
            || self.health.has_vulnerabilities()
            || self.health.maintenance_status.is_concerning()
    }
}

impl std::fmt::Display for DependencyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.package, self.health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_identifier_equality_case_insensitive() {
        let a = PackageIdentifier::with_version("Requests", "2.28.0");
        let b = PackageIdentifier::with_version("requests", "2.28.0");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_identifier_inequality_on_version() {
        let a = PackageIdentifier::with_version("requests", "2.28.0");
        let b = PackageIdentifier::new("requests");
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalized_name_collapses_separators() {
        let pkg = PackageIdentifier::new("My__Package..Name");
        assert_eq!(pkg.normalized_name(), "my-package-name");

        let pkg = PackageIdentifier::new("zope.interface");
        assert_eq!(pkg.normalized_name(), "zope-interface");
    }

    #[test]
    fn test_identifier_display() {
        let mut pkg = PackageIdentifier::with_version("requests", "2.28.0");
        pkg.extras = vec!["security".to_string(), "socks".to_string()];
        assert_eq!(pkg.to_string(), "requests[security,socks]==2.28.0");
    }

    #[test]
    fn test_repository_url_priority() {
        let mut meta = RegistryMetadata::default();
        meta.project_urls
            .insert("Homepage".to_string(), "https://example.com".to_string());
        meta.project_urls.insert(
            "Source".to_string(),
            "https://github.com/example/pkg".to_string(),
        );
        assert_eq!(meta.repository_url(), Some("https://github.com/example/pkg"));

        meta.project_urls.insert(
            "Repository".to_string(),
            "https://github.com/example/repo".to_string(),
        );
        assert_eq!(
            meta.repository_url(),
            Some("https://github.com/example/repo")
        );
    }

    #[test]
    fn test_repository_url_falls_back_to_homepage() {
        let mut meta = RegistryMetadata::default();
        meta.project_urls
            .insert("Homepage".to_string(), "https://example.com".to_string());
        assert_eq!(meta.repository_url(), Some("https://example.com"));
    }

    #[test]
    fn test_is_deprecated_classifier() {
        let mut meta = RegistryMetadata::default();
        assert!(!meta.is_deprecated());

        meta.classifiers
            .push("Development Status :: 7 - Inactive".to_string());
        assert!(meta.is_deprecated());
    }

    #[test]
    fn test_vulnerability_fixed_flag_not_persisted() {
        let vuln = Vulnerability {
            id: "CVE-2024-0001".to_string(),
            severity: Severity::High,
            title: "Example".to_string(),
            description: String::new(),
            affected_versions: "<2.0".to_string(),
            fixed_version: Some("2.0".to_string()),
            published: None,
            references: Vec::new(),
            cvss_score: Some(8.1),
            is_fixed_in_installed_version: true,
        };

        let json = serde_json::to_string(&vuln).unwrap();
        let restored: Vulnerability = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, "CVE-2024-0001");
        assert_eq!(restored.severity, Severity::High);
        // Runtime-only flag is recomputed on load, defaulting to open
        assert!(restored.is_open());
    }

    #[test]
    fn test_report_round_trip_preserves_scores() {
        let vuln = Vulnerability {
            id: "PYSEC-2024-1".to_string(),
            severity: Severity::Critical,
            title: "Bad".to_string(),
            description: String::new(),
            affected_versions: "<1.2".to_string(),
            fixed_version: Some("1.2".to_string()),
            published: None,
            references: Vec::new(),
            cvss_score: None,
            is_fixed_in_installed_version: true,
        };
        let report = DependencyReport {
            package: PackageIdentifier::with_version("flask", "2.3.2"),
            health: HealthScore {
                overall: 72.5,
                grade: HealthGrade::C,
                security_score: 96.0,
                maintenance_score: 70.0,
                community_score: 60.0,
                popularity_score: 55.0,
                code_quality_score: 50.0,
                license_score: 100.0,
                maintenance_status: MaintenanceStatus::Active,
                vulnerabilities: vec![vuln],
                risk_factors: vec!["example".to_string()],
                positive_factors: Vec::new(),
                confidence: ConfidenceLevel::Medium,
                calculated_at: Utc::now(),
            },
            registry: None,
            repository: None,
            alternatives: Vec::new(),
            update_available: Some("3.0.0".to_string()),
            is_direct: true,
        };

        let json = serde_json::to_string(&report).unwrap();
        let restored: DependencyReport = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.health.overall, 72.5);
        assert_eq!(restored.health.grade, HealthGrade::C);
        assert_eq!(restored.health.vulnerabilities.len(), 1);
        assert_eq!(restored.health.vulnerabilities[0].id, "PYSEC-2024-1");
        assert_eq!(restored.health.vulnerabilities[0].severity, Severity::Critical);
        assert_eq!(restored.update_available.as_deref(), Some("3.0.0"));
        // The open/fixed flag is runtime-only and comes back as open
        assert!(restored.health.vulnerabilities[0].is_open());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Low < Severity::Info);
    }
}
