//! Health scoring engine
//!
//! Combines registry metadata, repository metadata, and known
//! vulnerabilities into a composite 0-100 score with a letter grade.
//! Every input is optional: missing data degrades to a neutral baseline
//! and a lowered confidence level instead of an error, so a score is
//! always produced.

use crate::config::ScoringWeights;
use crate::normalize::{linear_normalize, log_normalize};
use crate::types::{
    ConfidenceLevel, HealthGrade, HealthScore, MaintenanceStatus, RegistryMetadata,
    RepositoryMetadata, Severity, Vulnerability,
};
use chrono::Utc;

/// Licenses scoring full marks
const LICENSE_PERMISSIVE: [&str; 7] = [
    "MIT",
    "APACHE-2.0",
    "BSD-2-CLAUSE",
    "BSD-3-CLAUSE",
    "ISC",
    "UNLICENSE",
    "0BSD",
];

/// Weak copyleft; checked before the strong-copyleft set so LGPL/MPL
/// resolve to the milder score. The overlap with LICENSE_COPYLEFT is
/// intentional and the check order is load-bearing.
const LICENSE_WEAK_COPYLEFT: [&str; 3] = ["LGPL-2.1", "LGPL-3.0", "MPL-2.0"];

const LICENSE_COPYLEFT: [&str; 6] = [
    "GPL-2.0",
    "GPL-3.0",
    "LGPL-2.1",
    "LGPL-3.0",
    "AGPL-3.0",
    "MPL-2.0",
];

/// Points deducted per open vulnerability of a given severity
fn severity_deduction(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 40.0,
        Severity::High => 25.0,
        Severity::Medium => 10.0,
        Severity::Low => 5.0,
        Severity::Info => 1.0,
    }
}

/// Calculate health scores from collected data.
///
/// Weights can be customized to emphasize different aspects of package
/// health; they are normalized to sum to 1.0 at construction time.
#[derive(Debug, Clone)]
pub struct HealthCalculator {
    weights: ScoringWeights,
}

impl Default for HealthCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCalculator {
    /// Calculator with the default weights (0.35/0.30/0.20/0.15)
    pub fn new() -> Self {
        Self::with_weights(ScoringWeights::default())
    }

    /// Calculator with caller-supplied weights. Partial overrides work
    /// via struct-update syntax on `ScoringWeights::default()`; whatever
    /// is passed gets normalized so the four weights sum to 1.0.
    pub fn with_weights(mut weights: ScoringWeights) -> Self {
        weights.normalize();
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Calculate a comprehensive health score.
    ///
    /// Never fails: absent registry or repository metadata lowers the
    /// confidence level rather than producing an error.
    pub fn calculate(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
        vulnerabilities: Vec<Vulnerability>,
    ) -> HealthScore {
        let security = self.security_score(&vulnerabilities);
        let maintenance = self.maintenance_score(registry, repo);
        let community = self.community_score(repo);
        let popularity = self.popularity_score(registry, repo);
        let code_quality = self.code_quality_score(repo);
        let license = self.license_score(registry, repo);

        let overall = security * self.weights.security
            + maintenance * self.weights.maintenance
            + community * self.weights.community
            + popularity * self.weights.popularity;

        HealthScore {
            overall,
            grade: score_to_grade(overall),
            security_score: security,
            maintenance_score: maintenance,
            community_score: community,
            popularity_score: popularity,
            code_quality_score: code_quality,
            license_score: license,
            maintenance_status: self.maintenance_status(registry, repo),
            risk_factors: self.identify_risks(registry, repo, &vulnerabilities),
            positive_factors: self.identify_positives(registry, repo),
            confidence: self.determine_confidence(registry, repo),
            vulnerabilities,
            calculated_at: Utc::now(),
        }
    }

    /// Score based on vulnerability count and severity.
    ///
    /// Open vulnerabilities deduct the full severity weight; fixed ones
    /// deduct only 10% of it. A package with several fixed advisories may
    /// simply have maintainers who patch quickly.
    fn security_score(&self, vulnerabilities: &[Vulnerability]) -> f64 {
        if vulnerabilities.is_empty() {
            return 100.0;
        }

        let open_deduction: f64 = vulnerabilities
            .iter()
            .filter(|v| v.is_open())
            .map(|v| severity_deduction(v.severity))
            .sum();

        let historical_deduction: f64 = vulnerabilities
            .iter()
            .filter(|v| v.is_fixed_in_installed_version)
            .map(|v| severity_deduction(v.severity) * 0.1)
            .sum();

        (100.0 - open_deduction - historical_deduction).max(0.0)
    }

    /// Score based on release recency, release consistency, commit
    /// frequency, and issue responsiveness.
    fn maintenance_score(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> f64 {
        let mut score: f64 = 50.0;
        let now = Utc::now();

        if let Some(registry) = registry {
            if let Some(release_date) = registry.release_date {
                let days_since_release = (now - release_date).num_days();
                if days_since_release < 30 {
                    score += 20.0;
                } else if days_since_release < 90 {
                    score += 15.0;
                } else if days_since_release < 180 {
                    score += 10.0;
                } else if days_since_release < 365 {
                    score += 5.0;
                } else if days_since_release > 730 {
                    score -= 10.0;
                }
            }

            if registry.total_releases > 10 {
                score += 10.0;
            } else if registry.total_releases > 5 {
                score += 5.0;
            }

            if registry.is_deprecated() {
                score -= 20.0;
            }
        }

        if let Some(repo) = repo {
            if repo.commit_frequency_30d > 1.0 {
                score += 15.0;
            } else if repo.commit_frequency_30d > 0.1 {
                score += 10.0;
            } else if repo.commit_frequency_30d > 0.0 {
                score += 5.0;
            }

            if repo.issue_close_rate_90d > 0.8 {
                score += 10.0;
            } else if repo.issue_close_rate_90d > 0.5 {
                score += 5.0;
            }

            if repo.is_archived {
                score -= 30.0;
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// Score based on community engagement.
    ///
    /// Without repository data the score stays at the neutral 50;
    /// missing data is not penalized.
    fn community_score(&self, repo: Option<&RepositoryMetadata>) -> f64 {
        let Some(repo) = repo else {
            return 50.0;
        };

        let mut score: f64 = 50.0;

        score += log_normalize(repo.contributors_count as f64, 1.0, 200.0, 20.0);

        // Bus-factor risk
        if repo.contributors_count <= 1 {
            score -= 10.0;
        }

        score += log_normalize(repo.stars as f64, 10.0, 50_000.0, 20.0);
        score += log_normalize(repo.forks as f64, 1.0, 500.0, 10.0);
        score += linear_normalize(repo.pr_merge_rate_90d, 0.0, 1.0, 10.0);

        if repo.is_archived {
            score -= 25.0;
        }

        score.clamp(0.0, 100.0)
    }

    /// Score based on package popularity.
    ///
    /// Downloads are the primary signal; watchers provide secondary
    /// social proof. Stars are excluded since they are already counted under
    /// community.
    fn popularity_score(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> f64 {
        let mut score: f64 = 50.0;

        if let Some(registry) = registry {
            if registry.downloads_last_month == 0 {
                score -= 5.0;
            } else {
                score += log_normalize(
                    registry.downloads_last_month as f64,
                    100.0,
                    50_000_000.0,
                    40.0,
                );
            }
        }

        if let Some(repo) = repo {
            score += log_normalize(repo.watchers as f64, 10.0, 5_000.0, 10.0);
        }

        score.clamp(0.0, 100.0)
    }

    /// Code quality score. Informational only: not part of the weighted
    /// overall since its signals largely overlap with community metrics.
    fn code_quality_score(&self, repo: Option<&RepositoryMetadata>) -> f64 {
        let Some(repo) = repo else {
            return 50.0;
        };

        let mut score: f64 = 50.0;

        // Multiple contributors suggests code review happens
        if repo.contributors_count > 5 {
            score += 15.0;
        } else if repo.contributors_count > 2 {
            score += 10.0;
        }

        if repo.pr_merge_rate_90d > 0.6 {
            score += 15.0;
        } else if repo.pr_merge_rate_90d > 0.3 {
            score += 10.0;
        }

        if repo.avg_issue_close_time_days < 7.0 {
            score += 10.0;
        } else if repo.avg_issue_close_time_days < 30.0 {
            score += 5.0;
        }

        if !repo.is_fork {
            score += 10.0;
        }

        score.clamp(0.0, 100.0)
    }

    /// License compatibility score. Informational only.
    ///
    /// Prefers the repository-reported license over the registry one
    /// (registry license fields are frequently free-form text).
    fn license_score(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> f64 {
        let license_id = repo
            .and_then(|r| r.license.as_deref())
            .or_else(|| registry.and_then(|p| p.license.as_deref()));

        let Some(license_id) = license_id else {
            // No license information: legal uncertainty
            return 30.0;
        };

        let normalized = license_id.to_uppercase().replace([' ', '_'], "-");

        if LICENSE_PERMISSIVE.iter().any(|l| normalized.contains(l)) {
            return 100.0;
        }
        if LICENSE_WEAK_COPYLEFT.iter().any(|l| normalized.contains(l)) {
            return 75.0;
        }
        if LICENSE_COPYLEFT.iter().any(|l| normalized.contains(l)) {
            return 60.0;
        }

        50.0
    }

    /// Confidence in the computed score, from data availability
    fn determine_confidence(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> ConfidenceLevel {
        let has_registry = registry.is_some();
        let has_repo = repo.is_some();
        let has_downloads = registry.map(|p| p.downloads_last_month > 0).unwrap_or(false);

        if has_registry && has_repo && has_downloads {
            ConfidenceLevel::High
        } else if has_registry && (has_repo || has_downloads) {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Classify maintenance status from activity signals.
    ///
    /// Archived wins over everything, deprecated over the date buckets;
    /// a missing date signal counts as infinitely old.
    fn maintenance_status(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> MaintenanceStatus {
        if repo.map(|r| r.is_archived).unwrap_or(false) {
            return MaintenanceStatus::Archived;
        }

        if registry.map(|p| p.is_deprecated()).unwrap_or(false) {
            return MaintenanceStatus::Deprecated;
        }

        let now = Utc::now();
        let days_since_release = registry
            .and_then(|p| p.release_date)
            .map(|d| (now - d).num_days())
            .unwrap_or(i64::MAX);
        let days_since_commit = repo
            .and_then(|r| r.last_commit_date)
            .map(|d| (now - d).num_days())
            .unwrap_or(i64::MAX);

        let min_days = days_since_release.min(days_since_commit);

        if min_days < 90 {
            MaintenanceStatus::Active
        } else if min_days < 365 {
            MaintenanceStatus::Stable
        } else if min_days < 730 {
            MaintenanceStatus::Slow
        } else if min_days < 1095 {
            MaintenanceStatus::Minimal
        } else {
            MaintenanceStatus::Abandoned
        }
    }

    /// Build the risk factor list. Check order is fixed so output is
    /// deterministic.
    fn identify_risks(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
        vulnerabilities: &[Vulnerability],
    ) -> Vec<String> {
        let mut risks = Vec::new();

        // Only open vulnerabilities count as risks
        let critical_count = vulnerabilities
            .iter()
            .filter(|v| v.is_open() && v.severity == Severity::Critical)
            .count();
        let high_count = vulnerabilities
            .iter()
            .filter(|v| v.is_open() && v.severity == Severity::High)
            .count();

        if critical_count > 0 {
            risks.push(format!(
                "{} OPEN critical vulnerability(ies)",
                critical_count
            ));
        }
        if high_count > 0 {
            risks.push(format!(
                "{} OPEN high severity vulnerability(ies)",
                high_count
            ));
        }

        if repo.map(|r| r.is_archived).unwrap_or(false) {
            risks.push("Repository is archived".to_string());
        }

        if registry.map(|p| p.is_deprecated()).unwrap_or(false) {
            risks.push("Package is deprecated".to_string());
        }

        let now = Utc::now();
        if let Some(release_date) = registry.and_then(|p| p.release_date) {
            let days_since = (now - release_date).num_days();
            if days_since > 730 {
                risks.push(format!("No release in {} years", days_since / 365));
            } else if days_since > 365 {
                risks.push("No release in over a year".to_string());
            }
        }

        if let Some(repo) = repo {
            if repo.contributors_count == 1 {
                risks.push("Single maintainer (bus factor risk)".to_string());
            }
            if repo.open_issues > 100 && repo.issue_close_rate_90d < 0.1 {
                risks.push("Many open issues with low resolution rate".to_string());
            }
        }

        if let Some(registry) = registry {
            if registry.yanked_releases > 0 {
                risks.push(format!("{} yanked release(s)", registry.yanked_releases));
            }
        }

        risks
    }

    /// Build the positive factor list, in fixed check order
    fn identify_positives(
        &self,
        registry: Option<&RegistryMetadata>,
        repo: Option<&RepositoryMetadata>,
    ) -> Vec<String> {
        let mut positives = Vec::new();

        if let Some(registry) = registry {
            if registry.downloads_last_month > 1_000_000 {
                positives.push("Highly popular (1M+ monthly downloads)".to_string());
            } else if registry.downloads_last_month > 100_000 {
                positives.push("Popular package (100K+ monthly downloads)".to_string());
            }

            if registry.total_releases > 20 {
                positives.push("Mature project with many releases".to_string());
            }

            let now = Utc::now();
            if let Some(release_date) = registry.release_date {
                if (now - release_date).num_days() < 30 {
                    positives.push("Recently updated".to_string());
                }
            }
        }

        if let Some(repo) = repo {
            if repo.contributors_count > 50 {
                positives.push("Large contributor community".to_string());
            } else if repo.contributors_count > 10 {
                positives.push("Active contributor community".to_string());
            }

            if repo.stars > 5_000 {
                positives.push("Highly starred repository".to_string());
            } else if repo.stars > 1_000 {
                positives.push("Well-starred repository".to_string());
            }

            if repo.issue_close_rate_90d > 0.8 {
                positives.push("Excellent issue resolution rate".to_string());
            }
            if repo.pr_merge_rate_90d > 0.8 {
                positives.push("Excellent PR merge rate".to_string());
            }

            if repo.avg_issue_close_time_days < 7.0 {
                positives.push("Fast issue resolution".to_string());
            }
        }

        positives
    }
}

/// Convert a numeric score to a letter grade.
///
/// Thresholds are calibrated for the base-50 scoring system: all-neutral
/// inputs land at 50 (an F worth investigating), good signals push
/// packages into B/A territory, and open vulnerabilities drag them to D/F.
fn score_to_grade(score: f64) -> HealthGrade {
    if score >= 85.0 {
        HealthGrade::A
    } else if score >= 75.0 {
        HealthGrade::B
    } else if score >= 65.0 {
        HealthGrade::C
    } else if score >= 55.0 {
        HealthGrade::D
    } else {
        HealthGrade::F
    }
}
