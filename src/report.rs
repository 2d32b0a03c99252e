//! Report generation orchestration
//!
//! Coordinates dependency resolution, metadata collection, vulnerability
//! scanning, and scoring into complete [`DependencyReport`]s. Collector
//! failures degrade to missing metadata and a lower confidence level; a
//! scan never aborts because one upstream call failed.

use crate::alternatives::AlternativesRecommender;
use crate::cache::CacheStore;
use crate::collectors::{
    extract_owner_repo, fetch_registry_metadata, fetch_repository_metadata, scan_vulnerabilities,
};
use crate::config::MonitorConfig;
use crate::error::{HealthError, Result};
use crate::resolver::DependencyResolver;
use crate::scoring::HealthCalculator;
use crate::types::{DependencyReport, PackageIdentifier};
use crate::validation::validate_package_name;
use std::path::Path;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Generate health reports for packages and projects
pub struct ReportGenerator {
    config: Arc<MonitorConfig>,
    resolver: DependencyResolver,
    calculator: Arc<HealthCalculator>,
    recommender: Arc<AlternativesRecommender>,
    cache: Option<CacheStore>,
}

impl ReportGenerator {
    pub fn new(config: MonitorConfig) -> Self {
        let calculator = HealthCalculator::with_weights(config.scoring_weights);
        let cache = if config.cache.enabled {
            Some(match &config.cache.dir {
                Some(dir) => CacheStore::new(dir.clone(), config.cache.ttl_secs),
                None => CacheStore::default_location(config.cache.ttl_secs),
            })
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            resolver: DependencyResolver::new(),
            calculator: Arc::new(calculator),
            recommender: Arc::new(AlternativesRecommender::default()),
            cache,
        }
    }

    /// Swap in a custom alternatives recommender
    pub fn with_recommender(mut self, recommender: AlternativesRecommender) -> Self {
        self.recommender = Arc::new(recommender);
        self
    }

    /// Check the health of a single package.
    ///
    /// Fails with `PackageNotFound` when the registry has never heard of
    /// it; any other upstream failure degrades to partial data.
    pub async fn check_package(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<DependencyReport> {
        validate_package_name(name)?;

        let package = PackageIdentifier {
            name: name.to_string(),
            version: version.map(String::from),
            extras: Vec::new(),
        };

        build_report(
            package,
            true,
            &self.config,
            &self.calculator,
            &self.recommender,
            self.cache.as_ref(),
        )
        .await
    }

    /// Scan a project's dependencies for health issues.
    ///
    /// `path` may be a project directory or a single manifest file.
    pub async fn scan_project(&self, path: &Path) -> Result<Vec<DependencyReport>> {
        info!("Scanning project at {}", path.display());

        let packages = self.resolver.resolve(path)?;
        let packages: Vec<_> = packages
            .into_iter()
            .filter(|p| {
                let keep = !self.config.ignored_dependencies.contains(&p.normalized_name());
                if !keep {
                    debug!("Skipping ignored dependency: {}", p.name);
                }
                keep
            })
            .collect();

        info!("Resolved {} dependencies", packages.len());
        Ok(self.generate_reports(packages).await)
    }

    /// Generate reports for a list of packages, fetching concurrently
    /// with a small delay between spawns to stay friendly to the APIs.
    pub async fn generate_reports(&self, packages: Vec<PackageIdentifier>) -> Vec<DependencyReport> {
        let mut tasks = Vec::new();

        for package in packages {
            let config = Arc::clone(&self.config);
            let calculator = Arc::clone(&self.calculator);
            let recommender = Arc::clone(&self.recommender);
            let cache = self.cache.clone();

            tasks.push(tokio::spawn(async move {
                build_report(
                    package,
                    false,
                    &config,
                    &calculator,
                    &recommender,
                    cache.as_ref(),
                )
                .await
            }));

            sleep(self.config.network.request_delay()).await;
        }

        let mut reports = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => warn!("Failed to build report: {}", e),
                Err(e) => warn!("Report task failed: {}", e),
            }
        }

        reports
    }

    /// Direct access to the resolver, for callers that only need
    /// identifiers
    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

/// Assemble one report from whatever data the collectors can provide
async fn build_report(
    package: PackageIdentifier,
    strict_registry: bool,
    config: &MonitorConfig,
    calculator: &HealthCalculator,
    recommender: &AlternativesRecommender,
    cache: Option<&CacheStore>,
) -> Result<DependencyReport> {
    debug!("Building report for {}", package);

    let registry = match fetch_registry_metadata(
        &package.normalized_name(),
        package.version.as_deref(),
        &config.network,
        cache,
    )
    .await
    {
        Ok(meta) => Some(meta),
        Err(e @ HealthError::PackageNotFound(_)) if strict_registry => return Err(e),
        Err(e) => {
            warn!("Registry metadata unavailable for {}: {}", package.name, e);
            None
        }
    };

    // The version being evaluated: explicit pin first, else whatever the
    // registry says is current.
    let evaluated_version = package
        .version
        .clone()
        .or_else(|| registry.as_ref().map(|m| m.version.clone()));

    let repository = match registry.as_ref().and_then(|m| m.repository_url()) {
        Some(url) if url.contains("github.com") => match extract_owner_repo(url) {
            Ok((owner, repo)) => {
                match fetch_repository_metadata(&owner, &repo, &config.network, cache).await {
                    Ok(meta) => Some(meta),
                    Err(e) => {
                        warn!("Repository metadata unavailable for {}: {}", package.name, e);
                        None
                    }
                }
            }
            Err(e) => {
                debug!("Unparsable repository URL for {}: {}", package.name, e);
                None
            }
        },
        _ => None,
    };

    let scan_target = PackageIdentifier {
        name: package.name.clone(),
        version: evaluated_version.clone(),
        extras: Vec::new(),
    };
    let vulnerabilities = match scan_vulnerabilities(&scan_target, &config.network, cache).await {
        Ok(vulns) => vulns,
        Err(e) => {
            warn!("Vulnerability scan unavailable for {}: {}", package.name, e);
            Vec::new()
        }
    };

    let health = calculator.calculate(registry.as_ref(), repository.as_ref(), vulnerabilities);

    // A pinned version older than the registry's latest means an update
    // is waiting.
    let update_available = match (&package.version, &registry) {
        (Some(pinned), Some(meta)) if *pinned != meta.version => Some(meta.version.clone()),
        _ => None,
    };

    let alternatives = if health.is_concerning() || health.has_open_vulnerabilities() {
        recommender.find_alternatives(&package, &health)
    } else {
        Vec::new()
    };

    Ok(DependencyReport {
        package,
        health,
        registry,
        repository,
        alternatives,
        update_available,
        is_direct: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn offline_config() -> MonitorConfig {
        MonitorConfig {
            cache: CacheConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_generator_construction() {
        let generator = ReportGenerator::new(offline_config());
        assert!(generator.cache.is_none());
    }

    #[tokio::test]
    async fn test_check_package_rejects_invalid_name() {
        let generator = ReportGenerator::new(offline_config());
        let result = generator.check_package("not a valid name!", None).await;
        assert!(matches!(
            result,
            Err(HealthError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_check_requests() {
        let generator = ReportGenerator::new(offline_config());
        match generator.check_package("requests", None).await {
            Ok(report) => {
                assert_eq!(report.package.name, "requests");
                assert!(report.health.overall > 0.0);
            }
            Err(e) => {
                eprintln!("Test skipped due to: {}", e);
            }
        }
    }
}
