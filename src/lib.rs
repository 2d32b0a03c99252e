//! # package_health_monitor
//!
//! A dependency health monitor for Python projects, providing insights into:
//! - **Health scoring**: Composite 0-100 score and letter grade from
//!   security, maintenance, community, and popularity signals
//! - **Vulnerability awareness**: Known advisories from the OSV database,
//!   split into open and already-fixed for the version in use
//! - **Manifest resolution**: Dependency extraction from requirements.txt
//!   and pyproject.toml (PEP 621 and Poetry)
//! - **Alternatives**: Suggested replacements for unhealthy dependencies
//!
//! ## Quick Start
//!
//! ```no_run
//! use package_health_monitor::{MonitorConfig, ReportGenerator};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let generator = ReportGenerator::new(MonitorConfig::default());
//! let report = generator.check_package("requests", None).await?;
//!
//! println!("{}: grade {}", report.package.name, report.health.grade);
//! for risk in &report.health.risk_factors {
//!     println!("  - {}", risk);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - Concurrent metadata fetching with API-friendly pacing
//! - Advisory on-disk caching with TTL expiry
//! - Configurable scoring weights
//! - CLI tool with table, JSON, and Markdown output

mod alternatives;
mod cache;
mod collectors;
mod config;
mod error;
mod normalize;
mod report;
mod resolver;
mod scoring;
mod types;
mod validation;

// Re-export public API
pub use alternatives::{AlternativesCatalog, AlternativesRecommender};
pub use cache::CacheStore;
pub use config::{CacheConfig, MonitorConfig, NetworkConfig, ScoringWeights};
pub use error::{HealthError, Result};
pub use normalize::{linear_normalize, log_normalize};
pub use report::ReportGenerator;
pub use resolver::{DependencyResolver, ManifestParser, PyProjectParser, RequirementsParser};
pub use scoring::HealthCalculator;
pub use types::{
    AlternativePackage, ConfidenceLevel, DependencyReport, HealthGrade, HealthScore,
    MaintenanceStatus, MigrationEffort, PackageIdentifier, RegistryMetadata, RepositoryMetadata,
    Severity, Vulnerability,
};
pub use validation::validate_package_name;
