//! Alternative package recommendations
//!
//! Suggests replacements for unhealthy dependencies from a catalog of
//! known alternatives. The catalog is immutable and injected at
//! construction, so tests can substitute fixtures and callers can ship
//! their own curated lists.

use crate::types::{AlternativePackage, HealthScore, MigrationEffort, PackageIdentifier};
use std::collections::HashMap;

/// Immutable lookup data for the recommender
#[derive(Debug, Clone, Default)]
pub struct AlternativesCatalog {
    /// Normalized package name -> candidate replacement names
    alternatives: HashMap<String, Vec<String>>,
    /// (from, to) -> migration effort estimate
    efforts: HashMap<(String, String), MigrationEffort>,
    /// (from, to) -> short rationale
    rationales: HashMap<(String, String), String>,
}

impl AlternativesCatalog {
    pub fn new(
        alternatives: HashMap<String, Vec<String>>,
        efforts: HashMap<(String, String), MigrationEffort>,
        rationales: HashMap<(String, String), String>,
    ) -> Self {
        Self {
            alternatives,
            efforts,
            rationales,
        }
    }

    /// Built-in catalog of widely known replacements
    pub fn builtin() -> Self {
        let mut alternatives: HashMap<String, Vec<String>> = HashMap::new();
        let entries: [(&str, &[&str]); 18] = [
            ("requests", &["httpx", "aiohttp", "urllib3"]),
            ("urllib3", &["httpx", "aiohttp", "requests"]),
            ("flask", &["fastapi", "starlette", "litestar", "quart"]),
            ("django", &["fastapi", "flask", "starlette"]),
            ("bottle", &["flask", "fastapi", "starlette"]),
            ("pillow", &["opencv-python", "scikit-image", "imageio"]),
            ("pyyaml", &["ruamel.yaml", "strictyaml"]),
            ("python-dateutil", &["pendulum", "arrow", "dateparser"]),
            ("beautifulsoup4", &["selectolax", "lxml", "parsel"]),
            ("nose", &["pytest"]),
            ("mock", &["pytest-mock"]),
            ("simplejson", &["orjson", "ujson"]),
            ("click", &["typer", "fire"]),
            ("python-dotenv", &["pydantic-settings", "environs"]),
            ("sqlalchemy", &["peewee", "tortoise-orm"]),
            ("marshmallow", &["pydantic", "attrs"]),
            ("gunicorn", &["uvicorn", "hypercorn"]),
            ("celery", &["rq", "huey", "dramatiq", "arq"]),
        ];
        for (name, alts) in entries {
            alternatives.insert(
                name.to_string(),
                alts.iter().map(|a| a.to_string()).collect(),
            );
        }

        let mut efforts = HashMap::new();
        let effort_entries = [
            ("requests", "httpx", MigrationEffort::Low),
            ("flask", "quart", MigrationEffort::Low),
            ("pyyaml", "ruamel.yaml", MigrationEffort::Low),
            ("nose", "pytest", MigrationEffort::Low),
            ("simplejson", "orjson", MigrationEffort::Low),
            ("gunicorn", "uvicorn", MigrationEffort::Low),
            ("flask", "fastapi", MigrationEffort::Medium),
            ("requests", "aiohttp", MigrationEffort::Medium),
            ("sqlalchemy", "peewee", MigrationEffort::Medium),
            ("celery", "dramatiq", MigrationEffort::Medium),
            ("django", "fastapi", MigrationEffort::High),
            ("django", "flask", MigrationEffort::High),
            ("sqlalchemy", "tortoise-orm", MigrationEffort::High),
        ];
        for (from, to, effort) in effort_entries {
            efforts.insert((from.to_string(), to.to_string()), effort);
        }

        let mut rationales = HashMap::new();
        let rationale_entries = [
            (
                "requests",
                "httpx",
                "Modern async-first HTTP client with sync support",
            ),
            (
                "flask",
                "fastapi",
                "Modern async framework with automatic API docs",
            ),
            (
                "pyyaml",
                "ruamel.yaml",
                "Better YAML 1.2 support, preserves comments",
            ),
            (
                "nose",
                "pytest",
                "More actively maintained, better plugin ecosystem",
            ),
            ("simplejson", "orjson", "Much faster JSON serialization"),
            (
                "gunicorn",
                "uvicorn",
                "ASGI support, better for async frameworks",
            ),
            ("celery", "dramatiq", "Simpler API, better defaults"),
            ("beautifulsoup4", "selectolax", "Much faster HTML parsing"),
            (
                "python-dateutil",
                "pendulum",
                "Cleaner API, timezone handling",
            ),
        ];
        for (from, to, why) in rationale_entries {
            rationales.insert((from.to_string(), to.to_string()), why.to_string());
        }

        Self {
            alternatives,
            efforts,
            rationales,
        }
    }
}

/// Find and rank alternative packages
pub struct AlternativesRecommender {
    catalog: AlternativesCatalog,
}

impl AlternativesRecommender {
    pub fn new(catalog: AlternativesCatalog) -> Self {
        Self { catalog }
    }

    /// Known alternative names for a package
    pub fn known_alternatives(&self, package_name: &str) -> &[String] {
        let normalized = PackageIdentifier::new(package_name).normalized_name();
        self.catalog
            .alternatives
            .get(&normalized)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Build recommendation records for a package, without fetching
    /// health data for the candidates.
    pub fn find_alternatives(
        &self,
        package: &PackageIdentifier,
        _current_health: &HealthScore,
    ) -> Vec<AlternativePackage> {
        let from = package.normalized_name();

        self.known_alternatives(&from)
            .iter()
            .map(|alt| {
                let effort = self.migration_effort(&from, alt);
                AlternativePackage {
                    package: PackageIdentifier::new(alt.clone()),
                    health_score: 0.0,
                    migration_effort: effort,
                    rationale: self.rationale(&from, alt),
                    api_compatibility: api_compatibility(effort),
                }
            })
            .collect()
    }

    /// Estimate migration effort between two packages
    fn migration_effort(&self, from: &str, to: &str) -> MigrationEffort {
        let key = (from.to_string(), to.to_string());
        if let Some(effort) = self.catalog.efforts.get(&key) {
            return *effort;
        }
        let reverse = (to.to_string(), from.to_string());
        if let Some(effort) = self.catalog.efforts.get(&reverse) {
            return *effort;
        }

        // A shared name prefix usually means a similar API
        let from_prefix = from.split(['-', '_']).next().unwrap_or(from);
        let to_prefix = to.split(['-', '_']).next().unwrap_or(to);
        if from_prefix == to_prefix {
            MigrationEffort::Low
        } else {
            MigrationEffort::Medium
        }
    }

    fn rationale(&self, from: &str, to: &str) -> String {
        self.catalog
            .rationales
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("Alternative to {}", from))
    }
}

impl Default for AlternativesRecommender {
    fn default() -> Self {
        Self::new(AlternativesCatalog::builtin())
    }
}

fn api_compatibility(effort: MigrationEffort) -> f64 {
    match effort {
        MigrationEffort::Low => 0.8,
        MigrationEffort::Medium => 0.5,
        MigrationEffort::High => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::HealthCalculator;

    fn neutral_health() -> HealthScore {
        HealthCalculator::new().calculate(None, None, Vec::new())
    }

    #[test]
    fn test_builtin_catalog_lookup() {
        let recommender = AlternativesRecommender::default();
        let alts = recommender.known_alternatives("requests");
        assert!(alts.contains(&"httpx".to_string()));
    }

    #[test]
    fn test_lookup_is_name_normalized() {
        let recommender = AlternativesRecommender::default();
        assert!(!recommender.known_alternatives("Python_Dateutil").is_empty());
    }

    #[test]
    fn test_find_alternatives_with_fixture_catalog() {
        let mut alternatives = HashMap::new();
        alternatives.insert(
            "leftpad".to_string(),
            vec!["padleft".to_string(), "textwrap".to_string()],
        );
        let mut efforts = HashMap::new();
        efforts.insert(
            ("leftpad".to_string(), "padleft".to_string()),
            MigrationEffort::Low,
        );

        let recommender = AlternativesRecommender::new(AlternativesCatalog::new(
            alternatives,
            efforts,
            HashMap::new(),
        ));

        let package = PackageIdentifier::new("leftpad");
        let found = recommender.find_alternatives(&package, &neutral_health());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].package.name, "padleft");
        assert_eq!(found[0].migration_effort, MigrationEffort::Low);
        assert!((found[0].api_compatibility - 0.8).abs() < 1e-9);
        // Unknown pair falls back to the medium default
        assert_eq!(found[1].migration_effort, MigrationEffort::Medium);
    }

    #[test]
    fn test_effort_reverse_direction_and_prefix_heuristic() {
        let recommender = AlternativesRecommender::default();
        // (requests, httpx) is Low; reverse lookup finds it too
        assert_eq!(
            recommender.migration_effort("httpx", "requests"),
            MigrationEffort::Low
        );
        // Shared prefix counts as low effort
        assert_eq!(
            recommender.migration_effort("pytest-cov", "pytest-xdist"),
            MigrationEffort::Low
        );
    }

    #[test]
    fn test_unknown_package_has_no_alternatives() {
        let recommender = AlternativesRecommender::default();
        let package = PackageIdentifier::new("totally-bespoke-internal-lib");
        assert!(recommender
            .find_alternatives(&package, &neutral_health())
            .is_empty());
    }
}
