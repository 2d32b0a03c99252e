//! Manifest parsing and dependency resolution
//!
//! Extracts package identifiers from requirements.txt and pyproject.toml
//! files. Parsers implement [`ManifestParser`] and register with the
//! [`DependencyResolver`], which tries them in priority order; new formats
//! plug in without touching the resolver.

use crate::error::{HealthError, Result};
use crate::types::PackageIdentifier;
use crate::validation::{check_recursion_depth, validate_include_path};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A single requirement line: name, optional extras, optional specifier,
/// optional environment marker and trailing comment.
static REQUIREMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<name>[A-Z0-9][-A-Z0-9._]*)(?:\[(?P<extras>[^\]]+)\])?(?:\s*(?P<specifier>[<>=!~][^;#]*))?(?:\s*;[^#]*)?(?:\s*#.*)?$",
    )
    .unwrap()
});

/// Exact `==` pin inside a specifier
static EXACT_VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"==\s*([\d.]+)").unwrap());

/// A constraint that starts with a literal version number
static LEADING_VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.\d+(?:\.\d+)?)").unwrap());

/// Capability contract for manifest format parsers
pub trait ManifestParser: Send + Sync {
    /// Whether this parser handles the given file
    fn can_parse(&self, path: &Path) -> bool;

    /// Extract package identifiers from the file
    fn parse(&self, path: &Path) -> Result<Vec<PackageIdentifier>>;
}

/// Parser for plain-list requirements files
pub struct RequirementsParser;

impl RequirementsParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_at_depth(
        &self,
        path: &Path,
        base_dir: &Path,
        depth: u32,
    ) -> Result<Vec<PackageIdentifier>> {
        check_recursion_depth(depth)?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| HealthError::parse(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut packages = Vec::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Includes recurse into sibling files, depth-bounded so a
            // circular include graph still terminates.
            if let Some(include) = line
                .strip_prefix("-r ")
                .or_else(|| line.strip_prefix("--requirement "))
            {
                match validate_include_path(include.trim(), base_dir, path) {
                    Ok(include_file) => {
                        match self.parse_at_depth(&include_file, base_dir, depth + 1) {
                            Ok(included) => packages.extend(included),
                            Err(e) => {
                                // A failing include is skipped, not fatal
                                warn!("Skipping include {}: {}", include.trim(), e);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Rejected include {}: {}", include.trim(), e);
                    }
                }
                continue;
            }

            // Editable installs and other pip options carry no package name
            if line.starts_with('-') {
                continue;
            }

            // Direct URL / VCS requirements are not registry packages
            if line.contains("://") || line.starts_with("git+") {
                continue;
            }

            if let Some(pkg) = parse_requirement_line(line) {
                packages.push(pkg);
            }
        }

        Ok(packages)
    }
}

impl Default for RequirementsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestParser for RequirementsParser {
    fn can_parse(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_lowercase();
        name.starts_with("requirements") && name.ends_with(".txt")
    }

    fn parse(&self, path: &Path) -> Result<Vec<PackageIdentifier>> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.parse_at_depth(path, base_dir, 0)
    }
}

/// Parse a single requirement line into an identifier
fn parse_requirement_line(line: &str) -> Option<PackageIdentifier> {
    if let Some(caps) = REQUIREMENT_PATTERN.captures(line) {
        let name = caps.name("name")?.as_str().to_string();

        let extras = caps
            .name("extras")
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        // Only an exact `==` pin resolves to a version; ranges stay open
        let version = caps
            .name("specifier")
            .and_then(|m| EXACT_VERSION_PATTERN.captures(m.as_str()))
            .map(|c| c[1].to_string());

        return Some(PackageIdentifier {
            name,
            version,
            extras,
        });
    }

    // Lenient fallback: take whatever precedes the first specifier char
    let name = line
        .split(['<', '>', '=', '!', '~', '[', ']', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    Some(PackageIdentifier::new(name))
}

/// Parser for pyproject.toml project descriptors (PEP 621 and Poetry)
pub struct PyProjectParser;

impl PyProjectParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_document(&self, doc: &toml::Value) -> Vec<PackageIdentifier> {
        let mut packages = Vec::new();

        // PEP 621: [project.dependencies] and [project.optional-dependencies]
        if let Some(project) = doc.get("project") {
            if let Some(deps) = project.get("dependencies").and_then(|d| d.as_array()) {
                for dep in deps {
                    if let Some(pkg) = dep.as_str().and_then(parse_requirement_line) {
                        packages.push(pkg);
                    }
                }
            }

            if let Some(groups) = project
                .get("optional-dependencies")
                .and_then(|d| d.as_table())
            {
                for deps in groups.values() {
                    if let Some(deps) = deps.as_array() {
                        for dep in deps {
                            if let Some(pkg) = dep.as_str().and_then(parse_requirement_line) {
                                packages.push(pkg);
                            }
                        }
                    }
                }
            }
        }

        // Poetry: [tool.poetry.dependencies], dev-dependencies, and groups
        if let Some(poetry) = doc
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.as_table())
        {
            if let Some(deps) = poetry.get("dependencies").and_then(|d| d.as_table()) {
                for (name, spec) in deps {
                    // The python entry pins the runtime, not a package
                    if name.eq_ignore_ascii_case("python") {
                        continue;
                    }
                    if let Some(pkg) = parse_poetry_spec(name, spec) {
                        packages.push(pkg);
                    }
                }
            }

            if let Some(deps) = poetry.get("dev-dependencies").and_then(|d| d.as_table()) {
                for (name, spec) in deps {
                    if let Some(pkg) = parse_poetry_spec(name, spec) {
                        packages.push(pkg);
                    }
                }
            }

            if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
                for group in groups.values() {
                    if let Some(deps) = group.get("dependencies").and_then(|d| d.as_table()) {
                        for (name, spec) in deps {
                            if let Some(pkg) = parse_poetry_spec(name, spec) {
                                packages.push(pkg);
                            }
                        }
                    }
                }
            }
        }

        packages
    }
}

impl Default for PyProjectParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestParser for PyProjectParser {
    fn can_parse(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some("pyproject.toml")
    }

    fn parse(&self, path: &Path) -> Result<Vec<PackageIdentifier>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HealthError::parse(format!("Failed to read {}: {}", path.display(), e)))?;

        let doc: toml::Value = toml::from_str(&content)
            .map_err(|e| HealthError::parse(format!("Invalid TOML in {}: {}", path.display(), e)))?;

        Ok(self.parse_document(&doc))
    }
}

/// Parse a Poetry dependency specification (bare constraint string or
/// table with version/extras/source keys)
fn parse_poetry_spec(name: &str, spec: &toml::Value) -> Option<PackageIdentifier> {
    let mut version = None;
    let mut extras = Vec::new();

    match spec {
        toml::Value::String(constraint) => {
            // Only a constraint starting with a literal version resolves;
            // caret/tilde/range prefixes stay unpinned.
            version = LEADING_VERSION_PATTERN
                .captures(constraint)
                .map(|c| c[1].to_string());
        }
        toml::Value::Table(table) => {
            // Source overrides mean the dependency doesn't come from the
            // registry at all.
            if ["git", "path", "url"].iter().any(|k| table.contains_key(*k)) {
                return None;
            }

            if let Some(constraint) = table.get("version").and_then(|v| v.as_str()) {
                version = LEADING_VERSION_PATTERN
                    .captures(constraint)
                    .map(|c| c[1].to_string());
            }

            if let Some(list) = table.get("extras").and_then(|e| e.as_array()) {
                extras = list
                    .iter()
                    .filter_map(|e| e.as_str().map(String::from))
                    .collect();
            }
        }
        _ => {}
    }

    Some(PackageIdentifier {
        name: name.to_string(),
        version,
        extras,
    })
}

/// Orchestrates dependency resolution across registered parsers
pub struct DependencyResolver {
    parsers: Vec<Box<dyn ManifestParser>>,
}

impl DependencyResolver {
    /// Resolver with the default parsers registered
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(PyProjectParser::new()),
                Box::new(RequirementsParser::new()),
            ],
        }
    }

    /// Register a custom parser; custom parsers take priority
    pub fn add_parser(&mut self, parser: Box<dyn ManifestParser>) {
        self.parsers.insert(0, parser);
    }

    /// Find and parse all dependency files under a project root.
    ///
    /// Accepts either a directory (discovered files parsed in priority
    /// order, failures skipped) or a single manifest file. Results are
    /// deduplicated by normalized name.
    pub fn resolve(&self, project_path: &Path) -> Result<Vec<PackageIdentifier>> {
        let mut dependencies = Vec::new();

        if project_path.is_file() {
            for parser in &self.parsers {
                if parser.can_parse(project_path) {
                    dependencies.extend(parser.parse(project_path)?);
                    break;
                }
            }
        } else {
            for file in self.find_manifest_files(project_path) {
                for parser in &self.parsers {
                    if parser.can_parse(&file) {
                        match parser.parse(&file) {
                            Ok(parsed) => {
                                debug!("Parsed {} entries from {}", parsed.len(), file.display());
                                dependencies.extend(parsed);
                            }
                            Err(e) => {
                                // One bad file must not abort the scan
                                warn!("Skipping {}: {}", file.display(), e);
                            }
                        }
                        break;
                    }
                }
            }
        }

        Ok(deduplicate(dependencies))
    }

    /// Parse a specific manifest file, failing when no parser claims it
    pub fn resolve_file(&self, file_path: &Path) -> Result<Vec<PackageIdentifier>> {
        for parser in &self.parsers {
            if parser.can_parse(file_path) {
                return parser.parse(file_path);
            }
        }

        Err(HealthError::parse(format!(
            "No suitable parser found for {}",
            file_path.display()
        )))
    }

    /// Discover manifest files under a project root, priority names first
    fn find_manifest_files(&self, project_path: &Path) -> Vec<std::path::PathBuf> {
        const PRIORITY_FILES: [&str; 5] = [
            "pyproject.toml",
            "requirements.txt",
            "requirements-dev.txt",
            "requirements-test.txt",
            "requirements-prod.txt",
        ];

        let mut files = Vec::new();

        for name in PRIORITY_FILES {
            let path = project_path.join(name);
            if path.exists() {
                files.push(path);
            }
        }

        // Any other requirements*.txt variants
        if let Ok(entries) = std::fs::read_dir(project_path) {
            for entry in entries.flatten() {
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.starts_with("requirements")
                    && name.ends_with(".txt")
                    && !files.contains(&path)
                {
                    files.push(path);
                }
            }
        }

        files
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove duplicates by normalized name.
///
/// The first-seen entry is the base; a version from either side wins over
/// none, and extras are unioned preserving first-seen order.
fn deduplicate(packages: Vec<PackageIdentifier>) -> Vec<PackageIdentifier> {
    let mut merged: Vec<PackageIdentifier> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for pkg in packages {
        let key = pkg.normalized_name();

        match index.get(&key) {
            None => {
                index.insert(key, merged.len());
                merged.push(pkg);
            }
            Some(&i) => {
                let existing = &mut merged[i];
                if existing.version.is_none() {
                    existing.version = pkg.version;
                }
                for extra in pkg.extras {
                    if !existing.extras.contains(&extra) {
                        existing.extras.push(extra);
                    }
                }
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirement_line_plain() {
        let pkg = parse_requirement_line("requests").unwrap();
        assert_eq!(pkg.name, "requests");
        assert_eq!(pkg.version, None);
        assert!(pkg.extras.is_empty());
    }

    #[test]
    fn test_parse_requirement_line_pinned() {
        let pkg = parse_requirement_line("requests==2.28.0").unwrap();
        assert_eq!(pkg.version.as_deref(), Some("2.28.0"));
    }

    #[test]
    fn test_parse_requirement_line_range_stays_unpinned() {
        let pkg = parse_requirement_line("requests>=2.0,<3.0").unwrap();
        assert_eq!(pkg.name, "requests");
        assert_eq!(pkg.version, None);
    }

    #[test]
    fn test_parse_requirement_line_extras_and_marker() {
        let pkg =
            parse_requirement_line("uvicorn[standard]==0.23.2 ; python_version >= \"3.8\"")
                .unwrap();
        assert_eq!(pkg.name, "uvicorn");
        assert_eq!(pkg.version.as_deref(), Some("0.23.2"));
        assert_eq!(pkg.extras, vec!["standard".to_string()]);
    }

    #[test]
    fn test_parse_requirement_line_inline_comment() {
        let pkg = parse_requirement_line("flask==2.3.2  # web framework").unwrap();
        assert_eq!(pkg.name, "flask");
        assert_eq!(pkg.version.as_deref(), Some("2.3.2"));
    }

    #[test]
    fn test_poetry_spec_caret_stays_unpinned() {
        let spec = toml::Value::String("^1.0.0".to_string());
        let pkg = parse_poetry_spec("pydantic", &spec).unwrap();
        assert_eq!(pkg.version, None);
    }

    #[test]
    fn test_poetry_spec_literal_version() {
        let spec = toml::Value::String("2.28".to_string());
        let pkg = parse_poetry_spec("requests", &spec).unwrap();
        assert_eq!(pkg.version.as_deref(), Some("2.28"));
    }

    #[test]
    fn test_poetry_spec_table_with_extras() {
        let spec: toml::Value =
            toml::from_str(r#"version = "1.10.2"
extras = ["dotenv"]"#)
                .unwrap();
        let pkg = parse_poetry_spec("pydantic", &spec).unwrap();
        assert_eq!(pkg.version.as_deref(), Some("1.10.2"));
        assert_eq!(pkg.extras, vec!["dotenv".to_string()]);
    }

    #[test]
    fn test_poetry_spec_source_override_excluded() {
        for key in ["git", "path", "url"] {
            let spec: toml::Value =
                toml::from_str(&format!("{} = \"somewhere\"", key)).unwrap();
            assert!(parse_poetry_spec("internal-lib", &spec).is_none());
        }
    }

    #[test]
    fn test_deduplicate_adopts_version() {
        let packages = vec![
            PackageIdentifier::new("requests"),
            PackageIdentifier::with_version("requests", "2.28.0"),
        ];
        let merged = deduplicate(packages);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].version.as_deref(), Some("2.28.0"));
    }

    #[test]
    fn test_deduplicate_unions_extras() {
        let mut a = PackageIdentifier::new("requests");
        a.extras = vec!["security".to_string()];
        let mut b = PackageIdentifier::new("requests");
        b.extras = vec!["socks".to_string()];

        let merged = deduplicate(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].extras.contains(&"security".to_string()));
        assert!(merged[0].extras.contains(&"socks".to_string()));
    }

    #[test]
    fn test_deduplicate_case_insensitive() {
        let packages = vec![
            PackageIdentifier::new("Django"),
            PackageIdentifier::with_version("django", "4.2"),
        ];
        let merged = deduplicate(packages);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Django");
        assert_eq!(merged[0].version.as_deref(), Some("4.2"));
    }

    #[test]
    fn test_requirements_can_parse() {
        let parser = RequirementsParser::new();
        assert!(parser.can_parse(Path::new("requirements.txt")));
        assert!(parser.can_parse(Path::new("requirements-dev.txt")));
        assert!(parser.can_parse(Path::new("project/requirements_extra.txt")));
        assert!(!parser.can_parse(Path::new("pyproject.toml")));
        assert!(!parser.can_parse(Path::new("notes.txt")));
    }

    #[test]
    fn test_pyproject_pep621_and_poetry() {
        let doc: toml::Value = toml::from_str(
            r#"
[project]
dependencies = ["requests==2.28.0", "click>=8.0"]

[project.optional-dependencies]
test = ["pytest==7.4.0"]

[tool.poetry.dependencies]
python = "^3.10"
httpx = "^0.24"

[tool.poetry.group.dev.dependencies]
ruff = "0.1.5"
"#,
        )
        .unwrap();

        let parser = PyProjectParser::new();
        let packages = parser.parse_document(&doc);
        let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();

        assert!(names.contains(&"requests"));
        assert!(names.contains(&"click"));
        assert!(names.contains(&"pytest"));
        assert!(names.contains(&"httpx"));
        assert!(names.contains(&"ruff"));
        assert!(!names.contains(&"python"));

        let ruff = packages.iter().find(|p| p.name == "ruff").unwrap();
        assert_eq!(ruff.version.as_deref(), Some("0.1.5"));
        let httpx = packages.iter().find(|p| p.name == "httpx").unwrap();
        assert_eq!(httpx.version, None);
    }
}
