//! Integration tests for manifest parsing and dependency resolution

use package_health_monitor::{DependencyResolver, PackageIdentifier};
use std::path::PathBuf;

fn fixture_project() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sample_project")
}

fn find<'a>(packages: &'a [PackageIdentifier], name: &str) -> Option<&'a PackageIdentifier> {
    packages.iter().find(|p| p.normalized_name() == name)
}

#[test]
fn test_resolve_sample_project() {
    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(&fixture_project()).unwrap();

    // requests appears in requirements.txt and requirements-dev.txt with
    // different extras; the merged entry carries both plus the pin
    let requests = find(&packages, "requests").expect("requests missing");
    assert_eq!(requests.version.as_deref(), Some("2.28.0"));
    assert!(requests.extras.contains(&"security".to_string()));
    assert!(requests.extras.contains(&"socks".to_string()));

    // No duplicates survive deduplication
    let requests_count = packages
        .iter()
        .filter(|p| p.normalized_name() == "requests")
        .count();
    assert_eq!(requests_count, 1);

    assert_eq!(
        find(&packages, "flask").unwrap().version.as_deref(),
        Some("2.3.2")
    );
    // Range specifiers stay unpinned
    assert_eq!(find(&packages, "gunicorn").unwrap().version, None);
    assert_eq!(find(&packages, "ruff").unwrap().version, None);

    // The include pulled dev requirements in
    assert_eq!(
        find(&packages, "pytest").unwrap().version.as_deref(),
        Some("7.4.0")
    );

    // pyproject contributions: PEP 621, optional groups, poetry tables
    assert!(find(&packages, "click").is_some());
    assert_eq!(
        find(&packages, "httpx").unwrap().version.as_deref(),
        Some("0.24.1")
    );
    assert_eq!(
        find(&packages, "coverage").unwrap().version.as_deref(),
        Some("7.3.0")
    );
    assert_eq!(
        find(&packages, "rich").unwrap().version.as_deref(),
        Some("13.5.2")
    );
    assert_eq!(
        find(&packages, "mypy").unwrap().version.as_deref(),
        Some("1.5.1")
    );

    // Git dependencies and the python pseudo-entry never appear
    assert!(find(&packages, "internal-tool").is_none());
    assert!(find(&packages, "python").is_none());

    // URL and editable lines were skipped
    assert!(find(&packages, "https").is_none());
}

#[test]
fn test_resolve_single_file() {
    let resolver = DependencyResolver::new();
    let packages = resolver
        .resolve(&fixture_project().join("requirements-dev.txt"))
        .unwrap();

    assert_eq!(packages.len(), 3);
    assert!(find(&packages, "pytest").is_some());
    assert!(find(&packages, "requests").is_some());
    assert!(find(&packages, "ruff").is_some());
}

#[test]
fn test_resolve_file_unsupported_extension() {
    let resolver = DependencyResolver::new();
    let result = resolver.resolve_file(std::path::Path::new("deps.xyz"));

    let err = result.unwrap_err();
    assert!(err.to_string().contains("No suitable parser"));
}

#[test]
fn test_self_including_file_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(&path, "-r requirements.txt\nflask==2.0.0\n").unwrap();

    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(&path).unwrap();

    // The cycle is cut by the depth guard; parseable entries survive
    assert!(find(&packages, "flask").is_some());
}

#[test]
fn test_mutually_including_files_terminate() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("requirements.txt");
    let b = dir.path().join("requirements-extra.txt");
    std::fs::write(&a, "-r requirements-extra.txt\nrequests\n").unwrap();
    std::fs::write(&b, "-r requirements.txt\nflask\n").unwrap();

    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(&a).unwrap();

    assert!(find(&packages, "requests").is_some());
    assert!(find(&packages, "flask").is_some());
}

#[test]
fn test_include_escaping_project_is_rejected() {
    let outside = tempfile::tempdir().unwrap();
    let secret = outside.path().join("requirements.txt");
    std::fs::write(&secret, "evil-package==1.0\n").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(
        &path,
        format!("-r {}\nflask==2.0.0\n", secret.display()),
    )
    .unwrap();

    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(&path).unwrap();

    // The escaping include is rejected, the rest of the file parses
    assert!(find(&packages, "evil-package").is_none());
    assert!(find(&packages, "flask").is_some());
}

#[test]
fn test_bad_file_does_not_abort_directory_resolve() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pyproject.toml"), "this is [ not toml").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "requests==2.28.0\n").unwrap();

    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(dir.path()).unwrap();

    assert!(find(&packages, "requests").is_some());
}

#[test]
fn test_malformed_sole_manifest_fails_hard() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pyproject.toml");
    std::fs::write(&path, "this is [ not toml").unwrap();

    let resolver = DependencyResolver::new();
    assert!(resolver.resolve_file(&path).is_err());
}

#[test]
fn test_comments_and_blank_lines_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requirements.txt");
    std::fs::write(
        &path,
        "# a comment\n\n   \nrequests==2.28.0\n# another\n",
    )
    .unwrap();

    let resolver = DependencyResolver::new();
    let packages = resolver.resolve(&path).unwrap();
    assert_eq!(packages.len(), 1);
}
