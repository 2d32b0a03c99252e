//! Input validation utilities
//!
//! Validates package names, include paths, and response sizes before they
//! reach parsers or network clients, rejecting path traversal and
//! malformed identifiers.

use crate::error::{HealthError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// PEP 503-shaped package name: starts and ends alphanumeric
static PACKAGE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$").unwrap());

/// Maximum recursion depth for includes in plain-list manifests
pub const MAX_INCLUDE_DEPTH: u32 = 5;

/// Maximum accepted response size (10 MB)
pub const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate and normalize a package name.
///
/// Returns the normalized form (lowercase, separator runs collapsed to a
/// single hyphen).
pub fn validate_package_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(HealthError::validation(
            "package_name",
            "Package name cannot be empty",
        ));
    }

    // PyPI caps names at 150 characters
    if name.len() > 150 {
        return Err(HealthError::validation(
            "package_name",
            "Package name exceeds 150 character limit",
        ));
    }

    if name
        .chars()
        .any(|c| (c as u32) < 32 || (c as u32) == 127)
    {
        return Err(HealthError::validation(
            "package_name",
            "Package name contains invalid control characters",
        ));
    }

    if !PACKAGE_NAME_PATTERN.is_match(name) {
        return Err(HealthError::validation(
            "package_name",
            format!(
                "'{}' must start and end with alphanumeric characters and \
                 contain only alphanumerics, dots, hyphens, and underscores",
                name
            ),
        ));
    }

    let mut normalized = String::with_capacity(name.len());
    let mut prev_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !prev_sep {
                normalized.push('-');
            }
            prev_sep = true;
        } else {
            normalized.extend(c.to_lowercase());
            prev_sep = false;
        }
    }
    Ok(normalized)
}

/// Validate an include path referenced from a manifest.
///
/// The resolved path must stay under `base_path`; escapes are rejected
/// rather than silently followed.
pub fn validate_include_path(
    include_path: &str,
    base_path: &Path,
    current_file: &Path,
) -> Result<PathBuf> {
    if include_path.is_empty() {
        return Err(HealthError::validation(
            "include_path",
            "Include path cannot be empty",
        ));
    }

    if include_path.contains('\0') {
        return Err(HealthError::validation(
            "include_path",
            "Path contains null bytes",
        ));
    }

    let parent = current_file.parent().unwrap_or_else(|| Path::new("."));
    let candidate = parent.join(include_path);

    // Canonicalize both sides so `..` segments and symlinks cannot escape
    // the resolve root.
    let resolved = candidate.canonicalize().map_err(|e| {
        HealthError::validation("include_path", format!("Cannot resolve '{}': {}", include_path, e))
    })?;
    let resolved_base = base_path.canonicalize().map_err(|e| {
        HealthError::validation("include_path", format!("Cannot resolve base path: {}", e))
    })?;

    if !resolved.starts_with(&resolved_base) {
        return Err(HealthError::validation(
            "include_path",
            format!(
                "Path '{}' escapes project directory (resolves to {})",
                include_path,
                resolved.display()
            ),
        ));
    }

    Ok(resolved)
}

/// Check whether include recursion depth exceeds the limit
pub fn check_recursion_depth(depth: u32) -> Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(HealthError::validation(
            "include_depth",
            format!(
                "Include depth {} exceeds maximum of {} (possible circular include)",
                depth, MAX_INCLUDE_DEPTH
            ),
        ));
    }
    Ok(())
}

/// Validate a Content-Length against the response size cap
pub fn validate_response_size(content_length: Option<u64>) -> Result<()> {
    if let Some(length) = content_length {
        if length > MAX_RESPONSE_SIZE {
            return Err(HealthError::validation(
                "response_size",
                format!(
                    "Response of {:.1} MB exceeds maximum of {} MB",
                    length as f64 / (1024.0 * 1024.0),
                    MAX_RESPONSE_SIZE / (1024 * 1024)
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_package_name_normalizes() {
        assert_eq!(validate_package_name("Requests").unwrap(), "requests");
        assert_eq!(
            validate_package_name("zope.interface").unwrap(),
            "zope-interface"
        );
        assert_eq!(
            validate_package_name("My__Package").unwrap(),
            "my-package"
        );
    }

    #[test]
    fn test_validate_package_name_rejects_bad_input() {
        assert!(validate_package_name("").is_err());
        assert!(validate_package_name("-leading").is_err());
        assert!(validate_package_name("trailing-").is_err());
        assert!(validate_package_name("has space").is_err());
        assert!(validate_package_name(&"a".repeat(151)).is_err());
        assert!(validate_package_name("null\0byte").is_err());
    }

    #[test]
    fn test_validate_include_path_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        let manifest = base.join("requirements.txt");
        std::fs::write(&manifest, "").unwrap();

        let result = validate_include_path("../../etc/passwd", base, &manifest);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_include_path_accepts_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        let manifest = base.join("requirements.txt");
        let sibling = base.join("requirements-dev.txt");
        std::fs::write(&manifest, "").unwrap();
        std::fs::write(&sibling, "").unwrap();

        let resolved = validate_include_path("requirements-dev.txt", base, &manifest).unwrap();
        assert_eq!(resolved, sibling.canonicalize().unwrap());
    }

    #[test]
    fn test_recursion_depth_cap() {
        assert!(check_recursion_depth(0).is_ok());
        assert!(check_recursion_depth(MAX_INCLUDE_DEPTH).is_ok());
        assert!(check_recursion_depth(MAX_INCLUDE_DEPTH + 1).is_err());
    }

    #[test]
    fn test_response_size_cap() {
        assert!(validate_response_size(None).is_ok());
        assert!(validate_response_size(Some(1024)).is_ok());
        assert!(validate_response_size(Some(MAX_RESPONSE_SIZE + 1)).is_err());
    }
}
