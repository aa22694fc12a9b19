//! Semantic version comparison

use std::cmp::Ordering;

use semver::Version;

use crate::error::{CoordinatorError, Result};

/// Parse `1.2.3`, `v1.2.3` or `1.2.3-rc.1`
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    Version::parse(bare).map_err(|_| CoordinatorError::InvalidVersionFormat(raw.to_string()))
}

/// Semantic-version precedence of `a` relative to `b`; build metadata is ignored
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;

    Ok(a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre)))
}

/// True only when both versions are known, valid, and `remote` is newer
pub fn update_available(remote: Option<&str>, local: Option<&str>) -> bool {
    match (remote, local) {
        (Some(remote), Some(local)) => {
            matches!(compare(remote, local), Ok(Ordering::Greater))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_components() {
        assert_eq!(compare("1.3.0", "1.2.0").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.2.0", "1.2.0").unwrap(), Ordering::Equal);
        assert_eq!(compare("1.2.0", "1.2.1").unwrap(), Ordering::Less);
        assert_eq!(compare("2.0.0", "1.99.99").unwrap(), Ordering::Greater);
        assert_eq!(compare("1.10.0", "1.9.0").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_prerelease_sorts_before_release() {
        assert_eq!(compare("1.3.0-rc.1", "1.3.0").unwrap(), Ordering::Less);
        assert_eq!(compare("1.3.0-rc.1", "1.2.0").unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_tag_prefix_and_build_metadata() {
        assert_eq!(compare("v1.3.0", "1.3.0").unwrap(), Ordering::Equal);
        assert_eq!(compare("1.3.0+build.7", "1.3.0").unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(
            compare("1.2", "1.2.0"),
            Err(CoordinatorError::InvalidVersionFormat(v)) if v == "1.2"
        ));
        assert!(compare("1.2.0", "").is_err());
        assert!(compare("latest", "1.0.0").is_err());
    }

    #[test]
    fn test_update_available() {
        assert!(update_available(Some("1.3.0"), Some("1.2.0")));
        assert!(!update_available(Some("1.2.0"), Some("1.2.0")));
        assert!(!update_available(Some("1.1.0"), Some("1.2.0")));
        assert!(!update_available(None, Some("1.2.0")));
        assert!(!update_available(Some("1.3.0"), None));
        assert!(!update_available(Some("garbage"), Some("1.2.0")));
    }
}
