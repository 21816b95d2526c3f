//! Version comparison
//!
//! Dot-separated integer tuple ordering for update decisions.

/// Returns true when `remote` is strictly newer than `local`.
///
/// Versions are compared as tuples of integer components; any non-numeric
/// component makes the comparison conservatively false.
pub fn is_newer(remote: &str, local: &str) -> bool {
    match (parse(remote), parse(local)) {
        (Some(remote), Some(local)) => remote > local,
        _ => false,
    }
}

fn parse(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_bump_is_newer() {
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(is_newer("1.2.0", "1.1.9"));
    }

    #[test]
    fn test_equal_is_not_newer() {
        assert!(!is_newer("1.0.0", "1.0.0"));
    }

    #[test]
    fn test_older_is_not_newer() {
        assert!(!is_newer("1.0.0", "1.0.1"));
        assert!(!is_newer("0.9.9", "1.0.0"));
    }

    #[test]
    fn test_longer_tuple_wins_on_equal_prefix() {
        assert!(is_newer("1.2.0", "1.2"));
        assert!(!is_newer("1.2", "1.2.0"));
    }

    #[test]
    fn test_major_bump_beats_minor_digits() {
        assert!(is_newer("2.0", "1.9.9"));
        assert!(is_newer("10.0.0", "9.9.9"));
    }

    #[test]
    fn test_non_numeric_never_newer() {
        assert!(!is_newer("1.0.x", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.x"));
        assert!(!is_newer("1.0.0-beta", "1.0.0"));
        assert!(!is_newer("", "1.0.0"));
    }
}
