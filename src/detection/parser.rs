//! Version output parsing with regex extraction.

use crate::Version;
use regex::Regex;
use std::sync::OnceLock;

/// Heuristic patterns tried in order when the catalog gives no regex.
///
/// Each has exactly one capture group holding the version text.
const FALLBACK_PATTERNS: &[&str] = &[
    r"\bv?(\d+\.\d+\.\d+(?:-[0-9A-Za-z][0-9A-Za-z.-]*)?)",
    r"(?i)version\s+v?(\d+\.\d+\.\d+)",
    r"(\d+\.\d+\.\d+)",
];

fn fallback_regexes() -> &'static [Regex] {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        FALLBACK_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Extract a version from CLI output.
///
/// When `custom` is given it is tried first: capture group 1 if the pattern
/// has one, otherwise the whole match. An invalid custom pattern is logged
/// and skipped. The built-in patterns then handle common formats:
///
/// - `2.1.12 (Claude Code)` -> 2.1.12
/// - `claude-code version 1.0.5` -> 1.0.5
/// - `codex-cli v0.87.0-alpha.2` -> 0.87.0-alpha.2
///
/// Returns `None` when nothing version-like is found.
pub(crate) fn extract_version(output: &str, custom: Option<&str>) -> Option<Version> {
    if let Some(pattern) = custom.filter(|p| !p.trim().is_empty()) {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(found) = capture_version(&re, output) {
                    return Some(found);
                }
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, "ignoring invalid version regex");
            }
        }
    }

    fallback_regexes()
        .iter()
        .find_map(|re| capture_version(re, output))
}

fn capture_version(re: &Regex, output: &str) -> Option<Version> {
    let caps = re.captures(output)?;
    let text = caps
        .get(1)
        .or_else(|| caps.get(0))?
        .as_str()
        .trim()
        .trim_end_matches(['.', '-']);
    if text.is_empty() {
        None
    } else {
        Some(Version::parse(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_claude_code_version() {
        let result = extract_version("2.1.12 (Claude Code)", None).unwrap();
        assert_eq!(result, Version::new(2, 1, 12));
    }

    #[test]
    fn test_parse_version_word_format() {
        let result = extract_version("claude-code version 1.0.5", None).unwrap();
        assert_eq!(result, Version::new(1, 0, 5));
    }

    #[test]
    fn test_parse_v_prefix_with_prerelease() {
        let result = extract_version("codex-cli v0.87.0-alpha.2", None).unwrap();
        assert_eq!(result.to_string(), "0.87.0-alpha.2");
    }

    #[test]
    fn test_parse_version_multiline() {
        let output = "My Tool\nVersion: 1.0.0\nBuilt on 2025-01-01";
        assert_eq!(extract_version(output, None).unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_version_no_match() {
        assert!(extract_version("no version here", None).is_none());
        assert!(extract_version("version 1.2", None).is_none());
    }

    #[test]
    fn test_custom_regex_with_group() {
        let output = "aider 0.50.1\nPython 3.12.1";
        let result = extract_version(output, Some(r"Python (\d+\.\d+\.\d+)")).unwrap();
        assert_eq!(result, Version::new(3, 12, 1));
    }

    #[test]
    fn test_custom_regex_without_group_uses_whole_match() {
        let result = extract_version("build 7.8.9-nightly", Some(r"\d+\.\d+\.\d+-\w+")).unwrap();
        assert_eq!(result.to_string(), "7.8.9-nightly");
    }

    #[test]
    fn test_custom_regex_miss_falls_back() {
        let result = extract_version("tool 4.5.6", Some(r"release-(\d+)")).unwrap();
        assert_eq!(result, Version::new(4, 5, 6));
    }

    #[test]
    fn test_invalid_custom_regex_falls_back() {
        let result = extract_version("tool 4.5.6", Some(r"(unclosed")).unwrap();
        assert_eq!(result, Version::new(4, 5, 6));
    }

    #[test]
    fn test_custom_regex_non_semver_capture_is_raw() {
        let result = extract_version("goose 2024.10", Some(r"goose (\S+)")).unwrap();
        assert!(!result.is_parsed());
        assert_eq!(result.raw(), "2024.10");
    }

    #[test]
    fn test_trailing_punctuation_dropped() {
        let result = extract_version("Installed codex v1.2.3-rc.1.", None).unwrap();
        assert!(result.is_parsed());
        assert_eq!(result.to_string(), "1.2.3-rc.1");
        assert_eq!(extract_version("now at 2.0.0.", None).unwrap(), Version::new(2, 0, 0));
    }
}
