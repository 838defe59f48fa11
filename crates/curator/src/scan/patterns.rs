//! Glob pattern normalization and matching.

use crate::error::{CuratorError, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Normalize a glob pattern for matching against relative paths.
///
/// Rules:
/// - Empty or "*" becomes "**/*" (match all)
/// - Leading slashes are stripped (relative matching)
/// - Patterns without a path separator get "**/" prefix
/// - Backslashes are treated as path separators
pub fn normalize_glob_pattern(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut pattern = unified.trim_start_matches('/').to_string();

    if pattern.is_empty() || pattern == "*" {
        pattern = "**/*".to_string();
    }

    if !pattern.contains('/') {
        pattern = format!("**/{}", pattern);
    }

    pattern
}

/// Globset only folds ASCII case, so patterns and paths are both lowercased.
fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

fn build_glob(raw: &str) -> Result<globset::Glob> {
    let normalized = fold_case(&normalize_glob_pattern(raw));
    GlobBuilder::new(&normalized)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map_err(|e| CuratorError::Pattern(format!("Invalid pattern '{}': {}", raw, e)))
}

/// Build a case-insensitive glob matcher from a raw pattern.
pub fn build_matcher(raw: &str) -> Result<GlobMatcher> {
    Ok(build_glob(raw)?.compile_matcher())
}

/// Compile several raw patterns into one set. `None` when there are none.
pub fn build_set(raw_patterns: &[String]) -> Result<Option<GlobSet>> {
    let mut builder = GlobSetBuilder::new();
    let mut count = 0;
    for raw in raw_patterns {
        if raw.trim().is_empty() {
            continue;
        }
        builder.add(build_glob(raw)?);
        count += 1;
    }
    if count == 0 {
        return Ok(None);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| CuratorError::Pattern(e.to_string()))
}

/// Match a raw glob pattern against a relative path.
pub fn matches(raw_pattern: &str, path: &str) -> Result<bool> {
    let matcher = build_matcher(raw_pattern)?;
    Ok(matcher.is_match(fold_case(path.trim_start_matches('/'))))
}

/// Read an ignore file: one pattern per line, `#` comments and blanks skipped.
pub fn read_ignore_file(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CuratorError::io(path, e)),
    };
    Ok(parse_ignore_lines(&content))
}

fn parse_ignore_lines(content: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('!') {
            warn!(pattern = %line, "Negated ignore patterns are not supported, skipping");
            continue;
        }
        patterns.push(line.to_string());
    }
    patterns
}

/// Include/exclude/ignore filters over relative paths.
///
/// Ignore and exclude always win over include.
#[derive(Debug, Default)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    ignore: Option<GlobSet>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String], ignore: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
            ignore: build_set(ignore)?,
        })
    }

    pub fn allows(&self, rel_path: &str) -> bool {
        let rel_path = fold_case(rel_path);
        let rel_path = rel_path.as_str();
        if self.ignore.as_ref().map_or(false, |set| set.is_match(rel_path)) {
            return false;
        }
        if self.exclude.as_ref().map_or(false, |set| set.is_match(rel_path)) {
            return false;
        }
        self.include.as_ref().map_or(true, |set| set.is_match(rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_basics() {
        assert_eq!(normalize_glob_pattern(""), "**/*");
        assert_eq!(normalize_glob_pattern("*"), "**/*");
        assert_eq!(normalize_glob_pattern("notes.txt"), "**/notes.txt");
        assert_eq!(normalize_glob_pattern("docs/*.md"), "docs/*.md");
        assert_eq!(normalize_glob_pattern("/docs/*.md"), "docs/*.md");
        assert_eq!(normalize_glob_pattern("docs\\*.md"), "docs/*.md");
    }

    #[test]
    fn matches_relative_paths() {
        assert!(matches("*.log", "b.log").unwrap());
        assert!(matches("*.log", "deep/nested/b.log").unwrap());
        assert!(matches("**/*.md", "top.md").unwrap());
        assert!(!matches("*.log", "b.txt").unwrap());
    }

    #[test]
    fn matching_is_case_insensitive_including_unicode() {
        assert!(matches("/SUB/INNER/*.log", "sub/inner/c.LOG").unwrap());
        assert!(matches("ÉTÉ*.TXT", "été-2024.txt").unwrap());
        assert!(matches("été*", "ÉTÉ-2024.TXT").unwrap());
        assert!(!matches("ÉTÉ*.TXT", "hiver-2024.txt").unwrap());
    }

    #[test]
    fn filter_folds_non_ascii_case() {
        let filter =
            PathFilter::new(&strings(&["ÜBER/*"]), &strings(&["über/ALT*"]), &[]).unwrap();
        assert!(filter.allows("Über/neu.txt"));
        assert!(!filter.allows("über/alt.txt"));
        assert!(!filter.allows("unter/neu.txt"));
    }

    #[test]
    fn exclude_beats_include() {
        let filter = PathFilter::new(&strings(&["**/*.md"]), &strings(&["sub/**"]), &[]).unwrap();
        assert!(filter.allows("top.md"));
        assert!(!filter.allows("sub/inner.md"));
        assert!(!filter.allows("top.txt"));
    }

    #[test]
    fn ignore_patterns_apply_without_include() {
        let filter = PathFilter::new(&[], &[], &strings(&["*.log"])).unwrap();
        assert!(!filter.allows("a.log"));
        assert!(!filter.allows("x/a.log"));
        assert!(filter.allows("a.txt"));
    }

    #[test]
    fn ignore_file_lines() {
        let parsed = parse_ignore_lines("# comment\n\n*.log\n  build/**  \n!keep.log\n");
        assert_eq!(parsed, strings(&["*.log", "build/**"]));
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let err = build_matcher("[unclosed").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
