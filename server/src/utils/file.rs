//! File and path utility functions

use std::path::PathBuf;

/// Expand a path string to an absolute path.
///
/// Cross-platform path expansion that handles:
/// - Tilde expansion: `~` or `~/path` -> home directory
/// - Relative paths: `.`, `..`, `./path`, `../path` -> absolute path
/// - Bare names: `foo` -> `./foo` -> absolute path in current directory
/// - Absolute paths: passed through unchanged
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            home.join(rest)
        } else {
            PathBuf::from(path)
        }
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_unchanged() {
        let result = expand_path("/absolute/path");
        assert_eq!(result, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn relative_dot_becomes_absolute() {
        let result = expand_path(".");
        assert!(result.is_absolute());
    }

    #[test]
    fn bare_name_relative_to_cwd() {
        let result = expand_path("mydata");
        assert!(result.is_absolute());
        assert!(result.ends_with("mydata"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let result = expand_path("~/.synapse-bot");
        assert!(result.is_absolute());
        assert!(!result.to_string_lossy().contains('~'));
        assert!(result.ends_with(".synapse-bot"));
    }

    #[test]
    fn trims_whitespace() {
        let result = expand_path("  /path/to/dir  ");
        assert_eq!(result, PathBuf::from("/path/to/dir"));
    }

    #[test]
    fn empty_string_returns_cwd() {
        let result = expand_path("");
        assert!(result.is_absolute());
    }
}
