//! The deployment manifest and the ignore rules it declares.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Manifest file name in the source root.
pub const MANIFEST_FILE: &str = "bfast.json";

/// Ignore globs used when the manifest is absent or unusable.
pub const DEFAULT_IGNORE: [&str; 4] = [
    "**/node_modules/**",
    "**/specs/**",
    "**/*.specs.*",
    "**/.git/**",
];

/// A compiled set of ignore globs.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreRules {
    /// The default rules.
    pub fn defaults() -> Self {
        Self::from_patterns(DEFAULT_IGNORE).unwrap_or_else(|_| Self::none())
    }

    /// Rules that ignore nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Compile glob patterns. Fails on the first invalid pattern.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(Glob::new(pattern)?);
            kept.push(pattern.to_owned());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    /// Read the `ignore` list of the manifest at `path`.
    ///
    /// Falls back to [`defaults`](Self::defaults) when the file is missing,
    /// is not JSON, has no `ignore` array of strings, or holds an invalid glob.
    pub async fn from_manifest(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(manifest = %path.display(), "no manifest, using default ignore list");
                return Self::defaults();
            }
            Err(e) => {
                warn!(manifest = %path.display(), error = %e, "unreadable manifest, using default ignore list");
                return Self::defaults();
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(manifest = %path.display(), error = %e, "malformed manifest, using default ignore list");
                return Self::defaults();
            }
        };
        let Some(list) = value.get("ignore").and_then(Value::as_array) else {
            debug!(manifest = %path.display(), "manifest has no ignore list, using defaults");
            return Self::defaults();
        };
        let patterns: Option<Vec<&str>> = list.iter().map(Value::as_str).collect();
        let Some(patterns) = patterns else {
            warn!(manifest = %path.display(), "ignore entries must be strings, using defaults");
            return Self::defaults();
        };
        match Self::from_patterns(patterns) {
            Ok(rules) => rules,
            Err(e) => {
                warn!(manifest = %path.display(), error = %e, "invalid ignore glob, using defaults");
                Self::defaults()
            }
        }
    }

    /// The source patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `path` under `root` is ignored. Patterns are tried against
    /// the path relative to `root` and against the full path.
    pub fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.set.is_match(relative) || self.set.is_match(path)
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_skip_vendored_and_spec_files() {
        let rules = IgnoreRules::defaults();
        let root = Path::new("/srv/fns");
        assert!(rules.is_ignored(root, Path::new("/srv/fns/node_modules/x/a.fn.json")));
        assert!(rules.is_ignored(root, Path::new("/srv/fns/specs/a.fn.json")));
        assert!(rules.is_ignored(root, Path::new("/srv/fns/api/hello.specs.fn.json")));
        assert!(!rules.is_ignored(root, Path::new("/srv/fns/api/hello.fn.json")));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(IgnoreRules::from_patterns(["a/[b"]).is_err());
    }

    #[tokio::test]
    async fn manifest_ignore_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(MANIFEST_FILE);
        std::fs::write(&manifest, r#"{"ignore": ["**/private/**"]}"#).unwrap();

        let rules = IgnoreRules::from_manifest(&manifest).await;
        assert_eq!(rules.patterns(), ["**/private/**"]);
        assert!(rules.is_ignored(dir.path(), &dir.path().join("private/a.fn.json")));
        assert!(!rules.is_ignored(dir.path(), &dir.path().join("node_modules/a.fn.json")));
    }

    #[tokio::test]
    async fn malformed_manifest_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(MANIFEST_FILE);

        for content in ["{not json", r#"{"ignore": "nope"}"#, r#"{"ignore": [1, 2]}"#, r#"{"ignore": ["a/[b"]}"#] {
            std::fs::write(&manifest, content).unwrap();
            let rules = IgnoreRules::from_manifest(&manifest).await;
            assert_eq!(rules.patterns(), DEFAULT_IGNORE, "content: {content}");
        }
    }

    #[tokio::test]
    async fn missing_manifest_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::from_manifest(&dir.path().join("absent.json")).await;
        assert_eq!(rules.patterns(), DEFAULT_IGNORE);
    }
}
