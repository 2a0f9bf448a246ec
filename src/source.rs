//! Metadata source file reading
//!
//! One source file per meta-key, named by the key with `/` replaced by
//! `.` plus the configured extension (`cms/model/article` ->
//! `cms.model.article.json`). Directories are searched in reverse
//! registration order and every match is deep-merged, so the
//! first-registered directory is merged last and wins conflicts.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{MetadataError, Result};
use crate::key::MetaKey;
use crate::merge::{deep_merge, Fragment};
use crate::paths::SearchPaths;

/// Default source file extension
pub const DEFAULT_EXTENSION: &str = "json";

/// Reads and accumulates metadata fragments from the search paths
#[derive(Debug, Clone)]
pub struct SourceReader {
    paths: SearchPaths,
    extension: String,
}

impl SourceReader {
    pub fn new(paths: SearchPaths) -> Self {
        Self {
            paths,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Override the source file extension (without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn paths(&self) -> &SearchPaths {
        &self.paths
    }

    /// Candidate file name for a meta-key (`cms/article` -> `cms.article.json`)
    pub fn file_name(&self, key: &MetaKey) -> String {
        format!("{}.{}", key.file_stem(), self.extension)
    }

    /// Load the fragment for one meta-key.
    ///
    /// A missing file is absence (`Ok(None)`), not an error; so is a file
    /// set that merges to an empty object. A malformed file is fatal for
    /// the whole load.
    pub fn read_fragment(&self, key: &MetaKey) -> Result<Option<Fragment>> {
        let candidate = self.file_name(key);

        // An exact path match short-circuits the directory search.
        let direct = Path::new(&candidate);
        if direct.is_file() {
            let fragment = self.read_file(direct)?;
            return Ok(if fragment.is_empty() { None } else { Some(fragment) });
        }

        let mut acc = Fragment::new();
        for dir in self.paths.read_order() {
            let path = dir.join(&candidate);
            if !path.is_file() {
                continue;
            }
            let fragment = self.read_file(&path)?;
            tracing::debug!(key = %key, path = %path.display(), "merging source fragment");
            deep_merge(&mut acc, &fragment);
        }

        Ok(if acc.is_empty() { None } else { Some(acc) })
    }

    /// Parse one source file, requiring a top-level object
    fn read_file(&self, path: &Path) -> Result<Fragment> {
        let content = fs::read_to_string(path).map_err(|source| MetadataError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| MetadataError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(MetadataError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Every meta-key that has at least one source file in the search
    /// paths, deduplicated and sorted.
    pub fn scan_keys(&self) -> Vec<MetaKey> {
        let mut keys = BTreeSet::new();
        for dir in self.paths.dirs() {
            for entry in WalkDir::new(dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                if path
                    .extension()
                    .map(|ext| ext != self.extension.as_str())
                    .unwrap_or(true)
                {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if let Ok(key) = MetaKey::from_type_name(&stem.replace('.', "/")) {
                    keys.insert(key);
                }
            }
        }
        keys.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(s: &str) -> MetaKey {
        MetaKey::from_type_name(s).unwrap()
    }

    fn reader_with_dirs(root: &Path, dirs: &[&str]) -> SourceReader {
        for dir in dirs {
            let path = root.join(dir);
            if !path.exists() {
                fs::create_dir_all(&path).unwrap();
            }
        }
        SourceReader::new(SearchPaths::new(root, dirs.to_vec()).unwrap())
    }

    #[test]
    fn test_first_registered_directory_wins_conflicts() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a", "b"]);

        fs::write(root.path().join("a/foo.json"), r#"{"x": 1}"#).unwrap();
        fs::write(root.path().join("b/foo.json"), r#"{"x": 2, "y": 3}"#).unwrap();

        let fragment = reader.read_fragment(&key("foo")).unwrap().unwrap();
        assert_eq!(fragment["x"], serde_json::json!(1));
        assert_eq!(fragment["y"], serde_json::json!(3));
    }

    #[test]
    fn test_missing_file_is_absence() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);

        assert!(reader.read_fragment(&key("nope")).unwrap().is_none());
    }

    #[test]
    fn test_empty_object_counts_as_absence() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);
        fs::write(root.path().join("a/foo.json"), "{}").unwrap();

        assert!(reader.read_fragment(&key("foo")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);
        fs::write(root.path().join("a/foo.json"), "{ not json").unwrap();

        let err = reader.read_fragment(&key("foo")).unwrap_err();
        match err {
            MetadataError::Parse { path, .. } => assert!(path.ends_with("foo.json")),
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_file_reports_path() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);
        // Present but not valid UTF-8, so the read itself fails.
        fs::write(root.path().join("a/foo.json"), [0xff, 0xfe, 0x01]).unwrap();

        let err = reader.read_fragment(&key("foo")).unwrap_err();
        match err {
            MetadataError::Unreadable { path, .. } => assert!(path.ends_with("foo.json")),
            other => panic!("expected Unreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_top_level_rejected() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);
        fs::write(root.path().join("a/foo.json"), "[1, 2, 3]").unwrap();

        let err = reader.read_fragment(&key("foo")).unwrap_err();
        assert!(matches!(err, MetadataError::NotAnObject { .. }));
    }

    #[test]
    fn test_dotted_file_names_map_to_nested_keys() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]);
        fs::write(
            root.path().join("a/cms.model.article.json"),
            r#"{"table": "articles"}"#,
        )
        .unwrap();

        let fragment = reader
            .read_fragment(&key("cms/model/article"))
            .unwrap()
            .unwrap();
        assert_eq!(fragment["table"], serde_json::json!("articles"));
    }

    #[test]
    fn test_scan_keys_unions_directories() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a", "b"]);

        fs::write(root.path().join("a/foo.json"), "{}").unwrap();
        fs::write(root.path().join("b/foo.json"), "{}").unwrap();
        fs::write(root.path().join("b/bar.baz.json"), "{}").unwrap();
        fs::write(root.path().join("b/ignored.txt"), "").unwrap();

        let keys = reader.scan_keys();
        assert_eq!(keys, vec![key("bar/baz"), key("foo")]);
    }

    #[test]
    fn test_custom_extension() {
        let root = tempdir().unwrap();
        let reader = reader_with_dirs(root.path(), &["a"]).with_extension("meta");
        fs::write(root.path().join("a/foo.meta"), r#"{"x": 1}"#).unwrap();
        fs::write(root.path().join("a/foo.json"), r#"{"x": 2}"#).unwrap();

        let fragment = reader.read_fragment(&key("foo")).unwrap().unwrap();
        assert_eq!(fragment["x"], serde_json::json!(1));
    }
}
