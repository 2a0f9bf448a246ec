//! Two-tier metadata cache
//!
//! The outer tier is a pluggable [`CacheStore`] holding serialized cache
//! envelopes keyed by the hashed cache key from [`crate::key::KeyCodec`].
//! A hit bypasses lineage resolution and source reading entirely. Entries
//! written by older releases are migrated to the current envelope shape on
//! first read.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::key::MetaKey;
use crate::merge::{deep_merge, Fragment};
use crate::source::SourceReader;

/// Envelope schema version written by this release
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Backing storage for serialized cache entries
pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Process-local store, mainly for tests and short-lived tools
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry, e.g. to model a cache written by an older release
    pub fn seed(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store writing one file per entry under a root directory.
///
/// The cache key's namespace prefix becomes a subdirectory, so entries
/// land at `<root>/metadata/<hex>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Versioned wrapper around a cached fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub payload: Fragment,
}

impl CacheEnvelope {
    pub fn new(payload: Fragment) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored entry, tolerating the two pre-envelope shapes.
    ///
    /// Returns the payload and whether the entry must be rewritten in the
    /// current shape. `None` means the entry is unusable and the caller
    /// should treat it as a miss.
    pub fn decode(raw: &str) -> Option<(Fragment, bool)> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let Value::Object(map) = value else {
            return None;
        };

        if let Some(version) = map.get("schema_version").and_then(Value::as_u64) {
            if version == u64::from(CACHE_SCHEMA_VERSION) {
                if let Some(Value::Object(payload)) = map.get("payload") {
                    return Some((payload.clone(), false));
                }
            }
            // Envelope from a different release, not safe to reinterpret
            return None;
        }

        // v1 entries wrapped the fragment in a "metadata" field
        if let Some(Value::Object(inner)) = map.get("metadata") {
            return Some((inner.clone(), true));
        }

        // v0 entries stored the bare fragment
        Some((map, true))
    }
}

/// Cache-aware load path shared by every identifier lookup
pub struct CacheGateway {
    store: Box<dyn CacheStore>,
}

impl CacheGateway {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store_mut(&mut self) -> &mut dyn CacheStore {
        self.store.as_mut()
    }

    /// Check the store for `cache_key`, migrating legacy entries in place.
    ///
    /// `Ok(None)` is a miss, including undecodable entries. The caller is
    /// expected to follow up with [`CacheGateway::compute_and_store`], and
    /// must not run lineage resolution before calling this: skipping that
    /// work on a hit is the point of the cache.
    pub fn try_get(&mut self, cache_key: &str) -> Result<Option<Fragment>> {
        let Some(raw) = self.store.get(cache_key)? else {
            return Ok(None);
        };
        match CacheEnvelope::decode(&raw) {
            Some((payload, needs_rewrite)) => {
                tracing::debug!(cache_key, "metadata cache hit");
                if needs_rewrite {
                    let encoded = CacheEnvelope::new(payload.clone()).encode()?;
                    self.store.put(cache_key, &encoded)?;
                }
                Ok(Some(payload))
            }
            None => {
                tracing::warn!(cache_key, "undecodable cache entry, recomputing");
                Ok(None)
            }
        }
    }

    /// Read every key's fragment in order, deep-merge, and store the result.
    ///
    /// Later keys override earlier ones. An empty merge is reported as
    /// `None` and never stored. Read errors propagate before anything is
    /// written, so a failed load leaves the store untouched.
    pub fn compute_and_store(
        &mut self,
        cache_key: &str,
        keys: &[MetaKey],
        reader: &SourceReader,
    ) -> Result<Option<Fragment>> {
        let mut acc = Fragment::new();
        for key in keys {
            if let Some(fragment) = reader.read_fragment(key)? {
                deep_merge(&mut acc, &fragment);
            }
        }
        if acc.is_empty() {
            tracing::debug!(cache_key, "no metadata found for key set");
            return Ok(None);
        }

        let encoded = CacheEnvelope::new(acc.clone()).encode()?;
        self.store.put(cache_key, &encoded)?;
        tracing::debug!(cache_key, keys = keys.len(), "metadata cache miss, recomputed");
        Ok(Some(acc))
    }

    /// Cached load of the merged fragment for a fixed key set
    pub fn load(
        &mut self,
        cache_key: &str,
        keys: &[MetaKey],
        reader: &SourceReader,
    ) -> Result<Option<Fragment>> {
        if let Some(payload) = self.try_get(cache_key)? {
            return Ok(Some(payload));
        }
        self.compute_and_store(cache_key, keys, reader)
    }

    pub fn invalidate(&mut self, cache_key: &str) -> Result<()> {
        self.store.remove(cache_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use crate::paths::SearchPaths;
    use std::path::Path;
    use tempfile::tempdir;

    fn key(s: &str) -> MetaKey {
        MetaKey::from_type_name(s).unwrap()
    }

    fn reader_at(root: &Path) -> SourceReader {
        fs::create_dir_all(root.join("meta")).unwrap();
        SourceReader::new(SearchPaths::new(root, vec!["meta"]).unwrap())
    }

    #[test]
    fn test_hit_bypasses_source_reading() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());
        let file = root.path().join("meta/foo.json");
        fs::write(&file, r#"{"x": 1}"#).unwrap();

        let mut gateway = CacheGateway::new(Box::new(MemoryStore::new()));
        let first = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(first["x"], serde_json::json!(1));

        // Behind the cache's back: a hit must not notice.
        fs::remove_file(&file).unwrap();
        let second = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(second["x"], serde_json::json!(1));
    }

    #[test]
    fn test_later_keys_override_earlier_on_miss() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());
        fs::write(root.path().join("meta/base.json"), r#"{"a": 1, "b": 1}"#).unwrap();
        fs::write(root.path().join("meta/child.json"), r#"{"b": 2}"#).unwrap();

        let mut gateway = CacheGateway::new(Box::new(MemoryStore::new()));
        let merged = gateway
            .load("metadata/abc", &[key("base"), key("child")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(merged["a"], serde_json::json!(1));
        assert_eq!(merged["b"], serde_json::json!(2));
    }

    #[test]
    fn test_empty_merge_is_none_and_not_stored() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());

        let mut gateway = CacheGateway::new(Box::new(MemoryStore::new()));
        assert!(gateway
            .load("metadata/abc", &[key("absent")], &reader)
            .unwrap()
            .is_none());
        assert!(gateway.store_mut().get("metadata/abc").unwrap().is_none());
    }

    #[test]
    fn test_v1_entry_is_unwrapped_and_rewritten() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());

        let mut store = MemoryStore::new();
        store.seed("metadata/abc", r#"{"metadata": {"x": 1}, "mtime": 12345}"#);
        let mut gateway = CacheGateway::new(Box::new(store));

        let payload = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(payload["x"], serde_json::json!(1));

        let raw = gateway.store_mut().get("metadata/abc").unwrap().unwrap();
        let envelope: CacheEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope.schema_version, CACHE_SCHEMA_VERSION);
        assert_eq!(envelope.payload["x"], serde_json::json!(1));
    }

    #[test]
    fn test_v0_bare_fragment_is_adopted() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());

        let mut store = MemoryStore::new();
        store.seed("metadata/abc", r#"{"x": 1}"#);
        let mut gateway = CacheGateway::new(Box::new(store));

        let payload = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(payload["x"], serde_json::json!(1));
    }

    #[test]
    fn test_corrupted_entry_recomputes_and_restores() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());
        fs::write(root.path().join("meta/foo.json"), r#"{"x": 9}"#).unwrap();

        let mut store = MemoryStore::new();
        store.seed("metadata/abc", "definitely not json");
        let mut gateway = CacheGateway::new(Box::new(store));

        let payload = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(payload["x"], serde_json::json!(9));

        let raw = gateway.store_mut().get("metadata/abc").unwrap().unwrap();
        assert!(serde_json::from_str::<CacheEnvelope>(&raw).is_ok());
    }

    #[test]
    fn test_future_envelope_version_is_a_miss() {
        let raw = r#"{"schema_version": 3, "created_at": "2024-01-01T00:00:00Z", "payload": {"x": 1}}"#;
        assert!(CacheEnvelope::decode(raw).is_none());
    }

    #[test]
    fn test_source_error_leaves_store_untouched() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());
        fs::write(root.path().join("meta/foo.json"), "{ broken").unwrap();

        let mut gateway = CacheGateway::new(Box::new(MemoryStore::new()));
        let err = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap_err();
        assert!(matches!(err, MetadataError::Parse { .. }));
        assert!(gateway.store_mut().get("metadata/abc").unwrap().is_none());
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let root = tempdir().unwrap();
        let reader = reader_at(root.path());
        let file = root.path().join("meta/foo.json");
        fs::write(&file, r#"{"x": 1}"#).unwrap();

        let mut gateway = CacheGateway::new(Box::new(MemoryStore::new()));
        gateway.load("metadata/abc", &[key("foo")], &reader).unwrap();

        fs::write(&file, r#"{"x": 2}"#).unwrap();
        gateway.invalidate("metadata/abc").unwrap();
        let payload = gateway
            .load("metadata/abc", &[key("foo")], &reader)
            .unwrap()
            .unwrap();
        assert_eq!(payload["x"], serde_json::json!(2));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let root = tempdir().unwrap();

        let mut store = FileStore::new(root.path());
        store.put("metadata/abc", r#"{"x": 1}"#).unwrap();
        assert!(root.path().join("metadata/abc.json").is_file());

        let reopened = FileStore::new(root.path());
        assert_eq!(
            reopened.get("metadata/abc").unwrap().unwrap(),
            r#"{"x": 1}"#
        );

        let mut reopened = reopened;
        reopened.remove("metadata/abc").unwrap();
        assert!(reopened.get("metadata/abc").unwrap().is_none());
    }
}
