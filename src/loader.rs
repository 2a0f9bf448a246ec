//! Metadata loading façade
//!
//! [`MetadataLoader`] ties the codec, lineage resolver, source reader and
//! cache gateway together behind a single entry point. It also keeps a
//! process-lifetime memo keyed by the original identifier string, so a
//! repeated load never touches the external cache again within one
//! process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheGateway, CacheStore};
use crate::error::{MetadataError, Result};
use crate::graph::lineage::LineageResolver;
use crate::graph::TypeGraph;
use crate::key::{KeyCodec, MetaKey};
use crate::merge::{deep_merge, Fragment};
use crate::paths::SearchPaths;
use crate::source::SourceReader;

/// Resolved metadata for one identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    inner: Fragment,
}

impl Metadata {
    pub fn new(inner: Fragment) -> Self {
        Self { inner }
    }

    /// Look up a value by dotted path, e.g. `"list.columns"`
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.inner.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Deep-merge `overlay` over the current contents
    pub fn merge(&mut self, overlay: &Fragment) {
        deep_merge(&mut self.inner, overlay);
    }

    pub fn as_map(&self) -> &Fragment {
        &self.inner
    }

    pub fn into_inner(self) -> Fragment {
        self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<Fragment> for Metadata {
    fn from(inner: Fragment) -> Self {
        Self { inner }
    }
}

/// Where a load lands its resolved data.
///
/// Resolved metadata always wins conflicts against the target's existing
/// keys; the target only contributes what the resolution did not set.
#[derive(Debug, Clone, Default)]
pub enum LoadTarget {
    /// Construct a fresh container
    #[default]
    New,
    /// Merge into an existing container
    Container(Metadata),
    /// Merge into a plain map
    Map(Fragment),
}

impl From<Metadata> for LoadTarget {
    fn from(metadata: Metadata) -> Self {
        LoadTarget::Container(metadata)
    }
}

impl From<Fragment> for LoadTarget {
    fn from(map: Fragment) -> Self {
        LoadTarget::Map(map)
    }
}

impl TryFrom<Value> for LoadTarget {
    type Error = MetadataError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(LoadTarget::New),
            Value::Object(map) => Ok(LoadTarget::Map(map)),
            other => Err(MetadataError::InvalidContainer(format!(
                "expected an object or null, got {}",
                value_kind(&other)
            ))),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Entry point for metadata resolution
pub struct MetadataLoader {
    codec: KeyCodec,
    lineage: LineageResolver,
    reader: SourceReader,
    cache: CacheGateway,
    resolved: HashMap<String, Option<Fragment>>,
}

impl MetadataLoader {
    pub fn new(paths: SearchPaths, graph: TypeGraph, store: Box<dyn CacheStore>) -> Self {
        Self {
            codec: KeyCodec::new(),
            lineage: LineageResolver::new(graph),
            reader: SourceReader::new(paths),
            cache: CacheGateway::new(store),
            resolved: HashMap::new(),
        }
    }

    /// Override the source file extension (without the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.reader = self.reader.with_extension(extension);
        self
    }

    pub fn graph(&self) -> &TypeGraph {
        self.lineage.graph()
    }

    pub fn reader(&self) -> &SourceReader {
        &self.reader
    }

    pub fn cache_mut(&mut self) -> &mut CacheGateway {
        &mut self.cache
    }

    /// Resolve an identifier into a fresh container
    pub fn load(&mut self, identifier: &str) -> Result<Metadata> {
        self.load_into(identifier, LoadTarget::New)
    }

    /// Resolve an identifier and merge the result into `target`
    pub fn load_into(&mut self, identifier: &str, target: LoadTarget) -> Result<Metadata> {
        let fragment = self.resolve_fragment(identifier, None)?;
        Ok(apply(target, fragment))
    }

    /// Merge the fragments of an explicit identifier list instead of the
    /// computed lineage, caching the result under `identifier` alone.
    pub fn load_idents(
        &mut self,
        identifier: &str,
        idents: &[&str],
        target: LoadTarget,
    ) -> Result<Metadata> {
        let fragment = self.resolve_fragment(identifier, Some(idents))?;
        Ok(apply(target, fragment))
    }

    /// The lineage the default load path would read, outermost first
    pub fn resolve_lineage(&mut self, identifier: &str) -> Result<Vec<MetaKey>> {
        let key = self.normalize(identifier)?;
        Ok(self.lineage.resolve(&key))
    }

    /// Normalize an identifier without loading anything
    pub fn normalize(&mut self, identifier: &str) -> Result<MetaKey> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(MetadataError::InvalidIdentifier(identifier.to_string()));
        }
        self.codec.meta_key(trimmed)
    }

    /// Drop both cache tiers' entries for one identifier
    pub fn invalidate(&mut self, identifier: &str) -> Result<()> {
        let key = self.normalize(identifier)?;
        let cache_key = self.codec.cache_key(std::slice::from_ref(&key));
        // The memo is keyed by original spelling; sweep every entry
        // that normalizes to the same meta-key.
        let mut stale = Vec::new();
        for ident in self.resolved.keys() {
            if self.codec.meta_key(ident).ok().as_ref() == Some(&key) {
                stale.push(ident.clone());
            }
        }
        for ident in stale {
            self.resolved.remove(&ident);
        }
        self.cache.invalidate(&cache_key)
    }

    fn resolve_fragment(
        &mut self,
        identifier: &str,
        idents: Option<&[&str]>,
    ) -> Result<Option<Fragment>> {
        if let Some(memoized) = self.resolved.get(identifier) {
            tracing::debug!(identifier, "in-process metadata memo hit");
            return Ok(memoized.clone());
        }

        let key = self.normalize(identifier)?;
        let cache_key = self.codec.cache_key(std::slice::from_ref(&key));

        // The external cache is consulted before any lineage work, so a
        // warm hit costs one store read regardless of hierarchy depth.
        let fragment = match self.cache.try_get(&cache_key)? {
            Some(payload) => Some(payload),
            None => {
                let keys = match idents {
                    Some(list) => {
                        let mut keys = Vec::with_capacity(list.len());
                        for ident in list {
                            keys.push(self.codec.meta_key(ident)?);
                        }
                        keys
                    }
                    None => self.lineage.resolve(&key),
                };
                self.cache.compute_and_store(&cache_key, &keys, &self.reader)?
            }
        };

        self.resolved.insert(identifier.to_string(), fragment.clone());
        Ok(fragment)
    }
}

fn apply(target: LoadTarget, fragment: Option<Fragment>) -> Metadata {
    let mut metadata = match target {
        LoadTarget::New => Metadata::default(),
        LoadTarget::Container(metadata) => metadata,
        LoadTarget::Map(map) => Metadata::from(map),
    };
    if let Some(fragment) = fragment {
        metadata.merge(&fragment);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::graph::{TypeDecl, TypeGraph};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_meta(root: &Path, name: &str, content: &str) {
        fs::write(root.join("meta").join(name), content).unwrap();
    }

    fn loader_at(root: &Path, graph: TypeGraph) -> MetadataLoader {
        fs::create_dir_all(root.join("meta")).unwrap();
        let paths = SearchPaths::new(root, vec!["meta"]).unwrap();
        MetadataLoader::new(paths, graph, Box::new(MemoryStore::new()))
    }

    fn child_of_base() -> TypeGraph {
        TypeGraph::builder()
            .declare(TypeDecl::new("Base"))
            .declare(TypeDecl::new("Child").extends("Base"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_merges_full_lineage() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), child_of_base());
        write_meta(root.path(), "base.json", r#"{"a": 1, "b": {"x": 1}}"#);
        write_meta(root.path(), "child.json", r#"{"b": {"y": 2}}"#);

        let metadata = loader.load("Child").unwrap();
        assert_eq!(metadata.get("a"), Some(&json!(1)));
        assert_eq!(metadata.get("b.x"), Some(&json!(1)));
        assert_eq!(metadata.get("b.y"), Some(&json!(2)));
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());

        let err = loader.load("   ").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_unknown_identifier_reads_its_own_file_only() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());
        write_meta(root.path(), "foo.json", r#"{"x": 1}"#);

        let metadata = loader.load("foo").unwrap();
        assert_eq!(metadata.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_memo_skips_external_cache_once_warm() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());
        write_meta(root.path(), "foo.json", r#"{"x": 1}"#);

        assert_eq!(loader.load("foo").unwrap().get("x"), Some(&json!(1)));

        // Clobber the external entry; the memo must still serve the load.
        let cache_key = KeyCodec::new().cache_key(&[loader.normalize("foo").unwrap()]);
        loader
            .cache_mut()
            .store_mut()
            .put(&cache_key, "garbage")
            .unwrap();
        write_meta(root.path(), "foo.json", r#"{"x": 99}"#);

        assert_eq!(loader.load("foo").unwrap().get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_resolution_overrides_target_keys() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());
        write_meta(root.path(), "foo.json", r#"{"a": 1}"#);

        let target = LoadTarget::try_from(json!({"a": 0, "keep": true})).unwrap();
        let metadata = loader.load_into("foo", target).unwrap();
        assert_eq!(metadata.get("a"), Some(&json!(1)));
        assert_eq!(metadata.get("keep"), Some(&json!(true)));
    }

    #[test]
    fn test_empty_resolution_leaves_target_unchanged() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());

        let metadata = loader.load_into("ghost", LoadTarget::New).unwrap();
        assert!(metadata.is_empty());

        let target = LoadTarget::try_from(json!({"z": 1})).unwrap();
        let metadata = loader.load_into("ghost", target).unwrap();
        assert_eq!(metadata.get("z"), Some(&json!(1)));
    }

    #[test]
    fn test_target_must_be_object_or_null() {
        assert!(matches!(LoadTarget::try_from(json!(null)), Ok(LoadTarget::New)));
        assert!(matches!(
            LoadTarget::try_from(json!({"a": 1})),
            Ok(LoadTarget::Map(_))
        ));
        let err = LoadTarget::try_from(json!(42)).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidContainer(_)));
    }

    #[test]
    fn test_explicit_idents_bypass_lineage_but_key_by_identifier() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), child_of_base());
        write_meta(root.path(), "base.json", r#"{"from": "base"}"#);
        write_meta(root.path(), "child.json", r#"{"from": "child"}"#);
        write_meta(root.path(), "extra.json", r#"{"from": "extra"}"#);

        let metadata = loader
            .load_idents("Child", &["extra"], LoadTarget::New)
            .unwrap();
        assert_eq!(metadata.get("from"), Some(&json!("extra")));

        // Cached under "Child" itself, so the default path now sees it.
        let metadata = loader.load("Child").unwrap();
        assert_eq!(metadata.get("from"), Some(&json!("extra")));
    }

    #[test]
    fn test_invalidate_clears_both_tiers() {
        let root = tempdir().unwrap();
        let mut loader = loader_at(root.path(), TypeGraph::empty());
        write_meta(root.path(), "foo.json", r#"{"x": 1}"#);

        assert_eq!(loader.load("foo").unwrap().get("x"), Some(&json!(1)));

        write_meta(root.path(), "foo.json", r#"{"x": 2}"#);
        loader.invalidate("foo").unwrap();
        assert_eq!(loader.load("foo").unwrap().get("x"), Some(&json!(2)));
    }

    #[test]
    fn test_dotted_get_stops_at_non_objects() {
        let metadata = Metadata::new(
            serde_json::from_value(json!({"a": {"b": 1}, "s": "str"})).unwrap(),
        );
        assert_eq!(metadata.get("a.b"), Some(&json!(1)));
        assert!(metadata.get("a.b.c").is_none());
        assert!(metadata.get("s.x").is_none());
        assert!(metadata.get("missing").is_none());
    }
}
