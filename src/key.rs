//! Meta-key codec: identifier normalization and cache-key derivation
//!
//! A meta-key is the canonical, cache-stable identifier for a type's
//! metadata: lowercase, hyphenated, slash-delimited
//! (`Vendor::Pkg::MyModel` -> `vendor/pkg/my-model`). The codec memoizes
//! conversions in both directions for its own lifetime and derives the
//! namespaced cache key for one key or a set of keys.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MetadataError, Result};

/// Namespace prefix for every derived cache key
pub const CACHE_KEY_NAMESPACE: &str = "metadata/";

/// Delimiter used when hashing a set of meta-keys into one cache key
const CACHE_KEY_JOIN: &str = "+";

/// Canonical identifier for a type's metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaKey(String);

impl MetaKey {
    /// Normalize a type name (or an already-normalized key) into a meta-key.
    ///
    /// Accepts `::`, `\` and `/` as namespace separators; each segment is
    /// converted to kebab-case. Normalization is idempotent: feeding a
    /// meta-key back in yields the same key.
    pub fn from_type_name(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(MetadataError::InvalidIdentifier(name.to_string()));
        }

        let segments: Vec<String> = trimmed
            .split(|c| c == '/' || c == '\\')
            .flat_map(|part| part.split("::"))
            .filter(|part| !part.is_empty())
            .map(to_kebab_case)
            .collect();

        if segments.is_empty() {
            return Err(MetadataError::InvalidIdentifier(name.to_string()));
        }

        Ok(Self(segments.join("/")))
    }

    /// Reconstruct a Rust-style type path (`vendor/my-model` -> `Vendor::MyModel`).
    ///
    /// Round-tripping does not necessarily reproduce the original spelling
    /// (case folding is lossy); repeated calls are consistent.
    pub fn to_type_name(&self) -> String {
        self.0
            .split('/')
            .map(to_pascal_case)
            .collect::<Vec<_>>()
            .join("::")
    }

    /// File stem for this key's metadata source file (`vendor/thing` -> `vendor.thing`)
    pub fn file_stem(&self) -> String {
        self.0.replace('/', ".")
    }

    /// The normalized string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MetaKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Convert one name segment to kebab-case.
///
/// Hyphens are inserted at lower-to-upper boundaries only, so acronym runs
/// collapse (`HTTPServer` -> `httpserver`, `BlogPost` -> `blog-post`).
fn to_kebab_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('-');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c == '_' || c == ' ' {
            result.push('-');
            prev_lower = false;
        } else {
            result.push(c);
            prev_lower = c.is_ascii_lowercase();
        }
    }

    result
}

/// Convert one kebab-case segment to PascalCase (`bar-baz` -> `BarBaz`)
fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if c == '-' || c == '_' || c == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Identifier codec with process-lifetime memoization tables.
///
/// Owned by the loader instance; both conversion directions are cached so
/// repeated lookups for the same identifier never recompute. No eviction.
#[derive(Debug, Default)]
pub struct KeyCodec {
    name_to_key: HashMap<String, MetaKey>,
    key_to_name: HashMap<MetaKey, String>,
}

impl KeyCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an identifier into a meta-key, memoized
    pub fn meta_key(&mut self, ident: &str) -> Result<MetaKey> {
        if let Some(key) = self.name_to_key.get(ident) {
            return Ok(key.clone());
        }
        let key = MetaKey::from_type_name(ident)?;
        self.name_to_key.insert(ident.to_string(), key.clone());
        Ok(key)
    }

    /// Reconstruct the type-name form of a meta-key, memoized
    pub fn type_name(&mut self, key: &MetaKey) -> String {
        if let Some(name) = self.key_to_name.get(key) {
            return name.clone();
        }
        let name = key.to_type_name();
        self.key_to_name.insert(key.clone(), name.clone());
        name
    }

    /// Derive the cache key for a set of meta-keys.
    ///
    /// The set is sorted before hashing, so the same identifiers yield the
    /// same cache key regardless of input order. A single key is the
    /// one-element case of the same transform.
    pub fn cache_key(&self, keys: &[MetaKey]) -> String {
        let mut sorted: Vec<&str> = keys.iter().map(MetaKey::as_str).collect();
        sorted.sort_unstable();

        let joined = sorted.join(CACHE_KEY_JOIN);
        let digest = Sha256::digest(joined.as_bytes());
        format!("{}{:x}", CACHE_KEY_NAMESPACE, digest)
    }
}
