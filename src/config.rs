//! Configuration management for the metadata loader
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (metafold.toml)
//! - Environment variables (METAFOLD_*)
//!
//! ## Example config file (metafold.toml):
//! ```toml
//! [paths]
//! base = "./app"
//! search = ["metadata", "metadata/overrides"]
//!
//! [cache]
//! backend = "file"
//! dir = "./storage/cache"
//!
//! [source]
//! extension = "json"
//!
//! [types]
//! manifest = "./app/types.json"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::{CacheStore, FileStore, MemoryStore};
use crate::graph::TypeGraph;
use crate::loader::MetadataLoader;
use crate::paths::SearchPaths;

/// Main configuration for the metadata loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Search path settings
    #[serde(default)]
    pub paths: PathSettings,

    /// Cache backend settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Source file settings
    #[serde(default)]
    pub source: SourceSettings,

    /// Type graph settings
    #[serde(default)]
    pub types: TypeSettings,
}

/// Search path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Base directory the search paths are resolved against
    #[serde(default = "default_base_path")]
    pub base: PathBuf,

    /// Search directories, relative to `base` unless absolute.
    /// Registration order matters: the first entry wins merge conflicts.
    #[serde(default = "default_search_paths")]
    pub search: Vec<String>,
}

/// Cache backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Which store backs the external cache tier
    #[serde(default)]
    pub backend: CacheBackend,

    /// Directory for the file backend (defaults to the XDG cache dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// External cache store selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Memory,
}

/// Source file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Source file extension, without the leading dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Type graph configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypeSettings {
    /// Path to a JSON manifest of type declarations
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

// Default value functions
fn default_base_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_search_paths() -> Vec<String> {
    vec!["metadata".to_string()]
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            base: default_base_path(),
            search: default_search_paths(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: None,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

impl Settings {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["metafold.toml", ".metafold.toml", "config/metafold.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "metafold", "metafold") {
            let xdg_config = config_dir.config_dir().join("metafold.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (METAFOLD_*)
        builder = builder.add_source(
            Environment::with_prefix("METAFOLD")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the base path (resolves relative paths)
    pub fn base_path(&self) -> PathBuf {
        if self.paths.base.is_absolute() {
            self.paths.base.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.paths.base)
        }
    }

    /// Directory used by the file cache backend
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache.dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("dev", "metafold", "metafold")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".metafold-cache"))
    }

    /// Construct a [`MetadataLoader`] from this configuration
    pub fn build_loader(&self) -> anyhow::Result<MetadataLoader> {
        use anyhow::Context;

        let graph = match &self.types.manifest {
            Some(path) => TypeGraph::from_manifest(path)
                .with_context(|| format!("loading type manifest {}", path.display()))?,
            None => TypeGraph::empty(),
        };

        let paths = SearchPaths::new(self.base_path(), self.paths.search.clone())
            .context("configuring search paths")?;

        let store: Box<dyn CacheStore> = match self.cache.backend {
            CacheBackend::File => Box::new(FileStore::new(self.cache_dir())),
            CacheBackend::Memory => Box::new(MemoryStore::new()),
        };

        Ok(MetadataLoader::new(paths, graph, store)
            .with_extension(self.source.extension.clone()))
    }
}
