//! Metafold
//!
//! A metadata resolution and caching engine: resolves structured JSON
//! metadata for a type from its full inheritance and interface lineage,
//! deep-merging one fragment per lineage member across a set of search
//! directories, with a two-tier caching strategy in front.
//!
//! ## Resolution pipeline
//!
//! ```text
//! identifier ("Vendor::Pkg::MyModel")
//!     │  KeyCodec             normalize to meta-key "vendor/pkg/my-model"
//!     │  CacheGateway         external store, hit returns immediately
//!     │  LineageResolver      ancestors + interfaces, outermost first
//!     │  SourceReader         <dir>/vendor.pkg.my-model.json per member
//!     │  merge                later fragments override, key by key
//!     └─ Metadata             cached, memoized, handed to the caller
//! ```
//!
//! A warm load costs one external cache read; a repeated load within the
//! same process costs one map lookup.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod key;
pub mod loader;
pub mod merge;
pub mod paths;
pub mod source;

pub use cache::{CacheEnvelope, CacheGateway, CacheStore, FileStore, MemoryStore};
pub use config::Settings;
pub use error::{MetadataError, Result};
pub use graph::{LineageResolver, TypeDecl, TypeGraph};
pub use key::{KeyCodec, MetaKey};
pub use loader::{LoadTarget, Metadata, MetadataLoader};
pub use merge::{deep_merge, Fragment};
pub use paths::SearchPaths;
pub use source::SourceReader;
