//! Declarative type graph
//!
//! Model types register their lineage (single parent plus implemented
//! interfaces) declaratively through a builder instead of being discovered
//! by runtime reflection. The graph is immutable once built, backed by
//! petgraph for relationship queries, and validated against inheritance
//! cycles at build time.

pub mod lineage;

pub use lineage::LineageResolver;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};
use crate::key::MetaKey;

/// Relationship kinds between registered types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Child type -> parent type
    Extends,
    /// Type -> interface it directly implements
    Implements,
}

/// Declarative description of one model type's lineage.
///
/// Names may be given in any identifier form the codec accepts
/// (`Cms::Model::Article`, `cms/model/article`); they are normalized to
/// meta-keys when the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Parent type (single inheritance)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Directly implemented interfaces, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            implements: Vec::new(),
        }
    }

    /// Set the parent type
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    /// Append a directly implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Resolved lineage facts for one registered type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub key: MetaKey,
    pub parent: Option<MetaKey>,
    /// Direct interfaces in declaration order
    pub interfaces: Vec<MetaKey>,
    /// False for types that were only referenced, never declared
    pub declared: bool,
}

/// Immutable registry of type lineage declarations
#[derive(Debug)]
pub struct TypeGraph {
    graph: DiGraph<MetaKey, EdgeKind>,
    nodes: HashMap<MetaKey, TypeInfo>,
    node_indices: HashMap<MetaKey, NodeIndex>,
}

impl TypeGraph {
    pub fn builder() -> TypeGraphBuilder {
        TypeGraphBuilder::default()
    }

    /// An empty graph: every identifier resolves to a singleton lineage
    pub fn empty() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            node_indices: HashMap::new(),
        }
    }

    /// Load type declarations from a JSON manifest file.
    ///
    /// The manifest is a JSON array of declarations:
    /// `[{"name": "Cms::Model::Article", "extends": "Cms::Model::Content",
    ///    "implements": ["Cms::Behavior::Taggable"]}, ...]`
    pub fn from_manifest(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read type manifest {}", path.display()))?;
        let decls: Vec<TypeDecl> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse type manifest {}", path.display()))?;

        let mut builder = TypeGraph::builder();
        for decl in decls {
            builder = builder.declare(decl);
        }
        Ok(builder.build()?)
    }

    pub fn get(&self, key: &MetaKey) -> Option<&TypeInfo> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &MetaKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All registered keys, sorted for stable output
    pub fn keys(&self) -> Vec<&MetaKey> {
        let mut keys: Vec<_> = self.nodes.keys().collect();
        keys.sort();
        keys
    }

    /// Keys that were referenced by some declaration but never declared
    /// themselves. Harmless (they resolve as plain nodes) but usually a
    /// sign of a typo in the manifest.
    pub fn undeclared_keys(&self) -> Vec<&MetaKey> {
        let mut keys: Vec<_> = self
            .nodes
            .values()
            .filter(|info| !info.declared)
            .map(|info| &info.key)
            .collect();
        keys.sort();
        keys
    }

    /// All types whose lineage includes `key`: transitive subtypes and
    /// implementors. Sorted for stable output; does not include `key`.
    pub fn descendants(&self, key: &MetaKey) -> Vec<MetaKey> {
        let Some(&start) = self.node_indices.get(key) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![start];

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            if idx != start {
                if let Some(node_key) = self.graph.node_weight(idx) {
                    result.push(node_key.clone());
                }
            }
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                stack.push(edge.source());
            }
        }

        result.sort();
        result
    }

    /// Fuzzy-match registered keys against a query, best score first
    pub fn search(&self, query: &str, limit: usize) -> Vec<(MetaKey, i64)> {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(MetaKey, i64)> = self
            .nodes
            .keys()
            .filter_map(|key| {
                matcher
                    .fuzzy_match(key.as_str(), query)
                    .map(|score| (key.clone(), score))
            })
            .collect();

        results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(limit);
        results
    }
}

/// Normalized intermediate form of one declaration
struct PendingDecl {
    parent: Option<MetaKey>,
    interfaces: Vec<MetaKey>,
    declared: bool,
}

/// Builder collecting type declarations before validation
#[derive(Default)]
pub struct TypeGraphBuilder {
    decls: Vec<TypeDecl>,
}

impl TypeGraphBuilder {
    /// Register a declaration. Declaring the same type again replaces the
    /// earlier declaration.
    pub fn declare(mut self, decl: TypeDecl) -> Self {
        self.decls.push(decl);
        self
    }

    /// Normalize names, auto-register referenced-but-undeclared types as
    /// plain nodes, and validate the relation graph. Cyclic
    /// extends/implements relations are rejected with `TypeCycle`.
    pub fn build(self) -> Result<TypeGraph> {
        let mut pending: HashMap<MetaKey, PendingDecl> = HashMap::new();

        for decl in &self.decls {
            let key = MetaKey::from_type_name(&decl.name)?;
            let parent = decl
                .extends
                .as_deref()
                .map(MetaKey::from_type_name)
                .transpose()?;
            let interfaces = decl
                .implements
                .iter()
                .map(|name| MetaKey::from_type_name(name))
                .collect::<Result<Vec<_>>>()?;

            if parent.as_ref() == Some(&key) {
                return Err(MetadataError::TypeCycle(vec![
                    key.to_string(),
                    key.to_string(),
                ]));
            }
            if interfaces.contains(&key) {
                return Err(MetadataError::TypeCycle(vec![
                    key.to_string(),
                    key.to_string(),
                ]));
            }

            pending.insert(
                key,
                PendingDecl {
                    parent,
                    interfaces,
                    declared: true,
                },
            );
        }

        // Referenced parents and interfaces become plain nodes so lineage
        // walks always land on a registered entry.
        let mut referenced: Vec<MetaKey> = Vec::new();
        for decl in pending.values() {
            if let Some(parent) = &decl.parent {
                referenced.push(parent.clone());
            }
            referenced.extend(decl.interfaces.iter().cloned());
        }
        for key in referenced {
            pending.entry(key).or_insert(PendingDecl {
                parent: None,
                interfaces: Vec::new(),
                declared: false,
            });
        }

        let mut graph = DiGraph::with_capacity(pending.len(), pending.len() * 2);
        let mut node_indices = HashMap::with_capacity(pending.len());
        for key in pending.keys() {
            let idx = graph.add_node(key.clone());
            node_indices.insert(key.clone(), idx);
        }

        for (key, decl) in &pending {
            let from = node_indices[key];
            if let Some(parent) = &decl.parent {
                graph.add_edge(from, node_indices[parent], EdgeKind::Extends);
            }
            for interface in &decl.interfaces {
                graph.add_edge(from, node_indices[interface], EdgeKind::Implements);
            }
        }

        for scc in kosaraju_scc(&graph) {
            if scc.len() > 1 {
                let mut members: Vec<String> = scc
                    .iter()
                    .filter_map(|idx| graph.node_weight(*idx))
                    .map(|key| key.to_string())
                    .collect();
                members.sort();
                return Err(MetadataError::TypeCycle(members));
            }
        }

        let nodes = pending
            .into_iter()
            .map(|(key, decl)| {
                let info = TypeInfo {
                    key: key.clone(),
                    parent: decl.parent,
                    interfaces: decl.interfaces,
                    declared: decl.declared,
                };
                (key, info)
            })
            .collect();

        Ok(TypeGraph {
            graph,
            nodes,
            node_indices,
        })
    }
}
