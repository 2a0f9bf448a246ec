//! Lineage resolution
//!
//! A lineage is the ordered list of meta-keys whose metadata fragments
//! are merged to resolve one type: ancestors outermost-first, each type's
//! direct interfaces immediately before the type itself, the subject's
//! own key always last. The order is the merge order: later entries
//! override earlier ones.

use std::collections::{HashMap, HashSet};

use crate::graph::TypeGraph;
use crate::key::MetaKey;

/// Memoizing lineage resolver over an immutable type graph
pub struct LineageResolver {
    graph: TypeGraph,
    memo: HashMap<MetaKey, Vec<MetaKey>>,
}

impl LineageResolver {
    pub fn new(graph: TypeGraph) -> Self {
        Self {
            graph,
            memo: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// Compute (or recall) the lineage for a meta-key.
    ///
    /// Unknown keys never fail: they resolve to the singleton lineage
    /// containing just themselves. Interfaces contribute only their own
    /// key; their declarations are not expanded into other lineages.
    pub fn resolve(&mut self, key: &MetaKey) -> Vec<MetaKey> {
        if let Some(lineage) = self.memo.get(key) {
            return lineage.clone();
        }

        let lineage = self.compute(key);
        tracing::debug!(key = %key, depth = lineage.len(), "lineage resolved");
        self.memo.insert(key.clone(), lineage.clone());
        lineage
    }

    fn compute(&self, key: &MetaKey) -> Vec<MetaKey> {
        if !self.graph.contains(key) {
            return vec![key.clone()];
        }

        // Ancestor chain, outermost first. The graph builder rejects
        // cyclic relations, so this walk terminates.
        let mut chain = Vec::new();
        let mut cursor = Some(key.clone());
        while let Some(current) = cursor {
            cursor = self.graph.get(&current).and_then(|info| info.parent.clone());
            chain.push(current);
        }
        chain.reverse();

        // Each type contributes its direct interfaces in reverse
        // declaration order, then itself. Among one type's interfaces the
        // first-declared one is therefore merged last and wins conflicts.
        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        for type_key in &chain {
            if let Some(info) = self.graph.get(type_key) {
                for interface in info.interfaces.iter().rev() {
                    if seen.insert(interface.clone()) {
                        lineage.push(interface.clone());
                    }
                }
            }
            if seen.insert(type_key.clone()) {
                lineage.push(type_key.clone());
            }
        }

        lineage
    }
}
