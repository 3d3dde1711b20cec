//! Rebuild propagation over the model's dependency declarations.
//!
//! The dependency map declares which sources each fact table is computed
//! from. Given the set of sources that changed in the current run, the
//! graph answers the one question the orchestrator needs: which facts must
//! be recomputed, in what order.
//!
//! Today every edge is source→fact, so any total order works and the
//! result is simply lexicographic for reproducible logs and tests. The
//! declarations are nonetheless held as a real directed graph with cycle
//! detection at construction: the moment a fact name appears on the
//! right-hand side of another fact (a fact→fact edge), ordering stops
//! being arbitrary, and a cycle among declarations must be rejected with
//! the member list rather than looping or building facts from stale
//! inputs.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::config::DependencyMap;
use crate::core::SemModelError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The model's dependency structure: one node per name, edges from each
/// dependency to the fact that consumes it.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    dependencies: DependencyMap,
}

impl DependencyGraph {
    /// Builds the graph from the declared dependency map and verifies it is
    /// acyclic.
    pub fn from_dependencies(dependencies: &DependencyMap) -> Result<Self, SemModelError> {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        let mut ensure_node = |graph: &mut DiGraph<String, ()>, name: &str| {
            if let Some(&idx) = node_map.get(name) {
                idx
            } else {
                let idx = graph.add_node(name.to_string());
                node_map.insert(name.to_string(), idx);
                idx
            }
        };

        for (fact, deps) in dependencies {
            let fact_idx = ensure_node(&mut graph, fact);
            for dep in deps {
                let dep_idx = ensure_node(&mut graph, dep);
                if !graph.contains_edge(dep_idx, fact_idx) {
                    graph.add_edge(dep_idx, fact_idx, ());
                }
            }
        }

        let built = Self { graph, node_map, dependencies: dependencies.clone() };
        built.detect_cycles()?;
        Ok(built)
    }

    /// Rejects cyclic declarations, listing the cycle members in traversal
    /// order.
    fn detect_cycles(&self) -> Result<(), SemModelError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if colors[&node] == Color::White
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(SemModelError::CyclicDependency {
                    members: cycle.iter().map(|&n| self.graph[n].clone()).collect(),
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Fact tables requiring a rebuild given the changed sources.
    ///
    /// A fact belongs in the result iff at least one of its declared
    /// sources changed. The empty changed-set short-circuits without
    /// touching the graph - the common "nothing changed" case. Results are
    /// lexicographically sorted.
    pub fn rebuild_set(&self, changed_sources: &BTreeSet<String>) -> Vec<String> {
        if changed_sources.is_empty() {
            return Vec::new();
        }

        let set: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| changed_sources.contains(d)))
            .map(|(fact, _)| fact.clone())
            .collect();
        debug!("rebuild set for {} changed source(s): {set:?}", changed_sources.len());
        set
    }

    /// The declared source list for a fact.
    pub fn sources_for(&self, fact: &str) -> Option<&[String]> {
        self.dependencies.get(fact).map(Vec::as_slice)
    }

    /// All declared fact names, sorted.
    pub fn facts(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Number of nodes in the underlying graph (sources + facts).
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }
}
