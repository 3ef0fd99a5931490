//! The entity dependency graph.
//!
//! Nodes are entity keys; an edge `a -> b` means `a` refers to `b`. Dependents are the
//! incoming neighbours, so the forward and reverse views cannot drift apart.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::entity::EntityKey;
use crate::core::location::Location;

/// Resolved references between the entities of one workspace.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Edge weights are the locations the references were declared at
    graph: DiGraph<EntityKey, Location>,
    nodes: HashMap<EntityKey, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Add an entity. Adding the same key twice is a no-op.
    pub fn add_entity(&mut self, key: EntityKey) -> NodeIndex {
        if let Some(&node) = self.nodes.get(&key) {
            return node;
        }
        let node = self.graph.add_node(key.clone());
        self.nodes.insert(key, node);
        node
    }

    /// Record that `from` refers to `to` at `location`.
    ///
    /// Several references between the same pair collapse into one edge carrying the
    /// first location.
    pub fn add_edge(&mut self, from: &EntityKey, to: &EntityKey, location: Location) {
        let from = self.add_entity(from.clone());
        let to = self.add_entity(to.clone());
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, location);
        }
    }

    /// Entities `key` refers to, sorted.
    pub fn deps(&self, key: &EntityKey) -> Vec<&EntityKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Entities referring to `key`, sorted.
    pub fn dependents(&self, key: &EntityKey) -> Vec<&EntityKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &EntityKey, direction: Direction) -> Vec<&EntityKey> {
        let Some(&node) = self.nodes.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<&EntityKey> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| &self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// Where `from` refers to `to`: the first location the reference was declared at.
    pub fn reference_site(&self, from: &EntityKey, to: &EntityKey) -> Option<&Location> {
        let edge = self.graph.find_edge(*self.nodes.get(from)?, *self.nodes.get(to)?)?;
        self.graph.edge_weight(edge)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
