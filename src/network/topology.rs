use std::collections::BTreeMap;

use crate::protocol::types::{Cost, NodeId};

/// Nodes and undirected link costs for one simulated network.
///
/// Ids follow declaration order, so the first node added is `n0`. Links are
/// keyed by the normalized `(min, max)` pair: a pair with no entry is
/// unreachable, a node's link to itself is free.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    names: Vec<String>,
    links: BTreeMap<(NodeId, NodeId), Cost>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node and hand out its id.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.names.len() as u32);
        self.names.push(name.into());
        id
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// All node ids, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.names.len() as u32).map(NodeId).collect()
    }

    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.names.get(node.index()).map(String::as_str)
    }

    /// Set the cost of the undirected link between `a` and `b`;
    /// `Cost::INFINITY` removes it.
    pub fn set_link(&mut self, a: NodeId, b: NodeId, cost: Cost) {
        if cost.is_infinite() {
            self.links.remove(&Self::key(a, b));
        } else {
            self.links.insert(Self::key(a, b), cost);
        }
    }

    /// Direct cost between two nodes: zero to itself, infinite when no link
    /// is configured.
    pub fn link_cost(&self, a: NodeId, b: NodeId) -> Cost {
        if a == b {
            return Cost::ZERO;
        }
        self.links
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(Cost::INFINITY)
    }

    /// Configured links as `(a, b, cost)` with `a < b`.
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId, Cost)> + '_ {
        self.links.iter().map(|(&(a, b), &cost)| (a, b, cost))
    }

    fn key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a <= b { (a, b) } else { (b, a) }
    }
}
