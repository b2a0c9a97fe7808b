use std::collections::{HashMap, HashSet};

use astral_core::error::{AstralError, Result};

use crate::edge::{Edge, EdgeOn};
use crate::node::Node;

/// A validated node/edge table for one operation.
///
/// Construction rejects empty graphs, duplicate node names, anything but
/// exactly one start node, edges to or from unknown nodes, and two edges
/// sharing the same (source, polarity, status) key.
pub struct Graph<O> {
    nodes: Vec<Node<O>>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    start: usize,
}

impl<O> Graph<O> {
    pub fn new(operation: &str, nodes: Vec<Node<O>>, edges: Vec<Edge>) -> Result<Self> {
        let invalid = |message: String| AstralError::Graph {
            operation: operation.to_string(),
            message,
        };

        if nodes.is_empty() {
            return Err(invalid("graph has no nodes".into()));
        }

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.name.clone(), i).is_some() {
                return Err(invalid(format!("duplicate node '{}'", node.name)));
            }
        }

        let starts: Vec<&str> = nodes
            .iter()
            .filter(|n| n.is_start)
            .map(|n| n.name.as_str())
            .collect();
        let start = match starts.as_slice() {
            [only] => index[*only],
            [] => return Err(invalid("no start node".into())),
            many => {
                return Err(invalid(format!(
                    "multiple start nodes: {}",
                    many.join(", ")
                )))
            }
        };

        let mut keys: HashSet<(&str, EdgeOn, Option<&str>)> = HashSet::new();
        for edge in &edges {
            for end in [&edge.from, &edge.to] {
                if !index.contains_key(end) {
                    return Err(invalid(format!(
                        "edge {} -> {} references unknown node '{}'",
                        edge.from, edge.to, end
                    )));
                }
            }
            if !keys.insert((edge.from.as_str(), edge.on, edge.status.as_deref())) {
                return Err(invalid(format!(
                    "ambiguous edges from '{}' on {:?} with status {:?}",
                    edge.from, edge.on, edge.status
                )));
            }
        }

        Ok(Self {
            nodes,
            edges,
            index,
            start,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn node(&self, idx: usize) -> &Node<O> {
        &self.nodes[idx]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn nodes(&self) -> &[Node<O>] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Select the outgoing edge for a terminal outcome.
    ///
    /// An edge guarded by exactly `status` wins over the unguarded edge of the
    /// same polarity, whatever the declaration order.
    pub fn next(&self, from: &str, on: EdgeOn, status: Option<&str>) -> Option<&Edge> {
        let mut fallback = None;
        for edge in self.edges.iter().filter(|e| e.from == from && e.on == on) {
            match (&edge.status, status) {
                (Some(guard), Some(s)) if guard == s => return Some(edge),
                (None, _) => fallback = Some(edge),
                _ => {}
            }
        }
        fallback
    }
}
