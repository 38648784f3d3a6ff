//! Per-pass graph snapshot and scheduling.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::node::{Node, NodeId};
use crate::error::TensorError;
use crate::scalar::Scalar;

/// Every node reachable from a set of roots, stored in discovery order and
/// addressed by dense indices.
pub(crate) struct GraphSnapshot<T: Scalar> {
    nodes: Vec<Rc<Node<T>>>,
    index: HashMap<NodeId, usize>,
    /// Parent arena indices per node, aligned with `Node::parents`.
    parents: Vec<Vec<Option<usize>>>,
}

impl<T: Scalar> GraphSnapshot<T> {
    /// Walk parent edges from `roots`. Nodes in `stop` are included but their
    /// parents are not explored.
    pub(crate) fn build(roots: &[Rc<Node<T>>], stop: &HashSet<NodeId>) -> Self {
        let mut nodes: Vec<Rc<Node<T>>> = Vec::new();
        let mut index = HashMap::new();
        let mut pending: Vec<Rc<Node<T>>> = Vec::new();

        for root in roots {
            if !index.contains_key(&root.id()) {
                index.insert(root.id(), nodes.len());
                nodes.push(Rc::clone(root));
                pending.push(Rc::clone(root));
            }
        }

        while let Some(node) = pending.pop() {
            if stop.contains(&node.id()) {
                continue;
            }
            for edge in node.parents().iter().flatten() {
                let parent = &edge.node;
                if !index.contains_key(&parent.id()) {
                    index.insert(parent.id(), nodes.len());
                    nodes.push(Rc::clone(parent));
                    pending.push(Rc::clone(parent));
                }
            }
        }

        let parents = nodes
            .iter()
            .map(|node| {
                if stop.contains(&node.id()) {
                    return vec![None; node.parents().len()];
                }
                node.parents()
                    .iter()
                    .map(|edge| edge.as_ref().and_then(|e| index.get(&e.node.id()).copied()))
                    .collect()
            })
            .collect();

        Self {
            nodes,
            index,
            parents,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, i: usize) -> &Rc<Node<T>> {
        &self.nodes[i]
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Arena indices of the parents of node `i`; `None` where flow stops.
    pub(crate) fn parents_of(&self, i: usize) -> &[Option<usize>] {
        &self.parents[i]
    }

    /// Order in which every node comes after all of its consumers.
    pub(crate) fn schedule(&self) -> Result<Vec<usize>, TensorError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.len(), self.len());
        let handles: Vec<NodeIndex> = (0..self.len()).map(|i| graph.add_node(i)).collect();
        for (consumer, parents) in self.parents.iter().enumerate() {
            for &producer in parents.iter().flatten() {
                graph.add_edge(handles[consumer], handles[producer], ());
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            TensorError::InvalidOperation(format!(
                "recorded graph has a cycle through node {}",
                self.nodes[graph[cycle.node_id()]].id()
            ))
        })?;
        Ok(order.into_iter().map(|handle| graph[handle]).collect())
    }
}
