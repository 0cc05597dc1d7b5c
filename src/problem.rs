/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::datatype::HasTop;
use crate::solver::DependencyCtx;

pub type NodeId = u32;

/// Stable identity of a client node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Node(NodeId);

impl Node {
    pub fn new(id: NodeId) -> Self {
        Node(id)
    }

    pub fn id(self) -> NodeId {
        self.0
    }
}

/// Client-supplied routine computing the value of a point from the values of
/// other points, read through [`DependencyCtx::depend_on`].
///
/// Transfer functions must be monotone with respect to the values they read;
/// the solver does not verify this.
pub type TransferFn<V, A> = Box<dyn Fn(&mut dyn DependencyCtx<V, A>, &A) -> V>;

/// Predicate deciding whether a new value differs enough from the old one to
/// require propagation to referrers. The node is closed over at registration;
/// the arguments identify the point within the node.
pub type ChangeFn<V, A> = Box<dyn Fn(&A, &V, &V) -> bool>;

/// Operator forcing a point to a conservative over-approximation once its
/// iteration budget is exhausted. Must return a value at least as large as
/// anything the transfer function would produce, and re-applying it must be
/// a no-op under the change detector.
pub type WideningFn<V, A> = Box<dyn Fn(&A, V) -> V>;

/// The permissive default change detector.
pub fn changed_if_unequal<V: PartialEq + 'static, A: 'static>() -> ChangeFn<V, A> {
    Box::new(|_, old, new| old != new)
}

struct NodeEntry<V, A> {
    transfer: TransferFn<V, A>,
    changed: ChangeFn<V, A>,
}

/// Mapping from each node to its transfer function and change detector,
/// constant for the lifetime of a solve.
pub struct DataFlowProblem<V, A = ()> {
    nodes: Vec<Option<NodeEntry<V, A>>>,
}

impl<V, A> Default for DataFlowProblem<V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A> DataFlowProblem<V, A> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Registers a node under an explicit id.
    pub fn insert(&mut self, node: Node, transfer: TransferFn<V, A>, changed: ChangeFn<V, A>) {
        let index = node.id() as usize;
        if index >= self.nodes.len() {
            self.nodes.resize_with(index + 1, || None);
        }
        let prior = self.nodes[index].replace(NodeEntry { transfer, changed });
        assert!(
            prior.is_none(),
            "transfer function registered twice for {:?}",
            node
        );
    }

    /// Allocates a fresh node id and registers the transfer function produced
    /// by `transfer`, which receives the new node so that recursive bindings
    /// can refer to themselves.
    pub fn allocate_node(
        &mut self,
        changed: ChangeFn<V, A>,
        transfer: impl FnOnce(Node) -> TransferFn<V, A>,
    ) -> Node {
        let node = Node::new(self.nodes.len() as NodeId);
        let transfer = transfer(node);
        self.nodes.push(Some(NodeEntry { transfer, changed }));
        node
    }

    pub fn contains(&self, node: Node) -> bool {
        self.transfer(node).is_some()
    }

    pub fn transfer(&self, node: Node) -> Option<&TransferFn<V, A>> {
        self.nodes
            .get(node.id() as usize)
            .and_then(|entry| entry.as_ref())
            .map(|entry| &entry.transfer)
    }

    pub fn change_detector(&self, node: Node) -> Option<&ChangeFn<V, A>> {
        self.nodes
            .get(node.id() as usize)
            .and_then(|entry| entry.as_ref())
            .map(|entry| &entry.changed)
    }

    /// Largest registered node id, if any; convenient for `Density::Dense`.
    pub fn max_node(&self) -> Option<Node> {
        self.nodes
            .iter()
            .rposition(|entry| entry.is_some())
            .map(|index| Node::new(index as NodeId))
    }
}

/// Choice of graph-store backend. `Dense` carries the largest node id the
/// problem will touch and indexes records by node id directly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Density {
    Sparse,
    Dense(Node),
}

/// Termination discipline for a solve.
///
/// `NeverAbort` relies on the ascending-chain condition of the value lattice.
/// `AbortAfter(n, widen)` replaces the transfer output of any point already
/// updated `n` times by `widen(args, current_value)`.
pub enum IterationBound<V, A = ()> {
    NeverAbort,
    AbortAfter(u32, WideningFn<V, A>),
}

impl<V, A> IterationBound<V, A> {
    /// Widening that jumps straight to the greatest element.
    pub fn abort_with_top(n: u32) -> Self
    where
        V: HasTop + 'static,
        A: 'static,
    {
        IterationBound::AbortAfter(n, Box::new(|_, _| V::top()))
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::changed_if_unequal;
    use crate::problem::DataFlowProblem;
    use crate::problem::Node;

    #[test]
    fn test_registry() {
        let mut problem: DataFlowProblem<u64> = DataFlowProblem::new();
        assert_eq!(problem.max_node(), None);

        problem.insert(
            Node::new(4),
            Box::new(|_, _| 0),
            changed_if_unequal(),
        );
        assert!(problem.contains(Node::new(4)));
        assert!(!problem.contains(Node::new(3)));
        assert_eq!(problem.max_node(), Some(Node::new(4)));

        let fresh = problem.allocate_node(changed_if_unequal(), |_| Box::new(|_, _| 1));
        assert_eq!(fresh, Node::new(5));
        assert!(problem.contains(fresh));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_double_registration() {
        let mut problem: DataFlowProblem<u64> = DataFlowProblem::new();
        problem.insert(Node::new(0), Box::new(|_, _| 0), changed_if_unequal());
        problem.insert(Node::new(0), Box::new(|_, _| 1), changed_if_unequal());
    }
}
