/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;
use std::mem;
use std::ops::Bound;

use im::OrdSet;
use petgraph::graph::DiGraph;
use smallvec::SmallVec;

use crate::problem::Node;
use crate::problem::NodeId;

pub const DEFAULT_POINTS_PER_NODE: usize = 4;

/// A `(node, arguments)` pair, the unit of iteration.
///
/// The argument tuple identifies a point within a node when the node's domain
/// is function-valued; for zero-argument domains it is unit. It must carry a
/// total order so that points of one node can be enumerated below a given
/// tuple and so that scheduling stays deterministic.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Point<A> {
    pub node: Node,
    pub args: A,
}

impl<A> Point<A> {
    pub fn new(node: Node, args: A) -> Self {
        Self { node, args }
    }
}

/// Per-point record held by the graph store.
///
/// `references` are the points whose value was consulted during the last
/// completed evaluation of this point; `referrers` is the mirror direction.
/// `iterations` counts how many times the value has been installed. A record
/// with no value and zero iterations exists only for points currently being
/// resolved inside a cycle.
#[derive(Clone)]
pub struct PointInfo<V, A> {
    pub value: Option<V>,
    pub references: OrdSet<Point<A>>,
    pub referrers: OrdSet<Point<A>>,
    pub iterations: u32,
}

impl<V: std::fmt::Debug, A: std::cmp::Ord + std::fmt::Debug> std::fmt::Debug for PointInfo<V, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointInfo")
            .field("value", &self.value)
            .field("references", &self.references)
            .field("referrers", &self.referrers)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl<V, A: Clone + Ord> PointInfo<V, A> {
    pub fn empty() -> Self {
        Self {
            value: None,
            references: OrdSet::new(),
            referrers: OrdSet::new(),
            iterations: 0,
        }
    }
}

/// Store of per-point records behind the solver.
///
/// Two interchangeable backends implement this contract: a dense store
/// indexed by node id directly, for problems that declare an upper bound on
/// their node ids, and a sparse store backed by an ordered map. They differ
/// only in representation; iteration order over points is ascending
/// `(node, arguments)` for both.
pub trait DependencyGraph<V, A>
where
    V: Clone,
    A: Clone + Ord,
{
    /// Record of `p`, if the point has been discovered.
    fn record(&self, p: &Point<A>) -> Option<&PointInfo<V, A>>;

    /// Record of `p`, created empty on first access.
    fn record_mut(&mut self, p: &Point<A>) -> &mut PointInfo<V, A>;

    /// All known points of `node` with arguments strictly less than `args`,
    /// in ascending argument order.
    fn lookup_lt<'a>(
        &'a self,
        node: Node,
        args: &A,
    ) -> SmallVec<[(&'a A, &'a PointInfo<V, A>); DEFAULT_POINTS_PER_NODE]>;

    /// All discovered points, ascending by `(node, arguments)`.
    fn points(&self) -> Box<dyn Iterator<Item = Point<A>> + '_>;

    /// Number of discovered points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installs `value` and `references` at `p`, bumps the iteration count
    /// and returns the prior record.
    ///
    /// The reference set is replaced in one shot; referrer sets of all gained
    /// and lost neighbours are rewritten from the diff, so the symmetry
    /// between `references` and `referrers` holds again on return. This is
    /// the only operation that repairs that symmetry.
    fn update_point(
        &mut self,
        p: &Point<A>,
        value: V,
        references: OrdSet<Point<A>>,
    ) -> PointInfo<V, A> {
        let old_value;
        let old_references;
        let old_referrers;
        let old_iterations;
        {
            let record = self.record_mut(p);
            old_value = record.value.replace(value);
            old_references = mem::replace(&mut record.references, references.clone());
            old_referrers = record.referrers.clone();
            old_iterations = record.iterations;
            record.iterations += 1;
        }
        for lost in old_references.iter().filter(|q| !references.contains(*q)) {
            self.record_mut(lost).referrers.remove(p);
        }
        for gained in references.iter().filter(|q| !old_references.contains(*q)) {
            self.record_mut(gained).referrers.insert(p.clone());
        }
        PointInfo {
            value: old_value,
            references: old_references,
            referrers: old_referrers,
            iterations: old_iterations,
        }
    }

    /// Snapshot of the reference edges as a directed petgraph graph, one edge
    /// from every point to every point it references.
    fn digraph(&self) -> DiGraph<Point<A>, ()> {
        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        for p in self.points() {
            let index = graph.add_node(p.clone());
            indices.insert(p, index);
        }
        for p in self.points() {
            if let Some(info) = self.record(&p) {
                for q in info.references.iter() {
                    graph.add_edge(indices[&p], indices[q], ());
                }
            }
        }
        graph
    }
}

/// Dense backend: node ids index a preallocated table of per-node argument
/// maps. Touching a node past the declared bound is a programmer error.
pub struct DenseDependencyGraph<V, A> {
    nodes: Vec<BTreeMap<A, PointInfo<V, A>>>,
}

impl<V, A> DenseDependencyGraph<V, A> {
    /// Store admitting node ids up to and including `max_node`.
    pub fn with_bound(max_node: Node) -> Self {
        let mut nodes = Vec::new();
        nodes.resize_with(max_node.id() as usize + 1, BTreeMap::new);
        Self { nodes }
    }
}

impl<V, A> DependencyGraph<V, A> for DenseDependencyGraph<V, A>
where
    V: Clone,
    A: Clone + Ord,
{
    fn record(&self, p: &Point<A>) -> Option<&PointInfo<V, A>> {
        self.nodes.get(p.node.id() as usize)?.get(&p.args)
    }

    fn record_mut(&mut self, p: &Point<A>) -> &mut PointInfo<V, A> {
        let index = p.node.id() as usize;
        assert!(
            index < self.nodes.len(),
            "{:?} exceeds the declared dense bound",
            p.node
        );
        self.nodes[index]
            .entry(p.args.clone())
            .or_insert_with(PointInfo::empty)
    }

    fn lookup_lt<'a>(
        &'a self,
        node: Node,
        args: &A,
    ) -> SmallVec<[(&'a A, &'a PointInfo<V, A>); DEFAULT_POINTS_PER_NODE]> {
        match self.nodes.get(node.id() as usize) {
            Some(map) => map
                .range((Bound::Unbounded, Bound::Excluded(args)))
                .collect(),
            None => SmallVec::new(),
        }
    }

    fn points(&self) -> Box<dyn Iterator<Item = Point<A>> + '_> {
        Box::new(self.nodes.iter().enumerate().flat_map(|(id, map)| {
            map.keys()
                .map(move |args| Point::new(Node::new(id as NodeId), args.clone()))
        }))
    }

    fn len(&self) -> usize {
        self.nodes.iter().map(BTreeMap::len).sum()
    }
}

/// Sparse backend: an ordered map from node id to the per-node argument map.
pub struct SparseDependencyGraph<V, A> {
    nodes: BTreeMap<NodeId, BTreeMap<A, PointInfo<V, A>>>,
}

impl<V, A> SparseDependencyGraph<V, A> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }
}

impl<V, A> Default for SparseDependencyGraph<V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A> DependencyGraph<V, A> for SparseDependencyGraph<V, A>
where
    V: Clone,
    A: Clone + Ord,
{
    fn record(&self, p: &Point<A>) -> Option<&PointInfo<V, A>> {
        self.nodes.get(&p.node.id())?.get(&p.args)
    }

    fn record_mut(&mut self, p: &Point<A>) -> &mut PointInfo<V, A> {
        self.nodes
            .entry(p.node.id())
            .or_default()
            .entry(p.args.clone())
            .or_insert_with(PointInfo::empty)
    }

    fn lookup_lt<'a>(
        &'a self,
        node: Node,
        args: &A,
    ) -> SmallVec<[(&'a A, &'a PointInfo<V, A>); DEFAULT_POINTS_PER_NODE]> {
        match self.nodes.get(&node.id()) {
            Some(map) => map
                .range((Bound::Unbounded, Bound::Excluded(args)))
                .collect(),
            None => SmallVec::new(),
        }
    }

    fn points(&self) -> Box<dyn Iterator<Item = Point<A>> + '_> {
        Box::new(self.nodes.iter().flat_map(|(&id, map)| {
            map.keys()
                .map(move |args| Point::new(Node::new(id), args.clone()))
        }))
    }

    fn len(&self) -> usize {
        self.nodes.values().map(BTreeMap::len).sum()
    }
}
