/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::mem;

use im::OrdSet;
use thiserror::Error;
use tracing::debug;
use tracing::trace;

use crate::datatype::JoinSemiLattice;
use crate::datatype::PriorityWorklist;
use crate::graph::DenseDependencyGraph;
use crate::graph::DependencyGraph;
use crate::graph::Point;
use crate::graph::PointInfo;
use crate::graph::SparseDependencyGraph;
use crate::problem::DataFlowProblem;
use crate::problem::Density;
use crate::problem::IterationBound;
use crate::problem::Node;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("no transfer function registered for {0:?}")]
    MissingTransfer(Node),
    /// The worklist drained without installing a value at the root. This is
    /// an internal invariant violation rather than an expected outcome.
    #[error("solver terminated without a value at the root {0:?}")]
    RootUnsolved(Node),
}

/// Ambient context a transfer function executes under.
///
/// Every value read goes through [`depend_on`](Self::depend_on), which
/// records the consulted point into the reference frame of the evaluation in
/// progress. That record is what makes change propagation precise: when the
/// consulted point later changes, the reading point is re-enqueued.
pub trait DependencyCtx<V, A> {
    fn depend_on(&mut self, node: Node, args: A) -> V;
}

/// Worklist-driven solver for one data-flow problem.
///
/// The solver owns the graph store, the call stack, the innermost reference
/// frame and the unstable set; transfer functions reach all of them only
/// through [`DependencyCtx`]. State does not outlive a solve: create a fresh
/// solver per problem instance.
///
/// The generic graph parameter is monomorphised; [`solve_problem`] performs
/// the density dispatch for the common case.
pub struct FixpointSolver<'p, V, A, G> {
    problem: &'p DataFlowProblem<V, A>,
    bound: IterationBound<V, A>,
    graph: G,
    call_stack: BTreeSet<Point<A>>,
    current_refs: OrdSet<Point<A>>,
    unstable: PriorityWorklist<A>,
    recomputes: u64,
}

impl<'p, V, A, G> FixpointSolver<'p, V, A, G>
where
    V: JoinSemiLattice,
    A: Clone + Ord + Debug,
    G: DependencyGraph<V, A>,
{
    pub fn new(problem: &'p DataFlowProblem<V, A>, bound: IterationBound<V, A>, graph: G) -> Self {
        Self {
            problem,
            bound,
            graph,
            call_stack: BTreeSet::new(),
            current_refs: OrdSet::new(),
            unstable: PriorityWorklist::new(),
            recomputes: 0,
        }
    }

    /// Runs the problem to a mutual fixed point and returns the value at
    /// `root`.
    pub fn solve(&mut self, root: Point<A>) -> Result<V, SolverError> {
        if !self.problem.contains(root.node) {
            return Err(SolverError::MissingTransfer(root.node));
        }
        self.unstable.insert(root.clone());
        self.work();
        debug!(
            points = self.graph.len(),
            recomputes = self.recomputes,
            "fixed point reached"
        );
        self.graph
            .record(&root)
            .and_then(|info| info.value.clone())
            .ok_or(SolverError::RootUnsolved(root.node))
    }

    pub fn value_at(&self, node: Node, args: &A) -> Option<&V> {
        self.info_at(node, args).and_then(|info| info.value.as_ref())
    }

    pub fn info_at(&self, node: Node, args: &A) -> Option<&PointInfo<V, A>> {
        self.graph.record(&Point::new(node, args.clone()))
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn work(&mut self) {
        while let Some(p) = self.unstable.pop_max() {
            self.recompute(p);
        }
    }

    /// Re-evaluates one point under a fresh reference frame, installs the
    /// result and propagates to referrers when the change detector fires.
    fn recompute(&mut self, p: Point<A>) -> V {
        self.recomputes += 1;
        let outer_frame = mem::take(&mut self.current_refs);
        let first_visit = self.call_stack.insert(p.clone());
        assert!(
            first_visit,
            "recompute reentered for {:?} without passing depend_on",
            p
        );

        let problem = self.problem;
        let new_value = match self.widened(&p) {
            Some(value) => value,
            None => {
                let transfer = problem.transfer(p.node).unwrap_or_else(|| {
                    panic!("no transfer function registered for {:?}", p.node)
                });
                transfer(self, &p.args)
            }
        };

        // The frame is read back while p is still on the call stack; the
        // frame only unwinds after propagation.
        let references = self.current_refs.clone();
        let old = self
            .graph
            .update_point(&p, new_value.clone(), references.clone());
        self.unstable.remove(&p);

        let changed = match &old.value {
            Some(prev) => {
                let detector = problem.change_detector(p.node).unwrap_or_else(|| {
                    panic!("no transfer function registered for {:?}", p.node)
                });
                detector(&p.args, prev, &new_value)
            }
            None => true,
        };
        if changed {
            // The prior referrer set decides propagation for everyone but p
            // itself: a first-time self-reference is not stored in it yet,
            // and an update that dropped its self-reference (a widened one)
            // has just retired it. The frame decides the self case.
            for q in old.referrers.iter() {
                if q != &p {
                    self.unstable.insert(q.clone());
                }
            }
            if references.contains(&p) {
                self.unstable.insert(p.clone());
            }
        }

        self.call_stack.remove(&p);
        self.current_refs = outer_frame;
        trace!(
            node = p.node.id(),
            args = ?p.args,
            iterations = old.iterations + 1,
            changed = changed,
            "recomputed"
        );
        new_value
    }

    /// Widened replacement value for `p`, when the iteration bound applies:
    /// a point already updated `n` times has its next transfer output
    /// replaced by `widen(args, prior)`.
    fn widened(&self, p: &Point<A>) -> Option<V> {
        let IterationBound::AbortAfter(limit, widen) = &self.bound else {
            return None;
        };
        let info = self.graph.record(p)?;
        let prior = info.value.as_ref()?;
        if info.iterations >= *limit {
            Some(widen(&p.args, prior.clone()))
        } else {
            None
        }
    }

    /// Join of all already-discovered points of the same node with strictly
    /// smaller argument tuples; `bottom` when there are none. At worst this
    /// degrades to `bottom`, at best it gives a mid-cycle read a head start.
    fn optimistic_approximation(&self, q: &Point<A>) -> V {
        let mut approximation = V::bottom();
        for (_, info) in self.graph.lookup_lt(q.node, &q.args) {
            if let Some(value) = &info.value {
                approximation.join_with(value.clone());
            }
        }
        approximation
    }
}

impl<V, A, G> DependencyCtx<V, A> for FixpointSolver<'_, V, A, G>
where
    V: JoinSemiLattice,
    A: Clone + Ord + Debug,
    G: DependencyGraph<V, A>,
{
    fn depend_on(&mut self, node: Node, args: A) -> V {
        let q = Point::new(node, args);
        self.current_refs.insert(q.clone());
        let known = self.graph.record(&q).and_then(|info| info.value.clone());
        match known {
            // Whether settled, queued or mid-cycle, an existing value is
            // returned as-is; if it is stale, the referrer edge recorded
            // above brings the change back to this caller later.
            Some(value) => value,
            // Inside the evaluation of q itself: break the cycle.
            None if self.call_stack.contains(&q) => self.optimistic_approximation(&q),
            // Undiscovered: descend depth-first.
            None => self.recompute(q),
        }
    }
}

/// Solves `problem` for the value at `root`, seeding the root point with the
/// default argument tuple. For function-valued roots construct a
/// [`FixpointSolver`] and call [`FixpointSolver::solve`] with a full point.
pub fn solve_problem<V, A>(
    problem: &DataFlowProblem<V, A>,
    density: Density,
    bound: IterationBound<V, A>,
    root: Node,
) -> Result<V, SolverError>
where
    V: JoinSemiLattice,
    A: Clone + Ord + Debug + Default,
{
    let root = Point::new(root, A::default());
    match density {
        Density::Sparse => {
            FixpointSolver::new(problem, bound, SparseDependencyGraph::new()).solve(root)
        }
        Density::Dense(max_node) => {
            FixpointSolver::new(problem, bound, DenseDependencyGraph::with_bound(max_node)).solve(root)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::datatype::JoinSemiLattice;
    use crate::graph::DependencyGraph;
    use crate::graph::Point;
    use crate::graph::SparseDependencyGraph;
    use crate::problem::changed_if_unequal;
    use crate::problem::DataFlowProblem;
    use crate::problem::IterationBound;
    use crate::problem::Node;
    use crate::solver::DependencyCtx;
    use crate::solver::FixpointSolver;

    /// Saturating self-loop feeding a two-node chain, so the final graph has
    /// both a cycle and settled downstream points.
    fn chain_problem() -> DataFlowProblem<u64> {
        let mut problem = DataFlowProblem::new();
        problem.insert(
            Node::new(0),
            Box::new(|ctx: &mut dyn DependencyCtx<u64, ()>, _: &()| {
                (ctx.depend_on(Node::new(0), ()) + 1).min(10)
            }),
            changed_if_unequal(),
        );
        problem.insert(
            Node::new(1),
            Box::new(|ctx, _| ctx.depend_on(Node::new(0), ()) + 3),
            changed_if_unequal(),
        );
        problem.insert(
            Node::new(2),
            Box::new(|ctx, _| ctx.depend_on(Node::new(1), ()) * 2),
            changed_if_unequal(),
        );
        problem
    }

    /// Kleene fixed-point property: re-bottoming any reachable point and
    /// re-running the worklist converges back to the same solution.
    #[test]
    fn test_bottom_reset_converges_to_same_fixed_point() {
        let problem = chain_problem();
        let root = Point::new(Node::new(2), ());

        let mut reference =
            FixpointSolver::new(&problem, IterationBound::NeverAbort, SparseDependencyGraph::new());
        let expected_root = reference.solve(root.clone()).unwrap();
        assert_eq!(expected_root, 26);
        let expected: Vec<(Point<()>, u64)> = reference
            .graph()
            .points()
            .map(|p| {
                let value = reference.graph().record(&p).unwrap().value.unwrap();
                (p, value)
            })
            .collect();

        let targets: Vec<Point<()>> = reference.graph().points().collect();
        for target in targets {
            let mut solver = FixpointSolver::new(
                &problem,
                IterationBound::NeverAbort,
                SparseDependencyGraph::new(),
            );
            solver.solve(root.clone()).unwrap();

            solver.graph.record_mut(&target).value = Some(u64::bottom());
            solver.unstable.insert(target.clone());
            solver.work();

            let resolved: Vec<(Point<()>, u64)> = solver
                .graph()
                .points()
                .map(|p| {
                    let value = solver.graph().record(&p).unwrap().value.unwrap();
                    (p, value)
                })
                .collect();
            assert_eq!(resolved, expected, "after re-bottoming {:?}", target);
        }
    }
}
