/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::graph::Point;
use crate::problem::Node;

/// Set of unstable points supporting extraction by descending node id.
///
/// Problem builders allocate ids in post-order over the structure being
/// analysed, so the largest id is the innermost point and popping it first
/// gives an inside-out iteration order. Ties within a node are broken by the
/// ascending order on argument tuples. Implemented as buckets in an ordered
/// map rather than a general priority queue so that the extraction order is
/// deterministic across runs.
#[derive(Clone, Debug, Default)]
pub struct PriorityWorklist<A> {
    buckets: BTreeMap<Node, BTreeSet<A>>,
    len: usize,
}

impl<A: Clone + Ord> PriorityWorklist<A> {
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn contains(&self, p: &Point<A>) -> bool {
        self.buckets
            .get(&p.node)
            .map_or(false, |bucket| bucket.contains(&p.args))
    }

    /// Returns true if the point was not already queued.
    pub fn insert(&mut self, p: Point<A>) -> bool {
        let inserted = self.buckets.entry(p.node).or_default().insert(p.args);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Returns true if the point was queued.
    pub fn remove(&mut self, p: &Point<A>) -> bool {
        let Some(bucket) = self.buckets.get_mut(&p.node) else {
            return false;
        };
        let removed = bucket.remove(&p.args);
        if removed {
            self.len -= 1;
            if bucket.is_empty() {
                self.buckets.remove(&p.node);
            }
        }
        removed
    }

    /// Extracts a point with the maximal node id, smallest argument tuple
    /// first within a node.
    pub fn pop_max(&mut self) -> Option<Point<A>> {
        let (&node, bucket) = self.buckets.iter_mut().next_back()?;
        let args = bucket.iter().next().cloned()?;
        bucket.remove(&args);
        if bucket.is_empty() {
            self.buckets.remove(&node);
        }
        self.len -= 1;
        Some(Point::new(node, args))
    }
}

#[cfg(test)]
mod tests {
    use crate::datatype::PriorityWorklist;
    use crate::graph::Point;
    use crate::problem::Node;

    fn point(node: u32, args: u32) -> Point<u32> {
        Point::new(Node::new(node), args)
    }

    #[test]
    fn test_pop_order() {
        let mut wl = PriorityWorklist::new();
        assert!(wl.insert(point(1, 0)));
        assert!(wl.insert(point(3, 7)));
        assert!(wl.insert(point(3, 2)));
        assert!(wl.insert(point(2, 0)));
        assert!(!wl.insert(point(3, 2)));
        assert_eq!(wl.len(), 4);

        assert_eq!(wl.pop_max(), Some(point(3, 2)));
        assert_eq!(wl.pop_max(), Some(point(3, 7)));
        assert_eq!(wl.pop_max(), Some(point(2, 0)));
        assert_eq!(wl.pop_max(), Some(point(1, 0)));
        assert_eq!(wl.pop_max(), None);
        assert!(wl.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut wl = PriorityWorklist::new();
        wl.insert(point(5, 1));
        wl.insert(point(5, 2));
        assert!(wl.contains(&point(5, 1)));
        assert!(wl.remove(&point(5, 1)));
        assert!(!wl.remove(&point(5, 1)));
        assert!(!wl.contains(&point(5, 1)));
        assert_eq!(wl.pop_max(), Some(point(5, 2)));
        assert!(wl.is_empty());
    }
}
