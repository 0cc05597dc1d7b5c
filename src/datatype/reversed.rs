/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::cmp::Ordering;

use crate::datatype::HasTop;
use crate::datatype::JoinSemiLattice;

/// Wrapper whose comparison operator is the reverse of the wrapped type's.
///
/// Intended for client domains that gain information downward (an arity-style
/// ordering where "more arguments" means "more information"): wrapping the
/// value reverses the order locally instead of requiring a reversed instance
/// on the underlying type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Reversed<T>(pub T);

impl<T: PartialOrd> PartialOrd for Reversed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        other.0.partial_cmp(&self.0)
    }
}

impl<T: Ord> Ord for Reversed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

// Under the reversed order the wrapped top is the least element and joins
// move downward.
impl<T: Clone + Ord + HasTop> JoinSemiLattice for Reversed<T> {
    fn bottom() -> Self {
        Reversed(T::top())
    }

    fn join_with(&mut self, rhs: Self) {
        if rhs.0 < self.0 {
            self.0 = rhs.0;
        }
    }
}

impl<T: Clone + Ord + HasTop> HasTop for Reversed<T> {
    fn top() -> Self {
        Reversed(T::bottom())
    }
}

#[cfg(test)]
mod tests {
    use crate::datatype::JoinSemiLattice;
    use crate::datatype::Reversed;

    #[test]
    fn test_reversed_order() {
        assert!(Reversed(2u32) < Reversed(1u32));
        assert!(Reversed(1u32) > Reversed(2u32));
        assert_eq!(Reversed(3u32), Reversed(3u32));
    }

    #[test]
    fn test_reversed_join_is_min() {
        assert_eq!(Reversed::<u32>::bottom(), Reversed(u32::MAX));
        assert_eq!(Reversed(5u32).join(Reversed(2)), Reversed(2));
        assert_eq!(Reversed(2u32).join(Reversed(5)), Reversed(2));
    }
}
