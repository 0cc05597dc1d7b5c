/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

/// Join-semilattice contract consumed by the solver.
///
/// `bottom` is the optimistic starting approximation and `join` must be
/// commutative, associative, idempotent and monotone. The solver does not
/// require a top element or a meet; widening is supplied per-problem by the
/// iteration bound.
pub trait JoinSemiLattice: Clone {
    fn bottom() -> Self;

    fn join(mut self, rhs: Self) -> Self {
        self.join_with(rhs);
        self
    }

    fn join_with(&mut self, rhs: Self);
}

/// Lattices with a greatest element, used by the `abort_with_top` widening.
pub trait HasTop: JoinSemiLattice {
    fn top() -> Self;
}

// The integer types under max form the lattices most client analyses start
// from (naturals with bottom 0, signed with bottom MIN).
macro_rules! impl_int_lattice {
    ($($t:ty),*) => {
        $(
            impl JoinSemiLattice for $t {
                fn bottom() -> Self {
                    <$t>::MIN
                }

                fn join_with(&mut self, rhs: Self) {
                    if rhs > *self {
                        *self = rhs;
                    }
                }
            }

            impl HasTop for $t {
                fn top() -> Self {
                    <$t>::MAX
                }
            }
        )*
    };
}

impl_int_lattice!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);
