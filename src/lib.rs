/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! TARSKI is a demand-driven fixed-point solver for monotone data-flow
//! problems over client-defined lattices.
//!
//! Clients describe a problem as a set of transfer functions keyed by node
//! ids; the solver iterates them to a mutual fixed point using a
//! priority-driven worklist with on-the-fly dependency discovery, optional
//! iteration bounds with client-supplied widening, and a choice between
//! sparse and dense graph representations.

pub mod datatype;
pub mod graph;
pub mod problem;
pub mod solver;
