/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod lattice;
mod reversed;
mod worklist;

pub use lattice::*;
pub use reversed::*;
pub use worklist::*;
