// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction errors.

/// Errors reported while building a [`RobinMbvh`](crate::RobinMbvh).
///
/// Queries, refits and coefficient updates never fail; everything that can go
/// wrong is caught when the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Star-radius bounds exist only for 2-D and 3-D boundaries.
    #[error("star radius bounds are only defined in 2 and 3 dimensions, got {0}")]
    UnsupportedDimension(usize),

    /// Leaf nodes encode four integers in their child slots.
    #[error("batch width {0} is too narrow, wide nodes need at least 4 lanes")]
    UnsupportedWidth(usize),

    /// A scalar hierarchy node has more children than a wide node has slots.
    #[error("hierarchy node {node} has {children} children but wide nodes hold at most {width}")]
    TooManyChildren {
        /// Index of the offending scalar node.
        node: usize,
        /// Number of children it has.
        children: usize,
        /// Slots available per wide node.
        width: usize,
    },

    /// Node, record or primitive counts do not fit the 32-bit child encoding.
    #[error("{0} primitives exceed the capacity of the child slot encoding")]
    TooManyPrimitives(usize),

    /// Primitives were supplied together with an empty scalar hierarchy.
    #[error("scalar hierarchy is empty but {0} primitives were supplied")]
    MissingHierarchy(usize),
}
