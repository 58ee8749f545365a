// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar (one child per node slot) hierarchy the wide tree is collapsed from.

use alloc::vec::Vec;

use smallvec::{SmallVec, smallvec};

use crate::cone::BoundingCone;
use crate::primitive::RobinPrimitive;
use crate::types::{BoundingBox, Vector};

/// Children of an internal scalar node, as indices into the node array.
pub type ScalarChildren = SmallVec<[usize; 4]>;

/// Role of a scalar node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScalarNodeKind {
    /// Covers primitives `offset..offset + count`.
    Leaf {
        /// First primitive.
        offset: usize,
        /// Number of primitives.
        count: usize,
    },
    /// Interior node.
    Internal {
        /// Child node indices.
        children: ScalarChildren,
    },
}

/// One node of a [`ScalarTree`].
#[derive(Clone, Debug)]
pub struct ScalarNode<V> {
    /// Bounds of everything below.
    pub bounding_box: BoundingBox<V>,
    /// Normal cone of everything below, anchored at the box centroid.
    pub cone: BoundingCone<V>,
    /// Smallest Robin coefficient below.
    pub min_robin_coeff: f32,
    /// Largest Robin coefficient below.
    pub max_robin_coeff: f32,
    /// Leaf range or children.
    pub kind: ScalarNodeKind,
}

/// A k-ary hierarchy over a primitive array, root at index 0.
///
/// Leaves refer to contiguous primitive ranges. Any builder may produce one
/// through [`ScalarTree::from_nodes`]; [`ScalarTree::build`] is a simple
/// binary builder using SAH-like splits.
#[derive(Clone, Debug)]
pub struct ScalarTree<V> {
    nodes: Vec<ScalarNode<V>>,
}

impl<V> Default for ScalarTree<V> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<V: Vector> ScalarTree<V> {
    /// Wraps externally built nodes. Node 0 is the root.
    pub fn from_nodes(nodes: Vec<ScalarNode<V>>) -> Self {
        Self { nodes }
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[ScalarNode<V>] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a binary hierarchy, reordering `primitives` so that every leaf
    /// covers a contiguous range of at most `max_leaf_size` of them.
    pub fn build<P: RobinPrimitive<V>>(primitives: &mut [P], max_leaf_size: usize) -> Self {
        let mut nodes = Vec::with_capacity(primitives.len().saturating_mul(2));
        if !primitives.is_empty() {
            Self::build_recursive(&mut nodes, primitives, 0, max_leaf_size.max(1));
        }
        Self { nodes }
    }

    fn build_recursive<P: RobinPrimitive<V>>(
        nodes: &mut Vec<ScalarNode<V>>,
        primitives: &mut [P],
        offset: usize,
        max_leaf_size: usize,
    ) -> usize {
        let mut bounding_box = BoundingBox::empty();
        let mut min_robin_coeff = f32::MAX;
        let mut max_robin_coeff = -f32::MAX;
        for p in primitives.iter() {
            bounding_box.expand_to_include(&p.bounding_box());
            let (lo, hi) = p.robin_coeffs();
            min_robin_coeff = min_robin_coeff.min(lo);
            max_robin_coeff = max_robin_coeff.max(hi);
        }

        let index = nodes.len();
        let count = primitives.len();
        nodes.push(ScalarNode {
            bounding_box,
            cone: BoundingCone::for_primitives(primitives, bounding_box.centroid()),
            min_robin_coeff,
            max_robin_coeff,
            kind: ScalarNodeKind::Leaf { offset, count },
        });
        if count <= max_leaf_size {
            return index;
        }

        let k = split_sah(primitives);
        let (left_prims, right_prims) = primitives.split_at_mut(k);
        let left = Self::build_recursive(nodes, left_prims, offset, max_leaf_size);
        let right = Self::build_recursive(nodes, right_prims, offset + k, max_leaf_size);

        let centroid = bounding_box.centroid();
        let cone = BoundingCone::merge(
            &nodes[left].cone,
            &nodes[right].cone,
            nodes[left].bounding_box.centroid(),
            nodes[right].bounding_box.centroid(),
            centroid,
        );
        let node = &mut nodes[index];
        node.cone = cone;
        node.kind = ScalarNodeKind::Internal {
            children: smallvec![left, right],
        };
        index
    }
}

/// SAH-like split: sort along each axis, precompute prefix/suffix boxes, and
/// choose `k` that minimizes `area(LB_k) * k + area(RB_k) * (n - k)`.
///
/// Leaves `primitives` sorted along the chosen axis and returns `k`, with
/// `0 < k < n`.
fn split_sah<V: Vector, P: RobinPrimitive<V>>(primitives: &mut [P]) -> usize {
    let n = primitives.len();
    let mut best: Option<(f64, usize, usize)> = None;
    let mut prefix: Vec<BoundingBox<V>> = Vec::with_capacity(n);
    let mut suffix: Vec<BoundingBox<V>> = Vec::with_capacity(n);
    for axis in 0..V::DIM {
        sort_along(primitives, axis);

        // Precompute prefix/suffix bboxes for O(1) split evaluation
        prefix.clear();
        let mut acc = BoundingBox::empty();
        for p in primitives.iter() {
            acc.expand_to_include(&p.bounding_box());
            prefix.push(acc);
        }
        suffix.clear();
        let mut acc = BoundingBox::empty();
        for p in primitives.iter().rev() {
            acc.expand_to_include(&p.bounding_box());
            suffix.push(acc);
        }
        suffix.reverse();

        for k in 1..n {
            let cost = f64::from(prefix[k - 1].half_surface_area()) * k as f64
                + f64::from(suffix[k].half_surface_area()) * (n - k) as f64;
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, axis, k));
            }
        }
    }

    match best {
        Some((_, axis, k)) => {
            if axis != V::DIM - 1 {
                sort_along(primitives, axis);
            }
            k
        }
        None => n / 2,
    }
}

fn sort_along<V: Vector, P: RobinPrimitive<V>>(primitives: &mut [P], axis: usize) {
    primitives.sort_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));
}
