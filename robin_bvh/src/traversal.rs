// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Star-radius queries.

use smallvec::SmallVec;

use crate::bound::RadiusBound;
use crate::math;
use crate::mbvh::RobinMbvh;
use crate::primitive::RobinPrimitive;
use crate::types::{BoundingSphere, UNBOUNDED, Vector};
use crate::visit::{VisitedSlots, visit_node};
use crate::wide::{LeafRecord, WideNode};

/// Inline capacity of the traversal stack; deeper traversals spill to the heap.
const TRAVERSAL_STACK_CAPACITY: usize = 64;

/// A pending subtree.
///
/// `distance` is the subtree's lower bound on the squared star radius. A
/// negative sign (including `-0.0`) marks a subtree that may hold silhouettes.
#[derive(Copy, Clone, Debug)]
struct StackEntry {
    node: usize,
    distance: f32,
}

type TraversalStack = SmallVec<[StackEntry; TRAVERSAL_STACK_CAPACITY]>;

/// Anything that can shrink a query sphere to the local star radius.
pub trait StarRadiusQuery<V: Vector> {
    /// Shrinks `s.r2` to the squared star radius at `s.c`, returning the
    /// number of nodes (or primitives) evaluated.
    ///
    /// `flip_normal_orientation` selects which side of the boundary counts as
    /// the inside for silhouette tests that are decided by a single face.
    fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
    ) -> usize;
}

impl<V: Vector, P: RobinPrimitive<V>, const W: usize> RobinMbvh<V, P, W> {
    /// Shrinks `s.r2` to the squared star radius at `s.c`.
    ///
    /// `s.r2` only ever decreases; start from [`BoundingSphere::unbounded`] for
    /// an unconstrained query. Returns the number of nodes visited, counting
    /// each evaluated primitive instead of its leaf when primitives are not
    /// batched.
    pub fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
    ) -> usize {
        let mut stack = TraversalStack::new();
        stack.push(StackEntry {
            node: 0,
            distance: -0.0,
        });
        let mut visited = 0;

        while let Some(entry) = stack.pop() {
            if math::abs(entry.distance) > s.r2 {
                continue;
            }
            let node = &self.nodes[entry.node];
            let silhouettes = entry.distance.is_sign_negative();

            if node.is_leaf() {
                let range = node.leaf_range();
                if self.batch_queries {
                    let records = &self.leaf_records[range.leaf_offset..][..range.leaf_count];
                    for (l, record) in records.iter().enumerate() {
                        let lanes = (range.reference_count - l * W).min(W);
                        let d2 = record.squared_star_radius(
                            s.c,
                            s.r2,
                            flip_normal_orientation,
                            silhouette_precision,
                            silhouettes,
                            self.bound,
                        );
                        s.r2 = d2[..lanes].iter().fold(s.r2, |r2, d| r2.min(*d));
                    }
                    visited += 1;
                } else {
                    let prims = &self.primitives[range.reference_offset..][..range.reference_count];
                    for p in prims {
                        p.compute_squared_star_radius(
                            s,
                            flip_normal_orientation,
                            silhouette_precision,
                            silhouettes,
                            self.bound,
                        );
                        visited += 1;
                    }
                }
            } else {
                let slots = visit_node(node, s.c, s.r2, self.bound);
                enqueue_nodes(node, &slots, &mut s.r2, &mut stack);
                visited += 1;
            }
        }
        visited
    }
}

impl<V: Vector, P: RobinPrimitive<V>, const W: usize> StarRadiusQuery<V> for RobinMbvh<V, P, W> {
    fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
    ) -> usize {
        Self::compute_squared_star_radius(self, s, flip_normal_orientation, silhouette_precision)
    }
}

/// A missing tree (no primitives) constrains nothing.
impl<V: Vector, T: StarRadiusQuery<V>> StarRadiusQuery<V> for Option<T> {
    fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
    ) -> usize {
        match self {
            Some(tree) => {
                tree.compute_squared_star_radius(s, flip_normal_orientation, silhouette_precision)
            }
            None => 0,
        }
    }
}

impl<V: Vector, const W: usize> LeafRecord<V, W> {
    /// Evaluates every lane against the same `r2`.
    fn squared_star_radius(
        &self,
        x: V,
        r2: f32,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
        perform_silhouette_tests: bool,
        bound: RadiusBound,
    ) -> [f32; W] {
        core::array::from_fn(|w| {
            self.lane(w).squared_star_radius(
                x,
                r2,
                flip_normal_orientation,
                silhouette_precision,
                perform_silhouette_tests,
                bound,
            )
        })
    }
}

/// Pushes the children selected by `slots`, tightening `r2` by their upper
/// bounds, with the nearest child on top of the stack.
fn enqueue_nodes<V: Vector, const W: usize>(
    node: &WideNode<V, W>,
    slots: &VisitedSlots<W>,
    r2: &mut f32,
    stack: &mut TraversalStack,
) {
    if W == 4 {
        let keys: [f32; 4] =
            core::array::from_fn(|w| if slots.mask[w] { slots.r2_min[w] } else { UNBOUNDED });
        for w in descending_order_4(keys) {
            push_slot(node, slots, w, r2, stack);
        }
        return;
    }

    // Only subtrees without silhouettes compete for the top.
    let mut closest: Option<(usize, f32)> = None;
    for w in 0..W {
        if let Some(distance) = push_slot(node, slots, w, r2, stack)
            && !slots.has_silhouettes[w]
            && closest.is_none_or(|(_, d)| distance < d)
        {
            closest = Some((stack.len() - 1, distance));
        }
    }
    if let Some((i, _)) = closest {
        let top = stack.len() - 1;
        stack.swap(i, top);
    }
}

/// Pushes slot `w` if it is selected, returning its lower bound.
fn push_slot<V: Vector, const W: usize>(
    node: &WideNode<V, W>,
    slots: &VisitedSlots<W>,
    w: usize,
    r2: &mut f32,
    stack: &mut TraversalStack,
) -> Option<f32> {
    if !slots.mask[w] {
        return None;
    }
    let distance = slots.r2_min[w];
    *r2 = r2.min(slots.r2_max[w]);
    stack.push(StackEntry {
        node: node.child_index(w),
        distance: if slots.has_silhouettes[w] {
            -distance
        } else {
            distance
        },
    });
    Some(distance)
}

/// Lane order for four keys, largest first (five-comparator sorting network).
fn descending_order_4(keys: [f32; 4]) -> [usize; 4] {
    let mut order = [0, 1, 2, 3];
    for (a, b) in [(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)] {
        if keys[order[a]] < keys[order[b]] {
            order.swap(a, b);
        }
    }
    order
}
