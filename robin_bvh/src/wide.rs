// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wide node and leaf record layouts.
//!
//! Both are structure-of-arrays with one lane per child slot (nodes) or per
//! primitive (leaf records), so a visit touches `W` siblings at once.

use core::f32::consts::PI;

use crate::cone::BoundingCone;
use crate::primitive::{FaceLane, FeatureFlags, RobinFace};
use crate::types::{BoundingBox, UNBOUNDED, Vector};

/// Child slot value for an unused slot.
pub(crate) const ABSENT: i32 = i32::MAX;

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "node and record counts are bounded by i32::MAX when the tree is built"
)]
#[inline]
pub(crate) fn to_i32(n: usize) -> i32 {
    n as i32
}

#[allow(
    clippy::cast_sign_loss,
    reason = "only called on non-negative slot values"
)]
#[inline]
pub(crate) fn to_usize(n: i32) -> usize {
    n as usize
}

/// Leaf payload stored in the child slots of a leaf node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LeafRange {
    /// First leaf record.
    pub(crate) leaf_offset: usize,
    /// Number of leaf records.
    pub(crate) leaf_count: usize,
    /// First primitive.
    pub(crate) reference_offset: usize,
    /// Number of primitives.
    pub(crate) reference_count: usize,
}

/// Internal or leaf node of the wide tree.
///
/// An internal node stores per-slot bounds and child indices (or [`ABSENT`]).
/// A leaf stores `-(leaf_offset + 1)`, the leaf record count, the primitive
/// offset and the primitive count in its first four slots; its per-slot bounds
/// are unused.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WideNode<V, const W: usize> {
    pub(crate) box_min: [V; W],
    pub(crate) box_max: [V; W],
    pub(crate) cone_axis: [V; W],
    pub(crate) cone_half_angle: [f32; W],
    pub(crate) cone_radius: [f32; W],
    pub(crate) min_robin_coeff: [f32; W],
    pub(crate) max_robin_coeff: [f32; W],
    pub(crate) child: [i32; W],
}

impl<V: Vector, const W: usize> Default for WideNode<V, W> {
    fn default() -> Self {
        Self {
            box_min: [V::splat(UNBOUNDED); W],
            box_max: [V::splat(-UNBOUNDED); W],
            cone_axis: [V::ZERO; W],
            cone_half_angle: [PI; W],
            cone_radius: [0.0; W],
            min_robin_coeff: [f32::MAX; W],
            max_robin_coeff: [-f32::MAX; W],
            child: [ABSENT; W],
        }
    }
}

impl<V: Vector, const W: usize> WideNode<V, W> {
    /// Returns true if this node stores a leaf range.
    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.child[0] < 0
    }

    /// Returns true if slot `w` holds no child.
    #[inline]
    pub(crate) fn is_absent(&self, w: usize) -> bool {
        self.child[w] == ABSENT
    }

    /// Child node index of an occupied internal slot.
    #[inline]
    pub(crate) fn child_index(&self, w: usize) -> usize {
        to_usize(self.child[w])
    }

    pub(crate) fn set_leaf(&mut self, range: LeafRange) {
        self.child[0] = -(to_i32(range.leaf_offset) + 1);
        self.child[1] = to_i32(range.leaf_count);
        self.child[2] = to_i32(range.reference_offset);
        self.child[3] = to_i32(range.reference_count);
    }

    pub(crate) fn leaf_range(&self) -> LeafRange {
        LeafRange {
            leaf_offset: to_usize(-(self.child[0] + 1)),
            leaf_count: to_usize(self.child[1]),
            reference_offset: to_usize(self.child[2]),
            reference_count: to_usize(self.child[3]),
        }
    }

    pub(crate) fn slot_box(&self, w: usize) -> BoundingBox<V> {
        BoundingBox::new(self.box_min[w], self.box_max[w])
    }

    pub(crate) fn slot_cone(&self, w: usize) -> BoundingCone<V> {
        BoundingCone::new(
            self.cone_axis[w],
            self.cone_half_angle[w],
            self.cone_radius[w],
        )
    }

    pub(crate) fn set_slot_bounds(
        &mut self,
        w: usize,
        bbox: &BoundingBox<V>,
        cone: &BoundingCone<V>,
    ) {
        self.box_min[w] = bbox.p_min;
        self.box_max[w] = bbox.p_max;
        self.cone_axis[w] = cone.axis;
        self.cone_half_angle[w] = cone.half_angle;
        self.cone_radius[w] = cone.radius;
    }

    pub(crate) fn set_slot_coeffs(&mut self, w: usize, min_coeff: f32, max_coeff: f32) {
        self.min_robin_coeff[w] = min_coeff;
        self.max_robin_coeff[w] = max_coeff;
    }

    /// Union of all occupied slot boxes.
    pub(crate) fn bounding_box(&self) -> BoundingBox<V> {
        let mut b = BoundingBox::empty();
        for w in (0..W).filter(|&w| !self.is_absent(w)) {
            b.expand_to_include(&self.slot_box(w));
        }
        b
    }

    /// `(min, max)` over all occupied slot coefficient ranges.
    pub(crate) fn coeff_range(&self) -> (f32, f32) {
        let mut lo = f32::MAX;
        let mut hi = -f32::MAX;
        for w in (0..W).filter(|&w| !self.is_absent(w)) {
            lo = lo.min(self.min_robin_coeff[w]);
            hi = hi.max(self.max_robin_coeff[w]);
        }
        (lo, hi)
    }
}

/// Up to `W` faces packed lane by lane.
///
/// Unused lanes hold far-away vertices, no adjacency and a Neumann
/// coefficient; queries never read them.
#[derive(Clone, Debug)]
pub(crate) struct LeafRecord<V: Vector, const W: usize> {
    pub(crate) positions: V::Array<[V; W]>,
    pub(crate) adjacent_normals: V::Array<[V; W]>,
    pub(crate) flags: V::Array<[FeatureFlags; W]>,
    pub(crate) max_robin_coeff: [f32; W],
    pub(crate) primitive_index: [usize; W],
}

impl<V: Vector, const W: usize> Default for LeafRecord<V, W> {
    fn default() -> Self {
        Self {
            positions: V::array_from_fn(|_| [V::splat(UNBOUNDED); W]),
            adjacent_normals: V::array_from_fn(|_| [V::ZERO; W]),
            flags: V::array_from_fn(|_| [FeatureFlags::IGNORE_ADJACENT_FACE; W]),
            max_robin_coeff: [-f32::MAX; W],
            primitive_index: [usize::MAX; W],
        }
    }
}

impl<V: Vector, const W: usize> LeafRecord<V, W> {
    /// Copies `face` into lane `w`.
    pub(crate) fn set_lane(&mut self, w: usize, face: &RobinFace<V>) {
        let positions = face.positions.as_ref();
        let normals = face.adjacent_normals.as_ref();
        let flags = face.flags.as_ref();
        for i in 0..V::DIM {
            self.positions.as_mut()[i][w] = positions[i];
            self.adjacent_normals.as_mut()[i][w] = normals[i];
            self.flags.as_mut()[i][w] = flags[i];
        }
        self.max_robin_coeff[w] = face.max_robin_coeff;
        self.primitive_index[w] = face.index;
    }

    /// Face data of lane `w`.
    pub(crate) fn lane(&self, w: usize) -> FaceLane<V> {
        FaceLane {
            positions: V::array_from_fn(|i| self.positions.as_ref()[i][w]),
            adjacent_normals: V::array_from_fn(|i| self.adjacent_normals.as_ref()[i][w]),
            flags: V::array_from_fn(|i| self.flags.as_ref()[i][w]),
            max_robin_coeff: self.max_robin_coeff[w],
        }
    }
}
