// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node visit: which children to descend into and how far they can reach.

use crate::bound::RadiusBound;
use crate::math;
use crate::primitive::{is_dirichlet, is_neumann};
use crate::types::{UNBOUNDED, Vector};
use crate::wide::WideNode;

/// Per-slot result of [`visit_node`].
#[derive(Copy, Clone, Debug)]
pub(crate) struct VisitedSlots<const W: usize> {
    /// Slots worth descending into.
    pub(crate) mask: [bool; W],
    /// Lower bound on the squared star radius any primitive below can impose.
    pub(crate) r2_min: [f32; W],
    /// Squared radius the result is guaranteed not to exceed once the slot is
    /// visited.
    pub(crate) r2_max: [f32; W],
    /// Slots that may contain silhouettes as seen from the query point.
    pub(crate) has_silhouettes: [bool; W],
}

/// Classifies the `W` children of an internal node for a query at `x` with
/// current squared radius `r2`.
///
/// Dirichlet children are bounded by their box distances. Other children get a
/// cone test; children that may hold silhouettes keep their box lower bound
/// and lose their upper bound. Neumann children without silhouettes are
/// dropped, and Robin children without silhouettes are bounded by `bound`.
pub(crate) fn visit_node<V: Vector, const W: usize>(
    node: &WideNode<V, W>,
    x: V,
    r2: f32,
    bound: RadiusBound,
) -> VisitedSlots<W> {
    let mut out = VisitedSlots {
        mask: [false; W],
        r2_min: [UNBOUNDED; W],
        r2_max: [UNBOUNDED; W],
        has_silhouettes: [false; W],
    };

    for w in 0..W {
        if node.is_absent(w) {
            continue;
        }
        let (d2_min, d2_max) = node.slot_box(w).squared_distance_bounds(x);
        out.r2_min[w] = d2_min;
        out.r2_max[w] = d2_max;
        out.mask[w] = d2_min <= r2;
    }

    for w in 0..W {
        let min_coeff = node.min_robin_coeff[w];
        let max_coeff = node.max_robin_coeff[w];
        if !out.mask[w] || is_dirichlet(min_coeff) {
            continue;
        }

        let bbox = node.slot_box(w);
        let overlap = node.slot_cone(w).overlap(x, &bbox, out.r2_min[w]);
        if overlap.overlaps {
            out.has_silhouettes[w] = true;
            out.r2_max[w] = UNBOUNDED;
        } else if is_neumann(max_coeff) {
            out.mask[w] = false;
        } else {
            let r_min = math::sqrt(out.r2_min[w]);
            let r_max = math::sqrt(out.r2_max[w]);
            // The upper bound keeps max_cos = 1 rather than the cone's range.
            let min_cos = math::abs(math::cos(overlap.min_angle))
                .min(math::abs(math::cos(overlap.max_angle)));
            let max_cos = 1.0;
            out.r2_min[w] =
                bound.min_squared_star_radius(r_min, r_max, min_coeff, max_coeff, min_cos, max_cos);
            out.r2_max[w] =
                bound.max_squared_star_radius(r_min, r_max, min_coeff, max_coeff, min_cos, max_cos);
        }
    }
    out
}
