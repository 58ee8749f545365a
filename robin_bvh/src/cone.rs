// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Normal cones used to rule out silhouettes.
//!
//! A [`BoundingCone`] bounds the directions of every face normal in a subtree
//! (including the normals of adjacent faces that silhouette tests compare
//! against). If, seen from a query point, no view direction into the subtree is
//! perpendicular to any normal in the cone, no feature in the subtree can be a
//! silhouette.

use core::f32::consts::{FRAC_PI_2, PI};

use crate::math;
use crate::primitive::RobinPrimitive;
use crate::types::{BoundingBox, EPSILON, Vector};

/// Cone of normal directions around `axis` with the given `half_angle`.
///
/// `radius` bounds the distance from the cone's origin (the centroid of the
/// bounding box it is stored with) to any point of the geometry it covers.
/// A negative half-angle marks an invalid (empty) cone.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingCone<V> {
    /// Central normal direction (unit length, or zero for a full cone).
    pub axis: V,
    /// Half-angle in radians; `PI` covers every direction.
    pub half_angle: f32,
    /// Distance bound from the cone origin to the covered geometry.
    pub radius: f32,
}

/// Result of [`BoundingCone::overlap`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConeOverlap {
    /// Whether some view direction may be perpendicular to some normal.
    pub overlaps: bool,
    /// Smallest angle between a view direction and a normal.
    pub min_angle: f32,
    /// Largest angle between a view direction and a normal.
    pub max_angle: f32,
}

impl<V: Vector> Default for BoundingCone<V> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<V: Vector> BoundingCone<V> {
    /// Create a cone.
    pub const fn new(axis: V, half_angle: f32, radius: f32) -> Self {
        Self {
            axis,
            half_angle,
            radius,
        }
    }

    /// The empty cone; merging with it is the identity.
    pub const fn invalid() -> Self {
        Self::new(V::ZERO, -PI, 0.0)
    }

    /// Returns true unless this is the empty cone.
    pub fn is_valid(&self) -> bool {
        self.half_angle >= 0.0
    }

    /// Cone covering the normals of `primitives`, centered on `centroid`.
    ///
    /// The cone is the full sphere of directions when any primitive has an
    /// open boundary feature (such a feature is always a silhouette) or when
    /// the normals cancel out.
    pub fn for_primitives<P: RobinPrimitive<V>>(primitives: &[P], centroid: V) -> Self {
        if primitives.is_empty() {
            return Self::invalid();
        }

        let mut axis_sum = V::ZERO;
        let mut open = false;
        let mut radius: f32 = 0.0;
        for p in primitives {
            let (_, far) = p.bounding_box().squared_distance_bounds(centroid);
            radius = radius.max(math::sqrt(far));
            open |= p.has_open_boundary();
            for n in p.cone_normals() {
                axis_sum += n;
            }
        }

        let axis = axis_sum.normalize_or_zero();
        if open || axis == V::ZERO {
            return Self::new(axis, PI, radius);
        }

        let mut half_angle: f32 = 0.0;
        for p in primitives {
            for n in p.cone_normals() {
                half_angle = half_angle.max(math::acos_clamped(axis.dot(n)));
            }
        }
        Self::new(axis, half_angle, radius)
    }

    /// Same cone re-anchored from `origin` to `new_origin`.
    fn reanchored(&self, origin: V, new_origin: V) -> Self {
        Self::new(
            self.axis,
            self.half_angle,
            self.radius + (new_origin - origin).length(),
        )
    }

    /// Smallest cone (of this family) containing `a` and `b`.
    ///
    /// `origin_a` and `origin_b` are the centroids the input cones are anchored
    /// at; the result is anchored at `new_origin`.
    pub fn merge(a: &Self, b: &Self, origin_a: V, origin_b: V, new_origin: V) -> Self {
        match (a.is_valid(), b.is_valid()) {
            (false, false) => return Self::invalid(),
            (true, false) => return a.reanchored(origin_a, new_origin),
            (false, true) => return b.reanchored(origin_b, new_origin),
            (true, true) => {}
        }

        let radius = (a.radius + (new_origin - origin_a).length())
            .max(b.radius + (new_origin - origin_b).length());
        let (wide, narrow) = if a.half_angle >= b.half_angle {
            (a, b)
        } else {
            (b, a)
        };

        let theta = math::acos_clamped(wide.axis.dot(narrow.axis));
        if (theta + narrow.half_angle).min(PI) <= wide.half_angle {
            return Self::new(wide.axis, wide.half_angle, radius);
        }

        let spread = 0.5 * (wide.half_angle + theta + narrow.half_angle);
        if spread >= PI {
            return Self::new(wide.axis, PI, radius);
        }
        match rotate_towards(wide.axis, narrow.axis, spread - wide.half_angle) {
            Some(axis) => Self::new(axis, spread, radius),
            // Opposite axes: no unique rotation plane.
            None => Self::new(wide.axis, PI, radius),
        }
    }

    /// Tests whether, seen from `x`, a view direction into `bbox` may be
    /// perpendicular to a normal in this cone.
    ///
    /// `d2_min` is the squared distance from `x` to `bbox`. When the test
    /// succeeds the angle range is left at `[0, PI / 2]`.
    pub fn overlap(&self, x: V, bbox: &BoundingBox<V>, d2_min: f32) -> ConeOverlap {
        let mut out = ConeOverlap {
            overlaps: true,
            min_angle: 0.0,
            max_angle: FRAC_PI_2,
        };
        if self.half_angle >= FRAC_PI_2 || d2_min < EPSILON {
            return out;
        }

        let view_axis = bbox.centroid() - x;
        let l = view_axis.length();
        if l <= self.radius {
            return out;
        }
        let phi = math::acos_clamped(self.axis.dot(view_axis) / l);
        if math::in_range(FRAC_PI_2, phi - self.half_angle, phi + self.half_angle) {
            return out;
        }

        let beta = math::asin_clamped(self.radius / l);
        let spread = self.half_angle + beta;
        let min_angle = phi - spread;
        let max_angle = phi + spread;
        out.overlaps = spread >= FRAC_PI_2 || math::in_range(FRAC_PI_2, min_angle, max_angle);
        if !out.overlaps {
            out.min_angle = min_angle;
            out.max_angle = max_angle;
        }
        out
    }
}

/// Rotates unit vector `u` by `angle` in the plane spanned by `u` and `v`.
fn rotate_towards<V: Vector>(u: V, v: V, angle: f32) -> Option<V> {
    let w = v - u * u.dot(v);
    let len = w.length();
    if len <= EPSILON {
        return None;
    }
    let w = w / len;
    Some((u * math::cos(angle) + w * math::sin(angle)).normalize_or_zero())
}
