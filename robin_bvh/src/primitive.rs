// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boundary primitives and their per-primitive star radius.

use glam::{Vec2, Vec3};

use crate::bound::RadiusBound;
use crate::math;
use crate::types::{BoundingBox, BoundingSphere, EPSILON, Vector};

/// Robin coefficient of a pure Dirichlet (absorbing) boundary.
pub const DIRICHLET_COEFF: f32 = f32::MAX;

/// Robin coefficient of a pure Neumann (reflecting) boundary.
pub const NEUMANN_COEFF: f32 = 0.0;

/// Returns true if `coeff` denotes a Dirichlet boundary.
#[inline]
pub fn is_dirichlet(coeff: f32) -> bool {
    coeff >= DIRICHLET_COEFF - EPSILON
}

/// Returns true if `coeff` denotes a Neumann boundary.
#[inline]
pub fn is_neumann(coeff: f32) -> bool {
    coeff <= EPSILON
}

bitflags::bitflags! {
    /// Adjacency of a silhouette feature (a vertex in 2-D, an edge in 3-D).
    ///
    /// A feature with an adjacent face is a silhouette when the query point
    /// sees the two faces from opposite sides. A feature without one is a
    /// silhouette unless it is ignored.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u8 {
        /// The feature is shared with another face whose normal is stored.
        const HAS_ADJACENT_FACE    = 0b0000_0001;
        /// An open feature that should never count as a silhouette.
        const IGNORE_ADJACENT_FACE = 0b0000_0010;
    }
}

/// A boundary primitive the hierarchy can be built over.
///
/// The hierarchy only needs bounds, normals for cone construction, Robin
/// coefficients, and a way to shrink a query sphere to the primitive's star
/// radius. Primitives that are [`RobinFace`]s can additionally be packed into
/// leaf records and evaluated a batch at a time.
pub trait RobinPrimitive<V: Vector> {
    /// Whether [`RobinPrimitive::face`] returns the primitive's geometry.
    const SUPPORTS_BATCH_QUERIES: bool = false;

    /// Stable external index, used to look up coefficient updates.
    fn index(&self) -> usize;

    /// Axis-aligned bounds.
    fn bounding_box(&self) -> BoundingBox<V>;

    /// Representative point used to sort primitives when building.
    fn centroid(&self) -> V;

    /// `(min, max)` Robin coefficient.
    fn robin_coeffs(&self) -> (f32, f32);

    /// Replaces the Robin coefficient range.
    fn set_robin_coeffs(&mut self, min_coeff: f32, max_coeff: f32);

    /// Every normal a silhouette test on this primitive can compare against.
    fn cone_normals(&self) -> impl Iterator<Item = V> + '_;

    /// Returns true if some feature is a silhouette from every direction.
    fn has_open_boundary(&self) -> bool;

    /// The primitive's face data, when it has one.
    fn face(&self) -> Option<&RobinFace<V>> {
        None
    }

    /// Shrinks `s.r2` to this primitive's star radius at `s.c`.
    ///
    /// With `perform_silhouette_tests` unset, silhouettes are known not to
    /// exist and are skipped.
    fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
        perform_silhouette_tests: bool,
        bound: RadiusBound,
    );
}

/// A line segment (2-D) or triangle (3-D) with Robin boundary data.
#[derive(Clone, Copy, Debug)]
pub struct RobinFace<V: Vector> {
    /// Vertex positions.
    pub positions: V::Array<V>,
    /// Per-feature normal of the adjacent face.
    pub adjacent_normals: V::Array<V>,
    /// Per-feature adjacency flags.
    pub flags: V::Array<FeatureFlags>,
    /// Smallest Robin coefficient on the face.
    pub min_robin_coeff: f32,
    /// Largest Robin coefficient on the face.
    pub max_robin_coeff: f32,
    /// External index.
    pub index: usize,
}

/// Robin boundary segment for 2-D problems.
pub type RobinLineSegment = RobinFace<Vec2>;

/// Robin boundary triangle for 3-D problems.
pub type RobinTriangle = RobinFace<Vec3>;

impl<V: Vector> RobinFace<V> {
    /// A Dirichlet face with open features and no adjacency.
    pub fn new(positions: V::Array<V>, index: usize) -> Self {
        Self {
            positions,
            adjacent_normals: V::array_from_fn(|_| V::ZERO),
            flags: V::array_from_fn(|_| FeatureFlags::empty()),
            min_robin_coeff: DIRICHLET_COEFF,
            max_robin_coeff: DIRICHLET_COEFF,
            index,
        }
    }

    /// Sets the Robin coefficient range.
    #[must_use]
    pub fn with_robin_coeffs(mut self, min_coeff: f32, max_coeff: f32) -> Self {
        self.min_robin_coeff = min_coeff;
        self.max_robin_coeff = max_coeff;
        self
    }

    /// Records the neighbor across `feature`.
    #[must_use]
    pub fn with_adjacent_face(mut self, feature: usize, normal: V) -> Self {
        self.adjacent_normals.as_mut()[feature] = normal;
        self.flags.as_mut()[feature].insert(FeatureFlags::HAS_ADJACENT_FACE);
        self
    }

    /// Replaces all feature flags.
    #[must_use]
    pub fn with_feature_flags(mut self, flags: V::Array<FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }

    /// Unit face normal.
    pub fn normal(&self) -> V {
        V::face_normal(&self.positions)
    }

    /// Axis-aligned bounds of the vertices.
    pub fn bounding_box(&self) -> BoundingBox<V> {
        BoundingBox::from_points(self.positions.as_ref().iter().copied())
    }

    /// Vertex average.
    pub fn centroid(&self) -> V {
        let mut sum = V::ZERO;
        for p in self.positions.as_ref() {
            sum += *p;
        }
        sum / V::DIM as f32
    }

    pub(crate) fn lane(&self) -> FaceLane<V> {
        FaceLane {
            positions: self.positions,
            adjacent_normals: self.adjacent_normals,
            flags: self.flags,
            max_robin_coeff: self.max_robin_coeff,
        }
    }
}

impl<V: Vector> RobinPrimitive<V> for RobinFace<V> {
    const SUPPORTS_BATCH_QUERIES: bool = true;

    fn index(&self) -> usize {
        self.index
    }

    fn bounding_box(&self) -> BoundingBox<V> {
        Self::bounding_box(self)
    }

    fn centroid(&self) -> V {
        Self::centroid(self)
    }

    fn robin_coeffs(&self) -> (f32, f32) {
        (self.min_robin_coeff, self.max_robin_coeff)
    }

    fn set_robin_coeffs(&mut self, min_coeff: f32, max_coeff: f32) {
        self.min_robin_coeff = min_coeff;
        self.max_robin_coeff = max_coeff;
    }

    fn cone_normals(&self) -> impl Iterator<Item = V> + '_ {
        let adjacent = self
            .adjacent_normals
            .as_ref()
            .iter()
            .zip(self.flags.as_ref())
            .filter(|(_, f)| f.contains(FeatureFlags::HAS_ADJACENT_FACE))
            .map(|(n, _)| *n);
        core::iter::once(self.normal()).chain(adjacent)
    }

    fn has_open_boundary(&self) -> bool {
        self.flags.as_ref().iter().any(|f| {
            !f.intersects(FeatureFlags::HAS_ADJACENT_FACE | FeatureFlags::IGNORE_ADJACENT_FACE)
        })
    }

    fn face(&self) -> Option<&Self> {
        Some(self)
    }

    fn compute_squared_star_radius(
        &self,
        s: &mut BoundingSphere<V>,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
        perform_silhouette_tests: bool,
        bound: RadiusBound,
    ) {
        s.r2 = self.lane().squared_star_radius(
            s.c,
            s.r2,
            flip_normal_orientation,
            silhouette_precision,
            perform_silhouette_tests,
            bound,
        );
    }
}

/// The slice of face data a star-radius evaluation reads.
///
/// Filled either from a [`RobinFace`] or from one lane of a leaf record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FaceLane<V: Vector> {
    pub(crate) positions: V::Array<V>,
    pub(crate) adjacent_normals: V::Array<V>,
    pub(crate) flags: V::Array<FeatureFlags>,
    pub(crate) max_robin_coeff: f32,
}

impl<V: Vector> FaceLane<V> {
    /// Squared star radius at `x`, never larger than `r2`.
    pub(crate) fn squared_star_radius(
        &self,
        x: V,
        r2: f32,
        flip_normal_orientation: bool,
        silhouette_precision: f32,
        perform_silhouette_tests: bool,
        bound: RadiusBound,
    ) -> f32 {
        let closest = V::closest_point_on_face(&self.positions, x);
        let d2_min = (x - closest).length_squared();
        if d2_min >= r2 {
            return r2;
        }
        if is_dirichlet(self.max_robin_coeff) {
            return d2_min;
        }

        let mut r2 = r2;
        let n = V::face_normal(&self.positions);
        if perform_silhouette_tests {
            let flags = self.flags.as_ref();
            let normals = self.adjacent_normals.as_ref();
            for i in 0..V::DIM {
                let view = x - V::closest_point_on_feature(&self.positions, i, x);
                let d2 = view.length_squared();
                if d2 >= r2 {
                    continue;
                }
                let silhouette = if flags[i].contains(FeatureFlags::HAS_ADJACENT_FACE) {
                    is_silhouette(
                        n,
                        normals[i],
                        view,
                        math::sqrt(d2),
                        flip_normal_orientation,
                        silhouette_precision,
                    )
                } else {
                    !flags[i].contains(FeatureFlags::IGNORE_ADJACENT_FACE)
                };
                if silhouette {
                    r2 = d2;
                }
            }
        }

        if !is_neumann(self.max_robin_coeff) {
            let positions = self.positions.as_ref();
            let r_min = math::sqrt(d2_min);
            let r_max = positions
                .iter()
                .map(|p| (x - *p).length())
                .fold(0.0, f32::max);
            let min_cos = if r_max > 0.0 {
                (math::abs(n.dot(x - positions[0])) / r_max).min(1.0)
            } else {
                1.0
            };
            r2 = r2.min(bound.min_squared_star_radius(
                r_min,
                r_max,
                self.max_robin_coeff,
                self.max_robin_coeff,
                min_cos,
                1.0,
            ));
        }
        r2
    }
}

/// Silhouette test for a feature shared by faces with normals `n0` and `n1`.
///
/// `view` points from the feature to the query point and has length `dist`.
fn is_silhouette<V: Vector>(
    n0: V,
    n1: V,
    view: V,
    dist: f32,
    flip_normal_orientation: bool,
    precision: f32,
) -> bool {
    if dist <= precision {
        // The query point sits on the feature itself.
        return false;
    }
    let view = view / dist;
    let dot0 = view.dot(n0);
    let dot1 = view.dot(n1);
    let sign = if flip_normal_orientation { 1.0 } else { -1.0 };
    if math::abs(dot0) <= precision {
        return sign * dot1 > precision;
    }
    if math::abs(dot1) <= precision {
        return sign * dot0 > precision;
    }
    dot0 * dot1 < 0.0
}
