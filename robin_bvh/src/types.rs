// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core geometric types: the [`Vector`] abstraction, boxes and query spheres.

use core::fmt::Debug;
use core::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub};

use glam::{Vec2, Vec3};

use crate::math;

/// Tolerance used for coefficient classification and degenerate geometry.
pub const EPSILON: f32 = f32::EPSILON;

/// Sentinel for "no finite bound": used for unbounded radii and empty extents.
pub const UNBOUNDED: f32 = f32::MAX;

/// A point or direction in the 2-D or 3-D space the hierarchy lives in.
///
/// Implemented for [`glam::Vec2`] (line-segment boundaries) and [`glam::Vec3`]
/// (triangle boundaries). Besides arithmetic it carries the few pieces of
/// dimension-specific face geometry the hierarchy needs; a face has exactly
/// `DIM` vertices and `DIM` silhouette features (vertices in 2-D, edges in 3-D).
pub trait Vector:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + Mul<f32, Output = Self>
    + Div<f32, Output = Self>
    + Neg<Output = Self>
    + Index<usize, Output = f32>
    + IndexMut<usize>
{
    /// Number of coordinates.
    const DIM: usize;
    /// The zero vector.
    const ZERO: Self;

    /// Fixed-size array with one entry per coordinate (and per face vertex / feature).
    type Array<T: Copy + Debug>: Copy + Debug + AsRef<[T]> + AsMut<[T]>;

    /// Builds an [`Vector::Array`] from a function of the entry index.
    fn array_from_fn<T: Copy + Debug>(f: impl FnMut(usize) -> T) -> Self::Array<T>;

    /// Vector with all coordinates set to `v`.
    fn splat(v: f32) -> Self;

    /// Dot product.
    fn dot(self, rhs: Self) -> f32;

    /// Component-wise minimum.
    fn min(self, rhs: Self) -> Self;

    /// Component-wise maximum.
    fn max(self, rhs: Self) -> Self;

    /// Unit normal of the face spanned by `vertices`.
    fn face_normal(vertices: &Self::Array<Self>) -> Self;

    /// Closest point to `x` on the face spanned by `vertices`.
    fn closest_point_on_face(vertices: &Self::Array<Self>, x: Self) -> Self;

    /// Closest point to `x` on silhouette feature `feature` of the face.
    ///
    /// In 2-D feature `i` is vertex `i`; in 3-D it is the edge from vertex `i`
    /// to vertex `i + 1`.
    fn closest_point_on_feature(vertices: &Self::Array<Self>, feature: usize, x: Self) -> Self;

    /// Surface measure of a box with the given extent, up to a constant factor.
    fn half_surface_area(extent: Self) -> f32;

    /// Squared Euclidean length.
    #[inline]
    fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Euclidean length.
    #[inline]
    fn length(self) -> f32 {
        math::sqrt(self.length_squared())
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    #[inline]
    fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len > EPSILON { self / len } else { Self::ZERO }
    }
}

fn closest_point_on_segment<V: Vector>(a: V, b: V, x: V) -> V {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= 0.0 {
        return a;
    }
    let t = ((x - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

impl Vector for Vec2 {
    const DIM: usize = 2;
    const ZERO: Self = Self::ZERO;

    type Array<T: Copy + Debug> = [T; 2];

    #[inline]
    fn array_from_fn<T: Copy + Debug>(f: impl FnMut(usize) -> T) -> [T; 2] {
        core::array::from_fn(f)
    }
    #[inline]
    fn splat(v: f32) -> Self {
        Self::splat(v)
    }
    #[inline]
    fn dot(self, rhs: Self) -> f32 {
        Self::dot(self, rhs)
    }
    #[inline]
    fn min(self, rhs: Self) -> Self {
        Self::min(self, rhs)
    }
    #[inline]
    fn max(self, rhs: Self) -> Self {
        Self::max(self, rhs)
    }

    fn face_normal(vertices: &[Self; 2]) -> Self {
        let s = vertices[1] - vertices[0];
        Vector::normalize_or_zero(Self::new(s.y, -s.x))
    }

    fn closest_point_on_face(vertices: &[Self; 2], x: Self) -> Self {
        closest_point_on_segment(vertices[0], vertices[1], x)
    }

    fn closest_point_on_feature(vertices: &[Self; 2], feature: usize, _x: Self) -> Self {
        vertices[feature]
    }

    #[inline]
    fn half_surface_area(extent: Self) -> f32 {
        extent.x + extent.y
    }
}

impl Vector for Vec3 {
    const DIM: usize = 3;
    const ZERO: Self = Self::ZERO;

    type Array<T: Copy + Debug> = [T; 3];

    #[inline]
    fn array_from_fn<T: Copy + Debug>(f: impl FnMut(usize) -> T) -> [T; 3] {
        core::array::from_fn(f)
    }
    #[inline]
    fn splat(v: f32) -> Self {
        Self::splat(v)
    }
    #[inline]
    fn dot(self, rhs: Self) -> f32 {
        Self::dot(self, rhs)
    }
    #[inline]
    fn min(self, rhs: Self) -> Self {
        Self::min(self, rhs)
    }
    #[inline]
    fn max(self, rhs: Self) -> Self {
        Self::max(self, rhs)
    }

    fn face_normal(vertices: &[Self; 3]) -> Self {
        let n = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]);
        Vector::normalize_or_zero(n)
    }

    /// Region-based closest point on a triangle (Voronoi regions of vertices,
    /// edges and the interior).
    fn closest_point_on_face(vertices: &[Self; 3], x: Self) -> Self {
        let [a, b, c] = *vertices;
        let ab = b - a;
        let ac = c - a;
        let ap = x - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = x - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            return a + ab * (d1 / (d1 - d3));
        }

        let cp = x - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            return a + ac * (d2 / (d2 - d6));
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 {
            return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
        }

        let denom = va + vb + vc;
        if denom <= 0.0 {
            // Degenerate triangle: fall back to its edges.
            return closest_point_on_segment(a, b, x);
        }
        a + ab * (vb / denom) + ac * (vc / denom)
    }

    fn closest_point_on_feature(vertices: &[Self; 3], feature: usize, x: Self) -> Self {
        closest_point_on_segment(vertices[feature], vertices[(feature + 1) % 3], x)
    }

    #[inline]
    fn half_surface_area(extent: Self) -> f32 {
        extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
    }
}

/// Axis-aligned bounding box.
///
/// The empty box has `p_min = +MAX` and `p_max = -MAX` so that expanding it by
/// anything yields that thing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox<V> {
    /// Minimum corner.
    pub p_min: V,
    /// Maximum corner.
    pub p_max: V,
}

impl<V: Vector> Default for BoundingBox<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: Vector> BoundingBox<V> {
    /// Create a box from its corners.
    pub const fn new(p_min: V, p_max: V) -> Self {
        Self { p_min, p_max }
    }

    /// The empty box.
    pub fn empty() -> Self {
        Self::new(V::splat(UNBOUNDED), V::splat(-UNBOUNDED))
    }

    /// A degenerate box containing exactly `p`.
    pub fn from_point(p: V) -> Self {
        Self::new(p, p)
    }

    /// Smallest box containing all `points`.
    pub fn from_points(points: impl IntoIterator<Item = V>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.expand_to_include_point(p);
        }
        b
    }

    /// Returns true if the box contains no point.
    pub fn is_empty(&self) -> bool {
        (0..V::DIM).any(|i| self.p_max[i] < self.p_min[i])
    }

    /// Grow the box to contain `p`.
    pub fn expand_to_include_point(&mut self, p: V) {
        self.p_min = self.p_min.min(p);
        self.p_max = self.p_max.max(p);
    }

    /// Grow the box to contain `other`.
    pub fn expand_to_include(&mut self, other: &Self) {
        self.p_min = self.p_min.min(other.p_min);
        self.p_max = self.p_max.max(other.p_max);
    }

    /// Union of two boxes.
    pub fn union(mut self, other: &Self) -> Self {
        self.expand_to_include(other);
        self
    }

    /// Returns true if `other` lies inside this box (boundaries included).
    pub fn contains(&self, other: &Self) -> bool {
        (0..V::DIM).all(|i| self.p_min[i] <= other.p_min[i] && other.p_max[i] <= self.p_max[i])
    }

    /// Box center.
    pub fn centroid(&self) -> V {
        (self.p_min + self.p_max) * 0.5
    }

    /// Box extent (`p_max - p_min`), zero for the empty box.
    pub fn extent(&self) -> V {
        if self.is_empty() {
            V::ZERO
        } else {
            self.p_max - self.p_min
        }
    }

    /// Surface measure used by split heuristics.
    pub fn half_surface_area(&self) -> f32 {
        V::half_surface_area(self.extent())
    }

    /// Minimum and maximum squared distance from `x` to the box.
    ///
    /// The minimum is zero when `x` lies inside; the maximum is the squared
    /// distance to the farthest corner.
    pub fn squared_distance_bounds(&self, x: V) -> (f32, f32) {
        let u = self.p_min - x;
        let v = x - self.p_max;
        let d_min = u.max(v).max(V::ZERO);
        let d_max = u.min(v);
        (d_min.length_squared(), d_max.length_squared())
    }
}

/// A query sphere: center `c` and squared radius `r2`.
///
/// Traversals only ever shrink `r2`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingSphere<V> {
    /// Center.
    pub c: V,
    /// Squared radius.
    pub r2: f32,
}

impl<V: Vector> BoundingSphere<V> {
    /// Create a sphere from its center and squared radius.
    pub const fn new(c: V, r2: f32) -> Self {
        Self { c, r2 }
    }

    /// A sphere with unbounded radius centered at `c`.
    pub const fn unbounded(c: V) -> Self {
        Self::new(c, UNBOUNDED)
    }
}
