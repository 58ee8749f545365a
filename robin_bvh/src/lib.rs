// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=robin_bvh --heading-base-level=0

//! Robin BVH: a wide bounding volume hierarchy for walk-on-stars queries.
//!
//! Walk-on-stars estimators for PDEs with mixed boundary conditions repeatedly
//! ask, at some point `x`, for the largest star-shaped ball around `x` that is
//! safe to sample in closed form. The ball must stop at absorbing (Dirichlet)
//! boundaries and at silhouettes of reflecting (Neumann) boundaries, and may
//! grow past Robin boundaries by an amount that depends on the local Robin
//! coefficient.
//!
//! This crate answers that query with a `W`-wide hierarchy over line segments
//! (2-D, [`glam::Vec2`]) or triangles (3-D, [`glam::Vec3`]):
//!
//! - Every child slot stores its subtree's box, normal cone and Robin
//!   coefficient range, so whole subtrees can be bounded or skipped at once.
//! - Normal cones decide when a subtree cannot contain silhouettes.
//! - Closed-form Robin bounds ([`RadiusBound`]) are exponential in 2-D and
//!   rational in 3-D.
//! - Geometry changes are absorbed with [`RobinMbvh::refit`] and coefficient
//!   changes with [`RobinMbvh::update_robin_coefficients`], without rebuilding.
//!
//! The wide tree is collapsed from any k-ary [`ScalarTree`]; a small SAH-like
//! builder is included.
//!
//! ## Example
//!
//! ```
//! use glam::Vec2;
//! use robin_bvh::{BoundingSphere, RobinLineSegment, RobinMbvh, ScalarTree};
//!
//! // A 2 x 2 absorbing square.
//! let corners = [
//!     Vec2::new(-1.0, -1.0),
//!     Vec2::new(1.0, -1.0),
//!     Vec2::new(1.0, 1.0),
//!     Vec2::new(-1.0, 1.0),
//! ];
//! let mut segments: Vec<RobinLineSegment> = (0..4)
//!     .map(|i| RobinLineSegment::new([corners[i], corners[(i + 1) % 4]], i))
//!     .collect();
//!
//! let scalar = ScalarTree::build(&mut segments, 2);
//! let bvh: RobinMbvh<Vec2, RobinLineSegment> =
//!     RobinMbvh::new(&scalar, segments).unwrap().expect("non-empty input");
//!
//! let mut s = BoundingSphere::unbounded(Vec2::new(0.5, 0.0));
//! bvh.compute_squared_star_radius(&mut s, false, 1e-3);
//! assert!((s.r2 - 0.25).abs() < 1e-6);
//! ```
//!
//! ## Boundary conditions
//!
//! Each primitive carries a `(min, max)` Robin coefficient range.
//! [`DIRICHLET_COEFF`] (`f32::MAX`) marks absorbing boundaries and
//! [`NEUMANN_COEFF`] (zero) reflecting ones; anything in between is Robin.
//! Silhouette features are described per face with [`FeatureFlags`].
//!
//! ## Features
//!
//! - `std` (default): float math from `std`, build timing in
//!   [`RobinMbvh::create`].
//! - `libm`: float math from `libm` for `no_std` targets.
//!
//! Build, refit and coefficient updates emit `tracing` spans at debug level.
//!
//! This crate is `no_std` (without the `std` feature) and uses `alloc`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bound;
mod cone;
mod error;
mod math;
mod mbvh;
mod primitive;
mod scalar;
mod traversal;
mod types;
mod visit;
mod wide;

pub use bound::RadiusBound;
pub use cone::{BoundingCone, ConeOverlap};
pub use error::Error;
pub use mbvh::{DEFAULT_WIDTH, MbvhStats, RobinMbvh, create_vectorized_robin_bvh};
pub use primitive::{
    DIRICHLET_COEFF, FeatureFlags, NEUMANN_COEFF, RobinFace, RobinLineSegment, RobinPrimitive,
    RobinTriangle, is_dirichlet, is_neumann,
};
pub use scalar::{ScalarChildren, ScalarNode, ScalarNodeKind, ScalarTree};
pub use traversal::StarRadiusQuery;
pub use types::{BoundingBox, BoundingSphere, EPSILON, UNBOUNDED, Vector};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::f32::consts::TAU;
    use glam::{Vec2, Vec3};

    #[derive(Clone)]
    struct Rng(u64);

    impl Rng {
        fn next_u64(&mut self) -> u64 {
            // xorshift64*
            let mut x = self.0;
            x ^= x >> 12;
            x ^= x << 25;
            x ^= x >> 27;
            self.0 = x;
            x.wrapping_mul(0x2545_F491_4F6C_DD1D)
        }

        fn next_f32(&mut self) -> f32 {
            (self.next_u64() >> 40) as f32 / (1_u64 << 24) as f32
        }

        fn range(&mut self, lo: f32, hi: f32) -> f32 {
            lo + (hi - lo) * self.next_f32()
        }
    }

    fn coeffs_for(i: usize) -> (f32, f32) {
        match i % 4 {
            0 => (DIRICHLET_COEFF, DIRICHLET_COEFF),
            1 => (NEUMANN_COEFF, NEUMANN_COEFF),
            2 => (0.5, 2.0),
            _ => (5.0, 5.0),
        }
    }

    /// Closed star-shaped polygon `r = 1 + 0.3 cos(5 theta)`, counterclockwise.
    fn flower(n: usize) -> Vec<RobinLineSegment> {
        let p = |k: usize| {
            let t = TAU * (k % n) as f32 / n as f32;
            let r = 1.0 + 0.3 * (5.0 * t).cos();
            Vec2::new(r * t.cos(), r * t.sin())
        };
        let normal = |k: usize| Vec2::face_normal(&[p(k), p(k + 1)]);
        (0..n)
            .map(|k| {
                let (lo, hi) = coeffs_for(k);
                RobinLineSegment::new([p(k), p(k + 1)], k)
                    .with_adjacent_face(0, normal(k + n - 1))
                    .with_adjacent_face(1, normal(k + 1))
                    .with_robin_coeffs(lo, hi)
            })
            .collect()
    }

    /// Surface of the cube `[-1, 1]^3` split into `k x k` quads per side,
    /// outward oriented, with edge adjacency.
    fn cube(k: i32) -> Vec<RobinTriangle> {
        let lattice = |c: [i32; 3]| {
            Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32) * (2.0 / k as f32) - Vec3::ONE
        };
        let mut tris: Vec<[[i32; 3]; 3]> = Vec::new();
        for axis in 0..3 {
            let (b, c) = ((axis + 1) % 3, (axis + 2) % 3);
            for side in [0, k] {
                for i in 0..k {
                    for j in 0..k {
                        let at = |di: i32, dj: i32| {
                            let mut v = [0; 3];
                            v[axis] = side;
                            v[b] = i + di;
                            v[c] = j + dj;
                            v
                        };
                        tris.push([at(0, 0), at(1, 0), at(1, 1)]);
                        tris.push([at(0, 0), at(1, 1), at(0, 1)]);
                    }
                }
            }
        }
        for t in &mut tris {
            let p = t.map(lattice);
            let n = (p[1] - p[0]).cross(p[2] - p[0]);
            if n.dot(p[0] + p[1] + p[2]) < 0.0 {
                t.swap(1, 2);
            }
        }

        let normals: Vec<Vec3> = tris.iter().map(|t| Vec3::face_normal(&t.map(lattice))).collect();
        tris.iter()
            .enumerate()
            .map(|(i, t)| {
                let (lo, hi) = coeffs_for(i);
                let mut face = RobinTriangle::new(t.map(lattice), i).with_robin_coeffs(lo, hi);
                for e in 0..3 {
                    let (a, b) = (t[e], t[(e + 1) % 3]);
                    let neighbor = (0..tris.len())
                        .find(|&j| j != i && tris[j].contains(&a) && tris[j].contains(&b));
                    if let Some(j) = neighbor {
                        face = face.with_adjacent_face(e, normals[j]);
                    }
                }
                face
            })
            .collect()
    }

    fn brute_force<V: Vector, P: RobinPrimitive<V>>(prims: &[P], x: V, bound: RadiusBound) -> f32 {
        let mut s = BoundingSphere::unbounded(x);
        for p in prims {
            p.compute_squared_star_radius(&mut s, false, 0.0, true, bound);
        }
        s.r2
    }

    fn assert_close(tree: f32, expected: f32, context: &str) {
        let tolerance = 1e-5 * expected.abs().max(1e-3);
        assert!(
            (tree - expected).abs() <= tolerance,
            "{context}: tree {tree} vs brute force {expected}"
        );
    }

    fn build<V: Vector, P: RobinPrimitive<V>, const W: usize>(
        mut prims: Vec<P>,
        max_leaf_size: usize,
    ) -> RobinMbvh<V, P, W> {
        let scalar = ScalarTree::build(&mut prims, max_leaf_size);
        RobinMbvh::new(&scalar, prims)
            .expect("valid configuration")
            .expect("non-empty input")
    }

    /// Primitive wrapper without batch support.
    #[derive(Clone, Copy, Debug)]
    struct Unbatched(RobinLineSegment);

    impl RobinPrimitive<Vec2> for Unbatched {
        fn index(&self) -> usize {
            self.0.index
        }
        fn bounding_box(&self) -> BoundingBox<Vec2> {
            self.0.bounding_box()
        }
        fn centroid(&self) -> Vec2 {
            self.0.centroid()
        }
        fn robin_coeffs(&self) -> (f32, f32) {
            self.0.robin_coeffs()
        }
        fn set_robin_coeffs(&mut self, min_coeff: f32, max_coeff: f32) {
            self.0.set_robin_coeffs(min_coeff, max_coeff);
        }
        fn cone_normals(&self) -> impl Iterator<Item = Vec2> + '_ {
            self.0.cone_normals()
        }
        fn has_open_boundary(&self) -> bool {
            self.0.has_open_boundary()
        }
        fn compute_squared_star_radius(
            &self,
            s: &mut BoundingSphere<Vec2>,
            flip_normal_orientation: bool,
            silhouette_precision: f32,
            perform_silhouette_tests: bool,
            bound: RadiusBound,
        ) {
            self.0.compute_squared_star_radius(
                s,
                flip_normal_orientation,
                silhouette_precision,
                perform_silhouette_tests,
                bound,
            );
        }
    }

    /// Checks every slot box and coefficient range against its subtree and
    /// returns the subtree's aggregate.
    fn check_tight<V: Vector, P: RobinPrimitive<V>, const W: usize>(
        mbvh: &RobinMbvh<V, P, W>,
        index: usize,
    ) -> (BoundingBox<V>, f32, f32) {
        let node = &mbvh.nodes[index];
        if node.is_leaf() {
            let range = node.leaf_range();
            let prims = &mbvh.primitives[range.reference_offset..][..range.reference_count];
            return prims.iter().fold(
                (BoundingBox::empty(), f32::MAX, -f32::MAX),
                |(b, lo, hi), p| {
                    let (min_coeff, max_coeff) = p.robin_coeffs();
                    (b.union(&p.bounding_box()), lo.min(min_coeff), hi.max(max_coeff))
                },
            );
        }
        let mut acc = (BoundingBox::empty(), f32::MAX, -f32::MAX);
        for w in (0..W).filter(|&w| !node.is_absent(w)) {
            let (b, lo, hi) = check_tight(mbvh, node.child_index(w));
            assert_eq!(node.slot_box(w), b, "slot box of node {index} lane {w}");
            assert_eq!(node.min_robin_coeff[w], lo);
            assert_eq!(node.max_robin_coeff[w], hi);
            acc = (acc.0.union(&b), acc.1.min(lo), acc.2.max(hi));
        }
        acc
    }

    #[test]
    fn empty_input_yields_no_tree() {
        let tree: Option<RobinMbvh<Vec2, RobinLineSegment>> =
            RobinMbvh::new(&ScalarTree::default(), Vec::new()).unwrap();
        assert!(tree.is_none());

        let built = create_vectorized_robin_bvh::<Vec2, RobinLineSegment>(
            &ScalarTree::default(),
            Vec::new(),
            true,
        )
        .unwrap();
        let mut s = BoundingSphere::new(Vec2::ZERO, 2.0);
        assert_eq!(built.compute_squared_star_radius(&mut s, false, 1e-3), 0);
        assert_eq!(s.r2, 2.0, "an absent tree leaves the sphere alone");
    }

    #[test]
    fn configuration_errors() {
        let mut prims = flower(16);
        let scalar = ScalarTree::build(&mut prims, 4);
        let narrow = RobinMbvh::<Vec2, RobinLineSegment, 2>::new(&scalar, prims.clone());
        assert_eq!(narrow.unwrap_err(), Error::UnsupportedWidth(2));

        let missing = RobinMbvh::<Vec2, RobinLineSegment, 4>::new(&ScalarTree::default(), prims.clone());
        assert_eq!(missing.unwrap_err(), Error::MissingHierarchy(16));

        // A root with five leaf children does not fit four slots.
        let leaf = |offset: usize| ScalarNode {
            bounding_box: prims[offset].bounding_box(),
            cone: BoundingCone::invalid(),
            min_robin_coeff: 0.0,
            max_robin_coeff: 0.0,
            kind: ScalarNodeKind::Leaf { offset, count: 1 },
        };
        let mut nodes = vec![ScalarNode {
            bounding_box: BoundingBox::empty(),
            cone: BoundingCone::invalid(),
            min_robin_coeff: 0.0,
            max_robin_coeff: 0.0,
            kind: ScalarNodeKind::Internal {
                children: (1..=5).collect(),
            },
        }];
        nodes.extend((0..5).map(leaf));
        let wide = RobinMbvh::<Vec2, RobinLineSegment, 4>::new(
            &ScalarTree::from_nodes(nodes),
            prims[..5].to_vec(),
        );
        assert_eq!(
            wide.unwrap_err(),
            Error::TooManyChildren {
                node: 0,
                children: 5,
                width: 4
            }
        );
    }

    #[test]
    fn two_segment_scene() {
        // Dirichlet segment at distance 1 above, Neumann segment at 0.5 below.
        let dirichlet =
            RobinLineSegment::new([Vec2::new(0.5, 1.0), Vec2::new(-0.5, 1.0)], 0);
        let neumann = RobinLineSegment::new([Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)], 1)
            .with_robin_coeffs(NEUMANN_COEFF, NEUMANN_COEFF);
        let x = Vec2::ZERO;

        // Closed Neumann segment: no silhouette, only the Dirichlet distance counts.
        let closed = neumann.with_feature_flags([FeatureFlags::IGNORE_ADJACENT_FACE; 2]);
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(vec![dirichlet, closed], 1);
        let mut s = BoundingSphere::unbounded(x);
        let visited = bvh.compute_squared_star_radius(&mut s, false, 1e-3);
        assert!((s.r2 - 1.0).abs() < 1e-6, "{}", s.r2);
        assert!(visited >= 2);

        // Open Neumann endpoints are silhouettes at squared distance 0.5.
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(vec![dirichlet, neumann], 1);
        let mut s = BoundingSphere::unbounded(x);
        bvh.compute_squared_star_radius(&mut s, false, 1e-3);
        assert!(s.r2 <= 1.0);
        assert!((s.r2 - 0.5).abs() < 1e-6, "{}", s.r2);
    }

    #[test]
    fn neumann_subtree_out_of_view_is_pruned() {
        // A closed Neumann segment facing the query point, far from the
        // Dirichlet segment: its slot is culled by the cone test.
        let dirichlet = RobinLineSegment::new([Vec2::new(0.5, 1.0), Vec2::new(-0.5, 1.0)], 0);
        let neumann = RobinLineSegment::new([Vec2::new(-0.1, -2.0), Vec2::new(0.1, -2.0)], 1)
            .with_robin_coeffs(NEUMANN_COEFF, NEUMANN_COEFF)
            .with_feature_flags([FeatureFlags::IGNORE_ADJACENT_FACE; 2]);
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(vec![dirichlet, neumann], 1);
        let mut s = BoundingSphere::unbounded(Vec2::ZERO);
        let visited = bvh.compute_squared_star_radius(&mut s, false, 1e-3);
        assert!((s.r2 - 1.0).abs() < 1e-6);
        assert_eq!(visited, 2, "root plus the Dirichlet leaf");
    }

    #[test]
    fn dirichlet_only_gives_closest_distance() {
        let prims: Vec<RobinLineSegment> = flower(64)
            .into_iter()
            .map(|p| p.with_robin_coeffs(DIRICHLET_COEFF, DIRICHLET_COEFF))
            .collect();
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(prims.clone(), 4);
        let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
        for _ in 0..64 {
            let x = Vec2::new(rng.range(-1.5, 1.5), rng.range(-1.5, 1.5));
            let closest = prims
                .iter()
                .map(|p| (x - Vec2::closest_point_on_face(&p.positions, x)).length_squared())
                .fold(f32::MAX, f32::min);
            let mut s = BoundingSphere::unbounded(x);
            bvh.compute_squared_star_radius(&mut s, false, 1e-3);
            assert_eq!(s.r2, closest);
        }
    }

    #[test]
    fn radius_never_grows() {
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(flower(64), 4);
        for r2 in [1e-4, 0.01, 0.1] {
            let mut s = BoundingSphere::new(Vec2::new(0.1, 0.2), r2);
            bvh.compute_squared_star_radius(&mut s, false, 1e-3);
            assert!(s.r2 <= r2);
        }
    }

    #[test]
    fn matches_brute_force_2d() {
        let prims = flower(96);
        let wide4: RobinMbvh<Vec2, RobinLineSegment> = build(prims.clone(), 4);
        let wide8: RobinMbvh<Vec2, RobinLineSegment, 8> = build(prims.clone(), 3);
        let unbatched: RobinMbvh<Vec2, Unbatched> =
            build(prims.iter().copied().map(Unbatched).collect(), 4);
        assert!(wide4.supports_batch_queries());
        assert!(!unbatched.supports_batch_queries());

        let mut rng = Rng(0xDEAD_BEEF_CAFE_F00D);
        for i in 0..200 {
            let t = rng.range(0.0, TAU);
            let r = if i % 3 == 0 {
                rng.range(1.4, 2.5)
            } else {
                rng.range(0.0, 0.65)
            };
            let x = Vec2::new(r * t.cos(), r * t.sin());
            let expected = brute_force(&prims, x, RadiusBound::Planar);

            for (name, (r2, visited)) in [
                ("wide4", query(&wide4, x)),
                ("wide8", query(&wide8, x)),
                ("unbatched", query(&unbatched, x)),
            ] {
                assert_close(r2, expected, name);
                assert!(visited > 0, "{name} visited nothing");
            }
        }
    }

    fn query<V: Vector, T: StarRadiusQuery<V>>(tree: &T, x: V) -> (f32, usize) {
        let mut s = BoundingSphere::unbounded(x);
        let visited = tree.compute_squared_star_radius(&mut s, false, 0.0);
        (s.r2, visited)
    }

    #[test]
    fn matches_brute_force_3d() {
        let prims = cube(4);
        assert_eq!(prims.len(), 192);
        assert!(prims.iter().all(|p| !p.has_open_boundary()), "closed surface");
        let bvh: RobinMbvh<Vec3, RobinTriangle> = build(prims.clone(), 4);
        assert_eq!(bvh.radius_bound(), RadiusBound::Spatial);

        let mut rng = Rng(0x0123_4567_89AB_CDEF);
        for i in 0..150 {
            let scale = if i % 4 == 0 { 2.5 } else { 0.9 };
            let x = Vec3::new(
                rng.range(-scale, scale),
                rng.range(-scale, scale),
                rng.range(-scale, scale),
            );
            let expected = brute_force(&prims, x, RadiusBound::Spatial);
            let (r2, visited) = query(&bvh, x);
            assert_close(r2, expected, "cube");
            assert!(visited > 0);
        }
    }

    #[test]
    fn refit_tracks_moved_geometry() {
        let mut bvh: RobinMbvh<Vec2, RobinLineSegment> = build(flower(80), 4);
        bvh.refit();
        let before = bvh.nodes.clone();
        bvh.refit();
        assert_eq!(bvh.nodes, before, "refit is idempotent");

        let offset = Vec2::new(3.0, -1.5);
        for p in bvh.primitives_mut() {
            for v in &mut p.positions {
                *v = *v * 1.2 + offset;
            }
        }
        bvh.refit();
        let (root_box, _, _) = check_tight(&bvh, 0);
        assert_eq!(bvh.bounding_box(), root_box);
        assert!(bvh.bounding_box().p_min.x > 1.0);

        let prims = bvh.primitives().to_vec();
        let mut rng = Rng(42);
        for _ in 0..100 {
            let t = rng.range(0.0, TAU);
            let r = rng.range(0.0, 0.7);
            let x = offset + Vec2::new(r * t.cos(), r * t.sin());
            let expected = brute_force(&prims, x, RadiusBound::Planar);
            assert_close(query(&bvh, x).0, expected, "after refit");
        }
    }

    #[test]
    fn coefficient_updates_keep_ranges_tight() {
        let mut bvh: RobinMbvh<Vec2, RobinLineSegment> = build(flower(72), 4);
        check_tight(&bvh, 0);

        let n = bvh.primitives().len();
        let min_values: Vec<f32> = (0..n).map(|i| 0.1 * (i % 7) as f32).collect();
        let max_values: Vec<f32> = min_values.iter().map(|v| v + 1.0).collect();
        bvh.update_robin_coefficients(&min_values, &max_values);

        for p in bvh.primitives() {
            assert_eq!(p.robin_coeffs(), (min_values[p.index], max_values[p.index]));
        }
        let (_, lo, hi) = check_tight(&bvh, 0);
        assert_eq!(lo, 0.0);
        assert!((hi - 1.6).abs() < 1e-6);

        let prims = bvh.primitives().to_vec();
        let mut rng = Rng(7);
        for _ in 0..100 {
            let x = Vec2::new(rng.range(-0.6, 0.6), rng.range(-0.6, 0.6));
            let expected = brute_force(&prims, x, RadiusBound::Planar);
            assert_close(query(&bvh, x).0, expected, "after update");
        }
    }

    #[test]
    fn stats_describe_shape() {
        let bvh: RobinMbvh<Vec2, RobinLineSegment> = build(flower(40), 4);
        let stats = bvh.stats();
        assert_eq!(stats.width, 4);
        assert_eq!(stats.primitives, 40);
        assert!(stats.leaf_nodes > 0 && stats.leaf_nodes < stats.nodes);
        assert!(stats.leaf_records >= 10);
        assert!(stats.max_depth >= 1);
        let text = alloc::format!("{stats}");
        assert!(text.starts_with("4-wide BVH"));

        // A single leaf is a valid tree.
        let single: RobinMbvh<Vec2, RobinLineSegment> = build(flower(3), 8);
        assert_eq!(single.stats().nodes, 1);
        let mut s = BoundingSphere::unbounded(Vec2::ZERO);
        assert_eq!(single.compute_squared_star_radius(&mut s, false, 1e-3), 1);
        assert!(s.r2 < UNBOUNDED);
    }
}
