// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two segments.
//!
//! An absorbing segment above the origin and a reflecting segment below it.
//! Whether the reflecting segment's endpoints count as silhouettes decides
//! how far the star-shaped region may reach.
//!
//! Run:
//! - `cargo run -p robin_bvh_demos --example two_segments`

use glam::Vec2;
use robin_bvh::{
    BoundingSphere, FeatureFlags, NEUMANN_COEFF, RobinLineSegment, RobinMbvh, ScalarTree,
};

fn star_radius(mut segments: Vec<RobinLineSegment>, x: Vec2) -> (f32, usize) {
    let scalar = ScalarTree::build(&mut segments, 1);
    let bvh: RobinMbvh<Vec2, RobinLineSegment> = RobinMbvh::new(&scalar, segments)
        .expect("2-D segments with the default width are supported")
        .expect("two segments were supplied");
    println!("{}", bvh.stats());

    let mut s = BoundingSphere::unbounded(x);
    let visited = bvh.compute_squared_star_radius(&mut s, false, 1e-3);
    (s.r2, visited)
}

fn main() {
    let x = Vec2::ZERO;
    let dirichlet = RobinLineSegment::new([Vec2::new(0.5, 1.0), Vec2::new(-0.5, 1.0)], 0);
    let neumann = RobinLineSegment::new([Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)], 1)
        .with_robin_coeffs(NEUMANN_COEFF, NEUMANN_COEFF);

    // Endpoints that belong to no other face are always silhouettes.
    let (r2, visited) = star_radius(vec![dirichlet, neumann], x);
    println!("open endpoints:    r = {:.4} ({visited} nodes visited)", r2.sqrt());

    // Marked as ignored, the reflecting segment no longer limits the region.
    let closed = neumann.with_feature_flags([FeatureFlags::IGNORE_ADJACENT_FACE; 2]);
    let (r2, visited) = star_radius(vec![dirichlet, closed], x);
    println!("ignored endpoints: r = {:.4} ({visited} nodes visited)", r2.sqrt());

    // A Robin coefficient on the upper segment lets the region grow past it.
    let robin = dirichlet.with_robin_coeffs(2.0, 2.0);
    let (r2, visited) = star_radius(vec![robin, closed], x);
    println!("robin upper edge:  r = {:.4} ({visited} nodes visited)", r2.sqrt());
}
