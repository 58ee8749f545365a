// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Refit and coefficient updates.
//!
//! Build a tree over a closed polygon, then move the polygon and change its
//! boundary conditions without rebuilding.
//!
//! Run:
//! - `cargo run -p robin_bvh_demos --example refit_and_update`

use std::f32::consts::TAU;

use glam::Vec2;
use robin_bvh::{
    BoundingSphere, DIRICHLET_COEFF, RobinLineSegment, RobinMbvh, ScalarTree, StarRadiusQuery,
    Vector,
};

fn polygon(n: usize) -> Vec<RobinLineSegment> {
    let p = |k: usize| {
        let t = TAU * (k % n) as f32 / n as f32;
        Vec2::new(t.cos(), t.sin())
    };
    let normal = |k: usize| Vec2::face_normal(&[p(k), p(k + 1)]);
    (0..n)
        .map(|k| {
            RobinLineSegment::new([p(k), p(k + 1)], k)
                .with_adjacent_face(0, normal(k + n - 1))
                .with_adjacent_face(1, normal(k + 1))
        })
        .collect()
}

fn report(label: &str, tree: &impl StarRadiusQuery<Vec2>, x: Vec2) {
    let mut s = BoundingSphere::unbounded(x);
    let visited = tree.compute_squared_star_radius(&mut s, false, 1e-3);
    println!("{label:<24} x = {x:?}  r = {:.4}  visited = {visited}", s.r2.sqrt());
}

fn main() {
    let mut segments = polygon(64);
    let scalar = ScalarTree::build(&mut segments, 4);
    let mut bvh: RobinMbvh<Vec2, RobinLineSegment> = RobinMbvh::create(&scalar, segments, true)
        .expect("2-D segments with the default width are supported")
        .expect("the polygon is not empty");
    println!("{}", bvh.stats());

    let x = Vec2::new(0.25, 0.0);
    report("all absorbing", &bvh, x);

    // Shift the whole polygon; only boxes and cones change.
    let offset = Vec2::new(0.5, 0.0);
    for segment in bvh.primitives_mut() {
        for p in &mut segment.positions {
            *p += offset;
        }
    }
    bvh.refit();
    println!("refit bounds: {:?}", bvh.bounding_box());
    report("after moving", &bvh, x + offset);

    // Right half reflecting, left half absorbing.
    let n = bvh.primitives().len();
    let mut min_values = vec![DIRICHLET_COEFF; n];
    let mut max_values = vec![DIRICHLET_COEFF; n];
    for (i, (lo, hi)) in min_values.iter_mut().zip(&mut max_values).enumerate() {
        if i < n / 4 || i >= 3 * n / 4 {
            *lo = 0.0;
            *hi = 0.0;
        }
    }
    bvh.update_robin_coefficients(&min_values, &max_values);
    report("right half reflecting", &bvh, x + offset);

    // A uniform Robin condition everywhere.
    let uniform = vec![0.5; n];
    bvh.update_robin_coefficients(&uniform, &uniform);
    report("robin everywhere", &bvh, x + offset);

    // An empty boundary constrains nothing.
    let empty: Option<RobinMbvh<Vec2, RobinLineSegment>> =
        RobinMbvh::new(&ScalarTree::default(), Vec::new()).expect("empty input is valid");
    report("no boundary", &empty, x);
}
