// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::f32::consts::TAU;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::{Vec2, Vec3};
use robin_bvh::{
    BoundingSphere, DIRICHLET_COEFF, NEUMANN_COEFF, RadiusBound, RobinLineSegment, RobinMbvh,
    RobinPrimitive, RobinTriangle, ScalarTree, Vector,
};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f32(&mut self) -> f32 {
        let v = self.next_u64() >> 40;
        (v as f32) / ((1u64 << 24) as f32)
    }
}

fn coeffs(k: usize) -> (f32, f32) {
    match k % 3 {
        0 => (DIRICHLET_COEFF, DIRICHLET_COEFF),
        1 => (NEUMANN_COEFF, NEUMANN_COEFF),
        _ => (1.0, 4.0),
    }
}

/// Polygon `r = 1 + 0.3 cos(5 theta)` with `n` segments and full adjacency.
fn gen_flower(n: usize) -> Vec<RobinLineSegment> {
    let p = |k: usize| {
        let t = TAU * (k % n) as f32 / n as f32;
        let r = 1.0 + 0.3 * (5.0 * t).cos();
        Vec2::new(r * t.cos(), r * t.sin())
    };
    let normal = |k: usize| Vec2::face_normal(&[p(k), p(k + 1)]);
    (0..n)
        .map(|k| {
            let (lo, hi) = coeffs(k);
            RobinLineSegment::new([p(k), p(k + 1)], k)
                .with_adjacent_face(0, normal(k + n - 1))
                .with_adjacent_face(1, normal(k + 1))
                .with_robin_coeffs(lo, hi)
        })
        .collect()
}

/// `n x n` grid of triangle pairs on the plane `z = 0`, open along the border.
fn gen_sheet(n: usize) -> Vec<RobinTriangle> {
    let at = |i: usize, j: usize| Vec3::new(i as f32 / n as f32, j as f32 / n as f32, 0.0);
    let mut out = Vec::with_capacity(2 * n * n);
    for i in 0..n {
        for j in 0..n {
            for tri in [
                [at(i, j), at(i + 1, j), at(i + 1, j + 1)],
                [at(i, j), at(i + 1, j + 1), at(i, j + 1)],
            ] {
                let (lo, hi) = coeffs(out.len());
                out.push(RobinTriangle::new(tri, out.len()).with_robin_coeffs(lo, hi));
            }
        }
    }
    out
}

fn gen_queries_2d(count: usize) -> Vec<Vec2> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let t = rng.next_f32() * TAU;
            let r = rng.next_f32() * 0.65;
            Vec2::new(r * t.cos(), r * t.sin())
        })
        .collect()
}

fn build<V: Vector, P: RobinPrimitive<V>, const W: usize>(mut prims: Vec<P>) -> RobinMbvh<V, P, W> {
    let scalar = ScalarTree::build(&mut prims, W);
    RobinMbvh::new(&scalar, prims).unwrap().unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[256usize, 1024, 4096] {
        let prims = gen_flower(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("flower_n{}", n), |b| {
            b.iter_batched(
                || prims.clone(),
                |mut prims| {
                    let scalar = ScalarTree::build(&mut prims, 4);
                    let bvh: RobinMbvh<Vec2, RobinLineSegment> =
                        RobinMbvh::new(&scalar, prims).unwrap().unwrap();
                    black_box(bvh.stats());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_query_2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_2d");
    let queries = gen_queries_2d(1024);
    group.throughput(Throughput::Elements(queries.len() as u64));
    for &n in &[256usize, 4096] {
        let prims = gen_flower(n);
        let wide4: RobinMbvh<Vec2, RobinLineSegment> = build(prims.clone());
        let wide8: RobinMbvh<Vec2, RobinLineSegment, 8> = build(prims.clone());

        group.bench_function(format!("wide4_n{}", n), |b| {
            b.iter(|| {
                let mut visited = 0;
                for &x in &queries {
                    let mut s = BoundingSphere::unbounded(x);
                    visited += wide4.compute_squared_star_radius(&mut s, false, 1e-3);
                    black_box(s.r2);
                }
                black_box(visited);
            })
        });
        group.bench_function(format!("wide8_n{}", n), |b| {
            b.iter(|| {
                for &x in &queries {
                    let mut s = BoundingSphere::unbounded(x);
                    wide8.compute_squared_star_radius(&mut s, false, 1e-3);
                    black_box(s.r2);
                }
            })
        });
        group.bench_function(format!("brute_force_n{}", n), |b| {
            b.iter(|| {
                for &x in &queries {
                    let mut s = BoundingSphere::unbounded(x);
                    for p in &prims {
                        p.compute_squared_star_radius(&mut s, false, 1e-3, true, RadiusBound::Planar);
                    }
                    black_box(s.r2);
                }
            })
        });
    }
    group.finish();
}

fn bench_query_3d(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_3d");
    let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
    let queries: Vec<Vec3> = (0..1024)
        .map(|_| Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32() - 0.5))
        .collect();
    group.throughput(Throughput::Elements(queries.len() as u64));
    let bvh: RobinMbvh<Vec3, RobinTriangle> = build(gen_sheet(48));
    group.bench_function("sheet_n48", |b| {
        b.iter(|| {
            for &x in &queries {
                let mut s = BoundingSphere::unbounded(x);
                bvh.compute_squared_star_radius(&mut s, false, 1e-3);
                black_box(s.r2);
            }
        })
    });
    group.finish();
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance");
    let mut bvh: RobinMbvh<Vec2, RobinLineSegment> = build(gen_flower(4096));
    let n = bvh.primitives().len();
    let min_values: Vec<f32> = (0..n).map(|i| (i % 5) as f32).collect();
    let max_values: Vec<f32> = min_values.iter().map(|v| v + 2.0).collect();

    group.bench_function("refit_n4096", |b| {
        b.iter(|| {
            for p in bvh.primitives_mut() {
                for v in &mut p.positions {
                    *v *= 1.0001;
                }
            }
            bvh.refit();
            black_box(bvh.bounding_box());
        })
    });
    group.bench_function("update_coefficients_n4096", |b| {
        b.iter(|| {
            bvh.update_robin_coefficients(&min_values, &max_values);
            black_box(bvh.stats());
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_query_2d,
    bench_query_3d,
    bench_maintenance,
);
criterion_main!(benches);
