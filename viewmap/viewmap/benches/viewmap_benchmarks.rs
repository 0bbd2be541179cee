//! Benchmarks for view-map builds.
//!
//! Run with: cargo bench -p viewmap
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p viewmap -- --save-baseline main
//! 2. After changes: cargo bench -p viewmap -- --baseline main

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::Point3;
use viewmap::{primitives, MeshAdapter, PerspectiveCamera, RenderSize, Viewmap, ViewmapOptions};

// =============================================================================
// Scene Generation
// =============================================================================

/// Two overlapping spheres, so every stage has work to do.
fn sphere_pair(segments: usize, rings: usize) -> Vec<MeshAdapter> {
    [("left", -0.6), ("right", 0.6)]
        .iter()
        .filter_map(|(name, x)| {
            MeshAdapter::new(primitives::uv_sphere(
                name,
                Point3::new(*x, 0.0, 0.0),
                1.0,
                segments,
                rings,
            ))
            .ok()
        })
        .collect()
}

// =============================================================================
// Build Benchmarks
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Build");
    group.sample_size(20);

    let camera = PerspectiveCamera::new(Point3::new(0.4, 1.2, 6.0), Point3::origin());
    let cases = [("sphere_pair_16x8", 16, 8), ("sphere_pair_32x16", 32, 16), ("sphere_pair_64x32", 64, 32)];

    for (name, segments, rings) in cases {
        let template = sphere_pair(segments, rings);
        let triangles: usize = template.iter().map(|m| m.faces().len()).sum();
        group.throughput(Throughput::Elements(triangles as u64));

        group.bench_with_input(BenchmarkId::new("full", name), &template, |b, template| {
            b.iter(|| {
                let mut viewmap = Viewmap::new(ViewmapOptions::default());
                let _ = pollster::block_on(viewmap.build(
                    black_box(template.clone()),
                    &camera,
                    RenderSize::default(),
                ));
                viewmap
            });
        });

        group.bench_with_input(
            BenchmarkId::new("no_visibility", name),
            &template,
            |b, template| {
                b.iter(|| {
                    let mut viewmap =
                        Viewmap::new(ViewmapOptions::default().with_ignore_visibility(true));
                    let _ = pollster::block_on(viewmap.build(
                        black_box(template.clone()),
                        &camera,
                        RenderSize::default(),
                    ));
                    viewmap
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_build);
criterion_main!(benches);
