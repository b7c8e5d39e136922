use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use bevy::math::Vec2;
use terrain_stream::chunk::lod::{DetailLevels, LodInfo};
use terrain_stream::chunk::TerrainStreamer;
use terrain_stream::generation::{height, mesh, preview, NoiseTerrainGenerator};
use terrain_stream::settings::{MeshSettings, TerrainSettings};
use terrain_stream::viewer::FlyViewer;

/// Height field for one default-sized chunk
fn bench_height_field(c: &mut Criterion) {
    let settings = TerrainSettings::default();
    let n = settings.mesh.num_verts_per_line();
    c.bench_function("height_field_default_chunk", |b| {
        b.iter(|| {
            black_box(height::generate_height_field(n, n, &settings.height_map, black_box(Vec2::new(144.0, -288.0))))
        })
    });
}

/// Mesh build for every supported LOD from the same height field
fn bench_mesh_per_lod(c: &mut Criterion) {
    let settings = TerrainSettings::default();
    let n = settings.mesh.num_verts_per_line();
    let Ok(heights) = height::generate_height_field(n, n, &settings.height_map, Vec2::ZERO) else {
        return;
    };

    for lod in 0..MeshSettings::NUM_SUPPORTED_LODS {
        c.bench_function(&format!("terrain_mesh_lod_{lod}"), |b| {
            b.iter(|| black_box(mesh::generate_terrain_mesh(&heights, &settings.mesh, black_box(lod))))
        });
    }
}

/// Synchronous preview path (height field + LOD 0 mesh)
fn bench_preview(c: &mut Criterion) {
    let mut settings = TerrainSettings::default();
    settings.mesh.chunk_size_index = 0;
    c.bench_function("preview_smallest_chunk", |b| b.iter(|| black_box(preview(&settings, 0))));
}

/// LOD selection sweep over a five entry table
fn bench_lod_selection(c: &mut Criterion) {
    let Ok(table) = DetailLevels::new(&[
        LodInfo { lod: 0, visible_dst_threshold: 100.0 },
        LodInfo { lod: 1, visible_dst_threshold: 200.0 },
        LodInfo { lod: 2, visible_dst_threshold: 300.0 },
        LodInfo { lod: 3, visible_dst_threshold: 450.0 },
        LodInfo { lod: 4, visible_dst_threshold: 600.0 },
    ]) else {
        return;
    };
    c.bench_function("lod_select_sweep", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for i in 0..1_000usize {
                let d = i as f32 * 0.65;
                acc += table.select_index(black_box(d)).map_or(0, |i| i + 1);
            }
            black_box(acc)
        })
    });
}

/// Full warm-up of the view neighbourhood: create, load, mesh, apply
fn bench_streamer_warm_up(c: &mut Criterion) {
    let mut settings = TerrainSettings::default();
    settings.mesh.chunk_size_index = 0;
    settings.detail_levels = vec![
        LodInfo { lod: 0, visible_dst_threshold: 120.0 },
        LodInfo { lod: 2, visible_dst_threshold: 240.0 },
    ];

    let mut group = c.benchmark_group("streamer");
    group.sample_size(10);
    group.bench_function("warm_up", |b| {
        b.iter(|| {
            let visible = match TerrainStreamer::new(&settings, Arc::new(NoiseTerrainGenerator)) {
                Ok(mut streamer) => {
                    streamer.tick(Vec2::ZERO);
                    streamer.finish_jobs();
                    streamer.tick(Vec2::ZERO).len()
                }
                Err(_) => 0,
            };
            black_box(visible)
        })
    });
    group.finish();
}

/// Randomized mouse deltas (deterministic LCG) through the viewer clamp
fn bench_viewer_look_random(c: &mut Criterion) {
    c.bench_function("viewer_look_random", |b| {
        b.iter(|| {
            let mut viewer = FlyViewer::default();
            let mut state: u32 = 0x1234_5678;
            for _ in 0..1_000usize {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let dx = (((state >> 16) & 0x7fff) as f32 / 32767.0) * 200.0 - 100.0;
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let dy = (((state >> 16) & 0x7fff) as f32 / 32767.0) * 200.0 - 100.0;
                viewer.apply_delta(black_box(Vec2::new(dx, dy)));
            }
            black_box((viewer.yaw, viewer.pitch));
        })
    });
}

criterion_group!(
    benches,
    bench_height_field,
    bench_mesh_per_lod,
    bench_preview,
    bench_lod_selection,
    bench_streamer_warm_up,
    bench_viewer_look_random
);
criterion_main!(benches);
