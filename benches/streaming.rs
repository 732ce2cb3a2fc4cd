use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::IVec2;

use mapview::core::StreamingConfig;
use mapview::format::{MeshVertex, decode_mesh, encode_mesh};
use mapview::material::MaterialId;
use mapview::streaming::{
    ChunkFetcher, ChunkRegistry, ChunkStreamer, ChunkTicket, LoggingDisplay, Spiral, View, ViewId,
    ViewSet, load_spiral,
};

struct NullFetcher;

impl ChunkFetcher for NullFetcher {
    fn request(&mut self, ticket: ChunkTicket, path: String) {
        black_box((ticket, path));
    }
}

fn grid_mesh(size: u32) -> (Vec<MeshVertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for z in 0..=size {
        for x in 0..=size {
            vertices.push(MeshVertex {
                position: [x as f32, 0.0, z as f32],
                uv: [x as f32 / size as f32, z as f32 / size as f32],
                normal: [0.0, 1.0, 0.0],
                color: [1.0, 1.0, 1.0],
            });
        }
    }
    let row = size + 1;
    for z in 0..size {
        for x in 0..size {
            let i = z * row + x;
            indices.extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
        }
    }
    (vertices, indices)
}

fn bench_spiral_walk(c: &mut Criterion) {
    c.bench_function("spiral_walk_d14", |b| {
        b.iter(|| Spiral::new(black_box(14)).count());
    });
}

fn bench_load_spiral_capped(c: &mut Criterion) {
    c.bench_function("load_spiral_cap8_half_loaded", |b| {
        b.iter(|| load_spiral(black_box(14), 8, |dx, dz| (dx + dz) % 2 != 0));
    });
}

fn bench_stream_tick_full_square(c: &mut Criterion) {
    let views = ViewSet::new(vec![View::new("chunk", 1, 0.0).unwrap()]).unwrap();
    let streamer = ChunkStreamer::new(&StreamingConfig {
        max_loads_per_tick: 1000,
        ..StreamingConfig::default()
    });

    c.bench_function("stream_tick_fill_196", |b| {
        b.iter(|| {
            let mut registry = ChunkRegistry::new(views.clone(), 16.0);
            let mut display = LoggingDisplay::new();
            let observer = black_box(IVec2::new(3, -7));
            streamer.stream_tick(&mut registry, ViewId(0), observer, &mut NullFetcher, &mut display)
        });
    });
}

fn bench_mesh_decode(c: &mut Criterion) {
    let (vertices, indices) = grid_mesh(32);
    let half = (indices.len() / 2) as u32;
    let groups = [(half, "grass_block"), (half, "stone")];
    let encoded = encode_mesh(&vertices, &indices, &groups).unwrap();

    c.bench_function("mesh_decode_32x32_grid", |b| {
        b.iter(|| {
            let mut next = 0;
            let mut resolver = |_: &str| {
                next += 1;
                MaterialId(next)
            };
            decode_mesh(black_box(&encoded), &mut resolver)
        });
    });
}

criterion_group!(
    benches,
    bench_spiral_walk,
    bench_load_spiral_capped,
    bench_stream_tick_full_square,
    bench_mesh_decode,
);
criterion_main!(benches);
