//! End-to-end streaming of a small in-memory world export

use std::io::Cursor;
use std::sync::Arc;

use glam::Vec3;
use image::{ImageFormat, Rgba, RgbaImage};

use mapview::core::StreamingConfig;
use mapview::format::{
    MaterialAnimation, MaterialDescriptor, MeshVertex, encode_materials, encode_mesh,
};
use mapview::streaming::{
    ChunkKey, LoggingDisplay, MemoryByteSource, Observer, ViewId, WorldSession,
};

const INFO: &str = r#"{
    "home": [40.0, 70.0, -8.0],
    "views": [
        { "filename": "detail", "distance": 0 },
        { "filename": "lod", "chunkSpan": 4, "distance": 500 }
    ]
}"#;

// Views sorted farthest first
const LOD: ViewId = ViewId(0);
const DETAIL: ViewId = ViewId(1);

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn two_triangle_mesh() -> Vec<u8> {
    let vertices: Vec<MeshVertex> = (0..4)
        .map(|i| MeshVertex {
            position: [i as f32, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            ..MeshVertex::default()
        })
        .collect();
    encode_mesh(&vertices, &[0, 1, 2, 0, 2, 3], &[(3, "stone"), (3, "water")]).unwrap()
}

fn world() -> MemoryByteSource {
    let source = MemoryByteSource::new();
    source.insert("world/info.json", INFO.as_bytes().to_vec());

    let mut water = MaterialDescriptor::new("water", "water.png");
    water.transparent = true;
    water.animation = Some(MaterialAnimation {
        frame_count: 2,
        frame_time_ms: 100,
        frame_order: vec![0, 1],
    });
    let stone = MaterialDescriptor::new("stone", "stone.png");
    let materials = encode_materials(&[stone, water]).unwrap();
    source.insert("world/block.mats", materials);
    source.insert("world/stone.png", png(16, 16));

    // Detail cells (0..=1, 0..=1) except (1, 1); one lod cell
    for (x, z) in [(0, 0), (1, 0), (0, 1)] {
        source.insert(format!("world/r.0.0/detail.{}.{}.m", x, z), two_triangle_mesh());
    }
    source.insert("world/r.0.0/lod.0.0.m", two_triangle_mesh());
    source
}

fn config() -> StreamingConfig {
    StreamingConfig {
        load_distance: 2,
        unload_distance: 4,
        ..StreamingConfig::default()
    }
}

async fn open(source: MemoryByteSource) -> WorldSession<LoggingDisplay, Vec<String>> {
    WorldSession::open("world", config(), Arc::new(source), LoggingDisplay::new(), Vec::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_open_reads_manifest_and_materials() {
    let session = open(world()).await;
    assert_eq!(session.views().len(), 2);
    assert_eq!(session.home(), Some(Vec3::new(40.0, 70.0, -8.0)));
    assert_eq!(session.materials().descriptor_count(), 2);
    // Materials are realized lazily
    assert!(session.materials().is_empty());
    assert!(session.errors().is_empty());
}

#[tokio::test]
async fn test_open_without_manifest_fails() {
    let result = WorldSession::open(
        "missing",
        config(),
        Arc::new(world()),
        LoggingDisplay::new(),
        Vec::<String>::new(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_material_file_is_reported() {
    let source = world();
    source.remove("world/block.mats");
    let session = open(source).await;
    assert_eq!(session.materials().descriptor_count(), 0);
    assert_eq!(session.errors().len(), 1);
}

#[tokio::test]
async fn test_stream_and_display_detail_view() {
    let mut session = open(world()).await;
    let observer = Observer::new(10.0, Vec3::new(5.0, 0.0, 5.0));

    let report = session.stream_tick(observer);
    assert_eq!(report.view, Some(DETAIL));
    assert_eq!(report.requested, 4);
    assert_eq!(session.stats().loading, 4);

    session.settle().await;

    let stats = session.stats();
    assert_eq!(stats.active_view, Some(DETAIL));
    assert_eq!(stats.loaded, 3);
    assert_eq!(stats.loading, 0);
    assert_eq!(stats.fetches_in_flight, 0);
    assert_eq!(session.display().displayed(), 3);
    assert_eq!(session.display().triangles(), 6);

    // Shared materials realized once across chunks
    assert_eq!(stats.materials, 2);
    assert_eq!(stats.animated_materials, 1);
    let stone = session.materials().find("stone").unwrap();
    assert_eq!(stone.texture_url, "world/stone.png");
    assert_eq!(stone.texture.image().map(|i| i.width), Some(16));
    let water = session.materials().find("water").unwrap();
    assert!(!water.depth_write);
    assert!(!water.texture.is_ready());

    // Missing chunk and missing water texture
    assert_eq!(session.errors().len(), 2);
    assert!(!session.registry().contains(ChunkKey::new(DETAIL, 1, 1)));
}

#[tokio::test]
async fn test_failed_chunk_is_retried() {
    let mut session = open(world()).await;
    let observer = Observer::new(10.0, Vec3::ZERO);

    session.stream_tick(observer);
    session.settle().await;
    assert_eq!(session.stats().loaded, 3);

    let report = session.stream_tick(observer);
    assert_eq!(report.requested, 1);
    assert!(session.registry().contains(ChunkKey::new(DETAIL, 1, 1)));
}

#[tokio::test]
async fn test_view_switch_discards_in_flight_loads() {
    let mut session = open(world()).await;

    // Nothing is awaited between the two ticks, so no detail load completes
    session.stream_tick(Observer::new(10.0, Vec3::ZERO));
    let report = session.stream_tick(Observer::new(1000.0, Vec3::ZERO));
    assert_eq!(report.view, Some(LOD));
    assert_eq!(report.evicted, 4);
    assert_eq!(session.stats().orphaned, 4);

    session.settle().await;

    let stats = session.stats();
    assert_eq!(stats.orphaned, 0);
    assert_eq!(stats.loaded, 1);
    assert_eq!(session.display().displayed(), 1);
    assert!(session.display().keys().all(|k| k.view == LOD));
}

#[tokio::test]
async fn test_no_view_below_every_threshold() {
    let mut session = open(world()).await;
    let report = session.stream_tick(Observer::new(0.0, Vec3::ZERO));
    assert_eq!(report.view, None);
    assert_eq!(report.requested, 0);
    assert_eq!(session.stats().active_view, None);
}

#[tokio::test]
async fn test_animation_tick_advances_water() {
    let mut session = open(world()).await;
    session.stream_tick(Observer::new(10.0, Vec3::ZERO));
    session.settle().await;

    assert_eq!(session.animation_tick(), 1);
    let water = session.materials().find("water").unwrap();
    let state = water.animation.as_ref().unwrap();
    assert_eq!(state.current_strip_frame(), 1);
    assert_eq!(state.texture_offset_y(), -0.5);
}

#[tokio::test]
async fn test_close_removes_displayed_chunks() {
    let mut session = open(world()).await;
    session.stream_tick(Observer::new(10.0, Vec3::ZERO));
    session.settle().await;

    let (display, errors) = session.close();
    assert_eq!(display.displayed(), 0);
    assert_eq!(errors.len(), 2);
}
