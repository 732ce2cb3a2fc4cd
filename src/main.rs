//! Headless streaming driver: opens a world export and streams it around a
//! fixed observer, logging what would be displayed.
//!
//! Usage: cargo run --release -- --world <DIR> [OPTIONS]
//!
//! Options:
//!   --config <FILE>     Streaming config JSON (default: built-in)
//!   --reduced           Use the low-power load/unload distances
//!   --target <X,Z>      Observer target in world units (default: manifest home)
//!   --distance <D>      Observer distance, selects the view (default: 50)
//!   --ticks <N>         Streaming ticks to run (default: 50)

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;

use mapview::core::{Result, StreamingConfig, logging};
use mapview::streaming::{FsByteSource, LogErrorSink, LoggingDisplay, Observer, WorldSession};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(world) = parse_str_arg(&args, "--world") else {
        eprintln!(
            "Usage: mapview --world <DIR> [--config <FILE>] [--reduced] \
             [--target X,Z] [--distance D] [--ticks N]"
        );
        std::process::exit(2);
    };

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => match StreamingConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        },
        None if args.iter().any(|a| a == "--reduced") => StreamingConfig::reduced(),
        None => StreamingConfig::default(),
    };
    let target = parse_str_arg(&args, "--target").and_then(|s| parse_xz(&s));
    let distance = parse_f64_arg(&args, "--distance").unwrap_or(50.0);
    let ticks = parse_u32_arg(&args, "--ticks").unwrap_or(50);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(world, config, target, distance, ticks)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(
    world: String,
    config: StreamingConfig,
    target: Option<Vec3>,
    distance: f64,
    ticks: u32,
) -> Result<()> {
    let source = Arc::new(FsByteSource::new(&world));
    let mut session: WorldSession =
        WorldSession::open("", config, source, LoggingDisplay::new(), LogErrorSink).await?;

    let target = target.or_else(|| session.home()).unwrap_or(Vec3::ZERO);
    let observer = Observer::new(distance, target);
    log::info!("Observer at {} (distance {})", target, distance);

    let mut stream = tokio::time::interval(session.config().stream_interval());
    let mut animate = tokio::time::interval(session.config().animation_interval());
    let mut done = 0;

    while done < ticks {
        tokio::select! {
            _ = stream.tick() => {
                let report = session.stream_tick(observer);
                if report.requested > 0 || report.evicted > 0 {
                    log::info!(
                        "Tick {}: requested {}, evicted {}",
                        done, report.requested, report.evicted
                    );
                }
                done += 1;
            }
            _ = animate.tick() => {
                session.animation_tick();
            }
        }
    }

    session.settle().await;
    let stats = session.stats();
    let (display, _) = session.close();

    println!("World: {}", world);
    println!("  Loaded chunks:  {}", stats.loaded);
    println!("  Orphaned:       {}", stats.orphaned);
    println!("  Materials:      {} ({} animated)", stats.materials, stats.animated_materials);
    println!("  Triangles:      {}", display.triangles());
    Ok(())
}

fn parse_xz(s: &str) -> Option<Vec3> {
    let (x, z) = s.split_once(',')?;
    Some(Vec3::new(x.trim().parse().ok()?, 0.0, z.trim().parse().ok()?))
}

fn parse_f64_arg(args: &[String], flag: &str) -> Option<f64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
