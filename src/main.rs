use std::error::Error;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use terrain_erosion::erosion::{ErosionEngine, ErosionParams, ErosionPreset};
use terrain_erosion::heightmap::{self, TerrainParams};
use terrain_erosion::{export, tilemap::Tilemap};

#[derive(Parser, Debug)]
#[command(name = "terrain_erosion")]
#[command(about = "Erode a heightmap with iterative rainfall and sediment transport")]
struct Args {
    /// Heightmap to erode: grayscale image, or 16-bit little-endian `.raw`
    /// sized by --width/--height (synthetic terrain is generated if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Width of the synthetic or raw heightmap
    #[arg(short = 'W', long, default_value = "256")]
    width: usize,

    /// Height of the synthetic or raw heightmap
    #[arg(short = 'H', long, default_value = "256")]
    height: usize,

    /// Random seed for synthetic terrain (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Elevation that white pixels / the highest synthetic peak map to
    #[arg(long, default_value = "1.0")]
    max_height: f32,

    /// Base parameter preset (gentle, normal, aggressive)
    #[arg(short, long, default_value = "normal")]
    preset: ErosionPreset,

    /// JSON parameter file, applied over the preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of erosion passes
    #[arg(long)]
    iterations: Option<usize>,

    /// Water placed on every cell per pass
    #[arg(long)]
    rainfall: Option<f32>,

    /// Sediment spreading threshold (higher = tighter deposits)
    #[arg(long)]
    cone_threshold: Option<f32>,

    /// Maximum drain sweeps per pass
    #[arg(long)]
    max_sweeps: Option<usize>,

    /// Stop after this many seconds, keeping completed passes
    #[arg(long)]
    time_limit: Option<f64>,

    /// Output heightmap (16-bit grayscale PNG)
    #[arg(short, long, default_value = "eroded.png")]
    output: PathBuf,

    /// Also write a hillshaded relief image
    #[arg(long)]
    hillshade: Option<PathBuf>,

    /// Also write an erosion/deposition difference image
    #[arg(long)]
    diff: Option<PathBuf>,

    /// Save the effective parameters as JSON
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn resolve_params(args: &Args) -> Result<ErosionParams, Box<dyn Error>> {
    let mut params = match &args.config {
        Some(path) => ErosionParams::from_json_file(path)?,
        None => ErosionParams::from_preset(args.preset),
    };
    if let Some(iterations) = args.iterations {
        params.iterations = iterations;
    }
    if let Some(rainfall) = args.rainfall {
        params.rainfall = rainfall;
    }
    if let Some(cone_threshold) = args.cone_threshold {
        params.cone_threshold = cone_threshold;
    }
    if let Some(max_sweeps) = args.max_sweeps {
        params.max_drain_sweeps = max_sweeps;
    }
    Ok(params)
}

fn load_heightmap(args: &Args) -> Result<Tilemap<f32>, Box<dyn Error>> {
    match &args.input {
        Some(path) => {
            println!("Loading heightmap from {}", path.display());
            let is_raw = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("raw"));
            if is_raw {
                Ok(heightmap::load_raw16(path, args.width, args.height, args.max_height)?)
            } else {
                Ok(heightmap::load_png(path, args.max_height)?)
            }
        }
        None => {
            let seed = args.seed.unwrap_or_else(|| rand::random());
            println!("Generating terrain with seed: {}", seed);
            let terrain = TerrainParams {
                max_height: args.max_height,
                ..Default::default()
            };
            Ok(heightmap::generate_terrain(args.width, args.height, &terrain, seed))
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let params = resolve_params(&args)?;
    let engine = ErosionEngine::new(params)?;
    let params = engine.params();

    let mut heightmap = load_heightmap(&args)?;
    println!("Map size: {}x{}", heightmap.width, heightmap.height);
    if let Some((min_h, max_h)) = heightmap.min_max() {
        println!("Height range: {:.4} to {:.4}", min_h, max_h);
    }

    println!("\nErosion parameters:");
    if args.config.is_none() {
        println!("  Preset:         {} ({})", args.preset, args.preset.description());
    }
    println!("  Iterations:     {}", params.iterations);
    println!("  Rainfall:       {}", params.rainfall);
    println!("  Cone threshold: {}", params.cone_threshold);
    println!("  Max sweeps:     {}", params.max_drain_sweeps);
    println!();

    if let Some(path) = &args.save_config {
        params.save_json_file(path)?;
        println!("Saved parameters to {}", path.display());
    }

    let original = heightmap.clone();
    let deadline = args.time_limit.map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let start = Instant::now();

    let stats = engine.run_with_progress(&mut heightmap, |progress| {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            println!("Time limit reached, stopping before pass {}", progress.iteration + 1);
            return ControlFlow::Break(());
        }
        println!(
            "[{:>3}/{:>3}] {:>5.1}%",
            progress.iteration + 1,
            progress.total,
            progress.fraction * 100.0
        );
        ControlFlow::Continue(())
    });
    let elapsed = start.elapsed();

    println!("\n=== Erosion Summary ===");
    println!("Passes completed:   {}{}", stats.iterations_completed, if stats.cancelled { " (cancelled)" } else { "" });
    println!("Elapsed:            {:?}", elapsed);
    if !stats.sweeps_per_iteration.is_empty() {
        let total: usize = stats.sweeps_per_iteration.iter().sum();
        let max = stats.sweeps_per_iteration.iter().max().copied().unwrap_or(0);
        println!(
            "Drain sweeps:       {} total, {:.1} avg, {} max",
            total,
            total as f64 / stats.sweeps_per_iteration.len() as f64,
            max
        );
    }
    println!("Unconverged passes: {}", stats.unconverged_iterations);
    println!("Sediment moved:     {:.6}", stats.total_sediment_moved);
    println!("Max cell change:    {:.6}", stats.max_height_change);

    export::export_heightmap(&heightmap, &args.output)?;
    println!("Saved {}", args.output.display());

    if let Some(path) = &args.hillshade {
        export::export_hillshade(&heightmap, path)?;
        println!("Saved {}", path.display());
    }
    if let Some(path) = &args.diff {
        export::export_difference(&original, &heightmap, path)?;
        println!("Saved {}", path.display());
    }

    Ok(())
}
