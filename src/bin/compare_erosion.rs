//! Debug tool for comparing erosion parameters visually
//! Erodes one synthetic terrain with several parameter sets and tiles the
//! hillshaded results into a single image.

use std::ops::ControlFlow;
use std::time::Instant;

use rayon::prelude::*;

use terrain_erosion::erosion::{ErosionBuffers, ErosionEngine, ErosionError, ErosionParams, ErosionPreset};
use terrain_erosion::export::{compose_grid, render_hillshade};
use terrain_erosion::heightmap::{self, TerrainParams};

const WIDTH: usize = 192;
const HEIGHT: usize = 192;
const SEED: u64 = 42;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating erosion comparison grid...");

    let base = heightmap::generate_terrain(WIDTH, HEIGHT, &TerrainParams::default(), SEED);

    let mut variants: Vec<(String, Option<ErosionParams>)> = vec![("No erosion".to_string(), None)];
    for &preset in ErosionPreset::all() {
        variants.push((format!("{}: {}", preset, preset.description()), Some(ErosionParams::from_preset(preset))));
    }
    for cone_threshold in [1.0, 2.5, 5.0] {
        variants.push((
            format!("Rain 4, cone {}", cone_threshold),
            Some(ErosionParams {
                iterations: 25,
                rainfall: 4.0,
                cone_threshold,
                ..Default::default()
            }),
        ));
    }
    variants.push((
        "Rain 10, 100 passes".to_string(),
        Some(ErosionParams {
            iterations: 100,
            rainfall: 10.0,
            ..Default::default()
        }),
    ));

    // Every variant owns its grid; water/sediment buffers are reused per worker.
    let results: Vec<_> = variants
        .par_iter()
        .map_init(
            || ErosionBuffers::for_heightmap(&base),
            |buffers, (name, params)| -> Result<_, ErosionError> {
                let mut hm = base.clone();
                let start = Instant::now();
                let stats = match params {
                    Some(p) => {
                        let engine = ErosionEngine::new(p.clone())?;
                        Some(engine.run_with_buffers(&mut hm, buffers, |_| ControlFlow::Continue(()))?)
                    }
                    None => None,
                };
                Ok((name.as_str(), render_hillshade(&hm), stats, start.elapsed()))
            },
        )
        .collect::<Result<_, ErosionError>>()?;

    for (idx, (name, _, stats, elapsed)) in results.iter().enumerate() {
        match stats {
            Some(stats) => println!(
                "  {}. {:<38} sediment {:>10.4}  unconverged {:>3}  {:?}",
                idx + 1,
                name,
                stats.total_sediment_moved,
                stats.unconverged_iterations,
                elapsed
            ),
            None => println!("  {}. {}", idx + 1, name),
        }
    }

    let images: Vec<_> = results.into_iter().map(|(_, img, _, _)| img).collect();
    compose_grid(&images, 3).save("erosion_comparison.png")?;
    println!("Saved erosion_comparison.png");

    Ok(())
}
