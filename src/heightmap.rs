use std::path::Path;

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::tilemap::{GridSizeError, Tilemap};

#[derive(Error, Debug)]
pub enum HeightmapError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Heightmap image {path} is empty")]
    Empty { path: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Raw heightmap has an odd byte count ({0})")]
    OddLength(usize),
    #[error(transparent)]
    GridSize(#[from] GridSizeError),
}

// =============================================================================
// TERRAIN PARAMETERS
// =============================================================================

/// Parameters for synthetic terrain generation
#[derive(Clone, Debug)]
pub struct TerrainParams {
    /// Noise features across the whole map (lower = larger features)
    pub base_frequency: f64,
    /// Number of noise octaves
    pub octaves: u32,
    /// Amplitude decay per octave (0.0-1.0)
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    /// Domain warping strength
    pub warp_strength: f64,
    /// Ridge noise power (higher = sharper ridges)
    pub ridge_power: f64,
    /// Share of the height taken by ridged noise (0.0-1.0)
    pub ridge_weight: f64,
    /// Output heights span `0.0..=max_height`
    pub max_height: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            base_frequency: 4.0,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            warp_strength: 0.15,
            ridge_power: 2.0,
            ridge_weight: 0.35,
            max_height: 1.0,
        }
    }
}

// =============================================================================
// SYNTHETIC TERRAIN
// =============================================================================

/// Generate seeded terrain from warped fBm blended with ridged noise.
/// The same seed always yields the same grid.
pub fn generate_terrain(width: usize, height: usize, params: &TerrainParams, seed: u64) -> Tilemap<f32> {
    // Each noise layer gets its own sub-seed drawn from the map seed.
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let terrain_noise = Perlin::new(rng.gen());
    let warp_noise = Perlin::new(rng.gen());
    let ridge_noise = Perlin::new(rng.gen());

    let raw = Tilemap::from_fn(width, height, |x, y| {
        let nx = x as f64 / width.max(1) as f64;
        let ny = y as f64 / height.max(1) as f64;
        let (wx, wy) = apply_domain_warp(nx, ny, &warp_noise, params.warp_strength);

        let base = fbm(
            &terrain_noise,
            wx * params.base_frequency,
            wy * params.base_frequency,
            params.octaves,
            params.persistence,
            params.lacunarity,
        );
        let ridges = ridged(&ridge_noise, wx * params.base_frequency, wy * params.base_frequency, params.ridge_power);

        ((base * 0.5 + 0.5) * (1.0 - params.ridge_weight) + ridges * params.ridge_weight) as f32
    });

    normalize(&raw, params.max_height)
}

/// A slope falling by `drop_per_row` with every row (`y`). Negative drops rise.
pub fn ramp(width: usize, height: usize, drop_per_row: f32) -> Tilemap<f32> {
    Tilemap::from_fn(width, height, |_, y| -(y as f32) * drop_per_row)
}

/// Flat ground at zero with the centre cell sunk by `depth`.
pub fn pit(width: usize, height: usize, depth: f32) -> Tilemap<f32> {
    let (cx, cy) = (width / 2, height / 2);
    Tilemap::from_fn(width, height, |x, y| if (x, y) == (cx, cy) { -depth } else { 0.0 })
}

/// Rescale `heightmap` to span `0.0..=max_height`. Flat maps come back as zeros.
pub fn normalize(heightmap: &Tilemap<f32>, max_height: f32) -> Tilemap<f32> {
    let Some((min_h, max_h)) = heightmap.min_max() else {
        return heightmap.clone();
    };
    let range = max_h - min_h;
    Tilemap::from_fn(heightmap.width, heightmap.height, |x, y| {
        if range > 0.0 {
            (*heightmap.get(x, y) - min_h) / range * max_height
        } else {
            0.0
        }
    })
}

/// Load a grayscale image (8 or 16 bit) as heights in `0.0..=max_height`.
pub fn load_png(path: &Path, max_height: f32) -> Result<Tilemap<f32>, HeightmapError> {
    let img = image::open(path)?.into_luma16();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(HeightmapError::Empty { path: path.display().to_string() });
    }

    Ok(Tilemap::from_fn(width as usize, height as usize, |x, y| {
        img.get_pixel(x as u32, y as u32).0[0] as f32 / u16::MAX as f32 * max_height
    }))
}

/// Load headerless little-endian 16-bit samples (the usual `.raw` terrain
/// export) as a `width` x `height` grid in `0.0..=max_height`.
pub fn load_raw16(path: &Path, width: usize, height: usize, max_height: f32) -> Result<Tilemap<f32>, HeightmapError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() % 2 != 0 {
        return Err(HeightmapError::OddLength(bytes.len()));
    }

    let heights = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as f32 / u16::MAX as f32 * max_height)
        .collect();
    Ok(Tilemap::from_vec(width, height, heights)?)
}

// =============================================================================
// NOISE HELPERS
// =============================================================================

fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value > 0.0 { total / max_value } else { 0.0 }
}

/// Domain warping - distort coordinates for organic shapes
fn apply_domain_warp(x: f64, y: f64, noise: &Perlin, strength: f64) -> (f64, f64) {
    let warp_scale = 4.0;
    let warp_x = noise.get([x * warp_scale, y * warp_scale]);
    let warp_y = noise.get([x * warp_scale + 5.2, y * warp_scale + 1.3]);
    (x + warp_x * strength, y + warp_y * strength)
}

/// Ridged multi-octave noise in `0.0..=1.0`
fn ridged(noise: &Perlin, x: f64, y: f64, power: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_val = 0.0;

    for i in 0..4 {
        let n = noise.get([x * frequency, y * frequency, i as f64 * 0.5]);
        // 1 - |noise| peaks at zero crossings
        total += amplitude * (1.0 - n.abs()).powf(power);
        max_val += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    (total / max_val).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_is_deterministic() {
        let params = TerrainParams::default();
        let a = generate_terrain(32, 24, &params, 99);
        let b = generate_terrain(32, 24, &params, 99);
        let c = generate_terrain(32, 24, &params, 100);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_terrain_spans_max_height() {
        let params = TerrainParams { max_height: 250.0, ..Default::default() };
        let hm = generate_terrain(40, 40, &params, 5);
        let (min_h, max_h) = hm.min_max().unwrap();
        assert!(min_h.abs() < 1e-4);
        assert!((max_h - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_ramp_and_pit_shapes() {
        let r = ramp(4, 3, 2.0);
        assert_eq!(*r.get(3, 0), 0.0);
        assert_eq!(*r.get(0, 2), -4.0);

        let p = pit(3, 3, 1.0);
        assert_eq!(*p.get(1, 1), -1.0);
        assert_eq!(p.as_slice().iter().filter(|&&h| h == 0.0).count(), 8);
    }

    fn write_raw(name: &str, samples: &[u16]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}_{}.raw", name, std::process::id()));
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_load_raw16_scales_samples() {
        let path = write_raw("raw16_ok", &[0, u16::MAX, 0, u16::MAX, 0, 0]);
        let hm = load_raw16(&path, 3, 2, 10.0);
        let _ = std::fs::remove_file(&path);

        let hm = hm.unwrap();
        assert_eq!((hm.width, hm.height), (3, 2));
        assert_eq!(*hm.get(1, 0), 10.0);
        assert_eq!(*hm.get(0, 1), 10.0);
        assert_eq!(*hm.get(2, 1), 0.0);
    }

    #[test]
    fn test_load_raw16_rejects_wrong_size() {
        let path = write_raw("raw16_short", &[1, 2, 3, 4, 5]);
        let result = load_raw16(&path, 3, 2, 1.0);
        let _ = std::fs::remove_file(&path);

        match result {
            Err(HeightmapError::GridSize(err)) => {
                assert_eq!((err.width, err.height, err.expected, err.actual), (3, 2, 6, 5));
            }
            other => panic!("expected a grid size error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_flat_map() {
        let flat = Tilemap::new_with(3, 3, 7.0f32);
        assert!(normalize(&flat, 1.0).as_slice().iter().all(|&h| h == 0.0));
    }
}
