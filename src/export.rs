//! PNG export of heightmaps and erosion results.

use std::path::Path;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use thiserror::Error;

use crate::tilemap::Tilemap;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Cannot export an empty {width}x{height} grid")]
    EmptyGrid { width: usize, height: usize },
    #[error("Grids differ in size: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),
}

fn check_not_empty(heightmap: &Tilemap<f32>) -> Result<(f32, f32), ExportError> {
    heightmap.min_max().ok_or(ExportError::EmptyGrid {
        width: heightmap.width,
        height: heightmap.height,
    })
}

/// Export a heightmap as 16-bit grayscale, stretched so the lowest cell
/// is black and the highest white. Flat maps export black.
pub fn export_heightmap(heightmap: &Tilemap<f32>, path: &Path) -> Result<(), ExportError> {
    let (min_h, max_h) = check_not_empty(heightmap)?;
    let range = max_h - min_h;

    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(heightmap.width as u32, heightmap.height as u32, |x, y| {
            let h = *heightmap.get(x as usize, y as usize);
            let t = if range > 0.0 { (h - min_h) / range } else { 0.0 };
            Luma([(t.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16])
        });

    img.save(path)?;
    Ok(())
}

/// Render a hillshaded relief map, lit from the upper left.
pub fn render_hillshade(heightmap: &Tilemap<f32>) -> RgbImage {
    let width = heightmap.width;
    let height = heightmap.height;
    let mut img = ImageBuffer::new(width as u32, height as u32);
    let Some((min_h, max_h)) = heightmap.min_max() else {
        return img;
    };
    let range = (max_h - min_h).max(f32::EPSILON);

    let (light_x, light_y, light_z) = (-0.7f32, -0.7f32, 0.5f32);
    let light_len = (light_x * light_x + light_y * light_y + light_z * light_z).sqrt();
    let (lx, ly, lz) = (light_x / light_len, light_y / light_len, light_z / light_len);

    // Exaggerate relief so a map spans roughly a quarter of its width in height.
    let relief = width.max(height) as f32 * 0.25 / range;

    for y in 0..height {
        for x in 0..width {
            let h = *heightmap.get(x, y);
            let normalized = (h - min_h) / range;

            let h_left = if x > 0 { *heightmap.get(x - 1, y) } else { h };
            let h_right = if x + 1 < width { *heightmap.get(x + 1, y) } else { h };
            let h_up = if y > 0 { *heightmap.get(x, y - 1) } else { h };
            let h_down = if y + 1 < height { *heightmap.get(x, y + 1) } else { h };

            let nx = (h_left - h_right) * relief * 0.5;
            let ny = (h_up - h_down) * relief * 0.5;
            let nlen = (nx * nx + ny * ny + 1.0).sqrt();
            let diffuse = ((nx * lx + ny * ly + lz) / nlen).max(0.0);
            let ambient = 0.3;
            let lighting = (ambient + (1.0 - ambient) * diffuse).min(1.0);

            let base = elevation_color(normalized);
            img.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    (base[0] as f32 * lighting) as u8,
                    (base[1] as f32 * lighting) as u8,
                    (base[2] as f32 * lighting) as u8,
                ]),
            );
        }
    }

    img
}

/// Green lowlands through brown and grey rock to snow.
fn elevation_color(t: f32) -> [u8; 3] {
    if t < 0.3 {
        [80, 140, 60]
    } else if t < 0.6 {
        let s = (t - 0.3) / 0.3;
        [(80.0 + s * 80.0) as u8, (140.0 - s * 60.0) as u8, (60.0 - s * 20.0) as u8]
    } else if t < 0.85 {
        let v = 160.0 - (t - 0.6) / 0.25 * 40.0;
        [v as u8, (v - 10.0) as u8, (v - 20.0) as u8]
    } else {
        [240, 240, 245]
    }
}

pub fn export_hillshade(heightmap: &Tilemap<f32>, path: &Path) -> Result<(), ExportError> {
    check_not_empty(heightmap)?;
    render_hillshade(heightmap).save(path)?;
    Ok(())
}

/// Render `after - before`: red where material was removed, blue where it
/// was deposited, white where nothing changed.
pub fn render_difference(before: &Tilemap<f32>, after: &Tilemap<f32>) -> Result<RgbImage, ExportError> {
    if !before.same_shape(after) {
        return Err(ExportError::ShapeMismatch(
            (before.width, before.height),
            (after.width, after.height),
        ));
    }

    let max_delta = before
        .as_slice()
        .iter()
        .zip(after.as_slice())
        .map(|(b, a)| (a - b).abs())
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON);

    Ok(ImageBuffer::from_fn(before.width as u32, before.height as u32, |x, y| {
        let delta = *after.get(x as usize, y as usize) - *before.get(x as usize, y as usize);
        let t = (delta.abs() / max_delta).clamp(0.0, 1.0);
        let fade = (255.0 * (1.0 - t)) as u8;
        if delta < 0.0 {
            Rgb([255, fade, fade])
        } else {
            Rgb([fade, fade, 255])
        }
    }))
}

pub fn export_difference(before: &Tilemap<f32>, after: &Tilemap<f32>, path: &Path) -> Result<(), ExportError> {
    check_not_empty(before)?;
    render_difference(before, after)?.save(path)?;
    Ok(())
}

/// Tile equally sized images into a `cols`-wide grid separated by a thin border.
pub fn compose_grid(images: &[RgbImage], cols: usize) -> RgbImage {
    let Some(first) = images.first() else {
        return ImageBuffer::new(1, 1);
    };
    let cols = cols.max(1);
    let rows = images.len().div_ceil(cols);
    let border = 4u32;
    let (cell_w, cell_h) = first.dimensions();

    let grid_w = cols as u32 * (cell_w + border) + border;
    let grid_h = rows as u32 * (cell_h + border) + border;
    let mut grid: RgbImage = ImageBuffer::from_pixel(grid_w, grid_h, Rgb([40, 40, 40]));

    for (idx, img) in images.iter().enumerate() {
        let x_offset = border + (idx % cols) as u32 * (cell_w + border);
        let y_offset = border + (idx / cols) as u32 * (cell_h + border);
        for (x, y, pixel) in img.enumerate_pixels() {
            if x < cell_w && y < cell_h {
                grid.put_pixel(x_offset + x, y_offset + y, *pixel);
            }
        }
    }

    grid
}
