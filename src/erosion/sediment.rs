//! Baking accumulated sediment back into the heightmap.
//!
//! Small sediment values land on their own cell. Anything at or above the
//! spreading threshold is laid down as a cone: the centre moves by exactly
//! one threshold and the change falls off linearly to zero at
//! `radius = sqrt(|sediment| / threshold)`. Bigger deposits or pits get
//! wider, shallower footprints instead of spikes.

use crate::tilemap::Tilemap;

/// Sediment magnitude at which spreading starts, before `cone_threshold` scaling.
pub const BASE_SEDIMENT_THRESHOLD: f32 = 2e-4;

/// Spreading threshold for a given `cone_threshold`.
#[inline]
pub fn sediment_threshold(cone_threshold: f32) -> f32 {
    BASE_SEDIMENT_THRESHOLD * cone_threshold
}

/// Apply `amount` of signed sediment centred on `(x, y)`.
///
/// Returns the largest absolute height change this made to a single cell.
pub fn add_sediment(heightmap: &mut Tilemap<f32>, x: usize, y: usize, amount: f32, threshold: f32) -> f32 {
    let magnitude = amount.abs();
    // NaN lands on its own cell so it stays visible in the heights.
    if magnitude.is_nan() || magnitude < threshold {
        *heightmap.get_mut(x, y) += amount;
        return magnitude;
    }

    let sign = amount.signum();
    let radius = (magnitude / threshold).sqrt();
    // Huge deposits can push the radius to infinity; nothing past the grid matters.
    let max_extent = heightmap.width.max(heightmap.height) as i64;
    let extent = (radius.ceil() as i64 - 1).min(max_extent);

    // Only walk the part of the square that lies on the grid.
    let x0 = (x as i64 - extent).max(0);
    let x1 = (x as i64 + extent).min(heightmap.width as i64 - 1);
    let y0 = (y as i64 - extent).max(0);
    let y1 = (y as i64 + extent).min(heightmap.height as i64 - 1);

    for ny in y0..=y1 {
        let i = (ny - y as i64) as f32;
        for nx in x0..=x1 {
            let j = (nx - x as i64) as f32;
            let falloff = (1.0 - (i * i + j * j).sqrt() / radius).clamp(0.0, 1.0);
            *heightmap.get_mut(nx as usize, ny as usize) += threshold * sign * falloff;
        }
    }

    threshold
}

/// Deposit every cell's sediment, row-major, and clear the sediment grid.
///
/// Returns the largest single-cell change made by any one deposit.
pub fn deposit_all(heightmap: &mut Tilemap<f32>, sediment: &mut Tilemap<f32>, cone_threshold: f32) -> f32 {
    let threshold = sediment_threshold(cone_threshold);
    let mut max_change = 0.0f32;
    for y in 0..heightmap.height {
        for x in 0..heightmap.width {
            let amount = std::mem::take(sediment.get_mut(x, y));
            max_change = max_change.max(add_sediment(heightmap, x, y, amount, threshold));
        }
    }
    max_change
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f32 = BASE_SEDIMENT_THRESHOLD;

    #[test]
    fn test_small_sediment_applied_in_place() {
        let mut hm = Tilemap::new_with(5, 5, 1.0f32);
        let amount = -0.5 * T;
        add_sediment(&mut hm, 2, 2, amount, T);

        for (x, y, &h) in hm.iter() {
            if (x, y) == (2, 2) {
                assert_eq!(h, 1.0 + amount);
            } else {
                assert_eq!(h, 1.0, "neighbour ({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn test_large_sediment_spreads_as_cone() {
        let mut hm = Tilemap::new_with(9, 9, 0.0f32);
        // radius 2.5 -> half-extent 2
        add_sediment(&mut hm, 4, 4, 6.25 * T, T);

        assert!((*hm.get(4, 4) - T).abs() < 1e-9);
        assert!((*hm.get(5, 4) - 0.6 * T).abs() < 1e-7);
        assert!((*hm.get(4, 2) - 0.2 * T).abs() < 1e-7);
        // Square corner lies beyond the radius.
        assert_eq!(*hm.get(6, 6), 0.0);
        // Outside the half-extent nothing changes.
        for (x, y, &h) in hm.iter() {
            let outside = (x as i32 - 4).abs() > 2 || (y as i32 - 4).abs() > 2;
            if outside {
                assert_eq!(h, 0.0, "({x}, {y}) outside the cone changed");
            }
            assert!(h <= *hm.get(4, 4));
        }
    }

    #[test]
    fn test_threshold_amount_takes_cone_branch() {
        let mut hm = Tilemap::new_with(3, 3, 0.0f32);
        let change = add_sediment(&mut hm, 1, 1, T, T);

        // radius 1 -> half-extent 0, so only the centre moves, by one threshold.
        assert_eq!(change, T);
        assert_eq!(*hm.get(1, 1), T);
        assert_eq!(hm.as_slice().iter().filter(|&&h| h != 0.0).count(), 1);
    }

    #[test]
    fn test_overflowing_radius_covers_grid() {
        let mut hm = Tilemap::new_with(4, 1, 0.0f32);
        add_sediment(&mut hm, 3, 0, 1.5e37, T);

        // magnitude / threshold overflows to infinity: every cell gets a full threshold.
        assert!(hm.as_slice().iter().all(|&h| (h - T).abs() < 1e-9));
    }

    #[test]
    fn test_nan_sediment_reaches_heightmap() {
        let mut hm = Tilemap::new_with(3, 3, 0.0f32);
        add_sediment(&mut hm, 1, 1, f32::NAN, T);

        assert!(hm.get(1, 1).is_nan());
        assert_eq!(hm.as_slice().iter().filter(|h| h.is_nan()).count(), 1);
    }

    #[test]
    fn test_negative_sediment_digs_pit() {
        let mut hm = Tilemap::new_with(9, 9, 0.0f32);
        add_sediment(&mut hm, 4, 4, -6.25 * T, T);
        assert!((*hm.get(4, 4) + T).abs() < 1e-9);
        assert!(*hm.get(5, 5) < 0.0);
    }

    #[test]
    fn test_cone_clipped_at_edges() {
        let mut hm = Tilemap::new_with(3, 3, 0.0f32);
        add_sediment(&mut hm, 0, 0, 100.0 * T, T);
        assert!((*hm.get(0, 0) - T).abs() < 1e-9);
        assert!(*hm.get(2, 2) > 0.0);
    }

    #[test]
    fn test_higher_cone_threshold_narrows_spread() {
        let mut wide = Tilemap::new_with(9, 9, 0.0f32);
        let mut narrow = Tilemap::new_with(9, 9, 0.0f32);
        add_sediment(&mut wide, 4, 4, 9.0 * T, sediment_threshold(1.0));
        add_sediment(&mut narrow, 4, 4, 9.0 * T, sediment_threshold(4.0));

        let touched = |hm: &Tilemap<f32>| hm.as_slice().iter().filter(|&&h| h != 0.0).count();
        assert!(touched(&narrow) < touched(&wide));
    }

    #[test]
    fn test_deposit_all_clears_sediment() {
        let mut hm = Tilemap::new_with(4, 4, 0.0f32);
        let mut sediment = Tilemap::new_with(4, 4, 0.0f32);
        sediment.set(1, 1, 0.5 * T);
        sediment.set(2, 3, -0.25 * T);

        let max_change = deposit_all(&mut hm, &mut sediment, 1.0);

        assert!(sediment.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(*hm.get(1, 1), 0.5 * T);
        assert_eq!(*hm.get(2, 3), -0.25 * T);
        assert_eq!(max_change, 0.5 * T);
    }
}
