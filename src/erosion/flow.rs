//! Rain and steepest-descent water routing.
//!
//! Every cell starts a pass holding the same amount of rain. A sweep visits
//! the grid row-major and pushes each wet cell's water to its strictly lower
//! 8-neighbours, split by slope. Water moving along the sweep direction is
//! picked up again later in the same sweep; water moving against it waits
//! for the next one. Cells with no lower neighbour simply lose their water.
//!
//! Each routing step also moves sediment: the destination gains what the
//! source loses, in proportion to flow times slope.

use crate::tilemap::Tilemap;

use super::ErosionError;

/// Slope discount for diagonal neighbours (roughly 1/sqrt(2)).
pub const DIAGONAL_WEIGHT: f32 = 0.714;

/// Sediment picked up per unit of flow times slope.
pub const SEDIMENT_FACTOR: f32 = 0.05;

/// Floor for the summed decline of a cell's downhill neighbours.
pub const MIN_DECLINE_SUM: f32 = 0.00001;

/// Result of draining one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Sweeps run, including the final dry one when the pass converged
    pub sweeps: usize,
    /// False if the sweep cap was hit while water was still moving
    pub converged: bool,
}

/// Transient water and sediment grids for one erosion run.
#[derive(Clone, Debug)]
pub struct ErosionBuffers {
    pub water: Tilemap<f32>,
    pub sediment: Tilemap<f32>,
    sediment_moved: f64,
}

impl ErosionBuffers {
    /// Allocate dry, sediment-free buffers matching `heightmap`.
    pub fn for_heightmap(heightmap: &Tilemap<f32>) -> Self {
        Self {
            water: Tilemap::new_with(heightmap.width, heightmap.height, 0.0),
            sediment: Tilemap::new_with(heightmap.width, heightmap.height, 0.0),
            sediment_moved: 0.0,
        }
    }

    /// Fail unless the buffers line up cell-for-cell with `heightmap`.
    pub fn check_shape(&self, heightmap: &Tilemap<f32>) -> Result<(), ErosionError> {
        if !self.water.same_shape(heightmap) {
            return Err(ErosionError::DimensionMismatch {
                expected: (heightmap.width, heightmap.height),
                actual: (self.water.width, self.water.height),
            });
        }
        Ok(())
    }

    /// Start a pass: `rainfall` water everywhere, no sediment.
    pub fn rain(&mut self, rainfall: f32) {
        self.water.fill(rainfall);
        self.sediment.fill(0.0);
    }

    /// Total sediment shifted between cells since the last call.
    pub fn take_sediment_moved(&mut self) -> f64 {
        std::mem::take(&mut self.sediment_moved)
    }

    /// Route the water resting on `(x, y)` one step downhill.
    ///
    /// Returns true if the cell held any water. The cell is always dry
    /// afterwards.
    pub fn move_water(&mut self, heightmap: &Tilemap<f32>, x: usize, y: usize) -> bool {
        let water = *self.water.get(x, y);
        if water <= 0.0 {
            return false;
        }

        let here = *heightmap.get(x, y);
        let mut downhill = [(0usize, 0usize, 0.0f32); 8];
        let mut count = 0;
        let mut decline_sum = 0.0f32;

        for (nx, ny, diagonal) in heightmap.neighbors_8(x, y) {
            let mut decline = here - *heightmap.get(nx, ny);
            // Strictly downhill only; a NaN decline is not downhill.
            if decline.is_nan() || decline <= 0.0 {
                continue;
            }
            if diagonal {
                decline *= DIAGONAL_WEIGHT;
            }
            downhill[count] = (nx, ny, decline);
            count += 1;
            decline_sum += decline;
        }

        if count > 0 {
            let decline_sum = decline_sum.max(MIN_DECLINE_SUM);
            let mut sand_out = 0.0f32;
            for &(nx, ny, decline) in &downhill[..count] {
                let flow = water * decline / decline_sum;
                let sand = SEDIMENT_FACTOR * flow * decline;
                *self.water.get_mut(nx, ny) += flow;
                *self.sediment.get_mut(nx, ny) += sand;
                sand_out += sand;
            }
            *self.sediment.get_mut(x, y) -= sand_out;
            self.sediment_moved += sand_out as f64;
        }

        self.water.set(x, y, 0.0);
        true
    }

    /// Sweep the grid until no cell holds water or `max_sweeps` is reached.
    pub fn drain(&mut self, heightmap: &Tilemap<f32>, max_sweeps: usize) -> DrainOutcome {
        let mut sweeps = 0;
        loop {
            let mut water_exists = false;
            for y in 0..heightmap.height {
                for x in 0..heightmap.width {
                    water_exists |= self.move_water(heightmap, x, y);
                }
            }
            sweeps += 1;

            if !water_exists {
                return DrainOutcome { sweeps, converged: true };
            }
            if sweeps >= max_sweeps {
                return DrainOutcome { sweeps, converged: false };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap;

    fn wet_cell(heightmap: &Tilemap<f32>, x: usize, y: usize, water: f32) -> ErosionBuffers {
        let mut buffers = ErosionBuffers::for_heightmap(heightmap);
        buffers.water.set(x, y, water);
        buffers
    }

    #[test]
    fn test_sediment_conserved_per_step() {
        let hm = Tilemap::from_fn(3, 3, |x, y| (x * x + y) as f32 * 0.5);
        let mut buffers = wet_cell(&hm, 2, 2, 2.0);

        assert!(buffers.move_water(&hm, 2, 2));

        let source = *buffers.sediment.get(2, 2);
        let received: f32 = buffers
            .sediment
            .iter()
            .filter(|&(x, y, _)| (x, y) != (2, 2))
            .map(|(_, _, &s)| s)
            .sum();
        assert!(source < 0.0);
        assert!((source + received).abs() < 1e-6);
        assert!((buffers.take_sediment_moved() - received as f64).abs() < 1e-6);
    }

    #[test]
    fn test_water_never_flows_uphill() {
        // Centre at 1.0; left column lower, right column higher, middle row level.
        let hm = Tilemap::from_fn(3, 3, |x, y| match (x, y) {
            (0, _) => 0.5,
            (2, _) => 2.0,
            _ => 1.0,
        });
        let mut buffers = wet_cell(&hm, 1, 1, 1.0);
        buffers.move_water(&hm, 1, 1);

        for (x, y, &w) in buffers.water.iter() {
            if x == 0 {
                assert!(w > 0.0, "lower cell ({x}, {y}) got no water");
            } else {
                assert_eq!(w, 0.0, "cell ({x}, {y}) is not lower but got water");
            }
        }
        let total: f32 = buffers.water.as_slice().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_diagonal_decline_is_discounted() {
        // Axis neighbour (1, 0) and diagonal neighbour (0, 0) are both one unit lower.
        let hm = Tilemap::from_fn(2, 2, |x, y| if y == 1 && x == 1 { 1.0 } else if y == 0 { 0.0 } else { 5.0 });
        let mut buffers = wet_cell(&hm, 1, 1, 1.0);
        buffers.move_water(&hm, 1, 1);

        let axis = *buffers.water.get(1, 0);
        let diagonal = *buffers.water.get(0, 0);
        assert!((axis - 1.0 / (1.0 + DIAGONAL_WEIGHT)).abs() < 1e-6);
        assert!((diagonal - DIAGONAL_WEIGHT / (1.0 + DIAGONAL_WEIGHT)).abs() < 1e-6);
        assert!((*buffers.sediment.get(0, 0) - SEDIMENT_FACTOR * diagonal * DIAGONAL_WEIGHT).abs() < 1e-7);
    }

    #[test]
    fn test_local_minimum_discards_water() {
        let hm = heightmap::pit(3, 3, 1.0);
        let mut buffers = wet_cell(&hm, 1, 1, 4.0);

        assert!(buffers.move_water(&hm, 1, 1));
        assert!(buffers.water.as_slice().iter().all(|&w| w == 0.0));
        assert!(buffers.sediment.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_dry_cell_reports_no_movement() {
        let hm = heightmap::ramp(3, 3, 1.0);
        let mut buffers = ErosionBuffers::for_heightmap(&hm);
        assert!(!buffers.move_water(&hm, 1, 0));
    }

    #[test]
    fn test_ramp_drains_within_two_sweeps() {
        let hm = heightmap::ramp(16, 16, 1.0);
        let mut buffers = ErosionBuffers::for_heightmap(&hm);
        buffers.rain(1.0);

        let outcome = buffers.drain(&hm, 100);
        assert!(outcome.converged);
        assert!(outcome.sweeps <= 2);
        assert!(buffers.water.as_slice().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_sweep_cap_stops_uphill_ordered_flow() {
        // Height rises with y, so water runs against the sweep and moves one row per sweep.
        let hm = heightmap::ramp(3, 40, -1.0);
        let mut buffers = ErosionBuffers::for_heightmap(&hm);
        buffers.rain(1.0);

        let outcome = buffers.drain(&hm, 5);
        assert_eq!(outcome, DrainOutcome { sweeps: 5, converged: false });
    }

    #[test]
    fn test_check_shape_rejects_mismatch() {
        let buffers = ErosionBuffers::for_heightmap(&Tilemap::new(4, 4));
        assert!(buffers.check_shape(&Tilemap::new(4, 4)).is_ok());
        assert!(matches!(
            buffers.check_shape(&Tilemap::new(4, 5)),
            Err(ErosionError::DimensionMismatch { expected: (4, 5), actual: (4, 4) })
        ));
    }

    #[test]
    fn test_nan_neighbour_receives_no_flow() {
        let mut hm = heightmap::ramp(3, 3, 1.0);
        hm.set(0, 2, f32::NAN);
        let mut buffers = wet_cell(&hm, 1, 1, 1.0);
        buffers.move_water(&hm, 1, 1);

        assert_eq!(*buffers.water.get(0, 2), 0.0);
        assert!(buffers.water.as_slice().iter().all(|w| w.is_finite()));
        let total: f32 = buffers.water.as_slice().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
