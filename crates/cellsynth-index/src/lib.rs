//! Toroidal topology and neighborhood enumeration for automaton grids.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted when constructing a topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Indicates dimensions that cannot describe a grid (e.g., zero width).
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(&'static str),
}

/// Relative offsets of the radius-1 Moore neighborhood as `(dx, dy)`.
///
/// Ordered row-major (`dy` outer, `dx` inner) with the centre omitted. Every
/// aggregate computed over a neighborhood visits cells in this order, which
/// keeps floating point sums reproducible for identical input state.
pub const MOORE_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Number of cells in a Moore neighborhood.
pub const MOORE_SIZE: usize = MOORE_OFFSETS.len();

/// Common behaviour exposed by neighborhood providers.
pub trait Neighborhood {
    /// Total number of addressable cells.
    fn len(&self) -> usize;

    /// Returns `true` when the topology addresses no cells.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit the flat indices neighboring `index` in a fixed, deterministic order.
    fn visit_neighbors(&self, index: usize, visitor: &mut dyn FnMut(usize));
}

/// Borderless rectangle whose edges wrap around in both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Torus {
    width: u32,
    height: u32,
}

impl Torus {
    /// Create a torus with the given dimensions; both must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, TopologyError> {
        if width == 0 || height == 0 {
            return Err(TopologyError::InvalidDimensions(
                "width and height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Wraps a single coordinate onto `[0, length)`.
    ///
    /// Uses the Euclidean remainder, so `-1` maps to `length - 1` rather than
    /// truncating towards zero.
    #[inline]
    #[must_use]
    pub fn wrap_axis(coord: i64, length: u32) -> u32 {
        coord.rem_euclid(i64::from(length)) as u32
    }

    /// Returns the unique in-range representative of `(x, y)`.
    #[inline]
    #[must_use]
    pub fn wrap(&self, x: i64, y: i64) -> (u32, u32) {
        (
            Self::wrap_axis(x, self.width),
            Self::wrap_axis(y, self.height),
        )
    }

    /// Flat row-major index of the wrapped coordinate.
    #[inline]
    #[must_use]
    pub fn index(&self, x: i64, y: i64) -> usize {
        let (x, y) = self.wrap(x, y);
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Inverse of [`Torus::index`] for indices already in range.
    #[inline]
    #[must_use]
    pub fn coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    /// Flat indices of the eight Moore neighbors of `(x, y)` in [`MOORE_OFFSETS`] order.
    ///
    /// On grids narrower than three cells the same index can appear more than
    /// once, and a cell can be its own neighbor.
    #[must_use]
    pub fn moore_neighbors(&self, x: i64, y: i64) -> [usize; MOORE_SIZE] {
        let mut out = [0usize; MOORE_SIZE];
        for (slot, (dx, dy)) in out.iter_mut().zip(MOORE_OFFSETS) {
            *slot = self.index(x + dx, y + dy);
        }
        out
    }
}

impl Neighborhood for Torus {
    fn len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    fn visit_neighbors(&self, index: usize, visitor: &mut dyn FnMut(usize)) {
        let (x, y) = self.coords(index);
        for neighbor in self.moore_neighbors(i64::from(x), i64::from(y)) {
            visitor(neighbor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimensions() {
        assert!(Torus::new(0, 4).is_err());
        assert!(Torus::new(4, 0).is_err());
        assert!(Torus::new(1, 1).is_ok());
    }

    #[test]
    fn wrap_handles_negative_and_overflowing_coordinates() {
        let torus = Torus::new(5, 3).expect("torus");
        assert_eq!(torus.wrap(-1, -1), (4, 2));
        assert_eq!(torus.wrap(5, 3), (0, 0));
        assert_eq!(torus.wrap(-11, 7), (4, 1));
        assert_eq!(torus.wrap(2, 1), (2, 1));
    }

    #[test]
    fn wrap_is_periodic() {
        let torus = Torus::new(7, 4).expect("torus");
        for x in -10..10 {
            for y in -6..6 {
                for k in -3..=3 {
                    assert_eq!(torus.wrap(x + k * 7, y), torus.wrap(x, y));
                    assert_eq!(torus.wrap(x, y + k * 4), torus.wrap(x, y));
                }
            }
        }
    }

    #[test]
    fn index_and_coords_round_trip_in_range() {
        let torus = Torus::new(4, 3).expect("torus");
        for index in 0..torus.len() {
            let (x, y) = torus.coords(index);
            assert_eq!(torus.index(i64::from(x), i64::from(y)), index);
        }
    }

    #[test]
    fn moore_neighbors_follow_row_major_offsets() {
        let torus = Torus::new(4, 4).expect("torus");
        let neighbors = torus.moore_neighbors(0, 0);
        let expected = [
            torus.index(3, 3),
            torus.index(0, 3),
            torus.index(1, 3),
            torus.index(3, 0),
            torus.index(1, 0),
            torus.index(3, 1),
            torus.index(0, 1),
            torus.index(1, 1),
        ];
        assert_eq!(neighbors, expected);
        assert!(!neighbors.contains(&torus.index(0, 0)));
    }

    #[test]
    fn degenerate_grid_lists_self_as_neighbor() {
        let torus = Torus::new(1, 1).expect("torus");
        assert_eq!(torus.moore_neighbors(0, 0), [0; MOORE_SIZE]);

        let torus = Torus::new(2, 1).expect("torus");
        let mut visited = Vec::new();
        torus.visit_neighbors(0, &mut |idx| visited.push(idx));
        assert_eq!(visited.len(), MOORE_SIZE);
        assert_eq!(visited.iter().filter(|&&idx| idx == 0).count(), 2);
        assert_eq!(visited.iter().filter(|&&idx| idx == 1).count(), 6);
    }
}
