//! Placeholder landscape served when no real data can be fetched
//!
//! This grid is demonstration data. It is not derived from any raster and
//! every result built on it is flagged `synthetic`.

use crate::types::ClassGrid;

/// Forest (3), grassland (12), pasture (15), mosaic (21) and water (33)
pub const PLACEHOLDER_GRID: [[i32; 8]; 8] = [
    [3, 3, 3, 3, 15, 15, 15, 21],
    [3, 3, 3, 15, 15, 15, 21, 21],
    [3, 3, 3, 15, 15, 21, 21, 21],
    [3, 3, 12, 12, 15, 21, 21, 33],
    [3, 12, 12, 12, 15, 15, 33, 33],
    [3, 3, 12, 15, 15, 15, 33, 33],
    [3, 3, 3, 15, 15, 21, 21, 33],
    [3, 3, 3, 3, 15, 21, 21, 21],
];

/// Built-in placeholder grid
pub fn placeholder(resolution_m: f64) -> ClassGrid {
    let rows: Vec<Vec<i32>> = PLACEHOLDER_GRID.iter().map(|row| row.to_vec()).collect();
    match ClassGrid::from_rows(&rows, resolution_m) {
        Some(grid) => grid,
        None => unreachable!("placeholder grid is a non-empty rectangle"),
    }
}
