//! Flat value lists to square grids

use crate::types::ClassGrid;

/// Tops `values` up to `threshold` by cycling through `typical`
///
/// Returns whether padding happened. Deterministic: the same input always
/// yields the same output.
pub fn pad_to_threshold(mut values: Vec<i32>, threshold: usize, typical: &[i32]) -> (Vec<i32>, bool) {
    if values.len() >= threshold || typical.is_empty() {
        return (values, false);
    }
    let missing = threshold - values.len();
    values.extend(typical.iter().copied().cycle().take(missing));
    (values, true)
}

/// Side of the smallest square holding `n` cells
pub fn square_side(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    while side > 0 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side
}

/// Reshapes values row-major into a `side`x`side` grid
///
/// Excess values are dropped; missing cells repeat the first value.
pub fn reshape_square_with_side(values: &[i32], side: usize, resolution_m: f64) -> Option<ClassGrid> {
    let first = *values.first()?;
    let total = side * side;
    let mut cells: Vec<i32> = values.iter().copied().take(total).collect();
    cells.resize(total, first);
    ClassGrid::new(side, side, cells, resolution_m)
}

/// Reshapes values into the smallest square grid that contains them all
pub fn reshape_square(values: &[i32], resolution_m: f64) -> Option<ClassGrid> {
    reshape_square_with_side(values, square_side(values.len()), resolution_m)
}
