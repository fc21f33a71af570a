//! Core data types for landmetrics

use std::collections::BTreeSet;

use serde::Serialize;

/// Default linear pixel size of the classification rasters, in meters
pub const DEFAULT_RESOLUTION_M: f64 = 30.0;

/// Represents grid dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Returns the total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Which acquisition strategy produced a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GridSource {
    /// Dense rectangular sample at native resolution
    Direct,
    /// Flat value list reshaped into a square grid
    Aggregated,
    /// Hard-coded demonstration data, not authoritative
    Synthetic,
}

impl GridSource {
    /// Returns the name of this source
    pub fn name(&self) -> &'static str {
        match self {
            GridSource::Direct => "direct",
            GridSource::Aggregated => "aggregated",
            GridSource::Synthetic => "synthetic",
        }
    }

    /// Whether the grid came from a lower-fidelity tier than the dense sample
    pub fn is_degraded(&self) -> bool {
        !matches!(self, GridSource::Direct)
    }
}

/// Row-major 2-D grid of land-cover class codes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassGrid {
    dims: Dimensions,
    cells: Vec<i32>,
    resolution_m: f64,
}

impl ClassGrid {
    /// Creates a grid from row-major cells; `None` if the shape does not match
    pub fn new(rows: usize, cols: usize, cells: Vec<i32>, resolution_m: f64) -> Option<Self> {
        if rows == 0 || cols == 0 || rows * cols != cells.len() {
            return None;
        }
        Some(Self {
            dims: Dimensions::new(rows, cols),
            cells,
            resolution_m,
        })
    }

    /// Creates a grid from nested rows; `None` if empty or ragged
    pub fn from_rows(rows: &[Vec<i32>], resolution_m: f64) -> Option<Self> {
        let cols = rows.first()?.len();
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        let cells = rows.iter().flatten().copied().collect();
        Self::new(rows.len(), cols, cells, resolution_m)
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn rows(&self) -> usize {
        self.dims.rows
    }

    pub fn cols(&self) -> usize {
        self.dims.cols
    }

    /// Linear pixel size in meters
    pub fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    /// Row-major cell values
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if row >= self.dims.rows || col >= self.dims.cols {
            return None;
        }
        self.cells.get(row * self.dims.cols + col).copied()
    }

    /// Returns the grid as nested rows
    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.cells
            .chunks(self.dims.cols)
            .map(|row| row.to_vec())
            .collect()
    }

    /// Sorted distinct class codes present in the grid
    pub fn distinct_classes(&self) -> Vec<i32> {
        self.cells
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether every cell equals `value`
    pub fn is_uniform(&self, value: i32) -> bool {
        self.cells.iter().all(|&cell| cell == value)
    }

    /// Pads the grid by edge replication until both dimensions reach `min_dim`
    ///
    /// Padding is split as evenly as possible between the two sides.
    pub fn pad_to_min(&self, min_dim: usize) -> ClassGrid {
        let rows = self.dims.rows.max(min_dim);
        let cols = self.dims.cols.max(min_dim);
        if rows == self.dims.rows && cols == self.dims.cols {
            return self.clone();
        }

        let top = (rows - self.dims.rows) / 2;
        let left = (cols - self.dims.cols) / 2;
        let mut cells = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let src_r = r.saturating_sub(top).min(self.dims.rows - 1);
            for c in 0..cols {
                let src_c = c.saturating_sub(left).min(self.dims.cols - 1);
                cells.push(self.cells[src_r * self.dims.cols + src_c]);
            }
        }

        ClassGrid {
            dims: Dimensions::new(rows, cols),
            cells,
            resolution_m: self.resolution_m,
        }
    }
}
