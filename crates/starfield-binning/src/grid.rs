//! Screen-space counting sort
//!
//! Buckets projected positions into a uniform grid of [`CELL_SIZE`] pixel cells and
//! produces, per cell, a packed `(start << 16) | length` header word. Cells are
//! enumerated row-major, x fastest.

use crate::BinningError;

/// Edge length of one grid cell in pixels
pub const CELL_SIZE: u32 = 32;

/// Largest number of positions one sort accepts; headers use 16-bit fields
pub const MAX_BINNED_POSITIONS: usize = u16::MAX as usize;

/// Screen-space position in pixels
pub type ScreenPosition = [f32; 2];

/// Per-cell bucket header.
///
/// After a completed sort `offset` points one past the bucket's last element, so the
/// bucket occupies `offset - length .. offset` of the sorted output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCell {
    pub offset: u16,
    pub length: u16,
}

impl GridCell {
    /// Index of the bucket's first element
    pub fn start(&self) -> u16 {
        self.offset - self.length
    }

    /// `(start << 16) | length`; an empty cell packs to `0`
    pub fn packed(&self) -> u32 {
        if self.length == 0 {
            return 0;
        }
        ((self.start() as u32) << 16) | self.length as u32
    }

    /// Split a packed header into `(start, length)`
    pub fn unpack(word: u32) -> (u16, u16) {
        ((word >> 16) as u16, (word & 0xFFFF) as u16)
    }
}

/// Number of cells needed to cover `pixels`
pub fn cells_for(pixels: u32) -> u32 {
    pixels.div_ceil(CELL_SIZE)
}

pub struct ScreenGrid {
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
    cells: Vec<GridCell>,
    packed: Vec<u32>,
    sorted: Vec<ScreenPosition>,
}

impl ScreenGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let mut grid = Self {
            width: 0,
            height: 0,
            columns: 0,
            rows: 0,
            cells: Vec::new(),
            packed: Vec::new(),
            sorted: Vec::new(),
        };
        grid.resize(width, height);
        grid
    }

    /// Resize to a new screen; clears any previous result
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.columns = cells_for(self.width);
        self.rows = cells_for(self.height);

        let num_cells = (self.columns * self.rows) as usize;
        self.cells = vec![GridCell::default(); num_cells];
        self.packed = vec![0; num_cells];
        self.sorted.clear();
    }

    /// Cell containing `position`, or `None` if it lies outside the grid
    pub fn cell_index(&self, position: ScreenPosition) -> Option<usize> {
        let [x, y] = position;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }

        let column = (x / CELL_SIZE as f32).floor();
        let row = (y / CELL_SIZE as f32).floor();
        if column < 0.0 || row < 0.0 || column >= self.columns as f32 || row >= self.rows as f32 {
            return None;
        }

        Some(row as usize * self.columns as usize + column as usize)
    }

    /// Sort `positions` into buckets, returning how many fell inside the grid.
    ///
    /// Runs in `O(N + cells)`: count, prefix sum, scatter, pack.
    pub fn sort(&mut self, positions: &[ScreenPosition]) -> Result<usize, BinningError> {
        if positions.len() > MAX_BINNED_POSITIONS {
            return Err(BinningError::CapacityExceeded {
                count: positions.len(),
                limit: MAX_BINNED_POSITIONS,
            });
        }

        self.cells.fill(GridCell::default());

        // Count
        let cell_of: Vec<Option<usize>> = positions.iter().map(|&p| self.cell_index(p)).collect();
        for cell in cell_of.iter().flatten() {
            self.cells[*cell].length += 1;
        }

        // Prefix sum
        let mut total: u16 = 0;
        for cell in &mut self.cells {
            cell.offset = total;
            total += cell.length;
        }

        // Scatter; offsets end up one past each bucket
        self.sorted.clear();
        self.sorted.resize(total as usize, [0.0; 2]);
        for (&position, cell) in positions.iter().zip(&cell_of) {
            if let Some(cell) = cell {
                let header = &mut self.cells[*cell];
                self.sorted[header.offset as usize] = position;
                header.offset += 1;
            }
        }

        // Pack
        for (word, cell) in self.packed.iter_mut().zip(&self.cells) {
            *word = cell.packed();
        }

        Ok(total as usize)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// One packed header word per cell, row-major
    pub fn packed_headers(&self) -> &[u32] {
        &self.packed
    }

    /// In-bounds positions grouped by cell
    pub fn sorted_positions(&self) -> &[ScreenPosition] {
        &self.sorted
    }

    /// Positions in cell `index` after the last sort
    pub fn bucket(&self, index: usize) -> &[ScreenPosition] {
        let cell = self.cells[index];
        &self.sorted[cell.start() as usize..cell.offset as usize]
    }

    /// `(columns, rows)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Screen size in pixels
    pub fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_rounds_up() {
        let grid = ScreenGrid::new(1920, 1080);
        assert_eq!(grid.dimensions(), (60, 34));
        assert_eq!(grid.num_cells(), 60 * 34);

        let grid = ScreenGrid::new(33, 1);
        assert_eq!(grid.dimensions(), (2, 1));
    }

    #[test]
    fn cell_index_floors_and_bounds() {
        let grid = ScreenGrid::new(64, 64);
        assert_eq!(grid.cell_index([0.0, 0.0]), Some(0));
        assert_eq!(grid.cell_index([31.9, 0.0]), Some(0));
        assert_eq!(grid.cell_index([32.0, 0.0]), Some(1));
        assert_eq!(grid.cell_index([0.0, 32.0]), Some(2));
        assert_eq!(grid.cell_index([63.9, 63.9]), Some(3));

        // Truncation would put these in cell 0
        assert_eq!(grid.cell_index([-0.5, 5.0]), None);
        assert_eq!(grid.cell_index([5.0, -0.5]), None);
        assert_eq!(grid.cell_index([-1.0, -1.0]), None);
        assert_eq!(grid.cell_index([64.0, 0.0]), None);
        assert_eq!(grid.cell_index([f32::NAN, 0.0]), None);
        assert_eq!(grid.cell_index([0.0, f32::INFINITY]), None);
    }

    #[test]
    fn sorts_into_buckets() {
        let mut grid = ScreenGrid::new(64, 64);
        let positions = [
            [40.0, 40.0], // cell 3
            [1.0, 1.0],   // cell 0
            [-1.0, -1.0], // discarded
            [33.0, 2.0],  // cell 1
            [2.0, 2.0],   // cell 0
            [50.0, 60.0], // cell 3
        ];

        assert_eq!(grid.sort(&positions).unwrap(), 5);
        assert_eq!(grid.bucket(0), &[[1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(grid.bucket(1), &[[33.0, 2.0]]);
        assert!(grid.bucket(2).is_empty());
        assert_eq!(grid.bucket(3), &[[40.0, 40.0], [50.0, 60.0]]);

        assert_eq!(
            grid.packed_headers(),
            &[2, (2 << 16) | 1, 0, (3 << 16) | 2]
        );
    }

    #[test]
    fn resort_clears_previous_counts() {
        let mut grid = ScreenGrid::new(32, 32);
        grid.sort(&[[1.0, 1.0]; 10]).unwrap();
        assert_eq!(grid.sort(&[[1.0, 1.0]; 3]).unwrap(), 3);
        assert_eq!(grid.cells()[0], GridCell { offset: 3, length: 3 });
    }

    #[test]
    fn capacity_is_a_hard_cap() {
        let mut grid = ScreenGrid::new(32, 32);
        let positions = vec![[1.0, 1.0]; MAX_BINNED_POSITIONS];
        assert_eq!(grid.sort(&positions).unwrap(), MAX_BINNED_POSITIONS);
        assert_eq!(GridCell::unpack(grid.packed_headers()[0]), (0, u16::MAX));

        let positions = vec![[1.0, 1.0]; MAX_BINNED_POSITIONS + 1];
        assert!(matches!(
            grid.sort(&positions),
            Err(BinningError::CapacityExceeded { count: 65536, .. })
        ));
    }

    #[test]
    fn empty_cells_pack_to_zero() {
        let mut grid = ScreenGrid::new(96, 32);
        grid.sort(&[]).unwrap();
        assert!(grid.packed_headers().iter().all(|&w| w == 0));
        assert!(grid.sorted_positions().is_empty());
    }
}
