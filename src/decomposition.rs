//! Mapping of the global 2D array onto the process grid.
//!
//! Pure arithmetic, no I/O: every rank computes its own block from the broadcast
//! configuration and its linear rank. The blocks of all ranks tile the global extent
//! with no gaps and no overlap under both scaling modes.

use crate::config::{Config, Scaling};

/// Position of a rank in the `proc_rows x proc_cols` grid (row-major in rank order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcCoord {
    pub row: u32,
    pub col: u32,
}

impl ProcCoord {
    pub fn from_rank(rank: usize, proc_cols: u32) -> Self {
        let proc_cols = proc_cols as usize;
        Self { row: (rank / proc_cols) as u32, col: (rank % proc_cols) as u32 }
    }

    pub fn to_rank(self, proc_cols: u32) -> usize {
        self.row as usize * proc_cols as usize + self.col as usize
    }
}

/// The hyperslab of the global 2D extent owned by one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalBlock {
    pub offset_row: u64,
    pub offset_col: u64,
    pub rows: u64,
    pub cols: u64,
}

impl LocalBlock {
    /// Number of elements in the block.
    pub fn len(&self) -> usize {
        (self.rows * self.cols) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.rows as usize, self.cols as usize]
    }

    pub fn contains(&self, row: u64, col: u64) -> bool {
        (self.offset_row..self.offset_row + self.rows).contains(&row)
            && (self.offset_col..self.offset_col + self.cols).contains(&col)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.offset_row < other.offset_row + other.rows
            && other.offset_row < self.offset_row + self.rows
            && self.offset_col < other.offset_col + other.cols
            && other.offset_col < self.offset_col + self.cols
    }
}

/// Extent of one rank's block. The configured extent is split under strong scaling
/// (divisibility is checked by [`Config::validate`]) and taken verbatim under weak
/// scaling.
pub fn local_extent(
    rows: u64, cols: u64, proc_rows: u32, proc_cols: u32, scaling: Scaling,
) -> (u64, u64) {
    match scaling {
        Scaling::Strong => (rows / u64::from(proc_rows), cols / u64::from(proc_cols)),
        Scaling::Weak => (rows, cols),
    }
}

/// Extent of the global 2D array the datasets are created with.
pub fn global_extent(
    rows: u64, cols: u64, proc_rows: u32, proc_cols: u32, scaling: Scaling,
) -> (u64, u64) {
    let (my_rows, my_cols) = local_extent(rows, cols, proc_rows, proc_cols, scaling);
    (my_rows * u64::from(proc_rows), my_cols * u64::from(proc_cols))
}

/// Computes the block owned by the rank at `coord`.
pub fn decompose(
    rows: u64, cols: u64, proc_rows: u32, proc_cols: u32, coord: ProcCoord, scaling: Scaling,
) -> LocalBlock {
    let (my_rows, my_cols) = local_extent(rows, cols, proc_rows, proc_cols, scaling);
    LocalBlock {
        offset_row: u64::from(coord.row) * my_rows,
        offset_col: u64::from(coord.col) * my_cols,
        rows: my_rows,
        cols: my_cols,
    }
}

/// Everything a rank knows about its place in the global array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decomposition {
    pub coord: ProcCoord,
    pub block: LocalBlock,
    /// Global (rows, cols) of every dataset plane.
    pub global: (u64, u64),
}

impl Decomposition {
    pub fn new(config: &Config, rank: usize) -> Self {
        let coord = ProcCoord::from_rank(rank, config.proc_cols);
        let block = decompose(
            config.rows,
            config.cols,
            config.proc_rows,
            config.proc_cols,
            coord,
            config.scaling,
        );
        let global = global_extent(
            config.rows,
            config.cols,
            config.proc_rows,
            config.proc_cols,
            config.scaling,
        );
        Self { coord, block, global }
    }
}
