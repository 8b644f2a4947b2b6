//! The storage layer the benchmark drives.
//!
//! [`Storage`] is the black-box capability the phases need: create or open the
//! container, create or open datasets, select a hyperslab and move a 2D block of
//! doubles in or out of it. [`H5Storage`] is the real thing; [`MemStorage`] keeps
//! everything in process memory so a group of threads can run the phases in tests.

use std::path::Path;

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::error::Result;
use crate::layout::DatasetSpec;

pub mod h5;
pub mod mem;

pub use self::h5::{H5Storage, Transfer};
pub use self::mem::MemStorage;

/// A rectangular selection: `count[i]` elements starting at `start[i]` on each axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Hyperslab {
    pub start: Vec<u64>,
    pub count: Vec<u64>,
}

impl Hyperslab {
    pub fn new(start: Vec<u64>, count: Vec<u64>) -> Self {
        debug_assert_eq!(start.len(), count.len());
        Self { start, count }
    }

    pub fn ndim(&self) -> usize {
        self.start.len()
    }

    /// Number of selected elements.
    pub fn len(&self) -> usize {
        self.count.iter().product::<u64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the selection lies within a dataset of the given shape.
    pub fn fits(&self, shape: &[u64]) -> bool {
        shape.len() == self.ndim()
            && self.start.iter().zip(&self.count).zip(shape).all(|((s, c), n)| s + c <= *n)
    }
}

/// Container and dataset operations used by the write and read phases.
///
/// Every method is called by every rank in the same order; with a collective transfer
/// mode the backend may require that `write` and `read` are entered by all ranks.
pub trait Storage {
    type File;
    type Dataset;
    /// A dataset together with a selected hyperslab, ready for a transfer.
    type Selection;

    /// Creates a new container; fails if one already exists at `path`.
    fn create_file(&self, path: &Path) -> Result<Self::File>;

    /// Opens an existing container read-only.
    fn open_file(&self, path: &Path) -> Result<Self::File>;

    fn create_group(&self, file: &Self::File, name: &str) -> Result<()>;

    /// Creates an (uninitialized) dataset of doubles.
    fn create_dataset(&self, file: &Self::File, spec: &DatasetSpec) -> Result<Self::Dataset>;

    fn open_dataset(&self, file: &Self::File, name: &str) -> Result<Self::Dataset>;

    fn select(&self, dataset: &Self::Dataset, slab: &Hyperslab) -> Result<Self::Selection>;

    /// Writes `data` into the selection; the block shape must match the selected extent.
    fn write(&self, selection: &Self::Selection, data: ArrayView2<f64>) -> Result<()>;

    fn read(&self, selection: &Self::Selection, out: ArrayViewMut2<f64>) -> Result<()>;

    /// Closes the container once every dataset handle has been released.
    fn close(&self, file: Self::File) -> Result<()>;

    /// Size in bytes of the closed container at `path`.
    fn file_size(&self, path: &Path) -> Result<u64>;

    /// Human-readable version of the storage library and its format bounds.
    fn library_version(&self) -> String;
}
