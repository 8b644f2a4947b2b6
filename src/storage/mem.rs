//! In-memory storage shared by the ranks of a [`LocalComm`](crate::comm::LocalComm) group.
//!
//! Container creation is treated as a collective: each rank joins the container once, and
//! an exclusive create only fails for a rank that has already created it. Groups and
//! datasets created by several ranks resolve to the same object.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{ArrayView2, ArrayViewMut2};
use parking_lot::Mutex;

use super::{Hyperslab, Storage};
use crate::error::Result;
use crate::layout::DatasetSpec;

#[derive(Debug)]
struct Buffer {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl Buffer {
    fn new(shape: &[u64]) -> Self {
        let len = shape.iter().product::<u64>() as usize;
        Self { shape: shape.to_vec(), data: vec![0.0; len] }
    }

    /// Flat offsets of every row of a hyperslab, in row-major order.
    fn rows<'a>(&'a self, slab: &'a Hyperslab) -> impl Iterator<Item = usize> + 'a {
        let ndim = self.shape.len();
        let strides: Vec<u64> = (0..ndim).map(|i| self.shape[i + 1..].iter().product()).collect();
        let base: u64 = slab.start.iter().zip(&strides).map(|(s, st)| s * st).sum();
        let (rows, row_stride) = (slab.count[ndim - 2], strides[ndim - 2]);
        (0..rows).map(move |r| (base + r * row_stride) as usize)
    }
}

#[derive(Debug, Default)]
struct Container {
    creators: HashSet<usize>,
    groups: HashSet<String>,
    datasets: HashMap<String, Arc<Mutex<Buffer>>>,
}

impl Container {
    fn num_elements(&self) -> u64 {
        self.datasets.values().map(|ds| ds.lock().data.len() as u64).sum()
    }
}

/// An open container.
#[derive(Clone, Debug)]
pub struct MemFile {
    container: Arc<Mutex<Container>>,
    writable: bool,
}

/// An open dataset.
#[derive(Clone, Debug)]
pub struct MemDataset {
    name: String,
    buffer: Arc<Mutex<Buffer>>,
    writable: bool,
}

/// A dataset with a selected hyperslab.
#[derive(Clone, Debug)]
pub struct MemSelection {
    dataset: MemDataset,
    slab: Hyperslab,
}

impl MemSelection {
    fn shape(&self) -> [usize; 2] {
        let n = self.slab.ndim();
        [self.slab.count[n - 2] as _, self.slab.count[n - 1] as _]
    }
}

/// Storage keeping containers in process memory; clones share the same containers.
#[derive(Clone, Debug, Default)]
pub struct MemStorage {
    rank: usize,
    files: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<Container>>>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view of the same containers used by `rank`.
    pub fn for_rank(&self, rank: usize) -> Self {
        Self { rank, files: Arc::clone(&self.files) }
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Removes a container, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.lock().remove(path).is_some()
    }

    /// Copies out the whole contents of a dataset in row-major order.
    pub fn contents(&self, path: &Path, name: &str) -> Option<(Vec<u64>, Vec<f64>)> {
        let files = self.files.lock();
        let container = files.get(path)?.lock();
        let buffer = container.datasets.get(name)?.lock();
        Some((buffer.shape.clone(), buffer.data.clone()))
    }
}

impl Storage for MemStorage {
    type File = MemFile;
    type Dataset = MemDataset;
    type Selection = MemSelection;

    fn create_file(&self, path: &Path) -> Result<MemFile> {
        let container = Arc::clone(self.files.lock().entry(path.to_owned()).or_default());
        ensure!(
            container.lock().creators.insert(self.rank),
            Storage: "unable to create file {:?}: file exists",
            path
        );
        Ok(MemFile { container, writable: true })
    }

    fn open_file(&self, path: &Path) -> Result<MemFile> {
        match self.files.lock().get(path) {
            Some(container) => Ok(MemFile { container: Arc::clone(container), writable: false }),
            None => fail!(Storage: "unable to open file {:?}: no such file", path),
        }
    }

    fn create_group(&self, file: &MemFile, name: &str) -> Result<()> {
        ensure!(file.writable, Storage: "unable to create group {:?}: read-only file", name);
        file.container.lock().groups.insert(name.to_owned());
        Ok(())
    }

    fn create_dataset(&self, file: &MemFile, spec: &DatasetSpec) -> Result<MemDataset> {
        ensure!(file.writable, Storage: "unable to create dataset {:?}: read-only file", spec.name);
        let mut container = file.container.lock();
        if let Some((parent, _)) = spec.name.rsplit_once('/') {
            ensure!(
                container.groups.contains(parent),
                Storage: "unable to create dataset {:?}: no group {:?}",
                spec.name,
                parent
            );
        }
        let buffer = Arc::clone(
            container
                .datasets
                .entry(spec.name.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Buffer::new(&spec.shape)))),
        );
        ensure!(
            buffer.lock().shape == spec.shape,
            Storage: "dataset {:?} already exists with a different shape",
            spec.name
        );
        Ok(MemDataset { name: spec.name.clone(), buffer, writable: true })
    }

    fn open_dataset(&self, file: &MemFile, name: &str) -> Result<MemDataset> {
        match file.container.lock().datasets.get(name) {
            Some(buffer) => Ok(MemDataset {
                name: name.to_owned(),
                buffer: Arc::clone(buffer),
                writable: file.writable,
            }),
            None => fail!(Storage: "unable to open dataset {:?}: not found", name),
        }
    }

    fn select(&self, dataset: &MemDataset, slab: &Hyperslab) -> Result<MemSelection> {
        ensure!(
            slab.ndim() >= 2 && slab.fits(&dataset.buffer.lock().shape),
            Storage: "hyperslab {:?} outside of dataset {:?}",
            slab,
            dataset.name
        );
        ensure!(
            slab.count[..slab.ndim() - 2].iter().all(|&c| c == 1),
            Storage: "hyperslab {:?} spans more than one plane",
            slab
        );
        Ok(MemSelection { dataset: dataset.clone(), slab: slab.clone() })
    }

    fn write(&self, selection: &MemSelection, data: ArrayView2<f64>) -> Result<()> {
        ensure!(
            selection.dataset.writable,
            Storage: "unable to write dataset {:?}: read-only file",
            selection.dataset.name
        );
        ensure!(
            data.shape() == selection.shape(),
            Storage: "buffer shape {:?} does not match selection {:?}",
            data.shape(),
            selection.shape()
        );
        let mut buffer = selection.dataset.buffer.lock();
        let offsets: Vec<usize> = buffer.rows(&selection.slab).collect();
        for (offset, row) in offsets.into_iter().zip(data.rows()) {
            for (dst, src) in buffer.data[offset..offset + row.len()].iter_mut().zip(row) {
                *dst = *src;
            }
        }
        Ok(())
    }

    fn read(&self, selection: &MemSelection, mut out: ArrayViewMut2<f64>) -> Result<()> {
        ensure!(
            out.shape() == selection.shape(),
            Storage: "buffer shape {:?} does not match selection {:?}",
            out.shape(),
            selection.shape()
        );
        let buffer = selection.dataset.buffer.lock();
        for (offset, mut row) in buffer.rows(&selection.slab).zip(out.rows_mut()) {
            let len = row.len();
            row.iter_mut().zip(&buffer.data[offset..offset + len]).for_each(|(d, s)| *d = *s);
        }
        Ok(())
    }

    fn close(&self, _file: MemFile) -> Result<()> {
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        match self.files.lock().get(path) {
            Some(container) => Ok(8 * container.lock().num_elements()),
            None => fail!(Storage: "unable to open file {:?}: no such file", path),
        }
    }

    fn library_version(&self) -> String {
        "in-memory storage".into()
    }
}
