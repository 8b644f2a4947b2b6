//! HDF5 backend.
//!
//! Containers and datasets go through the high-level `hdf5` API. Transfers use the raw
//! `H5Dwrite` / `H5Dread` calls so that a single dataset-transfer property list, built
//! once from the configured [`Transfer`] strategy, is applied to every call.

use std::ffi::CString;
use std::path::Path;

use ndarray::{ArrayView2, ArrayViewMut2};
use tracing::debug;

use hdf5::dataset::FillTime;
use hdf5::plist::{FileAccess, FileAccessBuilder};
use hdf5::{Dataset, Dataspace, File, PropertyList, SliceOrIndex};
use hdf5_sys::h5d::{H5Dread, H5Dwrite};
use hdf5_sys::h5f::{H5F_libver_t, H5Fcreate, H5Fopen, H5F_ACC_EXCL, H5F_ACC_RDONLY};
use hdf5_sys::h5p::{H5Pcreate, H5Pset_libver_bounds, H5P_DEFAULT};

use super::{Hyperslab, Storage};
use crate::config::{Config, IoMode, LibVer};
use crate::error::Result;
use crate::layout::DatasetSpec;

/// How raw data moves between the ranks' buffers and the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transfer {
    /// Every rank of the file's communicator takes part in each transfer, letting the
    /// MPI-IO layer aggregate the requests.
    Collective,
    /// Each rank issues its own transfer without synchronizing with the others.
    Independent,
}

impl From<IoMode> for Transfer {
    fn from(mode: IoMode) -> Self {
        match mode {
            IoMode::Collective => Self::Collective,
            IoMode::Independent => Self::Independent,
        }
    }
}

impl Transfer {
    /// Builds the dataset-transfer property list for this strategy.
    fn plist(self) -> Result<PropertyList> {
        let id = h5call!(H5Pcreate(*hdf5::globals::H5P_DATASET_XFER))?;
        let xfer = h5lock!(hdf5::from_id::<PropertyList>(id))?;
        cfg_if::cfg_if! {
            if #[cfg(feature = "mpio")] {
                use hdf5_sys::h5p::{H5FD_mpio_xfer_t, H5Pset_dxpl_mpio};
                let mode = match self {
                    Self::Collective => H5FD_mpio_xfer_t::H5FD_MPIO_COLLECTIVE,
                    Self::Independent => H5FD_mpio_xfer_t::H5FD_MPIO_INDEPENDENT,
                };
                h5call!(H5Pset_dxpl_mpio(xfer.id(), mode))?;
            } else {
                if self == Self::Collective {
                    tracing::warn!("collective transfers need MPI-IO; running independently");
                }
            }
        }
        Ok(xfer)
    }
}

/// The newest object format the linked library writes.
#[cfg(hdf5_1_14_0)]
pub const LATEST_FORMAT: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V114;
/// The newest object format the linked library writes.
#[cfg(all(hdf5_1_12_0, not(hdf5_1_14_0)))]
pub const LATEST_FORMAT: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V112;
/// The newest object format the linked library writes.
#[cfg(all(hdf5_1_10_2, not(hdf5_1_12_0)))]
pub const LATEST_FORMAT: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V110;
/// The newest object format the linked library writes.
#[cfg(not(hdf5_1_10_2))]
pub const LATEST_FORMAT: H5F_libver_t = hdf5_sys::h5f::H5F_LIBVER_LATEST;

fn object_format(version: LibVer) -> H5F_libver_t {
    match version {
        LibVer::Earliest => H5F_libver_t::H5F_LIBVER_EARLIEST,
        #[cfg(hdf5_1_10_2)]
        LibVer::V18 => H5F_libver_t::H5F_LIBVER_V18,
        #[cfg(hdf5_1_10_2)]
        LibVer::V110 => H5F_libver_t::H5F_LIBVER_V110,
        #[cfg(hdf5_1_12_0)]
        LibVer::V112 => H5F_libver_t::H5F_LIBVER_V112,
        // versions the linked library predates
        _ => LATEST_FORMAT,
    }
}

/// Resolves configured format bounds against the linked library.
///
/// A version newer than the library maps to its latest format, and `earliest` as the
/// upper bound leaves the upper bound at the latest format.
pub fn libver_bounds(low: LibVer, high: LibVer) -> (H5F_libver_t, H5F_libver_t) {
    let high = match high {
        LibVer::Earliest => LATEST_FORMAT,
        version => object_format(version),
    };
    (object_format(low), high)
}

/// A dataset with a selected hyperslab and the matching in-memory dataspace.
pub struct H5Selection {
    dataset: Dataset,
    file_space: Dataspace,
    mem_space: Dataspace,
    shape: [usize; 2],
}

/// Storage over an HDF5 container, optionally through the MPI-IO file driver.
pub struct H5Storage {
    transfer: Transfer,
    xfer: PropertyList,
    fapl: FileAccessBuilder,
    libver: (LibVer, LibVer),
    bounds: (H5F_libver_t, H5F_libver_t),
}

impl H5Storage {
    /// Storage with the default (single process) file driver.
    pub fn new(config: &Config) -> Result<Self> {
        let transfer = Transfer::from(config.mpi_io);
        let mut fapl = FileAccessBuilder::new();
        if config.alignment_increment > 1 {
            fapl.alignment(config.alignment_threshold, config.alignment_increment);
        }
        let libver = (config.libver_bound_low, config.libver_bound_high);
        let bounds = libver_bounds(libver.0, libver.1);
        ensure!(
            bounds.0 <= bounds.1,
            Config: "format bounds {}..{} resolve to an empty range",
            libver.0,
            libver.1
        );
        debug!(?transfer, ?bounds, "HDF5 storage");
        Ok(Self { transfer, xfer: transfer.plist()?, fapl, libver, bounds })
    }

    /// Storage opening every container with the MPI-IO driver on `comm`.
    #[cfg(feature = "mpio")]
    pub fn with_mpio(config: &Config, comm: mpi_sys::MPI_Comm) -> Result<Self> {
        let mut storage = Self::new(config)?;
        storage.fapl.mpio(comm, None);
        Ok(storage)
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    /// Format bounds applied to every container.
    pub fn bounds(&self) -> (H5F_libver_t, H5F_libver_t) {
        self.bounds
    }

    fn access_plist(&self) -> Result<FileAccess> {
        let fapl = self.fapl.finish()?;
        let (low, high) = self.bounds;
        h5call!(H5Pset_libver_bounds(fapl.id(), low, high))?;
        Ok(fapl)
    }

    fn open_as(&self, path: &Path, create: bool) -> Result<File> {
        let name = match path.to_str().and_then(|name| CString::new(name).ok()) {
            Some(name) => name,
            None => fail!(Storage: "invalid file name: {:?}", path),
        };
        let fapl = self.access_plist()?;
        let id = if create {
            h5call!(H5Fcreate(name.as_ptr(), H5F_ACC_EXCL, H5P_DEFAULT, fapl.id()))?
        } else {
            h5call!(H5Fopen(name.as_ptr(), H5F_ACC_RDONLY, fapl.id()))?
        };
        Ok(h5lock!(hdf5::from_id::<File>(id))?)
    }
}

impl Storage for H5Storage {
    type File = File;
    type Dataset = Dataset;
    type Selection = H5Selection;

    fn create_file(&self, path: &Path) -> Result<File> {
        self.open_as(path, true)
    }

    fn open_file(&self, path: &Path) -> Result<File> {
        self.open_as(path, false)
    }

    fn create_group(&self, file: &File, name: &str) -> Result<()> {
        file.create_group(name)?;
        Ok(())
    }

    fn create_dataset(&self, file: &File, spec: &DatasetSpec) -> Result<Dataset> {
        let shape: Vec<usize> = spec.shape.iter().map(|&n| n as _).collect();
        let mut builder = file.new_dataset_builder().empty::<f64>().shape(shape);
        builder = match spec.chunk {
            Some(ref chunk) => builder.chunk(chunk.iter().map(|&n| n as usize).collect::<Vec<_>>()),
            None => builder.no_chunk(),
        };
        if !spec.fill_values {
            builder = builder.fill_time(FillTime::Never);
        }
        Ok(builder.create(spec.name.as_str())?)
    }

    fn open_dataset(&self, file: &File, name: &str) -> Result<Dataset> {
        Ok(file.dataset(name)?)
    }

    fn select(&self, dataset: &Dataset, slab: &Hyperslab) -> Result<H5Selection> {
        let shape: Vec<u64> = dataset.shape().iter().map(|&n| n as _).collect();
        ensure!(
            slab.ndim() >= 2 && slab.fits(&shape),
            Storage: "hyperslab {:?} outside of dataset {:?}",
            slab,
            dataset.name()
        );
        let slices: Vec<SliceOrIndex> = slab
            .start
            .iter()
            .zip(&slab.count)
            .map(|(&start, &count)| SliceOrIndex::SliceCount {
                start: start as _,
                step: 1,
                count: count as _,
                block: 1,
            })
            .collect();
        let file_space = dataset.space()?.select(hdf5::Hyperslab::from(slices))?;
        let n = slab.ndim();
        let shape = [slab.count[n - 2] as usize, slab.count[n - 1] as usize];
        let mem_space = Dataspace::try_new(shape.to_vec())?;
        Ok(H5Selection { dataset: dataset.clone(), file_space, mem_space, shape })
    }

    fn write(&self, selection: &H5Selection, data: ArrayView2<f64>) -> Result<()> {
        ensure!(
            data.shape() == selection.shape,
            Storage: "buffer shape {:?} does not match selection {:?}",
            data.shape(),
            selection.shape
        );
        let data = data.as_standard_layout();
        h5call!(H5Dwrite(
            selection.dataset.id(),
            *hdf5::globals::H5T_NATIVE_DOUBLE,
            selection.mem_space.id(),
            selection.file_space.id(),
            self.xfer.id(),
            data.as_ptr().cast(),
        ))?;
        Ok(())
    }

    fn read(&self, selection: &H5Selection, mut out: ArrayViewMut2<f64>) -> Result<()> {
        ensure!(
            out.shape() == selection.shape,
            Storage: "buffer shape {:?} does not match selection {:?}",
            out.shape(),
            selection.shape
        );
        ensure!(out.is_standard_layout(), Storage: "read buffer must be contiguous");
        h5call!(H5Dread(
            selection.dataset.id(),
            *hdf5::globals::H5T_NATIVE_DOUBLE,
            selection.mem_space.id(),
            selection.file_space.id(),
            self.xfer.id(),
            out.as_mut_ptr().cast(),
        ))?;
        Ok(())
    }

    fn close(&self, file: File) -> Result<()> {
        file.flush()?;
        drop(file);
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(File::open(path)?.size())
    }

    fn library_version(&self) -> String {
        let (major, minor, release) = hdf5::library_version();
        format!(
            "HDF5 library version {}.{}.{}[low={},high={}]",
            major, minor, release, self.libver.0, self.libver.1
        )
    }
}
