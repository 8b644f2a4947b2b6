//! Parallel HDF5 I/O benchmark.
//!
//! Measures sustained write and read throughput of a group of processes, each owning one
//! block of a 2D process grid, moving `steps x arrays` planes of doubles in and out of a
//! single HDF5 container. Some of the knobs:
//!
//! - Strong or weak scaling of the global extent with the grid.
//! - Dataset rank 2, 3 or 4, with either the step or the array index outermost.
//! - Contiguous or chunked layout, fill-value allocation and alignment hints.
//! - Collective or independent MPI-IO transfers.
//!
//! Per-rank timings are reduced to group-wide min/max and reported by the root rank on the
//! console and as a CSV row. MPI support is enabled by the `mpio` feature and requires an
//! HDF5 library built with parallel support; without it the benchmark runs as a single
//! process over the default file driver.

#![cfg_attr(feature = "cargo-clippy", warn(clippy::all))]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::cast_possible_truncation))]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::cast_precision_loss))]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::module_name_repetitions))]
#![cfg_attr(feature = "cargo-clippy", allow(clippy::missing_errors_doc))]

#[cfg(all(feature = "mpio", not(h5_have_parallel)))]
compile_error!("Enabling \"mpio\" feature requires HDF5 library built with MPI support");

#[macro_use]
mod macros;

pub mod comm;
pub mod config;
pub mod decomposition;
pub mod driver;
pub mod error;
pub mod layout;
pub mod pattern;
pub mod read;
pub mod report;
pub mod storage;
pub mod timing;
pub mod write;

pub use crate::comm::{Comm, LocalComm, ROOT};
#[cfg(feature = "mpio")]
pub use crate::comm::World;
pub use crate::config::Config;
pub use crate::driver::{broadcast_config, Driver};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::report::Summary;
pub use crate::storage::{H5Storage, MemStorage, Storage};
