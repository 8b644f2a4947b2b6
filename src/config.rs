//! Benchmark configuration.
//!
//! The configuration is loaded and checked once by the root rank and then broadcast to
//! the whole group (see [`crate::driver::broadcast_config`]). The on-disk format is a
//! flat TOML table:
//!
//! ```toml
//! steps = 20
//! arrays = 500
//! rows = 100
//! cols = 200
//! scaling = "weak"
//! proc-rows = 1
//! proc-cols = 1
//! slowest-dimension = "step"
//! rank = 4
//! alignment-increment = 1
//! alignment-threshold = 0
//! layout = "contiguous"
//! fill-values = false
//! mpi-io = "independent"
//! libver-bound-low = "earliest"
//! libver-bound-high = "latest"
//! hdf5-file = "hdf5_iotest.h5"
//! csv-file = "hdf5_iotest.csv"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "hdf5_iotest.toml";

/// How the global array grows with the process grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    /// The configured extent is the global extent, split across the grid.
    Strong,
    /// The configured extent is each rank's block; the global extent grows with the grid.
    Weak,
}

/// Which logical axis is outermost: the step index or the array index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowestDimension {
    Step,
    Array,
}

/// On-disk storage layout of each dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Contiguous,
    Chunked,
}

/// MPI-IO transfer mode for raw data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// All ranks take part in each transfer.
    Collective,
    /// Each rank transfers on its own.
    Independent,
}

/// File format compatibility bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibVer {
    Earliest,
    V18,
    V110,
    V112,
    Latest,
}

macro_rules! impl_names {
    ($ty:ident { $($variant:ident => $name:expr),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    _ => fail!(
                        Config: "invalid {} '{}' (expected one of: {})",
                        stringify!($ty), s, [$($name),+].join(", ")
                    ),
                }
            }
        }
    };
}

impl_names!(Scaling { Strong => "strong", Weak => "weak" });
impl_names!(SlowestDimension { Step => "step", Array => "array" });
impl_names!(Layout { Contiguous => "contiguous", Chunked => "chunked" });
impl_names!(IoMode { Collective => "collective", Independent => "independent" });
impl_names!(LibVer {
    Earliest => "earliest",
    V18 => "v18",
    V110 => "v110",
    V112 => "v112",
    Latest => "latest",
});

/// Complete benchmark configuration, identical on every rank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Number of timed write/read iterations.
    pub steps: u32,
    /// Number of equally shaped arrays written per step.
    pub arrays: u32,
    pub rows: u64,
    #[serde(alias = "columns")]
    pub cols: u64,
    pub scaling: Scaling,
    #[serde(alias = "process-rows")]
    pub proc_rows: u32,
    #[serde(alias = "process-columns")]
    pub proc_cols: u32,
    pub slowest_dimension: SlowestDimension,
    /// Dimensionality of the datasets in the container (2, 3 or 4).
    #[serde(alias = "dataset-rank")]
    pub rank: u32,
    pub alignment_increment: u64,
    pub alignment_threshold: u64,
    pub layout: Layout,
    pub fill_values: bool,
    pub mpi_io: IoMode,
    pub libver_bound_low: LibVer,
    pub libver_bound_high: LibVer,
    pub hdf5_file: PathBuf,
    pub csv_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps: 20,
            arrays: 500,
            rows: 100,
            cols: 200,
            scaling: Scaling::Weak,
            proc_rows: 1,
            proc_cols: 1,
            slowest_dimension: SlowestDimension::Step,
            rank: 4,
            alignment_increment: 1,
            alignment_threshold: 0,
            layout: Layout::Contiguous,
            fill_values: false,
            mpi_io: IoMode::Independent,
            libver_bound_low: LibVer::Earliest,
            libver_bound_high: LibVer::Latest,
            hdf5_file: "hdf5_iotest.h5".into(),
            csv_file: "hdf5_iotest.csv".into(),
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl Config {
    /// Loads the configuration file; does not check it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("can't load '{}': {}", path.display(), err)))?;
        text.parse()
    }

    /// Checks each field on its own: counts and extents positive, a supported dataset
    /// rank and ordered compatibility bounds.
    pub fn sanity_check(&self) -> Result<()> {
        ensure!(self.steps > 0, Config: "steps must be positive");
        ensure!(self.arrays > 0, Config: "arrays must be positive");
        ensure!(self.rows > 0, Config: "rows must be positive");
        ensure!(self.cols > 0, Config: "cols must be positive");
        ensure!(self.proc_rows > 0, Config: "proc-rows must be positive");
        ensure!(self.proc_cols > 0, Config: "proc-cols must be positive");
        ensure!(self.alignment_increment > 0, Config: "alignment-increment must be positive");
        ensure!(
            (2..=4).contains(&self.rank),
            Config: "rank must be 2, 3 or 4, got {}",
            self.rank
        );
        ensure!(
            self.libver_bound_low <= self.libver_bound_high,
            Config: "libver-bound-low ({}) is above libver-bound-high ({})",
            self.libver_bound_low,
            self.libver_bound_high
        );
        ensure!(!self.hdf5_file.as_os_str().is_empty(), Config: "hdf5-file must not be empty");
        ensure!(!self.csv_file.as_os_str().is_empty(), Config: "csv-file must not be empty");
        Ok(())
    }

    /// Checks the configuration against a process group of `size` ranks.
    pub fn validate(&self, size: usize) -> Result<()> {
        self.sanity_check()?;
        let grid = self.proc_rows as usize * self.proc_cols as usize;
        ensure!(
            grid == size,
            Config: "process grid {}x{} needs {} ranks, got {}",
            self.proc_rows,
            self.proc_cols,
            grid,
            size
        );
        if self.scaling == Scaling::Strong {
            ensure!(
                self.rows % u64::from(self.proc_rows) == 0,
                Config: "rows ({}) not divisible by proc-rows ({}) under strong scaling",
                self.rows,
                self.proc_rows
            );
            ensure!(
                self.cols % u64::from(self.proc_cols) == 0,
                Config: "cols ({}) not divisible by proc-cols ({}) under strong scaling",
                self.cols,
                self.proc_cols
            );
        }
        Ok(())
    }
}
