//! Group communication used by the driver.
//!
//! The benchmark only needs a handful of collectives: barriers around the timed phases,
//! a byte broadcast for the configuration and a min/max reduction of the per-rank
//! timings. [`World`] provides them over MPI; [`LocalComm`] runs a group of threads in
//! one process.

use crate::error::Result;

mod local;
#[cfg(feature = "mpio")]
mod world;

pub use self::local::LocalComm;
#[cfg(feature = "mpio")]
pub use self::world::World;

/// Rank that loads the configuration, receives the reductions and writes the report.
pub const ROOT: usize = 0;

/// A process group. Every collective must be entered by all ranks in the same order.
pub trait Comm {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    fn barrier(&self) -> Result<()>;

    /// Replaces `buf` on every rank with the contents it has on `root`.
    fn broadcast_bytes(&self, root: usize, buf: &mut Vec<u8>) -> Result<()>;

    /// Element-wise minimum and maximum of `values` across the group.
    ///
    /// Every rank passes a vector of the same length; only `root` receives the result.
    fn reduce_min_max(&self, root: usize, values: &[f64]) -> Result<Option<(Vec<f64>, Vec<f64>)>>;

    /// Wall-clock time in seconds, monotonic within a run.
    fn wtime(&self) -> f64;

    /// Terminates every rank of the group.
    fn abort(&self, code: i32) -> !;
}
