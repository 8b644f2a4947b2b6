use mpi::collective::{CommunicatorCollectives, Root, SystemOperation};
use mpi::raw::AsRaw;
use mpi::topology::{Communicator, SimpleCommunicator};

use super::Comm;
use crate::error::Result;

/// An MPI communicator.
///
/// MPI failures inside a collective abort the job through the default error handler,
/// so the collectives here only fail on invalid arguments.
pub struct World {
    comm: SimpleCommunicator,
}

impl World {
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self { comm }
    }

    /// The raw communicator handed to the MPI-IO file driver.
    pub fn raw(&self) -> mpi_sys::MPI_Comm {
        self.comm.as_raw()
    }
}

impl Comm for World {
    fn rank(&self) -> usize {
        self.comm.rank() as _
    }

    fn size(&self) -> usize {
        self.comm.size() as _
    }

    fn barrier(&self) -> Result<()> {
        self.comm.barrier();
        Ok(())
    }

    fn broadcast_bytes(&self, root: usize, buf: &mut Vec<u8>) -> Result<()> {
        ensure!(root < self.size(), Collective: "broadcast root {} outside of group", root);
        let process = self.comm.process_at_rank(root as _);
        let mut len = buf.len() as u64;
        process.broadcast_into(&mut len);
        buf.resize(len as usize, 0);
        process.broadcast_into(&mut buf[..]);
        Ok(())
    }

    fn reduce_min_max(&self, root: usize, values: &[f64]) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        ensure!(root < self.size(), Collective: "reduction root {} outside of group", root);
        let process = self.comm.process_at_rank(root as _);
        if self.rank() == root {
            let mut min = vec![0.; values.len()];
            let mut max = vec![0.; values.len()];
            process.reduce_into_root(values, &mut min[..], SystemOperation::min());
            process.reduce_into_root(values, &mut max[..], SystemOperation::max());
            Ok(Some((min, max)))
        } else {
            process.reduce_into(values, SystemOperation::min());
            process.reduce_into(values, SystemOperation::max());
            Ok(None)
        }
    }

    fn wtime(&self) -> f64 {
        mpi::time()
    }

    fn abort(&self, code: i32) -> ! {
        self.comm.abort(code)
    }
}
