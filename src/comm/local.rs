use std::process;
use std::sync::{Arc, Barrier};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::error;

use super::Comm;
use crate::error::Result;

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    bytes: Mutex<Vec<u8>>,
    slots: Mutex<Vec<Vec<f64>>>,
    epoch: Instant,
}

fn min_max(slots: &[Vec<f64>], len: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    ensure!(
        slots.iter().all(|v| v.len() == len),
        Collective: "reduction vectors differ in length"
    );
    let mut min = vec![f64::INFINITY; len];
    let mut max = vec![f64::NEG_INFINITY; len];
    for slot in slots {
        for (i, &x) in slot.iter().enumerate() {
            min[i] = min[i].min(x);
            max[i] = max[i].max(x);
        }
    }
    Ok((min, max))
}

/// One rank of a group of threads sharing a process.
///
/// A rank that leaves a collective early (e.g. on an error) leaves the others waiting,
/// same as under MPI; failures must be uniform across the group.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl LocalComm {
    /// Creates the ranks of a group of `size`, to be moved into one thread each.
    pub fn group(size: usize) -> Vec<Self> {
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            bytes: Mutex::new(vec![]),
            slots: Mutex::new(vec![vec![]; size]),
            epoch: Instant::now(),
        });
        (0..size).map(|rank| Self { rank, size, shared: Arc::clone(&shared) }).collect()
    }

    /// A group of a single rank.
    pub fn solo() -> Self {
        Self::group(1).remove(0)
    }
}

impl Comm for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn broadcast_bytes(&self, root: usize, buf: &mut Vec<u8>) -> Result<()> {
        ensure!(root < self.size, Collective: "broadcast root {} outside of group", root);
        if self.rank == root {
            self.shared.bytes.lock().clone_from(buf);
        }
        self.barrier()?;
        if self.rank != root {
            buf.clone_from(&self.shared.bytes.lock());
        }
        // keep the root from overwriting the payload before everyone has copied it
        self.barrier()
    }

    fn reduce_min_max(&self, root: usize, values: &[f64]) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        ensure!(root < self.size, Collective: "reduction root {} outside of group", root);
        self.shared.slots.lock()[self.rank] = values.to_vec();
        self.barrier()?;
        let result = if self.rank == root {
            min_max(&self.shared.slots.lock(), values.len()).map(Some)
        } else {
            Ok(None)
        };
        // the root releases the others even when the reduction fails
        self.barrier()?;
        result
    }

    fn wtime(&self) -> f64 {
        self.shared.epoch.elapsed().as_secs_f64()
    }

    fn abort(&self, code: i32) -> ! {
        error!(rank = self.rank, code, "aborting");
        process::exit(code)
    }
}
