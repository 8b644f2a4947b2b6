//! The read phase.

use std::path::Path;

use ndarray::{Array2, ArrayView2};

use crate::comm::Comm;
use crate::decomposition::LocalBlock;
use crate::error::Result;
use crate::layout::DatasetPlan;
use crate::storage::Storage;
use crate::timing::accumulate;

/// Per-rank times of one read phase, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReadTimes {
    /// Sum over all read calls.
    pub read: f64,
}

/// Reads back every (step, array) plane of this rank's block from an existing container.
///
/// Uses the same plan and block as the write phase, so each rank reads exactly the
/// hyperslabs it wrote.
pub struct ReadTest<'a, S> {
    storage: &'a S,
    plan: &'a DatasetPlan,
    block: LocalBlock,
    path: &'a Path,
}

impl<'a, S: Storage> ReadTest<'a, S> {
    pub fn new(storage: &'a S, plan: &'a DatasetPlan, block: LocalBlock, path: &'a Path) -> Self {
        Self { storage, plan, block, path }
    }

    /// Runs the phase, discarding what is read.
    pub fn run<C: Comm + ?Sized>(&self, comm: &C) -> Result<ReadTimes> {
        self.run_with(comm, |_, _, _| {})
    }

    /// Runs the phase, handing each plane read to `inspect` outside the timed region.
    pub fn run_with<C, F>(&self, comm: &C, mut inspect: F) -> Result<ReadTimes>
    where
        C: Comm + ?Sized,
        F: FnMut(u32, u32, ArrayView2<f64>),
    {
        let storage = self.storage;
        let mut times = ReadTimes::default();

        let file = storage.open_file(self.path)?;
        let datasets = self
            .plan
            .datasets
            .iter()
            .map(|spec| storage.open_dataset(&file, &spec.name))
            .collect::<Result<Vec<_>>>()?;

        let mut buf = Array2::zeros(self.block.shape());
        for (step, array) in self.plan.iter() {
            let placement = self.plan.locate(step, array);
            let slab = placement.hyperslab(&self.block);
            let selection = storage.select(&datasets[placement.dataset], &slab)?;
            accumulate(comm, &mut times.read, || storage.read(&selection, buf.view_mut()))?;
            inspect(step, array, buf.view());
        }

        drop(datasets);
        storage.close(file)?;
        Ok(times)
    }
}
