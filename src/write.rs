//! The write phase.

use std::path::Path;

use ndarray::Array2;
use tracing::debug;

use crate::comm::Comm;
use crate::decomposition::LocalBlock;
use crate::error::Result;
use crate::layout::DatasetPlan;
use crate::pattern;
use crate::storage::Storage;
use crate::timing::{accumulate, Stopwatch};

/// Per-rank times of one write phase, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WriteTimes {
    /// Container, group and dataset creation.
    pub create: f64,
    /// Sum over all write calls.
    pub write: f64,
}

/// Creates the container and writes every (step, array) plane of this rank's block.
pub struct WriteTest<'a, S> {
    storage: &'a S,
    plan: &'a DatasetPlan,
    block: LocalBlock,
    path: &'a Path,
}

impl<'a, S: Storage> WriteTest<'a, S> {
    pub fn new(storage: &'a S, plan: &'a DatasetPlan, block: LocalBlock, path: &'a Path) -> Self {
        Self { storage, plan, block, path }
    }

    /// Runs the phase. Every rank of `comm` must call this; creation and (in collective
    /// mode) each write are collectives of the storage layer.
    pub fn run<C: Comm + ?Sized>(&self, comm: &C) -> Result<WriteTimes> {
        let storage = self.storage;
        let mut times = WriteTimes::default();

        let watch = Stopwatch::start(comm);
        let file = storage.create_file(self.path)?;
        for group in &self.plan.groups {
            storage.create_group(&file, group)?;
        }
        let datasets = self
            .plan
            .datasets
            .iter()
            .map(|spec| storage.create_dataset(&file, spec))
            .collect::<Result<Vec<_>>>()?;
        times.create = watch.elapsed();
        debug!(rank = comm.rank(), datasets = datasets.len(), "created {:?}", self.path);

        let mut buf = Array2::zeros(self.block.shape());
        for (step, array) in self.plan.iter() {
            pattern::fill(&mut buf, step, array, &self.block);
            let placement = self.plan.locate(step, array);
            let slab = placement.hyperslab(&self.block);
            let selection = storage.select(&datasets[placement.dataset], &slab)?;
            accumulate(comm, &mut times.write, || storage.write(&selection, buf.view()))?;
        }

        drop(datasets);
        storage.close(file)?;
        Ok(times)
    }
}
