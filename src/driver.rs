//! Orchestration of a benchmark run across the process group.
//!
//! 1. The root loads and validates the configuration and broadcasts the outcome, so a
//!    bad configuration fails every rank alike instead of leaving the group waiting.
//! 2. Each rank derives its block and the shared dataset plan.
//! 3. The write and read phases run between barriers.
//! 4. The per-rank timings are reduced to min/max on the root, which alone builds the
//!    [`Summary`].

use bincode::Options;
use tracing::{debug, info};

use crate::comm::{Comm, ROOT};
use crate::config::Config;
use crate::decomposition::Decomposition;
use crate::error::{Error, Result};
use crate::layout::DatasetPlan;
use crate::read::ReadTest;
use crate::report::Summary;
use crate::storage::Storage;
use crate::timing::{Metric, Stopwatch, TimingStats, Timings};
use crate::write::WriteTest;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding().with_little_endian()
}

/// Distributes the configuration loaded by `load` on the root to every rank.
///
/// `load` is only called on the root; the loaded configuration is validated against the
/// group size before it is sent. When loading or validation fails, every rank returns
/// the same [`ErrorKind::Config`](crate::error::ErrorKind::Config) error.
pub fn broadcast_config<C, F>(comm: &C, load: F) -> Result<Config>
where
    C: Comm + ?Sized,
    F: FnOnce() -> Result<Config>,
{
    let mut payload = vec![];
    if comm.rank() == ROOT {
        let loaded: std::result::Result<Config, String> = load()
            .and_then(|config| config.validate(comm.size()).map(|_| config))
            .map_err(|err| err.message());
        payload = match codec().serialize(&loaded) {
            Ok(payload) => payload,
            Err(err) => {
                let failed: std::result::Result<Config, String> =
                    Err(format!("unable to distribute configuration: {err}"));
                codec().serialize(&failed)?
            }
        };
    }
    comm.broadcast_bytes(ROOT, &mut payload)?;
    let loaded: std::result::Result<Config, String> = codec().deserialize(&payload)?;
    loaded.map_err(Error::Config)
}

/// Runs both phases on one rank of the group.
pub struct Driver<'a, C: ?Sized, S> {
    comm: &'a C,
    storage: &'a S,
    config: &'a Config,
    started: f64,
}

impl<'a, C: Comm + ?Sized, S: Storage> Driver<'a, C, S> {
    /// The wall-clock metric starts counting here unless [`started_at`](Self::started_at)
    /// moves its origin.
    pub fn new(comm: &'a C, storage: &'a S, config: &'a Config) -> Self {
        Self { comm, storage, config, started: comm.wtime() }
    }

    /// Counts wall-clock time from `started`, a reading of [`Comm::wtime`] taken earlier
    /// (e.g. right after the group came up).
    pub fn started_at(mut self, started: f64) -> Self {
        self.started = started;
        self
    }

    /// Runs the benchmark; returns the summary on the root and `None` elsewhere.
    pub fn run(&self) -> Result<Option<Summary>> {
        let (comm, storage, config) = (self.comm, self.storage, self.config);
        let rank = comm.rank();
        let path = config.hdf5_file.as_path();

        let decomposition = Decomposition::new(config, rank);
        let plan = DatasetPlan::new(config);
        let block = decomposition.block;
        debug!(rank, coord = ?decomposition.coord, ?block, "decomposition");
        debug!(rank, datasets = plan.datasets.len(), groups = plan.groups.len(), "plan");

        let mut timings = Timings::new();

        comm.barrier()?;
        if comm.is_root() {
            info!("write phase");
        }
        let watch = Stopwatch::start(comm);
        let write = WriteTest::new(storage, &plan, block, path).run(comm)?;
        comm.barrier()?;
        timings[Metric::WritePhase] = watch.elapsed();
        timings[Metric::Create] = write.create;
        timings[Metric::Write] = write.write;

        if comm.is_root() {
            info!("read phase");
        }
        let watch = Stopwatch::start(comm);
        let read = ReadTest::new(storage, &plan, block, path).run(comm)?;
        comm.barrier()?;
        timings[Metric::ReadPhase] = watch.elapsed();
        timings[Metric::Read] = read.read;

        timings[Metric::Wall] = comm.wtime() - self.started;
        debug!(rank, ?timings, "local timings");

        let stats = TimingStats::reduce(comm, &timings)?;
        match stats {
            Some(stats) => {
                let file_size = storage.file_size(path)?;
                info!(file_size, "done");
                Ok(Some(Summary {
                    config: config.clone(),
                    stats,
                    file_size,
                    bytes: bytes_per_rank(config, &decomposition),
                }))
            }
            None => Ok(None),
        }
    }
}

/// Bytes each rank moves in one phase.
pub fn bytes_per_rank(config: &Config, decomposition: &Decomposition) -> u64 {
    let block = decomposition.block;
    u64::from(config.steps) * u64::from(config.arrays) * block.rows * block.cols * 8
}

#[cfg(test)]
pub mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::comm::LocalComm;
    use crate::error::ErrorKind;
    use crate::storage::MemStorage;

    #[test]
    pub fn test_broadcast_solo() {
        let comm = LocalComm::solo();
        let config = broadcast_config(&comm, || Ok(Config { steps: 7, ..Config::default() }));
        assert_eq!(config.unwrap().steps, 7);

        let err = broadcast_config(&comm, || "steps = 0".parse()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "configuration error: steps must be positive");

        let err = broadcast_config(&comm, || Config::from_file("/nonexistent.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[cfg(unix)]
    #[test]
    pub fn test_broadcast_unencodable() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let comm = LocalComm::solo();
        let hdf5_file = OsStr::from_bytes(b"bad\xff.h5").into();
        let err = broadcast_config(&comm, || Ok(Config { hdf5_file, ..Config::default() }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().starts_with("unable to distribute configuration"));
    }

    #[test]
    pub fn test_bytes_per_rank() {
        let config = Config { steps: 10, arrays: 2, rows: 100, cols: 100, ..Config::default() };
        assert_eq!(bytes_per_rank(&config, &Decomposition::new(&config, 0)), 1_600_000);
    }

    #[test]
    pub fn test_run_solo() {
        let config =
            Config { steps: 2, arrays: 3, rows: 4, cols: 5, rank: 3, ..Config::default() };
        let comm = LocalComm::solo();
        let storage = MemStorage::new();
        let summary = Driver::new(&comm, &storage, &config).run().unwrap().unwrap();
        assert_eq!(summary.file_size, 2 * 3 * 4 * 5 * 8);
        assert_eq!(summary.bytes, 2 * 3 * 4 * 5 * 8);
        assert_eq!(summary.stats.min, summary.stats.max);
        let wall = summary.stats.max(Metric::Wall);
        for metric in [Metric::WritePhase, Metric::ReadPhase] {
            assert!(summary.stats.max(metric) <= wall);
        }

        let storage = MemStorage::new();
        let driver = Driver::new(&comm, &storage, &config).started_at(comm.wtime() - 30.);
        let summary = driver.run().unwrap().unwrap();
        assert!(summary.stats.min(Metric::Wall) >= 30.);
    }
}
