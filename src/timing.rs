//! Phase timers and the reduction of per-rank timings to group-wide bounds.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::comm::{Comm, ROOT};
use crate::error::Result;

/// Bytes in a mebibyte.
pub const MIB: f64 = 1024.0 * 1024.0;

/// Measures wall-clock time on the group's clock.
pub struct Stopwatch<'a, C: ?Sized> {
    comm: &'a C,
    start: f64,
}

impl<'a, C: Comm + ?Sized> Stopwatch<'a, C> {
    pub fn start(comm: &'a C) -> Self {
        Self { comm, start: comm.wtime() }
    }

    /// Seconds since the stopwatch was started.
    pub fn elapsed(&self) -> f64 {
        self.comm.wtime() - self.start
    }
}

/// Runs `func` and adds its wall time to `total`.
pub fn accumulate<C, T, F>(comm: &C, total: &mut f64, func: F) -> T
where
    C: Comm + ?Sized,
    F: FnOnce() -> T,
{
    let watch = Stopwatch::start(comm);
    let result = func();
    *total += watch.elapsed();
    result
}

/// A per-rank timing scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    /// The whole run, from after the configuration broadcast to the final barrier.
    Wall,
    /// Container creation, dataset creation, writes and close, plus the exit barrier.
    WritePhase,
    /// Container, group and dataset creation.
    Create,
    /// Write calls only.
    Write,
    ReadPhase,
    /// Read calls only.
    Read,
}

impl Metric {
    pub const ALL: [Self; 6] =
        [Self::Wall, Self::WritePhase, Self::Create, Self::Write, Self::ReadPhase, Self::Read];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wall => "wall",
            Self::WritePhase => "write-phase",
            Self::Create => "create",
            Self::Write => "write",
            Self::ReadPhase => "read-phase",
            Self::Read => "read",
        }
    }

    /// Whether the metric is a phase-level time, bounded by the wall time.
    pub fn is_phase(self) -> bool {
        matches!(self, Self::WritePhase | Self::ReadPhase)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per [`Metric`], in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timings([f64; 6]);

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        <[f64; 6]>::try_from(values).ok().map(Self)
    }
}

impl Index<Metric> for Timings {
    type Output = f64;

    fn index(&self, metric: Metric) -> &f64 {
        &self.0[metric as usize]
    }
}

impl IndexMut<Metric> for Timings {
    fn index_mut(&mut self, metric: Metric) -> &mut f64 {
        &mut self.0[metric as usize]
    }
}

/// Group-wide bounds of every metric, available on the root only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingStats {
    pub min: Timings,
    pub max: Timings,
}

impl TimingStats {
    /// Reduces the per-rank timings; every rank must call this, the root gets `Some`.
    pub fn reduce<C: Comm + ?Sized>(comm: &C, local: &Timings) -> Result<Option<Self>> {
        let reduced = comm.reduce_min_max(ROOT, local.as_slice())?;
        Ok(match reduced {
            Some((min, max)) => {
                let min = Timings::from_slice(&min);
                let max = Timings::from_slice(&max);
                match (min, max) {
                    (Some(min), Some(max)) => Some(Self { min, max }),
                    _ => fail!(Collective: "reduction returned {} metrics", local.as_slice().len()),
                }
            }
            None => None,
        })
    }

    pub fn min(&self, metric: Metric) -> f64 {
        self.min[metric]
    }

    pub fn max(&self, metric: Metric) -> f64 {
        self.max[metric]
    }

    /// Throughput bounds in MiB/s for moving `bytes` in the time given by `metric`.
    ///
    /// The slowest rank yields the lower bound and the fastest one the upper bound.
    pub fn rates(&self, metric: Metric, bytes: u64) -> (f64, f64) {
        (rate(bytes, self.max(metric)), rate(bytes, self.min(metric)))
    }
}

/// Throughput in MiB/s.
pub fn rate(bytes: u64, seconds: f64) -> f64 {
    bytes as f64 / (MIB * seconds)
}
