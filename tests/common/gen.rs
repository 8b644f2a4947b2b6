use hdf5_iotest::config::{Config, Layout, Scaling, SlowestDimension};
use rand::prelude::{Rng, SliceRandom};

/// A small random configuration whose grid has `size` ranks.
#[allow(dead_code)]
pub fn gen_config<R: Rng + ?Sized>(rng: &mut R, size: u32) -> Config {
    let divisors: Vec<u32> = (1..=size).filter(|d| size % d == 0).collect();
    let proc_rows = *divisors.choose(rng).unwrap_or(&1);
    let proc_cols = size / proc_rows;
    let scaling = if rng.gen_bool(0.5) { Scaling::Strong } else { Scaling::Weak };
    let (rows, cols) = match scaling {
        Scaling::Strong => {
            (u64::from(proc_rows) * rng.gen_range(1..6), u64::from(proc_cols) * rng.gen_range(1..6))
        }
        Scaling::Weak => (rng.gen_range(1..6), rng.gen_range(1..6)),
    };
    Config {
        steps: rng.gen_range(1..4),
        arrays: rng.gen_range(1..4),
        rows,
        cols,
        scaling,
        proc_rows,
        proc_cols,
        slowest_dimension: *[SlowestDimension::Step, SlowestDimension::Array].choose(rng).unwrap(),
        rank: rng.gen_range(2..=4),
        layout: *[Layout::Contiguous, Layout::Chunked].choose(rng).unwrap(),
        ..Config::default()
    }
}
