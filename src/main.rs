use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use hdf5_iotest::config::CONFIG_FILE;
use hdf5_iotest::report::ConfigReport;
use hdf5_iotest::{broadcast_config, Comm, Config, Driver, ErrorKind, H5Storage, Result, Storage};

/// Parallel HDF5 write/read throughput benchmark.
#[derive(Parser, Debug)]
#[command(name = "hdf5-iotest", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Container to write and read back, overriding `hdf5-file`
    #[arg(long, value_name = "PATH")]
    hdf5_file: Option<PathBuf>,

    /// Results file, overriding `csv-file`
    #[arg(long, value_name = "PATH")]
    csv_file: Option<PathBuf>,
}

impl Cli {
    fn load(&self) -> Result<Config> {
        let mut config = Config::from_file(&self.config)?;
        if let Some(ref path) = self.hdf5_file {
            config.hdf5_file = path.clone();
        }
        if let Some(ref path) = self.csv_file {
            config.csv_file = path.clone();
        }
        Ok(config)
    }
}

fn run<C, S, F>(comm: &C, cli: &Cli, open_storage: F) -> Result<()>
where
    C: Comm,
    S: Storage,
    F: FnOnce(&Config) -> Result<S>,
{
    let started = comm.wtime();
    let config = broadcast_config(comm, || cli.load())?;
    let storage = open_storage(&config)?;
    if comm.is_root() {
        println!("\n{}", storage.library_version());
        println!("{}", ConfigReport { config: &config, source: &cli.config });
    }
    if let Some(summary) = Driver::new(comm, &storage, &config).started_at(started).run()? {
        print!("{}", summary);
        summary.write_csv(&config.csv_file)?;
    }
    Ok(())
}

/// Configuration errors are seen by every rank and end the run cleanly; anything else
/// tears down the whole group.
fn finish<C: Comm>(comm: &C, result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.kind() == ErrorKind::Config => {
            if comm.is_root() {
                error!("{}", err);
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(rank = comm.rank(), "{}", err);
            comm.abort(1)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    cfg_if::cfg_if! {
        if #[cfg(feature = "mpio")] {
            let universe = match mpi::initialize() {
                Some(universe) => universe,
                None => {
                    error!("MPI has already been initialized");
                    return ExitCode::FAILURE;
                }
            };
            let world = hdf5_iotest::World::new(universe.world());
            let result = run(&world, &cli, |config| H5Storage::with_mpio(config, world.raw()));
            finish(&world, result)
        } else {
            let comm = hdf5_iotest::LocalComm::solo();
            let result = run(&comm, &cli, H5Storage::new);
            finish(&comm, result)
        }
    }
}
