use std::fs;

use hdf5::dataset::FillTime;
use hdf5_sys::h5f::H5F_libver_t;
use hdf5_sys::h5p::H5Pget_libver_bounds;
use ndarray::Array2;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use hdf5_iotest::config::{Config, IoMode, Layout, LibVer, SlowestDimension};
use hdf5_iotest::decomposition::Decomposition;
use hdf5_iotest::layout::DatasetPlan;
use hdf5_iotest::read::ReadTest;
use hdf5_iotest::report::CSV_HEADER;
use hdf5_iotest::storage::h5::{libver_bounds, LATEST_FORMAT};
use hdf5_iotest::storage::{H5Storage, Storage};
use hdf5_iotest::write::WriteTest;
use hdf5_iotest::{pattern, Driver, ErrorKind, LocalComm};

mod common;

fn small_config() -> Config {
    Config { steps: 3, arrays: 2, rows: 6, cols: 5, ..Config::default() }
}

#[test]
fn test_driver_roundtrip() {
    let dir = tempdir().unwrap();
    let comm = LocalComm::solo();
    for rank in 2..=4 {
        for slowest in [SlowestDimension::Step, SlowestDimension::Array] {
            for layout in [Layout::Contiguous, Layout::Chunked] {
                let name = format!("rank{}-{}-{}", rank, slowest, layout);
                let config = Config {
                    rank,
                    slowest_dimension: slowest,
                    layout,
                    fill_values: layout == Layout::Chunked,
                    hdf5_file: dir.path().join(format!("{}.h5", name)),
                    csv_file: dir.path().join(format!("{}.csv", name)),
                    ..small_config()
                };
                let storage = H5Storage::new(&config).unwrap();
                let summary = Driver::new(&comm, &storage, &config).run().unwrap().unwrap();
                assert!(summary.file_size >= 3 * 2 * 6 * 5 * 8, "{}", name);
                assert!(config.hdf5_file.exists());

                let plan = DatasetPlan::new(&config);
                let block = Decomposition::new(&config, 0).block;
                let mut planes = 0;
                ReadTest::new(&storage, &plan, block, &config.hdf5_file)
                    .run_with(&comm, |step, array, data| {
                        assert_eq!(data, pattern::block(step, array, &block));
                        planes += 1;
                    })
                    .unwrap();
                assert_eq!(planes, 6);

                let file = storage.open_file(&config.hdf5_file).unwrap();
                let expected = if config.fill_values { FillTime::IfSet } else { FillTime::Never };
                for spec in &plan.datasets {
                    let ds = storage.open_dataset(&file, &spec.name).unwrap();
                    assert_eq!(ds.dcpl().unwrap().fill_time(), expected, "{}", name);
                }
            }
        }
    }
}

#[test]
fn test_layout_on_disk() {
    let dir = tempdir().unwrap();
    let config = Config {
        rank: 2,
        slowest_dimension: SlowestDimension::Array,
        layout: Layout::Chunked,
        hdf5_file: dir.path().join("layout.h5"),
        ..small_config()
    };
    let storage = H5Storage::new(&config).unwrap();
    let plan = DatasetPlan::new(&config);
    let block = Decomposition::new(&config, 0).block;
    WriteTest::new(&storage, &plan, block, &config.hdf5_file).run(&LocalComm::solo()).unwrap();

    let file = hdf5::File::open(&config.hdf5_file).unwrap();
    let mut groups = file.member_names().unwrap();
    groups.sort();
    assert_eq!(groups, vec!["array=0", "array=1"]);
    let ds = file.dataset("array=1/step=2").unwrap();
    assert_eq!(ds.shape(), vec![6, 5]);
    assert_eq!(ds.chunk(), Some(vec![6, 5]));
    let data: Array2<f64> = ds.read_2d().unwrap();
    assert_eq!(data, pattern::block(2, 1, &block));
}

#[test]
fn test_alignment_and_bounds() {
    let dir = tempdir().unwrap();
    let config = Config {
        alignment_increment: 4096,
        alignment_threshold: 1,
        libver_bound_low: LibVer::V18,
        mpi_io: IoMode::Collective,
        hdf5_file: dir.path().join("aligned.h5"),
        ..small_config()
    };
    let storage = H5Storage::new(&config).unwrap();
    assert!(storage.library_version().starts_with("HDF5 library version 1."));
    assert!(storage.library_version().ends_with("[low=v18,high=latest]"));
    let summary = Driver::new(&LocalComm::solo(), &storage, &config).run().unwrap().unwrap();
    assert!(summary.file_size >= 4096);

    let file = storage.open_file(&config.hdf5_file).unwrap();
    let fapl = file.fapl().unwrap();
    let alignment = fapl.get_alignment().unwrap();
    assert_eq!((alignment.threshold, alignment.alignment), (1, 4096));
    let earliest = H5F_libver_t::H5F_LIBVER_EARLIEST;
    let (mut low, mut high) = (earliest, earliest);
    let status =
        hdf5::sync::sync(|| unsafe { H5Pget_libver_bounds(fapl.id(), &mut low, &mut high) });
    assert!(status >= 0);
    assert_eq!((low, high), libver_bounds(LibVer::V18, LibVer::Latest));
    assert_eq!(high, LATEST_FORMAT);
}

#[test]
fn test_earliest_upper_bound() {
    let dir = tempdir().unwrap();
    let config = Config {
        libver_bound_low: LibVer::Earliest,
        libver_bound_high: LibVer::Earliest,
        hdf5_file: dir.path().join("earliest.h5"),
        ..small_config()
    };
    config.validate(1).unwrap();
    let storage = H5Storage::new(&config).unwrap();
    assert_eq!(storage.bounds().1, LATEST_FORMAT);
    let summary = Driver::new(&LocalComm::solo(), &storage, &config).run().unwrap().unwrap();
    assert!(summary.file_size >= 3 * 2 * 6 * 5 * 8);
}

#[test]
fn test_existing_file() {
    let dir = tempdir().unwrap();
    let config = Config { hdf5_file: dir.path().join("exists.h5"), ..small_config() };
    fs::write(&config.hdf5_file, b"not hdf5").unwrap();
    let storage = H5Storage::new(&config).unwrap();
    assert_err!(
        Driver::new(&LocalComm::solo(), &storage, &config).run(),
        ErrorKind::Storage,
        "create"
    );
}

#[test]
fn test_csv_report() {
    let dir = tempdir().unwrap();
    let config = Config {
        hdf5_file: dir.path().join("report.h5"),
        csv_file: dir.path().join("report.csv"),
        ..small_config()
    };
    let storage = H5Storage::new(&config).unwrap();
    let summary = Driver::new(&LocalComm::solo(), &storage, &config).run().unwrap().unwrap();
    summary.write_csv(&config.csv_file).unwrap();
    let text = fs::read_to_string(&config.csv_file).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    let row: Vec<_> = lines.next().unwrap().split(',').collect();
    assert_eq!(&row[..14], &[
        "3", "2", "6", "5", "weak", "1", "1", "step", "4", "1", "0", "contiguous", "false",
        "independent"
    ]);
    assert_eq!(row[15], summary.file_size.to_string());
    assert!(lines.next().is_none());
}
