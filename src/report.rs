//! Console and CSV reports, produced by the root after the reduction.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::timing::{Metric, TimingStats};

/// Header row of the CSV report.
pub const CSV_HEADER: &str = "steps,arrays,rows,cols,scaling,proc-rows,proc-cols,slowdim,rank,\
alignment-increment,alignment-threshold,layout,fill,mpi-io,wall [s],fsize [B],\
write-phase-min [s],write-phase-max [s],creat-min [s],creat-max [s],write-min [s],write-max [s],\
read-phase-min [s],read-phase-max [s],read-min [s],read-max [s]";

const RULE: &str = "---------------------------------------------";

/// Everything the reports need, available on the root only.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub config: Config,
    pub stats: TimingStats,
    /// Size of the container after the run, in bytes.
    pub file_size: u64,
    /// Bytes each rank moved in one phase.
    pub bytes: u64,
}

impl Summary {
    /// Wall time of the run (the slowest rank).
    pub fn wall(&self) -> f64 {
        self.stats.max(Metric::Wall)
    }

    /// The single CSV data row.
    pub fn csv_row(&self) -> String {
        let c = &self.config;
        let mut fields = vec![
            c.steps.to_string(),
            c.arrays.to_string(),
            c.rows.to_string(),
            c.cols.to_string(),
            c.scaling.to_string(),
            c.proc_rows.to_string(),
            c.proc_cols.to_string(),
            c.slowest_dimension.to_string(),
            c.rank.to_string(),
            c.alignment_increment.to_string(),
            c.alignment_threshold.to_string(),
            c.layout.to_string(),
            c.fill_values.to_string(),
            c.mpi_io.to_string(),
            format!("{:.2}", self.wall()),
            format!("{:.0}", self.file_size as f64),
        ];
        for metric in [Metric::WritePhase, Metric::Create, Metric::Write, Metric::ReadPhase, Metric::Read] {
            fields.push(format!("{:.2}", self.stats.min(metric)));
            fields.push(format!("{:.2}", self.stats.max(metric)));
        }
        fields.join(",")
    }

    /// Writes the header and the data row to `path`, replacing any existing file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = fs::File::create(path)?;
        writeln!(file, "{}", CSV_HEADER)?;
        writeln!(file, "{}", self.csv_row())?;
        Ok(())
    }
}

fn pair(f: &mut fmt::Formatter, label: &str, (min, max): (f64, f64)) -> fmt::Result {
    writeln!(f, "{}_{:.2}\n\t\t\t^{:.2}", label, min, max)
}

/// Console summary of the measurements.
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stats = &self.stats;
        let time = |metric| (stats.min(metric), stats.max(metric));

        writeln!(f, "\nWall clock [s]:\t\t{:.2}", self.wall())?;
        writeln!(f, "File size [B]:\t\t{:.0}", self.file_size as f64)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Measurement:\t\t_MIN (over MPI ranks)")?;
        writeln!(f, "\t\t\t^MAX (over MPI ranks)")?;
        writeln!(f, "{}", RULE)?;
        pair(f, "Write phase [s]:\t", time(Metric::WritePhase))?;
        pair(f, "Create time [s]:\t", time(Metric::Create))?;
        pair(f, "Write time [s]:\t\t", time(Metric::Write))?;
        pair(f, "Write rate [MiB/s]:\t", stats.rates(Metric::Write, self.bytes))?;
        pair(f, "Read phase [s]:\t\t", time(Metric::ReadPhase))?;
        pair(f, "Read time [s]:\t\t", time(Metric::Read))?;
        pair(f, "Read rate [MiB/s]:\t", stats.rates(Metric::Read, self.bytes))
    }
}

/// Console description of the configuration in effect.
pub struct ConfigReport<'a> {
    pub config: &'a Config,
    pub source: &'a Path,
}

impl fmt::Display for ConfigReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = self.config;
        writeln!(f, "Config loaded from '{}':", self.source.display())?;
        writeln!(
            f,
            "\tsteps={}, arrays={},rows={}, columns={}, scaling={}",
            c.steps, c.arrays, c.rows, c.cols, c.scaling
        )?;
        writeln!(
            f,
            "\tproc-grid={}x{}, slowest-dimension={}, rank={}",
            c.proc_rows, c.proc_cols, c.slowest_dimension, c.rank
        )?;
        writeln!(
            f,
            "\talignment-increment={}, alignment-threshold={}",
            c.alignment_increment, c.alignment_threshold
        )?;
        write!(f, "\tlayout={}, fill={}, mpi-io={}", c.layout, c.fill_values, c.mpi_io)
    }
}

#[cfg(test)]
pub mod tests {
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use tempfile::tempdir;

    use super::*;
    use crate::timing::Timings;

    fn summary() -> Summary {
        let mut min = Timings::new();
        let mut max = Timings::new();
        for (i, metric) in Metric::ALL.iter().enumerate() {
            min[*metric] = 0.5 + i as f64;
            max[*metric] = 1.0 + i as f64;
        }
        Summary {
            config: Config { steps: 10, arrays: 2, rows: 100, cols: 100, ..Config::default() },
            stats: TimingStats { min, max },
            file_size: 1_602_048,
            bytes: 1_600_000,
        }
    }

    #[test]
    pub fn test_csv() {
        let summary = summary();
        assert_eq!(CSV_HEADER.split(',').count(), summary.csv_row().split(',').count());
        assert_eq!(
            summary.csv_row(),
            "10,2,100,100,weak,1,1,step,4,1,0,contiguous,false,independent,1.00,1602048,\
             1.50,2.00,2.50,3.00,3.50,4.00,4.50,5.00,5.50,6.00"
        );

        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        summary.write_csv(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("steps,arrays,rows,cols,scaling,"));
        assert!(lines[0].ends_with("read-min [s],read-max [s]"));
        assert_eq!(lines[1], summary.csv_row());
    }

    #[test]
    pub fn test_console() {
        let text = summary().to_string();
        assert!(text.contains("Wall clock [s]:\t\t1.00\n"));
        assert!(text.contains("File size [B]:\t\t1602048\n"));
        assert!(text.contains("Write time [s]:\t\t_3.50\n\t\t\t^4.00\n"));
        let re = Regex::new(r"Write rate \[MiB/s\]:\t_(\d+\.\d{2})\n\t\t\t\^(\d+\.\d{2})").unwrap();
        let caps = re.captures(&text).unwrap();
        // the slowest rank bounds the rate from below
        assert_eq!(&caps[1], format!("{:.2}", 1_600_000.0 / (1024.0 * 1024.0 * 4.0)));
        assert_eq!(&caps[2], format!("{:.2}", 1_600_000.0 / (1024.0 * 1024.0 * 3.5)));
        let pairs = Regex::new(r"(?m)^[A-Z][^\n]*:\t+_\d+\.\d{2}\n\t\t\t\^\d+\.\d{2}$").unwrap();
        assert_eq!(pairs.find_iter(&text).count(), 7);
    }

    #[test]
    pub fn test_config_report() {
        let config = Config { proc_rows: 2, proc_cols: 3, ..Config::default() };
        let text = ConfigReport { config: &config, source: Path::new("hdf5_iotest.toml") }.to_string();
        assert!(text.starts_with("Config loaded from 'hdf5_iotest.toml':\n"));
        assert!(text.contains("\tproc-grid=2x3, slowest-dimension=step, rank=4\n"));
        assert!(text.ends_with("layout=contiguous, fill=false, mpi-io=independent"));
    }
}
