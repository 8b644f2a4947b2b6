//! On-disk layout of the container: which datasets exist, their shapes and chunking,
//! and where each (step, array) plane lives.
//!
//! The plan depends on the configuration only, so every rank derives the same plan and
//! both phases agree on it. The slowest dimension is the outermost logical axis; it picks
//! the axis order inside 4D datasets, the axis that is split into separate datasets
//! (3D) or groups (2D), and the order the phases visit planes in. It never changes which
//! rank owns which elements.

use crate::config::{Config, Layout, SlowestDimension};
use crate::decomposition::{global_extent, LocalBlock};
use crate::storage::Hyperslab;

/// Creation parameters of one dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Path of the dataset inside the container.
    pub name: String,
    pub shape: Vec<u64>,
    /// Chunk shape when the layout is chunked.
    pub chunk: Option<Vec<u64>>,
    /// Whether the library fills unwritten elements with the fill value on allocation.
    pub fill_values: bool,
}

/// Location of one (step, array) plane in the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Index into [`DatasetPlan::datasets`].
    pub dataset: usize,
    /// Coordinates along the leading axes (empty for 2D datasets).
    pub lead: Vec<u64>,
}

impl Placement {
    /// The hyperslab of this plane owned by a rank with the given block.
    pub fn hyperslab(&self, block: &LocalBlock) -> Hyperslab {
        let mut start = self.lead.clone();
        let mut count = vec![1; self.lead.len()];
        start.extend([block.offset_row, block.offset_col]);
        count.extend([block.rows, block.cols]);
        Hyperslab::new(start, count)
    }
}

/// Datasets and groups of the container, identical on every rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetPlan {
    pub steps: u32,
    pub arrays: u32,
    pub slowest: SlowestDimension,
    pub rank: u32,
    /// Groups to create before the datasets (2D plans only).
    pub groups: Vec<String>,
    pub datasets: Vec<DatasetSpec>,
}

fn step_name(step: u32) -> String {
    format!("step={step}")
}

fn array_name(array: u32) -> String {
    format!("array={array}")
}

impl DatasetPlan {
    pub fn new(config: &Config) -> Self {
        let (rows, cols) = global_extent(
            config.rows,
            config.cols,
            config.proc_rows,
            config.proc_cols,
            config.scaling,
        );
        let (steps, arrays) = (config.steps, config.arrays);
        let (s, a) = (u64::from(steps), u64::from(arrays));
        let slowest = config.slowest_dimension;

        let spec = |name: String, lead: &[u64]| {
            let mut shape = lead.to_vec();
            shape.extend([rows, cols]);
            let chunk = match config.layout {
                Layout::Contiguous => None,
                Layout::Chunked => {
                    let mut chunk = vec![1; lead.len()];
                    chunk.extend([config.rows.min(rows), config.cols.min(cols)]);
                    Some(chunk)
                }
            };
            DatasetSpec { name, shape, chunk, fill_values: config.fill_values }
        };

        let mut groups = vec![];
        let datasets = match (config.rank, slowest) {
            (4, SlowestDimension::Step) => vec![spec("dataset".into(), &[s, a])],
            (4, SlowestDimension::Array) => vec![spec("dataset".into(), &[a, s])],
            (3, SlowestDimension::Step) => (0..steps).map(|i| spec(step_name(i), &[a])).collect(),
            (3, SlowestDimension::Array) => {
                (0..arrays).map(|j| spec(array_name(j), &[s])).collect()
            }
            (_, SlowestDimension::Step) => {
                groups = (0..steps).map(step_name).collect();
                (0..steps)
                    .flat_map(|i| (0..arrays).map(move |j| (i, j)))
                    .map(|(i, j)| spec(format!("{}/{}", step_name(i), array_name(j)), &[]))
                    .collect()
            }
            (_, SlowestDimension::Array) => {
                groups = (0..arrays).map(array_name).collect();
                (0..arrays)
                    .flat_map(|j| (0..steps).map(move |i| (i, j)))
                    .map(|(i, j)| spec(format!("{}/{}", array_name(j), step_name(i)), &[]))
                    .collect()
            }
        };

        Self { steps, arrays, slowest, rank: config.rank, groups, datasets }
    }

    /// Where the plane of `array` at `step` is stored.
    pub fn locate(&self, step: u32, array: u32) -> Placement {
        let (i, j) = (u64::from(step), u64::from(array));
        let (outer, inner, n_inner) = match self.slowest {
            SlowestDimension::Step => (step, array, self.arrays),
            SlowestDimension::Array => (array, step, self.steps),
        };
        match (self.rank, self.slowest) {
            (4, SlowestDimension::Step) => Placement { dataset: 0, lead: vec![i, j] },
            (4, SlowestDimension::Array) => Placement { dataset: 0, lead: vec![j, i] },
            (3, _) => Placement { dataset: outer as usize, lead: vec![u64::from(inner)] },
            _ => Placement {
                dataset: outer as usize * n_inner as usize + inner as usize,
                lead: vec![],
            },
        }
    }

    /// Visits every (step, array) pair, outermost axis first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let (steps, arrays, slowest) = (self.steps, self.arrays, self.slowest);
        let (n_outer, n_inner) = match slowest {
            SlowestDimension::Step => (steps, arrays),
            SlowestDimension::Array => (arrays, steps),
        };
        (0..n_outer).flat_map(move |outer| {
            (0..n_inner).map(move |inner| match slowest {
                SlowestDimension::Step => (outer, inner),
                SlowestDimension::Array => (inner, outer),
            })
        })
    }

    /// Total number of elements across all datasets.
    pub fn num_elements(&self) -> u64 {
        self.datasets.iter().map(|ds| ds.shape.iter().product::<u64>()).sum()
    }
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Scaling;
    use crate::decomposition::Decomposition;

    fn config(rank: u32, slowest: SlowestDimension, layout: Layout) -> Config {
        Config {
            steps: 3,
            arrays: 2,
            rows: 10,
            cols: 20,
            proc_rows: 2,
            proc_cols: 1,
            scaling: Scaling::Weak,
            rank,
            slowest_dimension: slowest,
            layout,
            ..Config::default()
        }
    }

    #[test]
    pub fn test_rank4() {
        let plan = DatasetPlan::new(&config(4, SlowestDimension::Step, Layout::Contiguous));
        assert_eq!(plan.datasets.len(), 1);
        assert_eq!(plan.datasets[0].shape, vec![3, 2, 20, 20]);
        assert_eq!(plan.datasets[0].chunk, None);
        assert_eq!(plan.locate(2, 1), Placement { dataset: 0, lead: vec![2, 1] });

        let plan = DatasetPlan::new(&config(4, SlowestDimension::Array, Layout::Chunked));
        assert_eq!(plan.datasets[0].shape, vec![2, 3, 20, 20]);
        assert_eq!(plan.datasets[0].chunk, Some(vec![1, 1, 10, 20]));
        assert_eq!(plan.locate(2, 1), Placement { dataset: 0, lead: vec![1, 2] });
        assert!(plan.groups.is_empty());
    }

    #[test]
    pub fn test_rank3() {
        let plan = DatasetPlan::new(&config(3, SlowestDimension::Step, Layout::Chunked));
        let names: Vec<_> = plan.datasets.iter().map(|ds| ds.name.as_str()).collect();
        assert_eq!(names, vec!["step=0", "step=1", "step=2"]);
        assert_eq!(plan.datasets[1].shape, vec![2, 20, 20]);
        assert_eq!(plan.datasets[1].chunk, Some(vec![1, 10, 20]));
        assert_eq!(plan.locate(1, 1), Placement { dataset: 1, lead: vec![1] });

        let plan = DatasetPlan::new(&config(3, SlowestDimension::Array, Layout::Contiguous));
        assert_eq!(plan.datasets.len(), 2);
        assert_eq!(plan.datasets[1].name, "array=1");
        assert_eq!(plan.datasets[1].shape, vec![3, 20, 20]);
        assert_eq!(plan.locate(2, 1), Placement { dataset: 1, lead: vec![2] });
    }

    #[test]
    pub fn test_rank2() {
        let plan = DatasetPlan::new(&config(2, SlowestDimension::Step, Layout::Contiguous));
        assert_eq!(plan.groups, vec!["step=0", "step=1", "step=2"]);
        assert_eq!(plan.datasets.len(), 6);
        let placement = plan.locate(2, 1);
        assert_eq!(plan.datasets[placement.dataset].name, "step=2/array=1");
        assert!(placement.lead.is_empty());

        let plan = DatasetPlan::new(&config(2, SlowestDimension::Array, Layout::Chunked));
        assert_eq!(plan.groups, vec!["array=0", "array=1"]);
        let placement = plan.locate(2, 1);
        assert_eq!(plan.datasets[placement.dataset].name, "array=1/step=2");
        assert_eq!(plan.datasets[placement.dataset].shape, vec![20, 20]);
        assert_eq!(plan.datasets[placement.dataset].chunk, Some(vec![10, 20]));
    }

    #[test]
    pub fn test_placements_are_distinct() {
        for rank in 2..=4 {
            for slowest in [SlowestDimension::Step, SlowestDimension::Array] {
                let plan = DatasetPlan::new(&config(rank, slowest, Layout::Contiguous));
                let pairs: Vec<_> = plan.iter().collect();
                assert_eq!(pairs.len(), 6);
                let placements: HashSet<_> = pairs
                    .iter()
                    .map(|&(step, array)| {
                        let p = plan.locate(step, array);
                        let shape = &plan.datasets[p.dataset].shape;
                        assert_eq!(p.lead.len() + 2, shape.len());
                        assert!(p.lead.iter().zip(shape).all(|(i, n)| i < n));
                        (p.dataset, p.lead)
                    })
                    .collect();
                assert_eq!(placements.len(), 6);
                assert_eq!(plan.num_elements(), 6 * 20 * 20);
            }
        }
    }

    #[test]
    pub fn test_iteration_order() {
        let plan = DatasetPlan::new(&config(4, SlowestDimension::Step, Layout::Contiguous));
        let order: Vec<_> = plan.iter().take(3).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0)]);
        let plan = DatasetPlan::new(&config(4, SlowestDimension::Array, Layout::Contiguous));
        let order: Vec<_> = plan.iter().take(4).collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1)]);
    }

    #[test]
    pub fn test_chunks_ignore_grid() {
        let mut config = config(4, SlowestDimension::Step, Layout::Chunked);
        config.scaling = Scaling::Strong;
        let plan = DatasetPlan::new(&config);
        assert_eq!(plan.datasets[0].shape, vec![3, 2, 10, 20]);
        assert_eq!(plan.datasets[0].chunk, Some(vec![1, 1, 10, 20]));
    }

    #[test]
    pub fn test_hyperslab() {
        let config = config(4, SlowestDimension::Step, Layout::Contiguous);
        let plan = DatasetPlan::new(&config);
        let block = Decomposition::new(&config, 1).block;
        let slab = plan.locate(1, 0).hyperslab(&block);
        assert_eq!(slab.start, vec![1, 0, 10, 0]);
        assert_eq!(slab.count, vec![1, 1, 10, 20]);
    }
}
