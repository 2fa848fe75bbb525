use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostMatrixError {
    #[error("Expected {expected} entries for the given shape, got {actual}")]
    DataLength { expected: usize, actual: usize },
    #[error("Row {row} has {actual} entries, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },
    #[error("Cost at worker {worker}, task {task} is not finite")]
    NonFinite { worker: usize, task: usize },
    #[error("Cost range [{min}, {max}) is empty")]
    InvalidRange { min: i64, max: i64 },
}

/// Cost of assigning each worker (row) to each task (column), row-major
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")
)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, CostMatrixError> {
        let expected = rows * cols;
        if data.len() != expected {
            return Err(CostMatrixError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        if let Some(k) = data.iter().position(|c| !c.is_finite()) {
            return Err(CostMatrixError::NonFinite {
                worker: k / cols,
                task: k % cols,
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, CostMatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != cols {
                return Err(CostMatrixError::RaggedRow {
                    row,
                    expected: cols,
                    actual: values.len(),
                });
            }
            data.extend_from_slice(values);
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn num_workers(&self) -> usize {
        self.rows
    }

    pub fn num_tasks(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Panics if `worker` or `task` is out of range.
    pub fn get(&self, worker: usize, task: usize) -> f64 {
        assert!(task < self.cols, "task {} out of range", task);
        self.data[worker * self.cols + task]
    }

    pub fn row(&self, worker: usize) -> &[f64] {
        &self.data[worker * self.cols..(worker + 1) * self.cols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }
}

impl TryFrom<Vec<Vec<f64>>> for CostMatrix {
    type Error = CostMatrixError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<CostMatrix> for Vec<Vec<f64>> {
    fn from(matrix: CostMatrix) -> Self {
        matrix.rows().map(<[f64]>::to_vec).collect()
    }
}

/// Reproducible random integer costs drawn from `[min_cost, max_cost)`
#[derive(Debug, Clone, Copy)]
pub struct RandomCostGenerator {
    min_cost: i64,
    max_cost: i64,
}

impl RandomCostGenerator {
    pub fn new(min_cost: i64, max_cost: i64) -> Result<Self, CostMatrixError> {
        if min_cost >= max_cost {
            return Err(CostMatrixError::InvalidRange {
                min: min_cost,
                max: max_cost,
            });
        }
        Ok(Self { min_cost, max_cost })
    }

    pub fn generate(&self, rows: usize, cols: usize, seed: u64) -> CostMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let between = Uniform::new(self.min_cost, self.max_cost);
        let data = (0..rows * cols).map(|_| between.sample(&mut rng) as f64).collect();
        CostMatrix { rows, cols, data }
    }
}
