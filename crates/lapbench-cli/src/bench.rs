use std::io;
use std::time::{Duration, Instant};

use lapbench_model::{
    Assignment, AssignmentModelBuilder, BuildError, CostMatrix, CostMatrixError, RandomCostGenerator, extract,
};
use lapbench_solver::{EngineError, SolveStatus, SolverAdapter};
use log::{error, info, warn};
use thiserror::Error;

use crate::bench_log::{BenchLog, LogRecord, Timing};

/// Settings for a sweep over growing problem sizes
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Number of instances to solve
    pub iterations: usize,
    /// Side length of the first instance; each iteration adds one
    pub start_size: usize,
    pub min_cost: i64,
    /// Exclusive
    pub max_cost: i64,
    /// Stop starting new iterations once this much wall-clock time has passed
    pub time_budget: Option<Duration>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            start_size: 5,
            min_cost: 1,
            max_cost: 1_000_000,
            time_budget: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum IterationFailure {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] BuildError),
    #[error("Solver construction failed: {0}")]
    SolverConstruction(String),
    #[error("Solver reported the assignment model infeasible")]
    Infeasible,
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Inconsistent assignment: {0}")]
    Inconsistent(String),
}

impl IterationFailure {
    /// Written to the log instead of a timing.
    pub fn log_label(&self) -> &'static str {
        match self {
            IterationFailure::InvalidInput(_) => "invalid",
            IterationFailure::SolverConstruction(_) => "construction",
            IterationFailure::Infeasible => "infeasible",
            IterationFailure::Engine(_) => "error",
            IterationFailure::Inconsistent(_) => "inconsistent",
        }
    }
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid cost range: {0}")]
    CostRange(#[from] CostMatrixError),
    #[error("Cannot write benchmark log: {0}")]
    Log(#[from] io::Error),
}

#[derive(Debug)]
pub struct SolvedInstance {
    pub status: SolveStatus,
    pub objective: f64,
    pub assignment: Assignment,
}

#[derive(Debug)]
pub struct IterationReport {
    /// 1-based
    pub iteration: usize,
    pub num_workers: usize,
    pub num_tasks: usize,
    /// Time spent inside the solver
    pub elapsed: Duration,
    pub outcome: Result<SolvedInstance, IterationFailure>,
}

impl IterationReport {
    /// `num_workers * num_tasks`, the size recorded in the benchmark log.
    pub fn problem_size(&self) -> usize {
        self.num_workers * self.num_tasks
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: usize,
    pub solved: usize,
    pub failed: usize,
}

/// Builds, solves and extracts one instance. Only the solve is timed.
pub fn solve_instance(
    costs: &CostMatrix,
    builder: &AssignmentModelBuilder,
    adapter: &dyn SolverAdapter,
) -> (Duration, Result<SolvedInstance, IterationFailure>) {
    let built = match builder.build(costs) {
        Ok(built) => built,
        Err(e) => return (Duration::ZERO, Err(e.into())),
    };

    let start = Instant::now();
    let result = adapter.solve(&built.model);
    let elapsed = start.elapsed();

    let outcome = match result.status {
        SolveStatus::Optimal | SolveStatus::Feasible => extract(&built, &result)
            .map_err(|e| IterationFailure::Inconsistent(e.to_string()))
            .and_then(|assignment| {
                assignment
                    .check_matching(built.num_workers, built.num_tasks)
                    .map_err(|e| IterationFailure::Inconsistent(e.to_string()))?;
                Ok(SolvedInstance {
                    status: result.status,
                    objective: result.objective_value.unwrap_or_else(|| assignment.total_cost()),
                    assignment,
                })
            }),
        SolveStatus::Infeasible => Err(IterationFailure::Infeasible),
        SolveStatus::Error => Err(match result.error {
            Some(EngineError::Construction(msg)) => IterationFailure::SolverConstruction(msg),
            Some(e) => IterationFailure::Engine(e.to_string()),
            None => IterationFailure::Engine("no error reported".to_string()),
        }),
    };

    (elapsed, outcome)
}

/// Solves instances of growing size with one adapter, appending one log line per instance.
pub struct Sweep<'a> {
    config: SweepConfig,
    builder: AssignmentModelBuilder,
    adapter: &'a dyn SolverAdapter,
    log: BenchLog,
}

impl<'a> Sweep<'a> {
    pub fn new(config: SweepConfig, adapter: &'a dyn SolverAdapter, log: BenchLog) -> Self {
        Self {
            config,
            builder: AssignmentModelBuilder::new(),
            adapter,
            log,
        }
    }

    pub fn with_builder(mut self, builder: AssignmentModelBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Runs the sweep. A failed instance is logged and the sweep moves on;
    /// only an unusable cost range or an unwritable log stops it early.
    pub fn run(&self, mut on_report: impl FnMut(&IterationReport)) -> Result<SweepSummary, SweepError> {
        let generator = RandomCostGenerator::new(self.config.min_cost, self.config.max_cost)?;
        let started = Instant::now();
        let mut summary = SweepSummary::default();

        for iteration in 1..=self.config.iterations {
            if let Some(budget) = self.config.time_budget {
                if started.elapsed() >= budget {
                    info!("time budget of {:?} spent after {} iterations", budget, summary.attempted);
                    break;
                }
            }

            let size = self.config.start_size + iteration - 1;
            let costs = generator.generate(size, size, iteration as u64);
            let (elapsed, outcome) = solve_instance(&costs, &self.builder, self.adapter);

            let report = IterationReport {
                iteration,
                num_workers: costs.num_workers(),
                num_tasks: costs.num_tasks(),
                elapsed,
                outcome,
            };

            summary.attempted += 1;
            let timing = match &report.outcome {
                Ok(_) => {
                    summary.solved += 1;
                    Timing::elapsed(elapsed)
                }
                Err(failure) => {
                    summary.failed += 1;
                    match failure {
                        IterationFailure::Infeasible | IterationFailure::Inconsistent(_) => {
                            error!("iteration {} ({}x{}): {}", iteration, size, size, failure)
                        }
                        _ => warn!("iteration {} ({}x{}): {}", iteration, size, size, failure),
                    }
                    Timing::Unsolved(failure.log_label())
                }
            };

            self.log.append(&LogRecord::now(timing, report.problem_size()))?;
            on_report(&report);
        }

        info!(
            "sweep finished: {} attempted, {} solved, {} failed",
            summary.attempted, summary.solved, summary.failed
        );
        Ok(summary)
    }
}
