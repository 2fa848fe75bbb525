mod bench;
mod bench_log;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lapbench_model::{AssignmentModelBuilder, CostMatrix, RandomCostGenerator};
use lapbench_solver::{Domain, EngineAdapter, SimplexEngine, SolverAdapter};

use crate::bench::{IterationReport, Sweep, SweepConfig, solve_instance};
use crate::bench_log::BenchLog;

#[derive(Parser)]
#[command(name = "lapbench")]
#[command(about = "Benchmark linear assignment problems solved as integer programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve random instances of growing size and log the solve times
    ///
    /// Instance i is (i + start-size - 1) square, so the default 500 iterations
    /// end at 504x504. Solve times grow steeply with size; pass --time-budget
    /// for long sweeps.
    Run {
        /// Number of instances to solve
        #[arg(short, long, default_value_t = 500)]
        iterations: usize,
        /// Workers (and tasks) in the first instance
        #[arg(long, default_value_t = 5)]
        start_size: usize,
        /// Smallest generated cost
        #[arg(long, default_value_t = 1)]
        min_cost: i64,
        /// Generated costs stay below this value
        #[arg(long, default_value_t = 1_000_000)]
        max_cost: i64,
        /// File the timings are appended to
        #[arg(short, long, default_value = "log.txt")]
        log_file: PathBuf,
        /// Stop starting new instances after this many seconds
        #[arg(long)]
        time_budget: Option<u64>,
        /// Per-solve time limit in milliseconds
        #[arg(long)]
        solve_timeout: Option<u64>,
        /// Solve the LP relaxation instead of the 0/1 program
        #[arg(long)]
        continuous: bool,
        /// Print every worker/task pair
        #[arg(short, long)]
        print_assignments: bool,
        /// Exit with status 1 if any instance failed
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Solve a cost matrix stored as a JSON array of rows
    Solve {
        /// The file containing the cost matrix
        file: PathBuf,
        /// Accept matrices with more tasks than workers or vice versa
        #[arg(long)]
        rectangular: bool,
        /// Time limit in milliseconds
        #[arg(long)]
        solve_timeout: Option<u64>,
    },
    /// Print a random square cost matrix as JSON
    Generate {
        /// Workers (and tasks)
        #[arg(short, long)]
        size: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value_t = 1)]
        min_cost: i64,
        #[arg(long, default_value_t = 1_000_000)]
        max_cost: i64,
    },
}

fn adapter(solve_timeout: Option<u64>) -> EngineAdapter<SimplexEngine> {
    let adapter = EngineAdapter::new(SimplexEngine::new());
    match solve_timeout {
        Some(ms) => adapter.with_time_limit(Duration::from_millis(ms)),
        None => adapter,
    }
}

fn print_report(report: &IterationReport, print_assignments: bool) {
    match &report.outcome {
        Ok(solved) => {
            println!("Total cost: {} ({})", solved.objective, solved.status);
            if print_assignments {
                for pair in &solved.assignment {
                    println!(
                        "Worker {} assigned to task {}. Cost: {}",
                        pair.worker + 1,
                        pair.task + 1,
                        pair.cost
                    );
                }
            }
        }
        Err(failure) => println!("No solution found: {}", failure),
    }
    println!(
        "#{} {}x{}: elapsed time is {} ms",
        report.iteration,
        report.num_workers,
        report.num_tasks,
        report.elapsed.as_millis()
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            iterations,
            start_size,
            min_cost,
            max_cost,
            log_file,
            time_budget,
            solve_timeout,
            continuous,
            print_assignments,
            fail_on_error,
        } => {
            let config = SweepConfig {
                iterations,
                start_size,
                min_cost,
                max_cost,
                time_budget: time_budget.map(Duration::from_secs),
            };
            let domain = if continuous { Domain::Continuous } else { Domain::Binary };
            let adapter = adapter(solve_timeout);
            let timings = BenchLog::new(log_file);
            log::info!("benchmarking {} engine, logging to {}", adapter.name(), timings.path().display());

            let sweep = Sweep::new(config, &adapter, timings)
                .with_builder(AssignmentModelBuilder::new().with_domain(domain));
            let summary = match sweep.run(|report| print_report(report, print_assignments)) {
                Ok(summary) => summary,
                Err(e) => {
                    eprintln!("Benchmark aborted: {}", e);
                    std::process::exit(1);
                }
            };

            println!();
            println!(
                "Solved {} of {} instances ({} failed)",
                summary.solved, summary.attempted, summary.failed
            );
            if fail_on_error && summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Solve {
            file,
            rectangular,
            solve_timeout,
        } => {
            let source = match std::fs::read_to_string(&file) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error reading file: {}", e);
                    std::process::exit(1);
                }
            };

            let costs: CostMatrix = match serde_json::from_str(&source) {
                Ok(costs) => costs,
                Err(e) => {
                    eprintln!("Invalid cost matrix: {}", e);
                    std::process::exit(1);
                }
            };

            let builder = AssignmentModelBuilder::new().allow_rectangular(rectangular);
            let (elapsed, outcome) = solve_instance(&costs, &builder, &adapter(solve_timeout));
            let report = IterationReport {
                iteration: 1,
                num_workers: costs.num_workers(),
                num_tasks: costs.num_tasks(),
                elapsed,
                outcome,
            };
            print_report(&report, true);

            if report.outcome.is_err() {
                std::process::exit(1);
            }
        }
        Commands::Generate {
            size,
            seed,
            min_cost,
            max_cost,
        } => {
            let generator = match RandomCostGenerator::new(min_cost, max_cost) {
                Ok(g) => g,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let costs = generator.generate(size, size, seed);
            match serde_json::to_string(&costs) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
