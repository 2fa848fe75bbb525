use lapbench_model::{
    AssignedPair, Assignment, AssignmentModelBuilder, BuildError, CostMatrix, RandomCostGenerator, extract,
};
use lapbench_solver::{Domain, EngineAdapter, SimplexEngine, SolveStatus, SolverAdapter};

fn solve(costs: &CostMatrix) -> (f64, Assignment) {
    let built = AssignmentModelBuilder::new().build(costs).unwrap();
    let adapter = EngineAdapter::new(SimplexEngine::new());
    let result = adapter.solve(&built.model);

    assert_eq!(result.status, SolveStatus::Optimal, "error: {:?}", result.error);
    let assignment = extract(&built, &result).unwrap();
    assignment
        .check_matching(built.num_workers, built.num_tasks)
        .unwrap();
    (result.objective_value.unwrap(), assignment)
}

/// Minimum over all permutations; only for small matrices.
fn brute_force(costs: &CostMatrix) -> f64 {
    fn go(costs: &CostMatrix, worker: usize, used: &mut Vec<bool>) -> f64 {
        if worker == costs.num_workers() {
            return 0.0;
        }
        let mut best = f64::INFINITY;
        for task in 0..costs.num_tasks() {
            if !used[task] {
                used[task] = true;
                best = best.min(costs.get(worker, task) + go(costs, worker + 1, used));
                used[task] = false;
            }
        }
        best
    }
    go(costs, 0, &mut vec![false; costs.num_tasks()])
}

#[test]
fn test_two_by_two() {
    let costs = CostMatrix::from_rows(vec![vec![4.0, 2.0], vec![3.0, 5.0]]).unwrap();
    let (objective, assignment) = solve(&costs);

    assert!((objective - 5.0).abs() < 1e-6);
    assert_eq!(
        assignment.pairs,
        vec![
            AssignedPair { worker: 0, task: 1, cost: 2.0 },
            AssignedPair { worker: 1, task: 0, cost: 3.0 },
        ]
    );
}

#[test]
fn test_single_worker() {
    let costs = CostMatrix::from_rows(vec![vec![7.0]]).unwrap();
    let (objective, assignment) = solve(&costs);

    assert!((objective - 7.0).abs() < 1e-6);
    assert_eq!(assignment.pairs, vec![AssignedPair { worker: 0, task: 0, cost: 7.0 }]);
}

#[test]
fn test_diagonal_preferred() {
    let costs = CostMatrix::from_rows(
        (0..3)
            .map(|i| (0..3).map(|j| if i == j { 1.0 } else { 100.0 }).collect())
            .collect(),
    )
    .unwrap();
    let (objective, assignment) = solve(&costs);

    assert!((objective - 3.0).abs() < 1e-6);
    assert!(assignment.iter().all(|p| p.worker == p.task));
}

#[test]
fn test_non_square_is_invalid_input() {
    let costs = CostMatrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
    assert_eq!(
        AssignmentModelBuilder::new().build(&costs),
        Err(BuildError::NotSquare { workers: 2, tasks: 3 })
    );
}

#[test]
fn test_rectangular_extension() {
    let costs = CostMatrix::from_rows(vec![vec![9.0, 2.0, 7.0], vec![1.0, 8.0, 6.0]]).unwrap();
    let built = AssignmentModelBuilder::new().allow_rectangular(true).build(&costs).unwrap();
    let result = EngineAdapter::new(SimplexEngine::new()).solve(&built.model);

    assert_eq!(result.status, SolveStatus::Optimal);
    let assignment = extract(&built, &result).unwrap();
    assert_eq!(assignment.check_matching(2, 3), Ok(()));
    assert!((assignment.total_cost() - 3.0).abs() < 1e-9);
}

#[test]
fn test_matches_brute_force() {
    let generator = RandomCostGenerator::new(1, 1_000).unwrap();
    for n in 1..=6 {
        for seed in 0..4 {
            let costs = generator.generate(n, n, seed);
            let (objective, assignment) = solve(&costs);
            let expected = brute_force(&costs);

            assert!(
                (objective - expected).abs() < 1e-6,
                "n={} seed={}: got {}, expected {}",
                n,
                seed,
                objective,
                expected
            );
            assert!((assignment.total_cost() - objective).abs() < 1e-6);
        }
    }
}

#[test]
fn test_never_infeasible() {
    // Same ranges as the benchmark sweep
    let generator = RandomCostGenerator::new(1, 1_000_000).unwrap();
    for (seed, n) in (5..=14).enumerate() {
        let costs = generator.generate(n, n, seed as u64 + 1);
        let (_, assignment) = solve(&costs);
        assert_eq!(assignment.len(), n);
    }
}

#[test]
fn test_repeated_solves_agree() {
    let costs = RandomCostGenerator::new(1, 20).unwrap().generate(8, 8, 3);
    let built = AssignmentModelBuilder::new().build(&costs).unwrap();
    let adapter = EngineAdapter::new(SimplexEngine::new());

    let first = adapter.solve(&built.model);
    let second = adapter.solve(&built.model);
    let third = EngineAdapter::new(SimplexEngine::new()).solve(&built.model);

    let a = first.objective_value.unwrap();
    assert!((a - second.objective_value.unwrap()).abs() < 1e-6);
    assert!((a - third.objective_value.unwrap()).abs() < 1e-6);
}

#[test]
fn test_relaxation_is_integral() {
    // Without integrality the vertex found is still a permutation
    let costs = RandomCostGenerator::new(1, 1_000).unwrap().generate(7, 7, 11);
    let built = AssignmentModelBuilder::new()
        .with_domain(Domain::Continuous)
        .build(&costs)
        .unwrap();
    let result = EngineAdapter::new(SimplexEngine::new()).solve(&built.model);

    let values = result.values.as_ref().unwrap();
    assert!(values.iter().all(|v| v.abs() < 1e-6 || (v - 1.0).abs() < 1e-6));
    assert!(built.model.violations(values, 1e-6).is_empty());

    let assignment = extract(&built, &result).unwrap();
    assert_eq!(assignment.check_matching(7, 7), Ok(()));
    assert!((assignment.total_cost() - brute_force(&costs)).abs() < 1e-6);
}
