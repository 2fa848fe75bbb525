use std::time::Duration;

use log::{debug, warn};

use crate::engine::{Engine, EngineError, EngineModel, EngineStatus};
use crate::problem::LinearModel;
use crate::solution::SolveResult;

/// Solves abstract models with some concrete engine.
///
/// Implementations must not change the semantics of the model and must
/// report every outcome through [`SolveResult`], never by panicking.
pub trait SolverAdapter {
    fn name(&self) -> &str;

    fn solve(&self, model: &LinearModel) -> SolveResult;
}

/// Translates a [`LinearModel`] onto any [`Engine`] and normalizes its status.
pub struct EngineAdapter<E> {
    engine: E,
    time_limit: Option<Duration>,
}

impl<E: Engine> EngineAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            time_limit: None,
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    fn try_solve(&self, model: &LinearModel) -> Result<SolveResult, EngineError> {
        model.validate()?;

        // Dropped on every return below.
        let mut handle = self
            .engine
            .create_model(model.num_variables(), model.num_constraints())?;

        for (j, v) in model.variables.iter().enumerate() {
            handle.set_variable_bounds(j, v.lower, v.upper, v.domain)?;
        }

        let mut row = Vec::new();
        for c in &model.constraints {
            row.clear();
            row.extend(c.coefficients.iter().map(|(&j, &coef)| (j, coef)));
            handle.add_constraint(&row, c.bound)?;
        }

        row.clear();
        row.extend(model.objective.coefficients.iter().map(|(&j, &coef)| (j, coef)));
        handle.set_objective(&row, model.objective.direction)?;
        handle.set_time_limit(self.time_limit);

        let status = handle.solve()?;
        debug!("{} finished with status {}", self.engine.name(), status);

        Ok(normalize(model, status, handle.objective_value(), handle.variable_values()))
    }
}

impl<E: Engine> SolverAdapter for EngineAdapter<E> {
    fn name(&self) -> &str {
        self.engine.name()
    }

    fn solve(&self, model: &LinearModel) -> SolveResult {
        match self.try_solve(model) {
            Ok(result) => result,
            Err(e) => {
                warn!("{} failed: {}", self.engine.name(), e);
                SolveResult::error(e)
            }
        }
    }
}

/// Maps an engine status onto the four-valued result taxonomy.
fn normalize(
    model: &LinearModel,
    status: EngineStatus,
    objective_value: Option<f64>,
    values: Option<Vec<f64>>,
) -> SolveResult {
    let values = values.filter(|v| v.len() == model.num_variables());

    match status {
        EngineStatus::Optimal => match values {
            Some(values) => {
                let obj = objective_value.unwrap_or_else(|| model.objective_value(&values));
                SolveResult::optimal(values, obj)
            }
            None => SolveResult::error(EngineError::MissingSolution(status)),
        },
        EngineStatus::Infeasible => SolveResult::infeasible(),
        EngineStatus::Unbounded => SolveResult::error(EngineError::Unbounded),
        EngineStatus::TimeLimit | EngineStatus::IterationLimit => match values {
            Some(values) => {
                let obj = objective_value.unwrap_or_else(|| model.objective_value(&values));
                SolveResult::feasible(values, obj)
            }
            None => SolveResult::error(EngineError::LimitReached(status)),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;
    use crate::problem::{Constraint, ConstraintBound, Direction, Domain};
    use crate::solution::SolveStatus;

    /// Everything the adapter forwarded, for assertions.
    #[derive(Debug, Default)]
    struct Recorded {
        bounds: Vec<(usize, f64, f64, Domain)>,
        rows: Vec<(Vec<(usize, f64)>, ConstraintBound)>,
        objective: Option<(Vec<(usize, f64)>, Direction)>,
        time_limit: Option<Duration>,
        solves: usize,
        dropped: bool,
    }

    /// Engine that replays a fixed outcome.
    struct ScriptedEngine {
        fail_construction: bool,
        status: EngineStatus,
        objective: Option<f64>,
        values: Option<Vec<f64>>,
        recorded: Rc<RefCell<Recorded>>,
    }

    struct ScriptedModel {
        status: EngineStatus,
        objective: Option<f64>,
        values: Option<Vec<f64>>,
        recorded: Rc<RefCell<Recorded>>,
    }

    impl ScriptedEngine {
        fn new(status: EngineStatus, objective: Option<f64>, values: Option<Vec<f64>>) -> Self {
            Self {
                fail_construction: false,
                status,
                objective,
                values,
                recorded: Rc::default(),
            }
        }
    }

    impl Engine for ScriptedEngine {
        type Model = ScriptedModel;

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn create_model(&self, _: usize, _: usize) -> Result<ScriptedModel, EngineError> {
            if self.fail_construction {
                return Err(EngineError::Construction("out of handles".to_string()));
            }
            Ok(ScriptedModel {
                status: self.status,
                objective: self.objective,
                values: self.values.clone(),
                recorded: Rc::clone(&self.recorded),
            })
        }
    }

    impl EngineModel for ScriptedModel {
        fn set_variable_bounds(&mut self, index: usize, lower: f64, upper: f64, domain: Domain) -> Result<(), EngineError> {
            self.recorded.borrow_mut().bounds.push((index, lower, upper, domain));
            Ok(())
        }

        fn add_constraint(&mut self, coefficients: &[(usize, f64)], bound: ConstraintBound) -> Result<(), EngineError> {
            self.recorded.borrow_mut().rows.push((coefficients.to_vec(), bound));
            Ok(())
        }

        fn set_objective(&mut self, coefficients: &[(usize, f64)], direction: Direction) -> Result<(), EngineError> {
            self.recorded.borrow_mut().objective = Some((coefficients.to_vec(), direction));
            Ok(())
        }

        fn set_time_limit(&mut self, limit: Option<Duration>) {
            self.recorded.borrow_mut().time_limit = limit;
        }

        fn solve(&mut self) -> Result<EngineStatus, EngineError> {
            self.recorded.borrow_mut().solves += 1;
            Ok(self.status)
        }

        fn objective_value(&self) -> Option<f64> {
            self.objective
        }

        fn variable_values(&self) -> Option<Vec<f64>> {
            self.values.clone()
        }
    }

    impl Drop for ScriptedModel {
        fn drop(&mut self) {
            self.recorded.borrow_mut().dropped = true;
        }
    }

    fn small_model() -> LinearModel {
        let mut model = LinearModel::new();
        model.add_variable("a", 0.0, 1.0, Domain::Binary);
        model.add_variable("b", 0.0, 1.0, Domain::Binary);
        let mut c = Constraint::new("one", ConstraintBound::Equal(1.0));
        c.add_term(0, 1.0).add_term(1, 1.0);
        model.add_constraint(c);
        model.add_constraint(Constraint::new("range", ConstraintBound::Range { lower: 0.0, upper: 1.0 }));
        model.set_objective(BTreeMap::from([(0, 3.0), (1, 5.0)]), Direction::Minimize);
        model
    }

    #[test]
    fn test_forwards_model_one_to_one() {
        let engine = ScriptedEngine::new(EngineStatus::Optimal, Some(3.0), Some(vec![1.0, 0.0]));
        let recorded = Rc::clone(&engine.recorded);
        let adapter = EngineAdapter::new(engine).with_time_limit(Duration::from_millis(250));

        let result = adapter.solve(&small_model());
        assert_eq!(result, SolveResult::optimal(vec![1.0, 0.0], 3.0));

        let recorded = recorded.borrow();
        assert_eq!(
            recorded.bounds,
            vec![(0, 0.0, 1.0, Domain::Binary), (1, 0.0, 1.0, Domain::Binary)]
        );
        assert_eq!(recorded.rows.len(), 2);
        assert_eq!(recorded.rows[0], (vec![(0, 1.0), (1, 1.0)], ConstraintBound::Equal(1.0)));
        assert_eq!(recorded.rows[1].1, ConstraintBound::Range { lower: 0.0, upper: 1.0 });
        assert_eq!(
            recorded.objective,
            Some((vec![(0, 3.0), (1, 5.0)], Direction::Minimize))
        );
        assert_eq!(recorded.time_limit, Some(Duration::from_millis(250)));
        assert_eq!(recorded.solves, 1);
        assert!(recorded.dropped);
    }

    #[test]
    fn test_limit_with_values_is_feasible() {
        let adapter = EngineAdapter::new(ScriptedEngine::new(EngineStatus::TimeLimit, None, Some(vec![0.0, 1.0])));
        let result = adapter.solve(&small_model());

        assert_eq!(result.status, SolveStatus::Feasible);
        // objective recomputed from the model when the engine has none
        assert_eq!(result.objective_value, Some(5.0));
    }

    #[test]
    fn test_limit_without_values_is_error() {
        let adapter = EngineAdapter::new(ScriptedEngine::new(EngineStatus::IterationLimit, None, None));
        let result = adapter.solve(&small_model());

        assert_eq!(result.status, SolveStatus::Error);
        assert_eq!(result.error, Some(EngineError::LimitReached(EngineStatus::IterationLimit)));
        assert!(result.values.is_none());
    }

    #[test]
    fn test_status_mapping() {
        let infeasible = EngineAdapter::new(ScriptedEngine::new(EngineStatus::Infeasible, None, None));
        assert_eq!(infeasible.solve(&small_model()), SolveResult::infeasible());

        let unbounded = EngineAdapter::new(ScriptedEngine::new(EngineStatus::Unbounded, None, None));
        assert_eq!(unbounded.solve(&small_model()).error, Some(EngineError::Unbounded));

        // wrong-length vector is not a usable solution
        let short = EngineAdapter::new(ScriptedEngine::new(EngineStatus::Optimal, Some(1.0), Some(vec![1.0])));
        assert_eq!(
            short.solve(&small_model()).error,
            Some(EngineError::MissingSolution(EngineStatus::Optimal))
        );
    }

    #[test]
    fn test_construction_failure_is_error() {
        let mut engine = ScriptedEngine::new(EngineStatus::Optimal, None, None);
        engine.fail_construction = true;
        let recorded = Rc::clone(&engine.recorded);
        let result = EngineAdapter::new(engine).solve(&small_model());

        assert_eq!(result.status, SolveStatus::Error);
        assert!(matches!(result.error, Some(EngineError::Construction(_))));
        assert_eq!(recorded.borrow().solves, 0);
    }

    #[test]
    fn test_invalid_model_never_reaches_engine() {
        let engine = ScriptedEngine::new(EngineStatus::Optimal, None, None);
        let recorded = Rc::clone(&engine.recorded);
        let mut model = small_model();
        model.variables[1].lower = 2.0;

        let result = EngineAdapter::new(engine).solve(&model);
        assert!(matches!(result.error, Some(EngineError::InvalidModel(_))));
        assert!(recorded.borrow().bounds.is_empty());
    }
}
