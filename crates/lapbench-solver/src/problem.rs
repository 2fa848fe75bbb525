use std::collections::BTreeMap;

use thiserror::Error;

/// A linear or mixed-integer model, independent of any engine
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearModel {
    /// Decision variables, addressed by their position
    pub variables: Vec<Variable>,
    /// Constraints in insertion order
    pub constraints: Vec<Constraint>,
    /// Objective function
    pub objective: Objective,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    /// Name/label for the variable (for diagnostics)
    pub name: String,
    pub lower: f64,
    /// May be `f64::INFINITY`
    pub upper: f64,
    pub domain: Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    Continuous,
    Integer,
    /// Integer restricted to {0, 1}
    Binary,
}

impl Domain {
    pub fn is_integral(self) -> bool {
        !matches!(self, Domain::Continuous)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Sparse coefficients keyed by variable index
    pub coefficients: BTreeMap<usize, f64>,
    pub bound: ConstraintBound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintBound {
    /// Equal (=)
    Equal(f64),
    /// Less than or equal (<=)
    LessEqual(f64),
    /// Greater than or equal (>=)
    GreaterEqual(f64),
    /// lower <= expr <= upper
    Range { lower: f64, upper: f64 },
}

impl ConstraintBound {
    /// Returns the (lower, upper) interval the constraint expression must lie in.
    pub fn interval(self) -> (f64, f64) {
        match self {
            ConstraintBound::Equal(v) => (v, v),
            ConstraintBound::LessEqual(v) => (f64::NEG_INFINITY, v),
            ConstraintBound::GreaterEqual(v) => (v, f64::INFINITY),
            ConstraintBound::Range { lower, upper } => (lower, upper),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Objective {
    /// Sparse coefficients keyed by variable index; absent means zero
    pub coefficients: BTreeMap<usize, f64>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

/// Information about a violated constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Value of the constraint expression
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Constraint {constraint} references variable {index}, but the model has {len} variables")]
    UnknownVariable { constraint: String, index: usize, len: usize },
    #[error("Variable {0} has lower bound above upper bound")]
    InvertedBounds(String),
    #[error("Variable {0} must have a finite lower bound")]
    UnboundedBelow(String),
    #[error("Constraint {0} has an empty range")]
    EmptyRange(String),
    #[error("Non-finite coefficient in {0}")]
    NonFiniteCoefficient(String),
}

impl Constraint {
    pub fn new(name: impl Into<String>, bound: ConstraintBound) -> Self {
        Self {
            name: name.into(),
            coefficients: BTreeMap::new(),
            bound,
        }
    }

    /// Adds `coefficient` to the term for `index`, merging repeated indices.
    pub fn add_term(&mut self, index: usize, coefficient: f64) -> &mut Self {
        *self.coefficients.entry(index).or_insert(0.0) += coefficient;
        self
    }

    /// Value of the constraint expression for the given assignment.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .map(|(&j, &coef)| coef * values.get(j).copied().unwrap_or(0.0))
            .sum()
    }
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a variable and returns its index.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64, domain: Domain) -> usize {
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
            domain,
        });
        self.variables.len() - 1
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, coefficients: BTreeMap<usize, f64>, direction: Direction) {
        self.objective = Objective { coefficients, direction };
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Checks that every index is in range and every bound is usable by an engine.
    pub fn validate(&self) -> Result<(), ModelError> {
        let len = self.variables.len();
        for v in &self.variables {
            if !v.lower.is_finite() {
                return Err(ModelError::UnboundedBelow(v.name.clone()));
            }
            if v.upper.is_nan() || v.lower > v.upper {
                return Err(ModelError::InvertedBounds(v.name.clone()));
            }
        }

        for c in &self.constraints {
            if let Some((&index, _)) = c.coefficients.range(len..).next() {
                return Err(ModelError::UnknownVariable {
                    constraint: c.name.clone(),
                    index,
                    len,
                });
            }
            if c.coefficients.values().any(|x| !x.is_finite()) {
                return Err(ModelError::NonFiniteCoefficient(c.name.clone()));
            }
            let (lower, upper) = c.bound.interval();
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(ModelError::EmptyRange(c.name.clone()));
            }
        }

        if let Some((&index, _)) = self.objective.coefficients.range(len..).next() {
            return Err(ModelError::UnknownVariable {
                constraint: "objective".to_string(),
                index,
                len,
            });
        }
        if self.objective.coefficients.values().any(|x| !x.is_finite()) {
            return Err(ModelError::NonFiniteCoefficient("objective".to_string()));
        }

        Ok(())
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .map(|(&j, &coef)| coef * values.get(j).copied().unwrap_or(0.0))
            .sum()
    }

    /// Constraints not satisfied by `values` within `tolerance`, worst first.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let lhs = c.activity(values);
            let (lower, upper) = c.bound.interval();

            let (violation_amount, description) = if lhs < lower - tolerance {
                let amt = lower - lhs;
                (amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, lower, amt))
            } else if lhs > upper + tolerance {
                let amt = lhs - upper;
                (amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, upper, amt))
            } else {
                continue;
            };

            violations.push(ConstraintViolation {
                constraint: c.name.clone(),
                actual: lhs,
                violation_amount,
                description,
            });
        }

        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        violations
    }
}
