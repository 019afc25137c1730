use std::collections::HashMap;

use crate::sorts::SmtSort;
use crate::terms::{Rational, SmtTerm};

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// Real values of the variables requested from a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, Rational>,
}

impl Model {
    pub fn get_real(&self, name: &str) -> Option<Rational> {
        self.values.get(name).copied()
    }
}

/// Boolean part of the interpolation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolItpAlgorithm {
    Weak,
    #[default]
    Strong,
}

/// Linear-arithmetic part of the interpolation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ArithItpAlgorithm {
    #[default]
    Weak,
    Weaker,
    Strong,
    Stronger,
    /// Interpolant strength chosen by a factor in `[0, 1]`.
    Factor(f64),
}

/// Interpolation settings forwarded to backends that support them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InterpolationOptions {
    pub bool_algorithm: BoolItpAlgorithm,
    pub arith_algorithm: ArithItpAlgorithm,
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Returns true when named assertions are reported by `get_unsat_core`.
    fn supports_named_unsat_core(&self) -> bool {
        false
    }

    /// Assert a constraint under a name that can show up in an UNSAT core
    /// or be referenced as part of an interpolation partition.
    ///
    /// Names are unique per solver instance. Backends without naming support
    /// assert the term anonymously.
    fn assert_named(&mut self, _name: &str, term: &SmtTerm) -> Result<(), Self::Error> {
        self.assert(term)
    }

    /// Names of the assertions in the UNSAT core of the previous check.
    fn get_unsat_core(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(Vec::new())
    }

    /// Ask the backend for minimal (irreducible) cores.
    ///
    /// Takes effect after the next `reset` for backends that configure
    /// cores at startup.
    fn set_minimal_unsat_core(&mut self, _minimal: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Returns true when `get_interpolant` can produce Craig interpolants.
    fn supports_interpolation(&self) -> bool {
        false
    }

    fn set_interpolation_options(
        &mut self,
        _options: &InterpolationOptions,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Interpolant between the named assertions in `partition_a` and every
    /// other live assertion, for the previous UNSAT check.
    ///
    /// `None` means the backend cannot interpolate.
    fn get_interpolant(&mut self, _partition_a: &[String]) -> Result<Option<SmtTerm>, Self::Error> {
        Ok(None)
    }

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
