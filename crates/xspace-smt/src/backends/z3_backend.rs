use std::collections::HashMap;

use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::sexpr;
use crate::solver::{Model, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::{Rational, SmtTerm};

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

/// In-process Z3 backend over real arithmetic.
///
/// Named assertions are tracked with Boolean indicator literals
/// (`lit => term`) and every check runs under the live literals as
/// assumptions, so the UNSAT core can be mapped back to names.
pub struct Z3Solver {
    solver: z3::Solver,
    real_vars: HashMap<String, z3::ast::Real>,
    /// Named assertions per push scope; index 0 is the base scope.
    tracked: Vec<Vec<(String, z3::ast::Bool)>>,
    /// Indicator literals of the last check, in core lookup order.
    last_checked: Vec<(String, z3::ast::Bool)>,
    timeout_ms: Option<u32>,
    minimal_core: bool,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self::with_timeout_ms(None)
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let timeout_ms = timeout_secs.saturating_mul(1000);
        Self::with_timeout_ms(Some(u32::try_from(timeout_ms).unwrap_or(u32::MAX)))
    }

    fn with_timeout_ms(timeout_ms: Option<u32>) -> Self {
        let mut solver = Self {
            solver: z3::Solver::new(),
            real_vars: HashMap::new(),
            tracked: vec![Vec::new()],
            last_checked: Vec::new(),
            timeout_ms,
            minimal_core: false,
            _params: None,
        };
        solver.apply_params();
        solver
    }

    fn apply_params(&mut self) {
        if self.timeout_ms.is_none() && !self.minimal_core {
            self._params = None;
            return;
        }
        let mut params = z3::Params::new();
        if let Some(ms) = self.timeout_ms {
            params.set_u32("timeout", ms);
            params.set_u32("solver2_timeout", ms);
        }
        if self.minimal_core {
            params.set_bool("core.minimize", true);
        }
        self.solver.set_params(&params);
        self._params = Some(params);
    }

    fn run_check(&mut self) -> SatResult {
        self.last_checked = self.tracked.iter().flatten().cloned().collect();
        let result = if self.last_checked.is_empty() {
            self.solver.check()
        } else {
            let lits: Vec<z3::ast::Bool> = self.last_checked.iter().map(|(_, lit)| lit.clone()).collect();
            self.solver.check_assumptions(&lits)
        };
        match result {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            ),
        }
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => self
                .real_vars
                .get(name)
                .map(|v| Z3Term::Real(v.clone()))
                .ok_or_else(|| Z3Error::UnknownVariable(name.clone())),
            SmtTerm::RealLit(r) => Ok(Z3Term::Real(real_literal(r))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Real(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Real(&l - &r))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Real(&l * &r))
            }
            SmtTerm::Neg(inner) => {
                let r = self.translate_term(inner)?.into_real()?;
                Ok(Z3Term::Real(&real_literal(&Rational::from_integer(0)) - &r))
            }
            SmtTerm::Eq(lhs, rhs) => match (self.translate_term(lhs)?, self.translate_term(rhs)?) {
                (Z3Term::Bool(l), Z3Term::Bool(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                (l, r) => Ok(Z3Term::Bool(l.into_real()?.eq(&r.into_real()?))),
            },
            SmtTerm::Lt(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Bool(l.gt(&r)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                let (l, r) = self.translate_reals(lhs, rhs)?;
                Ok(Z3Term::Bool(l.ge(&r)))
            }
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                match (self.translate_term(then)?, self.translate_term(els)?) {
                    (Z3Term::Bool(t), Z3Term::Bool(e)) => Ok(Z3Term::Bool(c.ite(&t, &e))),
                    (t, e) => Ok(Z3Term::Real(c.ite(&t.into_real()?, &e.into_real()?))),
                }
            }
        }
    }

    fn translate_reals(&self, lhs: &SmtTerm, rhs: &SmtTerm) -> Result<(z3::ast::Real, z3::ast::Real), Z3Error> {
        Ok((self.translate_term(lhs)?.into_real()?, self.translate_term(rhs)?.into_real()?))
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<z3::ast::Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
            .collect()
    }
}

fn real_literal(r: &Rational) -> z3::ast::Real {
    let numer = z3::ast::Real::from_int(&z3::ast::Int::from_i64(*r.numer()));
    if *r.denom() == 1 {
        return numer;
    }
    let denom = z3::ast::Real::from_int(&z3::ast::Int::from_i64(*r.denom()));
    &numer / &denom
}

/// Read a Z3 real numeral as printed by the model (`(/ 1.0 5.0)`, `1/5`, `0.5`).
fn parse_real_value(text: &str) -> Option<Rational> {
    if let Ok(expr) = sexpr::parse(text) {
        if let Ok(r) = sexpr::parse_rational(&expr) {
            return Some(r);
        }
    }
    let (numer, denom) = text.split_once('/')?;
    let numer = sexpr::parse_numeral(numer.trim()).ok()?;
    let denom = sexpr::parse_numeral(denom.trim()).ok()?;
    (denom != Rational::from_integer(0)).then(|| numer / denom)
}

enum Z3Term {
    Real(z3::ast::Real),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Real(_) => Err(Z3Error::Internal("Expected Bool, got Real".into())),
        }
    }

    fn into_real(self) -> Result<z3::ast::Real, Z3Error> {
        match self {
            Z3Term::Real(r) => Ok(r),
            Z3Term::Bool(_) => Err(Z3Error::Internal("Expected Real, got Bool".into())),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Real => {
                self.real_vars
                    .insert(name.to_string(), z3::ast::Real::new_const(name));
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        self.tracked.push(Vec::new());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        if self.tracked.len() <= 1 {
            return Err(Z3Error::Internal("pop without matching push".into()));
        }
        self.tracked.pop();
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        Ok(self.run_check())
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
        let mut values = HashMap::new();
        for &(name, _) in var_names {
            let Some(v) = self.real_vars.get(name) else {
                continue;
            };
            if let Some(r) = z3_model
                .eval::<z3::ast::Real>(v, true)
                .and_then(|val| parse_real_value(&val.to_string()))
            {
                values.insert(name.to_string(), r);
            }
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn supports_named_unsat_core(&self) -> bool {
        true
    }

    fn assert_named(&mut self, name: &str, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        let lit = z3::ast::Bool::new_const(name);
        self.solver.assert(&lit.implies(&z3_term));
        let scope = self
            .tracked
            .last_mut()
            .ok_or_else(|| Z3Error::Internal("missing base scope".into()))?;
        scope.push((name.to_string(), lit));
        Ok(())
    }

    fn get_unsat_core(&mut self) -> Result<Vec<String>, Z3Error> {
        let core = self.solver.get_unsat_core();
        Ok(core
            .iter()
            .filter_map(|core_lit| {
                self.last_checked
                    .iter()
                    .find(|(_, lit)| lit == core_lit)
                    .map(|(name, _)| name.clone())
            })
            .collect())
    }

    fn set_minimal_unsat_core(&mut self, minimal: bool) -> Result<(), Z3Error> {
        self.minimal_core = minimal;
        self.apply_params();
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply them.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.real_vars.clear();
        self.tracked = vec![Vec::new()];
        self.last_checked.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn real(n: i64, d: i64) -> SmtTerm {
        SmtTerm::real(Rational::new(n, d))
    }

    #[test]
    fn z3_real_strict_bounds_unsat() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x1", &SmtSort::Real)?;

        // 1/3 < x1 < 1/2 is SAT over the reals; adding x1 <= 1/3 is not
        solver.assert(&SmtTerm::var("x1").gt(real(1, 3)))?;
        solver.assert(&SmtTerm::var("x1").lt(real(1, 2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);

        solver.push()?;
        solver.assert(&SmtTerm::var("x1").le(real(1, 3)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        solver.pop()?;

        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_real_model_extraction() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x1", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("x1").mul(real(5, 1)).eq(real(1, 1)))?;

        let vars = vec![("x1", &SmtSort::Real)];
        let (result, model) = solver.check_sat_with_model(&vars)?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get_real("x1"), Some(Rational::new(1, 5)));
        Ok(())
    }

    #[test]
    fn z3_relu_ite_encoding() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x1", &SmtSort::Real)?;
        solver.declare_var("h", &SmtSort::Real)?;

        let zero = real(0, 1);
        let relu = SmtTerm::ite(
            SmtTerm::var("x1").ge(zero.clone()),
            SmtTerm::var("x1"),
            zero.clone(),
        );
        solver.assert(&SmtTerm::var("h").eq(relu))?;
        solver.assert(&SmtTerm::var("x1").le(real(-1, 2)))?;
        solver.assert(&SmtTerm::var("h").gt(zero))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_named_assertions_report_core() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x1", &SmtSort::Real)?;
        solver.declare_var("x2", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("x1").add(SmtTerm::var("x2")).le(real(1, 1)))?;

        solver.push()?;
        solver.assert_named("m0", &SmtTerm::var("x1").ge(real(1, 1)))?;
        solver.assert_named("m1", &SmtTerm::var("x2").ge(real(1, 2)))?;
        solver.assert_named("m2", &SmtTerm::var("x2").le(real(3, 1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        let mut core = solver.get_unsat_core()?;
        core.sort();
        assert_eq!(core, vec!["m0".to_string(), "m1".to_string()]);
        solver.pop()?;

        // Popped names no longer constrain the query
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_pop_without_push_is_an_error() {
        let mut solver = Z3Solver::new();
        assert!(solver.pop().is_err());
    }

    #[test]
    fn z3_timeout_configuration_survives_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(2);
        assert!(
            solver._params.is_some(),
            "timeout-backed solver should persist params for reset()"
        );

        solver.declare_var("x", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("x").eq(real(1, 2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);

        solver.reset()?;
        solver.declare_var("x", &SmtSort::Real)?;
        solver.assert(&SmtTerm::var("x").eq(real(2, 1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        assert!(solver._params.is_some());
        Ok(())
    }

    #[test]
    fn z3_minimal_core_setting_builds_params() -> TestResult {
        let mut solver = Z3Solver::new();
        assert!(solver._params.is_none());
        solver.set_minimal_unsat_core(true)?;
        assert!(solver._params.is_some());
        solver.set_minimal_unsat_core(false)?;
        assert!(solver._params.is_none());
        Ok(())
    }

    #[test]
    fn z3_core_survives_a_second_check_after_pop() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x1", &SmtSort::Real)?;
        solver.assert_named("base", &SmtTerm::var("x1").le(real(0, 1)))?;
        solver.push()?;
        solver.assert_named("m0", &SmtTerm::var("x1").ge(real(1, 1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        let mut core = solver.get_unsat_core()?;
        core.sort();
        assert_eq!(core, vec!["base".to_string(), "m0".to_string()]);
        solver.pop()?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_rejects_bool_arithmetic_and_unknown_vars() {
        let solver = Z3Solver::new();
        let bad = SmtTerm::bool(true).add(real(1, 1));
        assert!(solver.translate_term(&bad).is_err());
        assert!(matches!(
            solver.translate_term(&SmtTerm::var("nope")),
            Err(Z3Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn parse_real_value_accepts_z3_spellings() {
        assert_eq!(parse_real_value("(/ 1.0 5.0)"), Some(Rational::new(1, 5)));
        assert_eq!(parse_real_value("1/5"), Some(Rational::new(1, 5)));
        assert_eq!(parse_real_value("(- 2.0)"), Some(Rational::from_integer(-2)));
        assert_eq!(parse_real_value("0.5"), Some(Rational::new(1, 2)));
    }
}
