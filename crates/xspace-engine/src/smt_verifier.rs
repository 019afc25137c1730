//! [`Verifier`] over any [`SmtSolver`] backend.
//!
//! The network is encoded over Real variables: `x{i+1}` for inputs,
//! `n{l}_{j}` for node `j` of layer `l`. Hidden nodes are
//! `ite(sum >= 0, sum, 0)`, output nodes are affine.

use std::collections::HashMap;

use tracing::{debug, warn};
use xspace_nn::NNet;
use xspace_smt::solver::{InterpolationOptions, SatResult, SmtSolver};
use xspace_smt::sorts::SmtSort;
use xspace_smt::terms::{rational_from_f64, rational_to_f64, SmtTerm};

use crate::domain::feature_name;
use crate::verifier::{Answer, UnsatCore, Verifier, VerifierError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkKind {
    Equality,
    Lower,
    Upper,
    Interval,
}

impl MarkKind {
    fn prefix(self) -> &'static str {
        match self {
            MarkKind::Equality => "eq",
            MarkKind::Lower => "lo",
            MarkKind::Upper => "hi",
            MarkKind::Interval => "iv",
        }
    }
}

pub struct SmtVerifier<S: SmtSolver> {
    solver: S,
    /// Layer sizes of the loaded network.
    layers: Option<Vec<usize>>,
    /// Marked assertion names per checkpoint; index 0 is the base scope.
    scopes: Vec<Vec<String>>,
    marks: HashMap<String, (usize, MarkKind)>,
    next_mark: u64,
    checks: u64,
}

fn solver_error(e: impl std::error::Error) -> VerifierError {
    VerifierError::Solver(e.to_string())
}

fn literal(value: f64) -> Result<SmtTerm, VerifierError> {
    rational_from_f64(value)
        .map(SmtTerm::real)
        .ok_or(VerifierError::InvalidValue(value))
}

/// Solver variable of node `node` in `layer`.
pub fn node_name(layer: usize, node: usize) -> String {
    if layer == 0 {
        feature_name(node)
    } else {
        format!("n{layer}_{node}")
    }
}

impl<S: SmtSolver> SmtVerifier<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            layers: None,
            scopes: vec![Vec::new()],
            marks: HashMap::new(),
            next_mark: 0,
            checks: 0,
        }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn into_inner(self) -> S {
        self.solver
    }

    /// Variable of a node that may carry bounds (input or output layer).
    fn bound_target(&self, layer: usize, node: usize) -> Result<String, VerifierError> {
        let layers = self.layers.as_ref().ok_or(VerifierError::ModelNotLoaded)?;
        let output = layers.len() - 1;
        if layer != 0 && layer != output {
            return Err(VerifierError::InvalidLayer(layer));
        }
        if node >= layers[layer] {
            return Err(VerifierError::InvalidNode { layer, node });
        }
        Ok(node_name(layer, node))
    }

    fn assert_bound(
        &mut self,
        term: SmtTerm,
        feature: usize,
        kind: MarkKind,
        var: &str,
        marked: bool,
    ) -> Result<(), VerifierError> {
        if !marked {
            return self.solver.assert(&term).map_err(solver_error);
        }
        let name = format!("{}_{var}_{}", kind.prefix(), self.next_mark);
        self.next_mark += 1;
        self.solver.assert_named(&name, &term).map_err(solver_error)?;
        self.marks.insert(name.clone(), (feature, kind));
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name);
        }
        Ok(())
    }

    fn live_marks(&self) -> Vec<String> {
        self.scopes
            .iter()
            .flatten()
            .filter(|n| self.marks.contains_key(*n))
            .cloned()
            .collect()
    }

    fn encode(&mut self, network: &NNet) -> Result<(), VerifierError> {
        for i in 0..network.input_size() {
            let name = feature_name(i);
            self.solver
                .declare_var(&name, &SmtSort::Real)
                .map_err(solver_error)?;
            let x = SmtTerm::var(&name);
            let lo = literal(network.input_lower_bound(i))?;
            let hi = literal(network.input_upper_bound(i))?;
            self.solver.assert(&x.clone().ge(lo)).map_err(solver_error)?;
            self.solver.assert(&x.le(hi)).map_err(solver_error)?;
        }

        let output = network.output_layer();
        for layer in 1..network.num_layers() {
            for node in 0..network.layer_size(layer) {
                let mut terms = Vec::new();
                for (prev, &w) in network.weights(layer, node).iter().enumerate() {
                    if w != 0.0 {
                        terms.push(literal(w)?.mul(SmtTerm::var(node_name(layer - 1, prev))));
                    }
                }
                let bias = network.bias(layer, node);
                if bias != 0.0 || terms.is_empty() {
                    terms.push(literal(bias)?);
                }
                let sum = SmtTerm::sum(terms);
                let value = if layer == output {
                    sum
                } else {
                    let zero = literal(0.0)?;
                    SmtTerm::ite(sum.clone().ge(zero.clone()), sum, zero)
                };
                let name = node_name(layer, node);
                self.solver
                    .declare_var(&name, &SmtSort::Real)
                    .map_err(solver_error)?;
                self.solver
                    .assert(&SmtTerm::var(name).eq(value))
                    .map_err(solver_error)?;
            }
        }
        Ok(())
    }
}

impl<S: SmtSolver> Verifier for SmtVerifier<S> {
    fn load_model(&mut self, network: &NNet) -> Result<(), VerifierError> {
        if self.layers.is_some() {
            self.reset()?;
        }
        self.encode(network)?;
        self.layers = Some(
            (0..network.num_layers())
                .map(|l| network.layer_size(l))
                .collect(),
        );
        debug!(
            inputs = network.input_size(),
            outputs = network.output_size(),
            layers = network.num_layers(),
            "network encoded"
        );
        Ok(())
    }

    fn push(&mut self) -> Result<(), VerifierError> {
        self.solver.push().map_err(solver_error)?;
        self.scopes.push(Vec::new());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), VerifierError> {
        if self.scopes.len() <= 1 {
            return Err(VerifierError::EmptyStack);
        }
        self.solver.pop().map_err(solver_error)?;
        if let Some(names) = self.scopes.pop() {
            for name in names {
                self.marks.remove(&name);
            }
        }
        Ok(())
    }

    fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    fn add_lower_bound(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError> {
        let var = self.bound_target(layer, node)?;
        let term = SmtTerm::var(&var).ge(literal(value)?);
        self.assert_bound(term, node, MarkKind::Lower, &var, marked)
    }

    fn add_upper_bound(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError> {
        let var = self.bound_target(layer, node)?;
        let term = SmtTerm::var(&var).le(literal(value)?);
        self.assert_bound(term, node, MarkKind::Upper, &var, marked)
    }

    fn add_equality(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError> {
        let var = self.bound_target(layer, node)?;
        let term = SmtTerm::var(&var).eq(literal(value)?);
        self.assert_bound(term, node, MarkKind::Equality, &var, marked)
    }

    fn add_interval(
        &mut self,
        layer: usize,
        node: usize,
        lower: f64,
        upper: f64,
        marked: bool,
    ) -> Result<(), VerifierError> {
        let var = self.bound_target(layer, node)?;
        let x = SmtTerm::var(&var);
        let term = SmtTerm::and(vec![x.clone().ge(literal(lower)?), x.le(literal(upper)?)]);
        self.assert_bound(term, node, MarkKind::Interval, &var, marked)
    }

    fn add_classification_constraint(
        &mut self,
        label: usize,
        threshold: f64,
    ) -> Result<(), VerifierError> {
        let layers = self.layers.as_ref().ok_or(VerifierError::ModelNotLoaded)?;
        let output = layers.len() - 1;
        let outputs = layers[output];
        if outputs < 2 {
            return Err(VerifierError::Unsupported(
                "a multi-class constraint on a single-output network",
            ));
        }
        if label >= outputs {
            return Err(VerifierError::InvalidLabel { label, outputs });
        }
        let target = SmtTerm::var(node_name(output, label));
        let threshold = literal(threshold)?;
        let flips = (0..outputs)
            .filter(|&i| i != label)
            .map(|i| {
                SmtTerm::var(node_name(output, i))
                    .sub(target.clone())
                    .gt(threshold.clone())
            })
            .collect();
        self.solver
            .assert(&SmtTerm::or(flips))
            .map_err(solver_error)
    }

    fn check(&mut self) -> Answer {
        self.checks += 1;
        let answer = match self.solver.check_sat() {
            Ok(SatResult::Sat) => Answer::Sat,
            Ok(SatResult::Unsat) => Answer::Unsat,
            Ok(SatResult::Unknown(reason)) => {
                debug!(%reason, "solver returned unknown");
                Answer::Unknown
            }
            Err(e) => {
                warn!(error = %e, "solver check failed");
                Answer::Error
            }
        };
        debug!(check = self.checks, ?answer, "check");
        answer
    }

    fn check_with_model(&mut self) -> (Answer, Option<Vec<f64>>) {
        self.checks += 1;
        let inputs = self.layers.as_ref().map_or(0, |l| l[0]);
        let names: Vec<String> = (0..inputs).map(feature_name).collect();
        let query: Vec<(&str, &SmtSort)> = names.iter().map(|n| (n.as_str(), &SmtSort::Real)).collect();
        match self.solver.check_sat_with_model(&query) {
            Ok((SatResult::Sat, model)) => {
                let values = model.map(|m| {
                    names
                        .iter()
                        .map(|n| m.get_real(n).map_or(f64::NAN, |r| rational_to_f64(&r)))
                        .collect()
                });
                (Answer::Sat, values)
            }
            Ok((SatResult::Unsat, _)) => (Answer::Unsat, None),
            Ok((SatResult::Unknown(reason), _)) => {
                debug!(%reason, "solver returned unknown");
                (Answer::Unknown, None)
            }
            Err(e) => {
                warn!(error = %e, "solver check failed");
                (Answer::Error, None)
            }
        }
    }

    fn reset_sample(&mut self) {
        self.marks.clear();
        for scope in &mut self.scopes {
            scope.clear();
        }
    }

    fn reset(&mut self) -> Result<(), VerifierError> {
        self.solver.reset().map_err(solver_error)?;
        self.layers = None;
        self.scopes = vec![Vec::new()];
        self.marks.clear();
        Ok(())
    }

    fn checks_count(&self) -> u64 {
        self.checks
    }

    fn reset_checks_count(&mut self) {
        self.checks = 0;
    }

    fn supports_unsat_core(&self) -> bool {
        self.solver.supports_named_unsat_core()
    }

    fn unsat_core(&mut self) -> Result<UnsatCore, VerifierError> {
        if !self.supports_unsat_core() {
            return Err(VerifierError::Unsupported("unsat core extraction"));
        }
        let names = self.solver.get_unsat_core().map_err(solver_error)?;
        let mut core = UnsatCore::default();
        for name in names {
            let Some(&(feature, kind)) = self.marks.get(&name) else {
                continue;
            };
            let list = match kind {
                MarkKind::Equality => &mut core.equalities,
                MarkKind::Lower => &mut core.lower_bounds,
                MarkKind::Upper => &mut core.upper_bounds,
                MarkKind::Interval => &mut core.intervals,
            };
            list.push(feature);
        }
        for list in [
            &mut core.equalities,
            &mut core.lower_bounds,
            &mut core.upper_bounds,
            &mut core.intervals,
        ] {
            list.sort_unstable();
            list.dedup();
        }
        Ok(core)
    }

    fn set_minimal_unsat_core(&mut self, minimal: bool) -> Result<(), VerifierError> {
        self.solver
            .set_minimal_unsat_core(minimal)
            .map_err(solver_error)
    }

    fn supports_interpolation(&self) -> bool {
        self.solver.supports_interpolation()
    }

    fn set_interpolation_options(
        &mut self,
        options: &InterpolationOptions,
    ) -> Result<(), VerifierError> {
        self.solver
            .set_interpolation_options(options)
            .map_err(solver_error)
    }

    fn interpolant(&mut self) -> Result<SmtTerm, VerifierError> {
        let partition = self.live_marks();
        self.solver
            .get_interpolant(&partition)
            .map_err(solver_error)?
            .ok_or(VerifierError::Unsupported("interpolation"))
    }
}
