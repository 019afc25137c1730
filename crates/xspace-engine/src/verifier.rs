//! The decision oracle the strategies query.
//!
//! A [`Verifier`] owns one solver session holding the network encoding and a
//! stack of checkpoints. Strategies only see this trait (as
//! `&mut dyn Verifier`), so they never depend on a concrete backend.

use miette::Diagnostic;
use thiserror::Error;
use xspace_nn::NNet;
use xspace_smt::solver::InterpolationOptions;
use xspace_smt::terms::SmtTerm;

/// Outcome of a single check.
///
/// `Unsat` means no input in the asserted region changes the
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Sat,
    Unsat,
    Unknown,
    Error,
}

#[derive(Debug, Error, Diagnostic)]
pub enum VerifierError {
    #[error("solver failure: {0}")]
    #[diagnostic(code(xspace::verifier::solver))]
    Solver(String),

    #[error("bounds are only allowed on the input or output layer, got layer {0}")]
    #[diagnostic(code(xspace::verifier::layer))]
    InvalidLayer(usize),

    #[error("layer {layer} has no node {node}")]
    #[diagnostic(code(xspace::verifier::node))]
    InvalidNode { layer: usize, node: usize },

    #[error("label {label} is out of range for {outputs} outputs")]
    #[diagnostic(code(xspace::verifier::label))]
    InvalidLabel { label: usize, outputs: usize },

    #[error("pop without a matching push")]
    #[diagnostic(code(xspace::verifier::stack))]
    EmptyStack,

    #[error("{0} is not supported by this verifier")]
    #[diagnostic(code(xspace::verifier::unsupported))]
    Unsupported(&'static str),

    #[error("value {0} cannot be encoded")]
    #[diagnostic(code(xspace::verifier::value))]
    InvalidValue(f64),

    #[error("no model is loaded")]
    #[diagnostic(code(xspace::verifier::no_model))]
    ModelNotLoaded,
}

/// Marked assertions of the last UNSAT check, by feature index (sorted).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsatCore {
    pub equalities: Vec<usize>,
    pub lower_bounds: Vec<usize>,
    pub upper_bounds: Vec<usize>,
    pub intervals: Vec<usize>,
}

impl UnsatCore {
    pub fn is_empty(&self) -> bool {
        self.equalities.is_empty()
            && self.lower_bounds.is_empty()
            && self.upper_bounds.is_empty()
            && self.intervals.is_empty()
    }

    /// Every feature mentioned, sorted and deduplicated.
    pub fn features(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .equalities
            .iter()
            .chain(&self.lower_bounds)
            .chain(&self.upper_bounds)
            .chain(&self.intervals)
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

pub trait Verifier {
    /// Encode `network`; replaces nothing, call [`reset`](Self::reset) first
    /// to re-encode.
    fn load_model(&mut self, network: &NNet) -> Result<(), VerifierError>;

    fn push(&mut self) -> Result<(), VerifierError>;

    fn pop(&mut self) -> Result<(), VerifierError>;

    /// Current checkpoint depth.
    fn depth(&self) -> usize;

    fn add_lower_bound(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError>;

    fn add_upper_bound(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError>;

    fn add_equality(
        &mut self,
        layer: usize,
        node: usize,
        value: f64,
        marked: bool,
    ) -> Result<(), VerifierError>;

    /// `lower <= node <= upper` as one assertion (one core entry when marked).
    fn add_interval(
        &mut self,
        layer: usize,
        node: usize,
        lower: f64,
        upper: f64,
        marked: bool,
    ) -> Result<(), VerifierError>;

    /// Assert that some output other than `label` exceeds it by more than
    /// `threshold`.
    fn add_classification_constraint(
        &mut self,
        label: usize,
        threshold: f64,
    ) -> Result<(), VerifierError>;

    fn check(&mut self) -> Answer;

    /// Like [`check`](Self::check), with input values of a satisfying
    /// assignment when the answer is `Sat`.
    fn check_with_model(&mut self) -> (Answer, Option<Vec<f64>>);

    /// Forget the marked-assertion registry of the current sample.
    fn reset_sample(&mut self);

    /// Drop everything, including the network encoding.
    fn reset(&mut self) -> Result<(), VerifierError>;

    fn checks_count(&self) -> u64;

    fn reset_checks_count(&mut self);

    fn supports_unsat_core(&self) -> bool {
        false
    }

    fn unsat_core(&mut self) -> Result<UnsatCore, VerifierError> {
        Err(VerifierError::Unsupported("unsat core extraction"))
    }

    fn set_minimal_unsat_core(&mut self, _minimal: bool) -> Result<(), VerifierError> {
        Ok(())
    }

    fn supports_interpolation(&self) -> bool {
        false
    }

    fn set_interpolation_options(
        &mut self,
        _options: &InterpolationOptions,
    ) -> Result<(), VerifierError> {
        Ok(())
    }

    /// Interpolant between the marked assertions and the rest, for the last
    /// UNSAT check.
    fn interpolant(&mut self) -> Result<SmtTerm, VerifierError> {
        Err(VerifierError::Unsupported("interpolation"))
    }
}
