use miette::Diagnostic;
use thiserror::Error;
use xspace_nn::{DatasetError, ModelError};

use crate::verifier::VerifierError;

#[derive(Debug, Error, Diagnostic)]
pub enum ExplainError {
    #[error("precondition violated: {0}")]
    #[diagnostic(code(xspace::explain::precondition))]
    PreconditionViolation(String),

    #[error("unsupported configuration: {0}")]
    #[diagnostic(
        code(xspace::explain::unsupported),
        help("unsat cores need z3 or cvc5; interpolation needs the opensmt solver")
    )]
    UnsupportedConfiguration(String),

    #[error("solver error: {0}")]
    #[diagnostic(code(xspace::explain::solver))]
    SolverError(String),

    #[error("invalid strategy specification: {0}")]
    #[diagnostic(
        code(xspace::strategy::spec),
        help("strategies are comma-separated, e.g. `abductive, trial n 4` or `ucore interval min`")
    )]
    StrategySpec(String),

    #[error("verifier error: {0}")]
    #[diagnostic(code(xspace::explain::verifier))]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dataset(#[from] DatasetError),
}

impl ExplainError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        ExplainError::PreconditionViolation(message.into())
    }
}
