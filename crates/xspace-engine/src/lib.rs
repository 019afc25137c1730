#![doc = include_str!("../README.md")]

//! Explanation search engine.
//!
//! Bounds and explanations, the verifier capability trait and its SMT
//! implementation, the strategy chain, and the framework that runs it over
//! a dataset.

pub mod bound;
pub mod config;
pub mod domain;
pub mod error;
pub mod explanation;
pub mod framework;
pub mod parse;
pub mod report;
pub mod smt_verifier;
pub mod strategy;
pub mod var_bound;
pub mod verifier;

pub use bound::{Bound, Interval};
pub use config::{Config, ExplanationType, SampleFilter};
pub use domain::FeatureSpace;
pub use error::ExplainError;
pub use explanation::{Explanation, PrintFormat};
pub use framework::Framework;
pub use report::{CheckVerdict, ExplainRun, RunSummary, SampleReport};
pub use smt_verifier::SmtVerifier;
pub use strategy::{parse_strategies, Strategy, VarOrdering};
pub use var_bound::VarBound;
pub use verifier::{Answer, UnsatCore, Verifier, VerifierError};
