//! Explanation search strategies.
//!
//! A strategy rewrites an [`Explanation`] in place by querying the verifier.
//! Strategies run in a chain; each starts from what the previous one left.

mod abductive;
mod interpolation;
mod slice;
mod trial_and_error;
mod unsat_core;

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};
use xspace_smt::solver::{ArithItpAlgorithm, BoolItpAlgorithm, InterpolationOptions};

use crate::domain::FeatureSpace;
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::var_bound::VarBound;
use crate::verifier::{Answer, Verifier};

pub use interpolation::parse_interpolant;

/// Order in which features are visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VarOrdering {
    #[default]
    Regular,
    Reverse,
    /// Must be a permutation of `0..n`.
    Manual(Vec<usize>),
}

impl VarOrdering {
    pub fn resolve(&self, n: usize) -> Result<Vec<usize>, ExplainError> {
        match self {
            VarOrdering::Regular => Ok((0..n).collect()),
            VarOrdering::Reverse => Ok((0..n).rev().collect()),
            VarOrdering::Manual(order) => {
                let mut seen = vec![false; n];
                for &i in order {
                    if i >= n || std::mem::replace(&mut seen[i], true) {
                        return Err(ExplainError::precondition(format!(
                            "manual order {order:?} is not a permutation of 0..{n}"
                        )));
                    }
                }
                if order.len() != n {
                    return Err(ExplainError::precondition(format!(
                        "manual order {order:?} is not a permutation of 0..{n}"
                    )));
                }
                Ok(order.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnsatCoreConfig {
    /// Split points and intervals into separately marked lower and upper terms.
    pub split_eq: bool,
    /// Ask the backend for minimal cores.
    pub minimal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialAndErrorConfig {
    pub max_attempts: u32,
}

impl Default for TrialAndErrorConfig {
    fn default() -> Self {
        Self { max_attempts: 4 }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationConfig {
    pub options: InterpolationOptions,
    /// One interpolant per feature instead of one for the whole explanation.
    pub per_feature: bool,
    /// Drop redundant features with an unsat-core pass afterwards.
    pub final_ucore: bool,
    /// Only these features go into the A-partition; `None` means all.
    pub vars: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceConfig {
    pub vars: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Abductive,
    UnsatCore(UnsatCoreConfig),
    TrialAndError(TrialAndErrorConfig),
    Interpolation(InterpolationConfig),
    Slice(SliceConfig),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Abductive => "abductive",
            Strategy::UnsatCore(_) => "ucore",
            Strategy::TrialAndError(_) => "trial",
            Strategy::Interpolation(_) => "itp",
            Strategy::Slice(_) => "slice",
        }
    }

    pub fn requires_unsat_core(&self) -> bool {
        match self {
            Strategy::UnsatCore(_) => true,
            Strategy::Interpolation(c) => c.final_ucore,
            _ => false,
        }
    }

    pub fn requires_interpolation(&self) -> bool {
        matches!(self, Strategy::Interpolation(_))
    }

    /// Fail early when the verifier lacks a capability this strategy needs.
    pub fn validate(&self, verifier: &dyn Verifier, space: &FeatureSpace) -> Result<(), ExplainError> {
        if self.requires_unsat_core() && !verifier.supports_unsat_core() {
            return Err(ExplainError::UnsupportedConfiguration(format!(
                "strategy `{}` needs unsat cores",
                self.name()
            )));
        }
        if self.requires_interpolation() && !verifier.supports_interpolation() {
            return Err(ExplainError::UnsupportedConfiguration(format!(
                "strategy `{}` needs interpolation",
                self.name()
            )));
        }
        let vars = match self {
            Strategy::Interpolation(c) => c.vars.as_deref().unwrap_or(&[]),
            Strategy::Slice(c) => &c.vars,
            _ => &[],
        };
        for &v in vars {
            space.check_index(v)?;
        }
        Ok(())
    }

    /// Solver options this strategy needs; applied before the model is loaded.
    pub fn configure(&self, verifier: &mut dyn Verifier) -> Result<(), ExplainError> {
        match self {
            Strategy::UnsatCore(c) if c.minimal => verifier.set_minimal_unsat_core(true)?,
            Strategy::Interpolation(c) => verifier.set_interpolation_options(&c.options)?,
            _ => {}
        }
        Ok(())
    }

    /// Whether this strategy only removes whole features.
    pub fn is_abductive_only(&self) -> bool {
        matches!(self, Strategy::Abductive)
    }

    pub fn execute(&self, session: &mut Session<'_>, explanation: &mut Explanation) -> Result<(), ExplainError> {
        let order = self.execute_init(session)?;
        self.execute_body(session, explanation, &order)?;
        self.execute_finish(session, explanation);
        Ok(())
    }

    fn execute_init(&self, session: &Session<'_>) -> Result<Vec<usize>, ExplainError> {
        debug!(strategy = self.name(), "strategy start");
        session.ordering.resolve(session.space.len())
    }

    fn execute_body(
        &self,
        session: &mut Session<'_>,
        explanation: &mut Explanation,
        order: &[usize],
    ) -> Result<(), ExplainError> {
        match self {
            Strategy::Abductive => abductive::run(session, explanation, order),
            Strategy::UnsatCore(c) => unsat_core::run(session, explanation, c),
            Strategy::TrialAndError(c) => trial_and_error::run(session, explanation, c, order),
            Strategy::Interpolation(c) => interpolation::run(session, explanation, c, order),
            Strategy::Slice(c) => slice::run(session, explanation, c),
        }
    }

    fn execute_finish(&self, session: &Session<'_>, explanation: &Explanation) {
        debug!(
            strategy = self.name(),
            features = explanation.len(),
            terms = explanation.term_count(),
            checks = session.verifier.checks_count(),
            "strategy done"
        );
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Strategy::Abductive => Ok(()),
            Strategy::UnsatCore(c) => {
                write!(f, " {}", if c.split_eq { "interval" } else { "sample" })?;
                if c.minimal {
                    write!(f, " min")?;
                }
                Ok(())
            }
            Strategy::TrialAndError(c) => write!(f, " n {}", c.max_attempts),
            Strategy::Interpolation(c) => {
                let bool_alg = match c.options.bool_algorithm {
                    BoolItpAlgorithm::Weak => "bweak",
                    BoolItpAlgorithm::Strong => "bstrong",
                };
                write!(f, " {bool_alg}")?;
                match c.options.arith_algorithm {
                    ArithItpAlgorithm::Weak => write!(f, " aweak")?,
                    ArithItpAlgorithm::Weaker => write!(f, " aweaker")?,
                    ArithItpAlgorithm::Strong => write!(f, " astrong")?,
                    ArithItpAlgorithm::Stronger => write!(f, " astronger")?,
                    ArithItpAlgorithm::Factor(k) => write!(f, " afactor {k}")?,
                }
                if c.per_feature {
                    write!(f, " interval")?;
                }
                if c.final_ucore {
                    write!(f, " ucore")?;
                }
                if let Some(vars) = &c.vars {
                    write!(f, " vars")?;
                    for v in vars {
                        write!(f, " {}", crate::domain::feature_name(*v))?;
                    }
                }
                Ok(())
            }
            Strategy::Slice(c) => {
                for v in &c.vars {
                    write!(f, " {}", crate::domain::feature_name(*v))?;
                }
                Ok(())
            }
        }
    }
}

fn spec_error(message: impl Into<String>) -> ExplainError {
    ExplainError::StrategySpec(message.into())
}

fn parse_var(token: &str) -> Result<usize, ExplainError> {
    crate::domain::parse_feature_name(token)
        .ok_or_else(|| spec_error(format!("`{token}` is not a variable name (expected x1, x2, ...)")))
}

fn parse_vars<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<usize>, ExplainError> {
    let vars = tokens.map(parse_var).collect::<Result<Vec<_>, _>>()?;
    if vars.is_empty() {
        return Err(spec_error("expected at least one variable"));
    }
    Ok(vars)
}

impl FromStr for Strategy {
    type Err = ExplainError;

    /// One strategy: `name param...`, names and keywords case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let Some(name) = tokens.next() else {
            return Err(spec_error("empty strategy"));
        };
        let invalid = |name: &str, param: &str| spec_error(format!("strategy `{name}`: invalid parameter `{param}`"));
        match name.to_ascii_lowercase().as_str() {
            "abductive" => match tokens.next() {
                None => Ok(Strategy::Abductive),
                Some(extra) => Err(invalid("abductive", extra)),
            },
            "ucore" => {
                let mut config = UnsatCoreConfig::default();
                for token in tokens {
                    match token.to_ascii_lowercase().as_str() {
                        "sample" => config.split_eq = false,
                        "interval" => config.split_eq = true,
                        "min" => config.minimal = true,
                        _ => return Err(invalid("ucore", token)),
                    }
                }
                Ok(Strategy::UnsatCore(config))
            }
            "trial" => {
                let mut config = TrialAndErrorConfig::default();
                while let Some(token) = tokens.next() {
                    if !token.eq_ignore_ascii_case("n") {
                        return Err(invalid("trial", token));
                    }
                    config.max_attempts = tokens
                        .next()
                        .and_then(|k| k.parse::<u32>().ok())
                        .filter(|k| *k > 0)
                        .ok_or_else(|| spec_error("strategy `trial`: `n` needs a positive count"))?;
                }
                Ok(Strategy::TrialAndError(config))
            }
            "itp" => parse_interpolation(tokens.collect()),
            "slice" => Ok(Strategy::Slice(SliceConfig {
                vars: parse_vars(tokens)?,
            })),
            other => Err(spec_error(format!("unknown strategy `{other}`"))),
        }
    }
}

fn parse_interpolation(tokens: Vec<&str>) -> Result<Strategy, ExplainError> {
    let mut config = InterpolationConfig::default();
    let opts = &mut config.options;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        i += 1;
        match token.to_ascii_lowercase().as_str() {
            "weak" => {
                opts.bool_algorithm = BoolItpAlgorithm::Weak;
                opts.arith_algorithm = ArithItpAlgorithm::Weak;
            }
            "strong" => {
                opts.bool_algorithm = BoolItpAlgorithm::Strong;
                opts.arith_algorithm = ArithItpAlgorithm::Strong;
            }
            "weaker" => {
                opts.bool_algorithm = BoolItpAlgorithm::Weak;
                opts.arith_algorithm = ArithItpAlgorithm::Weaker;
            }
            "stronger" => {
                opts.bool_algorithm = BoolItpAlgorithm::Strong;
                opts.arith_algorithm = ArithItpAlgorithm::Stronger;
            }
            "bweak" => opts.bool_algorithm = BoolItpAlgorithm::Weak,
            "bstrong" => opts.bool_algorithm = BoolItpAlgorithm::Strong,
            "aweak" => opts.arith_algorithm = ArithItpAlgorithm::Weak,
            "astrong" => opts.arith_algorithm = ArithItpAlgorithm::Strong,
            "aweaker" => opts.arith_algorithm = ArithItpAlgorithm::Weaker,
            "astronger" => opts.arith_algorithm = ArithItpAlgorithm::Stronger,
            "afactor" => {
                let factor = tokens
                    .get(i)
                    .and_then(|f| f.parse::<f64>().ok())
                    .filter(|f| (0.0..=1.0).contains(f))
                    .ok_or_else(|| spec_error("strategy `itp`: `afactor` needs a factor in [0, 1]"))?;
                i += 1;
                opts.arith_algorithm = ArithItpAlgorithm::Factor(factor);
            }
            "interval" => config.per_feature = true,
            "ucore" => config.final_ucore = true,
            "vars" => {
                // variables run until the next keyword
                let start = i;
                while i < tokens.len() && parse_var(tokens[i]).is_ok() {
                    i += 1;
                }
                config.vars = Some(parse_vars(tokens[start..i].iter().copied())?);
            }
            _ => {
                return Err(spec_error(format!("strategy `itp`: invalid parameter `{token}`")));
            }
        }
    }
    Ok(Strategy::Interpolation(config))
}

/// Parse a comma-separated strategy chain.
pub fn parse_strategies(spec: &str) -> Result<Vec<Strategy>, ExplainError> {
    let chain = spec
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Strategy::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err(spec_error("no strategies given"));
    }
    Ok(chain)
}

/// Everything a strategy needs while it works on one sample.
pub struct Session<'a> {
    pub verifier: &'a mut dyn Verifier,
    pub space: &'a FeatureSpace,
    pub sample: &'a [f64],
    pub ordering: &'a VarOrdering,
    pub unknown_answers: u64,
    pub warnings: Vec<String>,
}

impl<'a> Session<'a> {
    pub fn new(
        verifier: &'a mut dyn Verifier,
        space: &'a FeatureSpace,
        sample: &'a [f64],
        ordering: &'a VarOrdering,
    ) -> Self {
        Self {
            verifier,
            space,
            sample,
            ordering,
            unknown_answers: 0,
            warnings: Vec::new(),
        }
    }

    /// Check; a backend failure aborts the sample, UNKNOWN is counted.
    pub fn check(&mut self) -> Result<Answer, ExplainError> {
        match self.verifier.check() {
            Answer::Error => Err(ExplainError::SolverError(format!(
                "check {} failed",
                self.verifier.checks_count()
            ))),
            Answer::Unknown => {
                self.unknown_answers += 1;
                warn!(check = self.verifier.checks_count(), "solver answered unknown");
                Ok(Answer::Unknown)
            }
            answer => Ok(answer),
        }
    }

    /// Run `f` between a push and a pop; the pop also happens when `f` fails.
    pub fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExplainError>,
    ) -> Result<T, ExplainError> {
        self.verifier.push()?;
        let result = f(self);
        let popped = self.verifier.pop();
        let value = result?;
        popped?;
        Ok(value)
    }

    pub fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Assert one entry on input `feature`.
    pub fn assert_var_bound(
        &mut self,
        feature: usize,
        bound: &VarBound,
        marked: bool,
        split_eq: bool,
    ) -> Result<(), ExplainError> {
        let v = &mut *self.verifier;
        match *bound {
            VarBound::Point { value } if marked && split_eq => {
                v.add_lower_bound(0, feature, value, true)?;
                v.add_upper_bound(0, feature, value, true)?;
            }
            VarBound::Point { value } => v.add_equality(0, feature, value, marked)?,
            VarBound::Lower { value } => v.add_lower_bound(0, feature, value, marked)?,
            VarBound::Upper { value } => v.add_upper_bound(0, feature, value, marked)?,
            VarBound::Interval { lower, upper } if marked && !split_eq => {
                v.add_interval(0, feature, lower, upper, true)?;
            }
            VarBound::Interval { lower, upper } => {
                v.add_lower_bound(0, feature, lower, marked)?;
                v.add_upper_bound(0, feature, upper, marked)?;
            }
        }
        Ok(())
    }

    /// Assert every entry except `skip`; `marked` decides per feature.
    pub fn assert_explanation(
        &mut self,
        explanation: &Explanation,
        skip: Option<usize>,
        marked: impl Fn(usize) -> bool,
        split_eq: bool,
    ) -> Result<(), ExplainError> {
        for (&feature, bound) in explanation {
            if Some(feature) == skip {
                continue;
            }
            self.assert_var_bound(feature, bound, marked(feature), split_eq)?;
        }
        Ok(())
    }
}
