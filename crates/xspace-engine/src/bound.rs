//! Single-feature constraints: one-sided or equality [`Bound`]s and closed
//! [`Interval`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use xspace_smt::terms::{rational_from_decimal, SmtTerm};

use crate::error::ExplainError;

/// A constraint on one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Bound {
    /// `feature = v`
    Eq(f64),
    /// `feature >= v`
    Lower(f64),
    /// `feature <= v`
    Upper(f64),
}

impl Bound {
    pub fn value(&self) -> f64 {
        match self {
            Bound::Eq(v) | Bound::Lower(v) | Bound::Upper(v) => *v,
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        match self {
            Bound::Eq(v) => x == *v,
            Bound::Lower(v) => x >= *v,
            Bound::Upper(v) => x <= *v,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            Bound::Eq(_) => "=",
            Bound::Lower(_) => ">=",
            Bound::Upper(_) => "<=",
        }
    }

    /// SMT-LIB term over the variable `var`, with the value as a short rational.
    pub fn to_term(&self, var: &str) -> Result<SmtTerm, ExplainError> {
        let value = SmtTerm::real(decimal(self.value())?);
        let x = SmtTerm::var(var);
        Ok(match self {
            Bound::Eq(_) => x.eq(value),
            Bound::Lower(_) => x.ge(value),
            Bound::Upper(_) => x.le(value),
        })
    }
}

pub(crate) fn decimal(value: f64) -> Result<xspace_smt::terms::Rational, ExplainError> {
    rational_from_decimal(value)
        .ok_or_else(|| ExplainError::precondition(format!("value {value} is not representable")))
}

/// A closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// `None` when `lower > upper` or either end is NaN.
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        (lower <= upper).then_some(Self { lower, upper })
    }

    pub fn point(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn size(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        Interval::new(self.lower.max(other.lower), self.upper.min(other.upper))
    }

    /// Clamp `x` into the interval.
    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.lower).min(self.upper)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_point() {
            write!(f, "[{}]", self.lower)
        } else {
            write!(f, "[{},{}]", self.lower, self.upper)
        }
    }
}
