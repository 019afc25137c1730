use num::rational::Ratio;
use num::{One, Signed, ToPrimitive, Zero};

/// Exact rational constants used for real literals.
pub type Rational = Ratio<i64>;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Real literal.
    RealLit(Rational),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn real(r: Rational) -> Self {
        SmtTerm::RealLit(r)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// Left-nested sum; the empty sum is the real literal `0`.
    pub fn sum(terms: Vec<SmtTerm>) -> Self {
        let mut iter = terms.into_iter();
        let Some(first) = iter.next() else {
            return SmtTerm::RealLit(Rational::zero());
        };
        iter.fold(first, SmtTerm::add)
    }

    /// Flatten nested conjunctions into their list of conjuncts.
    ///
    /// A non-`And` term is its own single conjunct, `true` has none.
    pub fn conjuncts(&self) -> Vec<&SmtTerm> {
        let mut out = Vec::new();
        collect_conjuncts(self, &mut out);
        out
    }
}

fn collect_conjuncts<'a>(term: &'a SmtTerm, out: &mut Vec<&'a SmtTerm>) {
    match term {
        SmtTerm::And(terms) => {
            for t in terms {
                collect_conjuncts(t, out);
            }
        }
        SmtTerm::BoolLit(true) => {}
        other => out.push(other),
    }
}

/// Closest rational to a finite float, preferring the simplest fraction.
///
/// Returns `None` for NaN and infinities, or when the value does not fit.
pub fn rational_from_f64(value: f64) -> Option<Rational> {
    if !value.is_finite() {
        return None;
    }
    Rational::approximate_float(value).or_else(|| rational_from_decimal(value))
}

/// Rational obtained from the six-decimal rendering of a float (`1.2` -> `6/5`).
///
/// This is the representation used when printing explanations, so printed
/// values are short and stable across platforms.
pub fn rational_from_decimal(value: f64) -> Option<Rational> {
    if !value.is_finite() {
        return None;
    }
    const SCALE: i64 = 1_000_000;
    let scaled = (value * SCALE as f64).round();
    if scaled.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(Rational::new(scaled as i64, SCALE))
}

/// Convert a rational back into a float (approximation for large terms).
pub fn rational_to_f64(r: &Rational) -> f64 {
    let numer = r.numer().to_f64().unwrap_or(f64::NAN);
    let denom = r.denom().to_f64().unwrap_or(f64::NAN);
    numer / denom
}

/// SMT-LIB2 spelling of a rational: `6`, `(/ 6 5)`, `(- (/ 6 5))`.
pub fn rational_to_smtlib(r: &Rational) -> String {
    let abs = r.abs();
    let body = if abs.denom().is_one() {
        abs.numer().to_string()
    } else {
        format!("(/ {} {})", abs.numer(), abs.denom())
    };
    if r.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}
