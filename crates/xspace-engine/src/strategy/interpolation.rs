//! Explanations read off Craig interpolants.
//!
//! The marked bounds form the A-partition, the network and classification
//! the B-partition. Each conjunct of the interpolant has to be a bound on a
//! single input variable; strict inequalities are read as non-strict.

use tracing::debug;
use xspace_smt::backends::smtlib_printer::to_smtlib;
use xspace_smt::terms::{rational_to_f64, Rational, SmtTerm};

use super::{unsat_core, InterpolationConfig, Session, UnsatCoreConfig};
use crate::bound::Bound;
use crate::domain::FeatureSpace;
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::verifier::Answer;

pub(super) fn run(
    session: &mut Session<'_>,
    explanation: &mut Explanation,
    config: &InterpolationConfig,
    order: &[usize],
) -> Result<(), ExplainError> {
    let selected = |f: usize| config.vars.as_ref().map_or(true, |vars| vars.contains(&f));
    if config.per_feature {
        for &feature in order {
            if !explanation.contains(feature) || !selected(feature) {
                continue;
            }
            let bounds = interpolate(session, explanation, |f| f == feature)?;
            if let Some((other, _)) = bounds.iter().find(|(f, _)| *f != feature) {
                return Err(ExplainError::precondition(format!(
                    "interpolant for {} mentions {}",
                    session.space.name(feature),
                    session.space.name(*other)
                )));
            }
            let mut single = Explanation::new();
            for (f, bound) in bounds {
                single.insert_bound(session.space, f, bound)?;
            }
            explanation.replace(feature, single.get(feature).copied());
        }
        if config.final_ucore {
            let ucore = UnsatCoreConfig {
                split_eq: true,
                minimal: false,
            };
            unsat_core::run(session, explanation, &ucore)?;
        }
        return Ok(());
    }

    let bounds = interpolate(session, explanation, selected)?;
    let mut rebuilt = Explanation::new();
    for (&f, vb) in explanation.iter() {
        if !selected(f) {
            rebuilt.insert_var_bound(f, *vb);
        }
    }
    for (f, bound) in bounds {
        rebuilt.insert_bound(session.space, f, bound)?;
    }
    *explanation = rebuilt;
    if config.final_ucore {
        let ucore = UnsatCoreConfig {
            split_eq: true,
            minimal: false,
        };
        unsat_core::run(session, explanation, &ucore)?;
    }
    Ok(())
}

/// Assert the explanation with `in_a` features marked and parse the interpolant.
fn interpolate(
    session: &mut Session<'_>,
    explanation: &Explanation,
    in_a: impl Fn(usize) -> bool,
) -> Result<Vec<(usize, Bound)>, ExplainError> {
    let itp = session.scoped(|s| {
        s.assert_explanation(explanation, None, &in_a, false)?;
        match s.check()? {
            Answer::Unsat => Ok(s.verifier.interpolant()?),
            answer => Err(ExplainError::precondition(format!(
                "interpolant requested but the explanation check answered {answer:?}"
            ))),
        }
    })?;
    session.verifier.reset_sample();
    debug!(interpolant = %to_smtlib(&itp), "interpolant");
    parse_interpolant(&itp, session.space)
}

/// Conjuncts of an interpolant as bounds on input features, clamped to
/// their domains.
pub fn parse_interpolant(
    term: &SmtTerm,
    space: &FeatureSpace,
) -> Result<Vec<(usize, Bound)>, ExplainError> {
    term.conjuncts()
        .into_iter()
        .map(|atom| parse_atom(atom, space, false))
        .collect()
}

fn unsupported(term: &SmtTerm) -> ExplainError {
    ExplainError::precondition(format!("unsupported interpolant shape `{}`", to_smtlib(term)))
}

#[derive(Clone, Copy)]
enum Rel {
    Le,
    Ge,
    Eq,
}

fn parse_atom(term: &SmtTerm, space: &FeatureSpace, negated: bool) -> Result<(usize, Bound), ExplainError> {
    let (rel, lhs, rhs) = match term {
        SmtTerm::Not(inner) if !negated => return parse_atom(inner, space, true),
        SmtTerm::Le(l, r) | SmtTerm::Lt(l, r) => (Rel::Le, l, r),
        SmtTerm::Ge(l, r) | SmtTerm::Gt(l, r) => (Rel::Ge, l, r),
        SmtTerm::Eq(l, r) if !negated => (Rel::Eq, l, r),
        _ => return Err(unsupported(term)),
    };
    // coefficient * var REL constant
    let (coeff, name, constant, rel) = match (linear(lhs), constant(rhs), constant(lhs), linear(rhs)) {
        (Some((k, x)), Some(c), _, _) => (k, x, c, rel),
        (_, _, Some(c), Some((k, x))) => (k, x, c, flip(rel)),
        _ => return Err(unsupported(term)),
    };
    let zero = Rational::from_integer(0);
    if coeff == zero {
        return Err(unsupported(term));
    }
    let rel = if coeff < zero { flip(rel) } else { rel };
    let rel = if negated { flip(rel) } else { rel };
    let feature = space.index_of(name).ok_or_else(|| {
        ExplainError::precondition(format!("interpolant mentions unknown variable `{name}`"))
    })?;
    let value = space.domain(feature).clamp(rational_to_f64(&(constant / coeff)));
    Ok((
        feature,
        match rel {
            Rel::Le => Bound::Upper(value),
            Rel::Ge => Bound::Lower(value),
            Rel::Eq => Bound::Eq(value),
        },
    ))
}

fn flip(rel: Rel) -> Rel {
    match rel {
        Rel::Le => Rel::Ge,
        Rel::Ge => Rel::Le,
        Rel::Eq => Rel::Eq,
    }
}

fn constant(term: &SmtTerm) -> Option<Rational> {
    match term {
        SmtTerm::RealLit(r) => Some(*r),
        SmtTerm::Neg(inner) => constant(inner).map(|c| -c),
        _ => None,
    }
}

/// `x`, `(- x)`, `(* k x)` or `(* x k)`.
fn linear(term: &SmtTerm) -> Option<(Rational, &str)> {
    match term {
        SmtTerm::Var(name) => Some((Rational::from_integer(1), name)),
        SmtTerm::Neg(inner) => linear(inner).map(|(k, x)| (-k, x)),
        SmtTerm::Mul(a, b) => match (constant(a), constant(b)) {
            (Some(k), None) => linear(b).map(|(k2, x)| (k * k2, x)),
            (None, Some(k)) => linear(a).map(|(k2, x)| (k * k2, x)),
            _ => None,
        },
        _ => None,
    }
}
