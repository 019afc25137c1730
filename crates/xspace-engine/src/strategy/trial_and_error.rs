use tracing::debug;

use super::{Session, TrialAndErrorConfig};
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::var_bound::VarBound;
use crate::verifier::Answer;

/// Widen each feature's interval towards its domain edges by bisection.
pub(super) fn run(
    session: &mut Session<'_>,
    explanation: &mut Explanation,
    config: &TrialAndErrorConfig,
    order: &[usize],
) -> Result<(), ExplainError> {
    if config.max_attempts == 0 {
        return Err(ExplainError::precondition("trial-and-error needs at least one attempt"));
    }
    for &feature in order {
        let Some(current) = explanation.get(feature).copied() else {
            continue;
        };
        let domain = session.space.domain(feature);
        let original = current.to_interval(domain);
        let (d_lo, d_hi) = (domain.lower(), domain.upper());
        // only a point on a degenerate domain touches both edges
        if original.lower() == d_lo && original.upper() == d_hi {
            continue;
        }

        let (lo, hi) = session.scoped(|s| {
            s.assert_explanation(explanation, Some(feature), |_| false, false)?;
            let (mut o_lo, mut o_hi) = (original.lower(), original.upper());
            if o_lo != d_lo {
                o_lo = s.scoped(|s| relax(s, feature, config.max_attempts, o_lo, d_lo, |lo| (lo, o_hi)))?;
            }
            if o_hi != d_hi {
                o_hi = s.scoped(|s| relax(s, feature, config.max_attempts, o_hi, d_hi, |hi| (o_lo, hi)))?;
            }
            Ok((o_lo, o_hi))
        })?;

        if (lo, hi) != (original.lower(), original.upper()) {
            debug!(feature, lo, hi, "relaxed");
        }
        explanation.replace(feature, VarBound::interval(domain, lo, hi)?);
    }
    Ok(())
}

/// Try the interval reaching `edge`, then halve the distance to `orig` on
/// every failure. Returns the accepted end, or `orig`.
fn relax(
    session: &mut Session<'_>,
    feature: usize,
    max_attempts: u32,
    orig: f64,
    edge: f64,
    interval: impl Fn(f64) -> (f64, f64),
) -> Result<f64, ExplainError> {
    let mut candidate = edge;
    for _ in 0..max_attempts {
        let (lower, upper) = interval(candidate);
        session.verifier.add_interval(0, feature, lower, upper, false)?;
        if session.check()? == Answer::Unsat {
            return Ok(candidate);
        }
        candidate = (candidate + orig) / 2.0;
    }
    Ok(orig)
}
