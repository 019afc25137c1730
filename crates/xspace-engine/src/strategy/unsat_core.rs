use tracing::debug;

use super::{Session, UnsatCoreConfig};
use crate::bound::Bound;
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::verifier::Answer;

/// Rebuild the explanation from the unsat core of the fully asserted query.
pub(super) fn run(
    session: &mut Session<'_>,
    explanation: &mut Explanation,
    config: &UnsatCoreConfig,
) -> Result<(), ExplainError> {
    let core = session.scoped(|s| {
        s.assert_explanation(explanation, None, |_| true, config.split_eq)?;
        match s.check()? {
            Answer::Unsat => Ok(s.verifier.unsat_core()?),
            answer => Err(ExplainError::precondition(format!(
                "unsat core requested but the explanation check answered {answer:?}"
            ))),
        }
    })?;
    debug!(?core, "unsat core");

    let space = session.space;
    let missing = |feature: usize| {
        ExplainError::precondition(format!(
            "core mentions {} which is not in the explanation",
            space.name(feature)
        ))
    };
    let mut rebuilt = Explanation::new();
    for &feature in &core.lower_bounds {
        let vb = explanation.get(feature).ok_or_else(|| missing(feature))?;
        let value = vb.lower().ok_or_else(|| missing(feature))?;
        rebuilt.insert_bound(space, feature, Bound::Lower(value))?;
    }
    for &feature in &core.upper_bounds {
        let vb = explanation.get(feature).ok_or_else(|| missing(feature))?;
        let value = vb.upper().ok_or_else(|| missing(feature))?;
        rebuilt.insert_bound(space, feature, Bound::Upper(value))?;
    }
    for &feature in core.equalities.iter().chain(&core.intervals) {
        let vb = explanation.get(feature).ok_or_else(|| missing(feature))?;
        rebuilt.insert_var_bound(feature, *vb);
    }
    *explanation = rebuilt;
    session.verifier.reset_sample();
    Ok(())
}
