use super::{Session, SliceConfig};
use crate::error::ExplainError;
use crate::explanation::Explanation;

/// Intersect with the sample explanation minus the sliced-out features.
pub(super) fn run(
    session: &mut Session<'_>,
    explanation: &mut Explanation,
    config: &SliceConfig,
) -> Result<(), ExplainError> {
    let mut sliced = Explanation::from_sample(session.space, session.sample)?;
    for &feature in &config.vars {
        session.space.check_index(feature)?;
        sliced.erase(feature);
    }
    explanation.intersect(session.space, &sliced)
}
