use tracing::debug;

use super::Session;
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::verifier::Answer;

/// Greedy shrink: drop each feature whose removal keeps the query UNSAT.
pub(super) fn run(
    session: &mut Session<'_>,
    explanation: &mut Explanation,
    order: &[usize],
) -> Result<(), ExplainError> {
    for &feature in order {
        if !explanation.contains(feature) {
            continue;
        }
        let answer = session.scoped(|s| {
            s.assert_explanation(explanation, Some(feature), |_| false, false)?;
            s.check()
        })?;
        session.verifier.reset_sample();
        if answer == Answer::Unsat {
            debug!(feature, "feature is redundant");
            explanation.erase(feature);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeatureSpace;
    use crate::strategy::testing::{Call, ScriptedVerifier};
    use crate::strategy::{Strategy, VarOrdering};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn setup() -> (FeatureSpace, Explanation) {
        let space = FeatureSpace::new(vec![(0.0, 1.0); 3]).expect("valid space");
        let e = Explanation::from_sample(&space, &[1.0, 0.0, 0.5]).expect("in domain");
        (space, e)
    }

    #[test]
    fn erases_features_on_unsat_only() -> TestResult {
        let (space, mut e) = setup();
        let mut v = ScriptedVerifier::with_answers([Answer::Sat, Answer::Unsat, Answer::Unknown]);
        let order = VarOrdering::Regular;
        let sample = [1.0, 0.0, 0.5];
        let mut session = Session::new(&mut v, &space, &sample, &order);
        Strategy::Abductive.execute(&mut session, &mut e)?;
        assert_eq!(session.unknown_answers, 1);
        assert_eq!(e.features(), vec![0, 2]);
        assert_eq!(v.depth, 0);
        // second query omits feature 1, third no longer asserts it
        assert_eq!(
            v.calls[5..],
            [
                Call::Push,
                Call::Eq(0, 1.0, false),
                Call::Eq(2, 0.5, false),
                Call::Check,
                Call::Pop,
                Call::Push,
                Call::Eq(0, 1.0, false),
                Call::Check,
                Call::Pop,
            ]
        );
        Ok(())
    }

    #[test]
    fn absent_features_cost_no_check() -> TestResult {
        let (space, mut e) = setup();
        e.erase(1);
        let mut v = ScriptedVerifier::default();
        let order = VarOrdering::Reverse;
        let sample = [1.0, 0.0, 0.5];
        let mut session = Session::new(&mut v, &space, &sample, &order);
        Strategy::Abductive.execute(&mut session, &mut e)?;
        assert_eq!(v.check_count(), 2);
        Ok(())
    }

    #[test]
    fn error_aborts_with_balanced_stack() -> TestResult {
        let (space, mut e) = setup();
        let mut v = ScriptedVerifier::with_answers([Answer::Unsat, Answer::Error]);
        let order = VarOrdering::Regular;
        let sample = [1.0, 0.0, 0.5];
        let mut session = Session::new(&mut v, &space, &sample, &order);
        let result = Strategy::Abductive.execute(&mut session, &mut e);
        assert!(matches!(result, Err(ExplainError::SolverError(_))));
        assert_eq!(v.depth, 0);
        assert_eq!(e.features(), vec![1, 2]);
        Ok(())
    }
}
