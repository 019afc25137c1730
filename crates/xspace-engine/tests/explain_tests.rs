//! End-to-end explanation runs against the Z3 backend.

mod common;

use common::*;
use xspace_engine::explanation::PrintFormat;
use xspace_engine::parse::parse_explanations;
use xspace_engine::{CheckVerdict, Config, ExplainError, Explanation, VarBound, VarOrdering};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn toy_regular_order_frees_the_dominant_feature_first() -> TestResult {
    let mut fw = z3_framework(Config::default(), toy());
    let run = fw.explain(&single(&[1.0, 0.0, 0.0], 1))?;
    // with x2 = x3 = 0 the output is 5 * x1 >= 0 whatever x1 is
    assert_eq!(run.explanations[0].features(), vec![1, 2]);
    assert_eq!(run.reports[0].checks, 3);
    assert_eq!(run.reports[0].computed_class, 1);
    Ok(())
}

#[test]
fn toy_reverse_order_keeps_the_dominant_feature() -> TestResult {
    let config = Config {
        reverse_features: true,
        ..Config::default()
    };
    let mut fw = z3_framework(config, toy());
    let run = fw.explain(&single(&[1.0, 0.0, 0.0], 1))?;
    assert_eq!(run.explanations[0].features(), vec![0]);
    assert_eq!(run.explanations[0].get(0), Some(&VarBound::Point { value: 1.0 }));

    fw.set_ordering(VarOrdering::Manual(vec![1, 2, 0]))?;
    let run = fw.explain(&single(&[1.0, 0.0, 0.0], 1))?;
    assert_eq!(run.explanations[0].features(), vec![0]);
    Ok(())
}

#[test]
fn unsat_core_is_minimal() -> TestResult {
    let network = toy();
    let data = single(&[0.2, 0.4, 0.6], 1);
    let mut fw = framework_with("ucore sample min", Config::default(), network.clone());
    let run = fw.explain(&data)?;
    let explanation = &run.explanations[0];
    assert!(run.reports[0].error.is_none(), "{:?}", run.reports[0].error);
    assert!(!explanation.is_empty());
    assert!(explanation.features().iter().all(|&f| f < 3));

    let reduced: Vec<Explanation> = explanation
        .features()
        .into_iter()
        .map(|f| {
            let mut e = explanation.clone();
            e.erase(f);
            e
        })
        .collect();
    for e in reduced {
        let verdict = fw.check_explanations(std::slice::from_ref(&e), &data)?;
        assert!(
            matches!(verdict[0], CheckVerdict::Invalid { .. } | CheckVerdict::Unknown),
            "{e:?} should no longer be sufficient"
        );
    }
    Ok(())
}

#[test]
fn trial_relaxation_reaches_a_fixed_point() -> TestResult {
    let config = Config {
        reverse_features: true,
        ..Config::default()
    };
    let mut fw = framework_with("abductive, trial", config, toy());
    let data = single(&[1.0, 0.0, 0.0], 1);
    let run = fw.explain(&data)?;
    assert_eq!(run.explanations[0].get(0), Some(&VarBound::Lower { value: 0.75 }));
    assert_eq!(run.reports[0].fixed_features, 0);
    assert_eq!(run.reports[0].terms, 1);

    fw.parse_strategies("trial")?;
    let again = fw.expand(run.explanations.clone(), &data)?;
    assert_eq!(again.explanations, run.explanations);
    Ok(())
}

#[test]
fn every_chain_produces_valid_explanations() -> TestResult {
    let network = toy();
    let data = load_dataset("toy.csv");
    for spec in ["abductive", "abductive, trial n 3", "ucore interval", "ucore sample, trial", "slice x2"] {
        let mut fw = framework_with(spec, Config::default(), network.clone());
        let run = fw.explain(&data)?;
        assert!(run.reports.iter().all(|r| r.error.is_none()), "{spec}");
        let verdicts = fw.check_explanations(&run.explanations, &data)?;
        assert!(
            verdicts.iter().all(|v| *v == CheckVerdict::Valid),
            "{spec}: {verdicts:?}"
        );
    }
    Ok(())
}

#[test]
fn pinned_feature_goes_through_every_strategy() -> TestResult {
    let network = pinned_toy();
    let data = single(&[1.0, 0.0, 0.0], 1);
    for chain in [
        "abductive",
        "trial",
        "trial n 2, abductive",
        "abductive, trial",
        "ucore sample",
        "ucore interval min",
        "slice x2",
    ] {
        let mut fw = framework_with(chain, Config::default(), network.clone());
        let run = fw.explain(&data)?;
        assert!(run.reports[0].error.is_none(), "{chain}: {:?}", run.reports[0].error);
        if let Some(vb) = run.explanations[0].get(0) {
            assert_eq!(vb, &VarBound::Point { value: 1.0 }, "{chain}");
        }
        let verdicts = fw.check_explanations(&run.explanations, &data)?;
        assert_eq!(verdicts, vec![CheckVerdict::Valid], "{chain}");
    }

    // relaxation leaves the pinned point alone and frees the rest
    let mut fw = framework_with("trial", Config::default(), network);
    let run = fw.explain(&data)?;
    assert_eq!(run.explanations[0].features(), vec![0]);
    assert_eq!(run.explanations[0].get(0), Some(&VarBound::Point { value: 1.0 }));
    Ok(())
}

#[test]
fn interpolant_bounds_pass_the_checker() -> TestResult {
    let data = single(&[1.0, 0.0, 0.0], 1);
    let mut fw = interpolating_framework("itp", "(and (<= (/ 3 4) x1) (<= x2 1))", toy());
    let run = fw.explain(&data)?;
    assert!(run.reports[0].error.is_none(), "{:?}", run.reports[0].error);
    assert!(run.reports[0].warnings.is_empty());
    assert_eq!(run.explanations[0].features(), vec![0]);
    assert_eq!(run.explanations[0].get(0), Some(&VarBound::Lower { value: 0.75 }));
    assert_eq!(fw.check_explanations(&run.explanations, &data)?, vec![CheckVerdict::Valid]);
    Ok(())
}

#[test]
fn unreadable_interpolant_keeps_the_previous_explanation() -> TestResult {
    let data = single(&[1.0, 0.0, 0.0], 1);
    let mut fw = interpolating_framework("abductive, itp", "(<= (+ x2 x3) 1)", toy());
    let run = fw.explain(&data)?;
    assert!(run.reports[0].error.is_none(), "{:?}", run.reports[0].error);
    assert_eq!(run.reports[0].warnings.len(), 1);
    assert_eq!(run.explanations[0].features(), vec![1, 2]);
    assert_eq!(fw.check_explanations(&run.explanations, &data)?, vec![CheckVerdict::Valid]);
    Ok(())
}

#[test]
fn multi_class_network_is_explained() -> TestResult {
    let network = load_model("three_class.nnet");
    let data = load_dataset("three_class.csv");
    let mut fw = framework_with("abductive, trial", Config::default(), network.clone());
    let run = fw.explain(&data)?;
    assert_eq!(
        run.reports.iter().map(|r| r.computed_class).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    for (explanation, sample) in run.explanations.iter().zip(data.samples()) {
        for point in corners(explanation, fw.space()) {
            assert!(keeps_label(&network, &point, sample.expected_class), "{point:?}");
        }
    }
    Ok(())
}

#[test]
fn empty_explanation_has_a_counterexample() -> TestResult {
    let network = toy();
    let data = single(&[1.0, 0.0, 0.0], 1);
    let mut fw = z3_framework(Config::default(), network.clone());
    let verdicts = fw.check_explanations(&[Explanation::new()], &data)?;
    let CheckVerdict::Invalid { counterexample } = &verdicts[0] else {
        panic!("expected a counterexample, got {verdicts:?}");
    };
    assert_eq!(counterexample.len(), 3);
    assert!(!keeps_label(&network, counterexample, 1));
    Ok(())
}

#[test]
fn interpolation_needs_an_interpolating_solver() {
    let mut fw = z3_framework(Config::default(), toy());
    assert!(matches!(
        fw.parse_strategies("itp strong"),
        Err(ExplainError::UnsupportedConfiguration(_))
    ));
}

#[test]
fn printed_explanations_can_be_expanded() -> TestResult {
    let data = load_dataset("toy.csv");
    let mut fw = z3_framework(Config::default(), toy());
    let run = fw.explain(&data)?;
    let text = run
        .explanations
        .iter()
        .map(|e| e.render(fw.space(), PrintFormat::Smtlib2, false))
        .collect::<Result<Vec<_>, _>>()?
        .join("\n");
    let parsed = parse_explanations(&text, "toy.smt2", fw.space())?;
    assert_eq!(parsed, run.explanations);

    fw.parse_strategies("trial n 2")?;
    let expanded = fw.expand(parsed, &data)?;
    for (before, after) in run.explanations.iter().zip(&expanded.explanations) {
        assert!(after.features().iter().all(|f| before.contains(*f)));
    }
    Ok(())
}

#[test]
fn report_serializes() -> TestResult {
    let config = Config {
        max_samples: Some(2),
        ..Config::default()
    };
    let mut fw = z3_framework(config, toy());
    let run = fw.explain(&load_dataset("toy.csv"))?;
    let json: serde_json::Value = serde_json::from_str(&run.to_json_pretty()?)?;
    assert_eq!(json["summary"]["dataset_size"], 5);
    assert_eq!(json["summary"]["processed"], 2);
    assert!(json["samples"][0]["explanation"].is_object());
    Ok(())
}

#[test]
#[ignore = "requires the opensmt binary"]
fn opensmt_interpolation_yields_valid_explanations() -> TestResult {
    use xspace_engine::{Framework, SmtVerifier};
    use xspace_smt::backends::process_backend::{Dialect, ProcessSolver};

    let network = toy();
    let data = load_dataset("toy.csv");
    let verifier = SmtVerifier::new(ProcessSolver::new(Dialect::OpenSmt)?);
    let mut fw = Framework::new(Config::default(), network.clone(), Box::new(verifier))?;
    fw.parse_strategies("itp interval")?;
    let run = fw.explain(&data)?;
    for (explanation, report) in run.explanations.iter().zip(&run.reports) {
        for point in corners(explanation, fw.space()) {
            assert!(keeps_label(&network, &point, report.computed_class), "{point:?}");
        }
    }
    Ok(())
}
