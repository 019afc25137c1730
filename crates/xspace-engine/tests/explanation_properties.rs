//! Property tests over random toy samples: soundness, containment and
//! domain validity.

mod common;

use common::*;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xspace_engine::{Config, VarBound};

/// Feature values on a 1/8 grid so the samples print exactly.
fn grid_sample() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((0u8..=8).prop_map(|k| f64::from(k) / 8.0), 3)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn explanations_are_sound_and_contain_the_sample(
        values in grid_sample(),
        reverse in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let network = toy();
        let config = Config { reverse_features: reverse, ..Config::default() };
        let mut fw = framework_with("abductive, trial n 3", config, network.clone());
        let data = single(&values, 0);
        let run = fw.explain(&data).expect("explain");
        let report = &run.reports[0];
        prop_assert!(report.error.is_none(), "{:?}", report.error);
        let explanation = &run.explanations[0];
        let space = fw.space();

        for (&feature, vb) in explanation {
            let domain = space.domain(feature);
            let interval = vb.to_interval(domain);
            prop_assert!(vb.contains(values[feature]), "{vb:?} excludes {}", values[feature]);
            prop_assert!(domain.contains_interval(&interval));
            prop_assert!(interval != domain, "{vb:?} covers the whole domain");
            if let VarBound::Interval { lower, upper } = *vb {
                prop_assert!(lower < upper);
            }
        }

        let label = report.computed_class;
        for point in corners(explanation, space) {
            prop_assert!(keeps_label(&network, &point, label), "corner {point:?}");
        }
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..64 {
            let point: Vec<f64> = (0..space.len())
                .map(|i| {
                    let interval = explanation
                        .get(i)
                        .map_or(space.domain(i), |vb| vb.to_interval(space.domain(i)));
                    if interval.is_point() {
                        interval.lower()
                    } else {
                        rng.gen_range(interval.lower()..=interval.upper())
                    }
                })
                .collect();
            prop_assert!(keeps_label(&network, &point, label), "sampled {point:?}");
        }
    }

    #[test]
    fn abductive_never_grows_and_keeps_points(values in grid_sample()) {
        let mut fw = z3_framework(Config::default(), toy());
        let run = fw.explain(&single(&values, 0)).expect("explain");
        let explanation = &run.explanations[0];
        prop_assert!(explanation.len() <= 3);
        for (&feature, vb) in explanation {
            prop_assert_eq!(*vb, VarBound::Point { value: values[feature] });
        }
        prop_assert_eq!(run.reports[0].checks, 3);
    }
}
