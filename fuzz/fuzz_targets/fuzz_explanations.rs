#![no_main]
use libfuzzer_sys::fuzz_target;
use xspace_engine::parse::parse_explanations;
use xspace_engine::{FeatureSpace, PrintFormat};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(space) = FeatureSpace::new(vec![(0.0, 1.0), (-1.0, 1.0), (0.0, 0.0)]) else {
        return;
    };
    if let Ok(explanations) = parse_explanations(s, "fuzz.smt2", &space) {
        for explanation in explanations {
            let _ = explanation.render(&space, PrintFormat::Smtlib2, true);
            let _ = explanation.relative_volume(&space);
        }
    }
});
