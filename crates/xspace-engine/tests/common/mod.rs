#![allow(dead_code)]

use std::path::PathBuf;

use xspace_engine::framework::BINARY_PRECISION;
use xspace_engine::{
    Answer, Config, Explanation, FeatureSpace, Framework, SmtVerifier, UnsatCore, Verifier, VerifierError,
};
use xspace_nn::{classification_label, Dataset, NNet, Sample};
use xspace_smt::backends::z3_backend::Z3Solver;
use xspace_smt::sexpr;
use xspace_smt::terms::SmtTerm;

pub fn demo_path(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(rel)
}

pub fn load_model(name: &str) -> NNet {
    let path = demo_path(&format!("models/{name}"));
    NNet::from_file(&path).unwrap_or_else(|e| panic!("Failed to load {}: {e}", path.display()))
}

pub fn load_dataset(name: &str) -> Dataset {
    let path = demo_path(&format!("data/{name}"));
    Dataset::from_file(&path).unwrap_or_else(|e| panic!("Failed to load {}: {e}", path.display()))
}

pub fn toy() -> NNet {
    load_model("toy.nnet")
}

/// The toy network with `x1` pinned to 1 by its domain.
pub fn pinned_toy() -> NNet {
    let src = "2,3,1,3,\n3,2,1,\n0,\n\
               1.0,0.0,0.0,\n1.0,1.0,1.0,\n\
               0.0,0.0,0.0,0.0,\n1.0,1.0,1.0,1.0,\n\
               5.0,-1.0,-1.0,\n-1.0,1.0,1.0,\n0.0,\n0.0,\n\
               1.0,-1.0,\n0.0,\n";
    NNet::parse(src, "pinned_toy.nnet").unwrap_or_else(|e| panic!("Failed to parse pinned toy: {e}"))
}

pub fn single(values: &[f64], class: usize) -> Dataset {
    Dataset::new(vec![Sample {
        values: values.to_vec(),
        expected_class: class,
    }])
    .expect("one sample")
}

pub fn z3_framework(config: Config, network: NNet) -> Framework {
    let verifier = SmtVerifier::new(Z3Solver::new());
    Framework::new(config, network, Box::new(verifier)).expect("z3 supports the default chain")
}

pub fn framework_with(spec: &str, config: Config, network: NNet) -> Framework {
    let mut framework = z3_framework(config, network);
    framework
        .parse_strategies(spec)
        .unwrap_or_else(|e| panic!("bad chain `{spec}`: {e}"));
    framework
}

/// Whether `values` keeps `label`, allowing the binary precision margin.
pub fn keeps_label(network: &NNet, values: &[f64], label: usize) -> bool {
    let output = network.compute_output(values).expect("forward pass");
    if output.len() == 1 {
        return match label {
            1 => output[0] > -BINARY_PRECISION,
            _ => output[0] < BINARY_PRECISION,
        };
    }
    classification_label(&output) == label
}

/// Corners of the box an explanation allows, free features spanning their domain.
pub fn corners(explanation: &Explanation, space: &FeatureSpace) -> Vec<Vec<f64>> {
    let mut points = vec![Vec::new()];
    for i in 0..space.len() {
        let interval = explanation
            .get(i)
            .map_or(space.domain(i), |vb| vb.to_interval(space.domain(i)));
        let mut edges = vec![interval.lower()];
        if !interval.is_point() {
            edges.push(interval.upper());
        }
        points = points
            .into_iter()
            .flat_map(|p| {
                edges.iter().map(move |&e| {
                    let mut q = p.clone();
                    q.push(e);
                    q
                })
            })
            .collect();
    }
    points
}

/// Z3 answers every check; `interpolant` always returns the same term.
pub struct FixedInterpolant {
    inner: SmtVerifier<Z3Solver>,
    interpolant: SmtTerm,
}

impl FixedInterpolant {
    pub fn new(interpolant: &str) -> Self {
        let expr = sexpr::parse(interpolant).unwrap_or_else(|e| panic!("bad interpolant: {e}"));
        Self {
            inner: SmtVerifier::new(Z3Solver::new()),
            interpolant: sexpr::to_term(&expr).unwrap_or_else(|e| panic!("bad interpolant: {e}")),
        }
    }
}

impl Verifier for FixedInterpolant {
    fn load_model(&mut self, network: &NNet) -> Result<(), VerifierError> {
        self.inner.load_model(network)
    }

    fn push(&mut self) -> Result<(), VerifierError> {
        self.inner.push()
    }

    fn pop(&mut self) -> Result<(), VerifierError> {
        self.inner.pop()
    }

    fn depth(&self) -> usize {
        self.inner.depth()
    }

    fn add_lower_bound(&mut self, layer: usize, node: usize, value: f64, marked: bool) -> Result<(), VerifierError> {
        self.inner.add_lower_bound(layer, node, value, marked)
    }

    fn add_upper_bound(&mut self, layer: usize, node: usize, value: f64, marked: bool) -> Result<(), VerifierError> {
        self.inner.add_upper_bound(layer, node, value, marked)
    }

    fn add_equality(&mut self, layer: usize, node: usize, value: f64, marked: bool) -> Result<(), VerifierError> {
        self.inner.add_equality(layer, node, value, marked)
    }

    fn add_interval(
        &mut self,
        layer: usize,
        node: usize,
        lower: f64,
        upper: f64,
        marked: bool,
    ) -> Result<(), VerifierError> {
        self.inner.add_interval(layer, node, lower, upper, marked)
    }

    fn add_classification_constraint(&mut self, label: usize, threshold: f64) -> Result<(), VerifierError> {
        self.inner.add_classification_constraint(label, threshold)
    }

    fn check(&mut self) -> Answer {
        self.inner.check()
    }

    fn check_with_model(&mut self) -> (Answer, Option<Vec<f64>>) {
        self.inner.check_with_model()
    }

    fn reset_sample(&mut self) {
        self.inner.reset_sample()
    }

    fn reset(&mut self) -> Result<(), VerifierError> {
        self.inner.reset()
    }

    fn checks_count(&self) -> u64 {
        self.inner.checks_count()
    }

    fn reset_checks_count(&mut self) {
        self.inner.reset_checks_count()
    }

    fn supports_unsat_core(&self) -> bool {
        self.inner.supports_unsat_core()
    }

    fn unsat_core(&mut self) -> Result<UnsatCore, VerifierError> {
        self.inner.unsat_core()
    }

    fn supports_interpolation(&self) -> bool {
        true
    }

    fn interpolant(&mut self) -> Result<SmtTerm, VerifierError> {
        Ok(self.interpolant.clone())
    }
}

pub fn interpolating_framework(chain: &str, interpolant: &str, network: NNet) -> Framework {
    let verifier = FixedInterpolant::new(interpolant);
    let mut framework =
        Framework::new(Config::default(), network, Box::new(verifier)).expect("default chain is supported");
    framework
        .parse_strategies(chain)
        .unwrap_or_else(|e| panic!("bad chain `{chain}`: {e}"));
    framework
}
