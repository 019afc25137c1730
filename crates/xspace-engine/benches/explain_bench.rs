use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xspace_engine::{Config, Framework, SmtVerifier, Verifier};
use xspace_nn::{Dataset, NNet, Sample};
use xspace_smt::backends::z3_backend::Z3Solver;

const INPUTS: usize = 8;
const HIDDEN: usize = 12;

fn generated_network() -> NNet {
    let mut rng = StdRng::seed_from_u64(17);
    let mut layer = |rows: usize, cols: usize| -> Vec<Vec<f64>> {
        (0..rows)
            .map(|_| (0..cols).map(|_| f64::from(rng.gen_range(-8i32..=8)) / 8.0).collect())
            .collect()
    };
    let weights = vec![layer(HIDDEN, INPUTS), layer(1, HIDDEN)];
    NNet::new(
        vec![0.0; INPUTS],
        vec![1.0; INPUTS],
        weights,
        vec![vec![0.0; HIDDEN], vec![0.0]],
    )
    .unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let network = generated_network();
    c.bench_function("encode_8x12x1", |b| {
        b.iter(|| {
            let mut verifier = SmtVerifier::new(Z3Solver::new());
            verifier.load_model(black_box(&network)).unwrap();
        })
    });
}

fn bench_abductive(c: &mut Criterion) {
    let network = generated_network();
    let values: Vec<f64> = (0..INPUTS).map(|i| (i % 4) as f64 / 4.0).collect();
    let dataset = Dataset::new(vec![Sample {
        values,
        expected_class: 0,
    }])
    .unwrap();
    let verifier = SmtVerifier::new(Z3Solver::new());
    let mut framework = Framework::new(Config::default(), network, Box::new(verifier)).unwrap();
    c.bench_function("abductive_8x12x1", |b| {
        b.iter(|| framework.explain(black_box(&dataset)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_abductive);
criterion_main!(benches);
