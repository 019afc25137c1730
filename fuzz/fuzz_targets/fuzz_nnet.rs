#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // The model parser must never panic on any input.
        if let Ok(network) = xspace_nn::NNet::parse(s, "fuzz.nnet") {
            let input: Vec<f64> = (0..network.input_size())
                .map(|i| network.input_lower_bound(i))
                .collect();
            let _ = network.compute_output(&input);
        }
    }
});
