// `xspace check`: re-verify explanations read from a file.

use miette::miette;
use xspace_engine::parse::read_explanations;
use xspace_engine::{CheckVerdict, Config};

use super::helpers::{build_framework, load_inputs};
use crate::cli::{InputArgs, SolverArgs};

pub(crate) fn run_check_command(
    inputs: InputArgs,
    explanations: std::path::PathBuf,
    solver: SolverArgs,
) -> miette::Result<()> {
    let (network, dataset) = load_inputs(&inputs)?;
    let mut framework = build_framework(Config::default(), network, &solver, None)?;
    let parsed = read_explanations(&explanations, framework.space(), dataset.len())?;
    let verdicts = framework.check_explanations(&parsed, &dataset)?;

    let mut invalid = 0;
    for (index, verdict) in verdicts.iter().enumerate() {
        match verdict {
            CheckVerdict::Valid => println!("sample {}: valid", index + 1),
            CheckVerdict::Unknown => println!("sample {}: unknown", index + 1),
            CheckVerdict::Invalid { counterexample } => {
                invalid += 1;
                let values = counterexample
                    .iter()
                    .map(f64::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                println!("sample {}: INVALID, counterexample {values}", index + 1);
            }
        }
    }
    if invalid > 0 {
        return Err(miette!("{invalid} of {} explanations are invalid", verdicts.len()));
    }
    Ok(())
}
