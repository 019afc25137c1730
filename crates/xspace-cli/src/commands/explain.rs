// `xspace explain` and `xspace expand`.

use std::fs;

use miette::{IntoDiagnostic, WrapErr};
use tracing::info;
use xspace_engine::parse::read_explanations;
use xspace_engine::{ExplainRun, Framework, PrintFormat};

use super::helpers::{build_framework, load_config, load_inputs, write_output};
use crate::cli::{InputArgs, RunArgs, SolverArgs};

pub(crate) fn run_explain_command(
    inputs: InputArgs,
    solver: SolverArgs,
    run: RunArgs,
    verbosity: u8,
) -> miette::Result<()> {
    let config = load_config(&run, verbosity)?;
    let (network, dataset) = load_inputs(&inputs)?;
    let mut framework = build_framework(config, network, &solver, run.strategies.as_deref())?;
    let result = framework.explain(&dataset)?;
    emit(&framework, &result, &run)
}

pub(crate) fn run_expand_command(
    inputs: InputArgs,
    explanations: std::path::PathBuf,
    solver: SolverArgs,
    run: RunArgs,
    verbosity: u8,
) -> miette::Result<()> {
    let config = load_config(&run, verbosity)?;
    let (network, dataset) = load_inputs(&inputs)?;
    let mut framework = build_framework(config, network, &solver, run.strategies.as_deref())?;
    let parsed = read_explanations(&explanations, framework.space(), dataset.len())?;
    info!(
        file = %explanations.display(),
        count = parsed.len(),
        "Loaded explanations"
    );
    let result = framework.expand(parsed, &dataset)?;
    emit(&framework, &result, &run)
}

/// Render every explanation and write the optional JSON report.
fn emit(framework: &Framework, result: &ExplainRun, run: &RunArgs) -> miette::Result<()> {
    let config = framework.config();
    let mut text = String::new();
    for (index, explanation) in result.explanations.iter().enumerate() {
        let rendered = explanation.render(framework.space(), config.print_format, config.print_free)?;
        if config.print_format == PrintFormat::Smtlib2 {
            text.push_str(&rendered);
            text.push('\n');
        } else {
            text.push_str(&format!("sample {}:\n{rendered}\n\n", index + 1));
        }
    }
    write_output(run.out.as_deref(), &text)?;

    if let Some(path) = &run.report {
        let json = result.to_json_pretty().into_diagnostic()?;
        fs::write(path, json)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }
    Ok(())
}
