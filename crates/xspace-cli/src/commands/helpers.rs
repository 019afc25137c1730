// Shared helpers for the command handlers: argument conversion, solver
// construction, config loading and output.

use std::fs;
use std::path::Path;

use miette::{miette, IntoDiagnostic, WrapErr};
use xspace_engine::{Config, ExplanationType, Framework, PrintFormat, SampleFilter, SmtVerifier, Verifier};
use xspace_nn::{Dataset, NNet};
use xspace_smt::backends::process_backend::{Dialect, ProcessSolver};
use xspace_smt::backends::z3_backend::Z3Solver;

use crate::cli::{InputArgs, RunArgs, SolverArgs};

pub(crate) fn parse_filter(raw: &str) -> miette::Result<SampleFilter> {
    match raw {
        "all" => Ok(SampleFilter::All),
        "correct" => Ok(SampleFilter::Correct),
        "incorrect" => Ok(SampleFilter::Incorrect),
        other => Err(miette!("Unknown filter: {other}. Use 'all', 'correct' or 'incorrect'.")),
    }
}

pub(crate) fn parse_print_format(raw: &str) -> miette::Result<PrintFormat> {
    match raw {
        "bounds" => Ok(PrintFormat::Bounds),
        "smtlib2" | "smt2" => Ok(PrintFormat::Smtlib2),
        "intervals" => Ok(PrintFormat::Intervals),
        other => Err(miette!(
            "Unknown format: {other}. Use 'bounds', 'smtlib2' or 'intervals'."
        )),
    }
}

pub(crate) fn parse_explanation_type(raw: &str) -> miette::Result<ExplanationType> {
    match raw {
        "simple" => Ok(ExplanationType::Simple),
        "general" => Ok(ExplanationType::General),
        "unsat-core" | "unsat_core" | "ucore" => Ok(ExplanationType::UnsatCore),
        "interpolation" | "itp" => Ok(ExplanationType::Interpolation),
        other => Err(miette!(
            "Unknown explanation type: {other}. Use 'simple', 'general', 'unsat-core' or 'interpolation'."
        )),
    }
}

pub(crate) fn solver_dialect(raw: &str) -> miette::Result<Option<Dialect>> {
    match raw {
        "z3" => Ok(None),
        "cvc5" => Ok(Some(Dialect::Cvc5)),
        "z3-bin" => Ok(Some(Dialect::Z3)),
        "opensmt" => Ok(Some(Dialect::OpenSmt)),
        other => Err(miette!(
            "Unknown solver: {other}. Use 'z3', 'cvc5', 'z3-bin' or 'opensmt'."
        )),
    }
}

/// The in-process Z3 backend, or a solver binary driven over SMT-LIB2.
pub(crate) fn build_verifier(args: &SolverArgs) -> miette::Result<Box<dyn Verifier>> {
    let Some(dialect) = solver_dialect(&args.solver)? else {
        return Ok(Box::new(SmtVerifier::new(Z3Solver::with_timeout_secs(args.timeout))));
    };
    let command = args
        .solver_path
        .as_deref()
        .unwrap_or(dialect.default_command());
    let timeout_ms = (args.timeout > 0).then(|| args.timeout.saturating_mul(1000));
    let solver = ProcessSolver::with_command_and_timeout(dialect, command, timeout_ms)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to start solver `{command}`"))?;
    Ok(Box::new(SmtVerifier::new(solver)))
}

/// Config file (if any) with command-line overrides applied.
pub(crate) fn load_config(run: &RunArgs, verbosity: u8) -> miette::Result<Config> {
    let mut config = match &run.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            Config::from_json(&text)
                .into_diagnostic()
                .wrap_err_with(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if run.reverse {
        config.reverse_features = true;
    }
    if let Some(max) = run.max_samples {
        config.max_samples = Some(max);
    }
    if run.shuffle {
        config.shuffle_samples = true;
    }
    if let Some(seed) = run.seed {
        config.shuffle_seed = seed;
    }
    if let Some(filter) = &run.filter {
        config.filter = parse_filter(filter)?;
    }
    if let Some(class) = run.expected_class {
        config.expected_class = Some(class);
    }
    if let Some(format) = &run.format {
        config.print_format = parse_print_format(format)?;
    }
    if run.print_free {
        config.print_free = true;
    }
    if let Some(kind) = &run.explanation_type {
        config.explanation_type = parse_explanation_type(kind)?;
    }
    if run.minimal_ucore {
        config.minimal_unsat_core = true;
    }
    config.verbosity = config.verbosity.max(verbosity);
    Ok(config)
}

pub(crate) fn load_inputs(inputs: &InputArgs) -> miette::Result<(NNet, Dataset)> {
    let network = NNet::from_file(&inputs.model)?;
    let dataset = Dataset::from_file(&inputs.dataset)?;
    Ok((network, dataset))
}

pub(crate) fn build_framework(
    config: Config,
    network: NNet,
    solver: &SolverArgs,
    strategies: Option<&str>,
) -> miette::Result<Framework> {
    let verifier = build_verifier(solver)?;
    let mut framework = Framework::new(config, network, verifier)?;
    if let Some(spec) = strategies {
        framework.parse_strategies(spec)?;
    }
    Ok(framework)
}

/// Write to `out`, or stdout when absent.
pub(crate) fn write_output(out: Option<&Path>, text: &str) -> miette::Result<()> {
    match out {
        Some(path) => fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() -> miette::Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"filter": "correct", "max_samples": 10, "print_format": "intervals"}"#)
            .into_diagnostic()?;
        let run = RunArgs {
            config: Some(path),
            max_samples: Some(2),
            format: Some("smtlib2".into()),
            reverse: true,
            ..RunArgs::default()
        };
        let config = load_config(&run, 1)?;
        assert_eq!(config.filter, SampleFilter::Correct);
        assert_eq!(config.max_samples, Some(2));
        assert_eq!(config.print_format, PrintFormat::Smtlib2);
        assert!(config.reverse_features);
        assert_eq!(config.verbosity, 1);
        Ok(())
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(parse_filter("some").is_err());
        assert!(parse_print_format("json").is_err());
        assert!(parse_explanation_type("fancy").is_err());
        assert!(solver_dialect("yices").is_err());
        assert!(matches!(solver_dialect("opensmt"), Ok(Some(Dialect::OpenSmt))));
    }
}
