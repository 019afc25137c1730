use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::backends::smtlib_printer::{quote_symbol, sort_to_smtlib, to_smtlib};
use crate::sexpr::{self, SExpr};
use crate::solver::{ArithItpAlgorithm, BoolItpAlgorithm, InterpolationOptions, Model, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::{Rational, SmtTerm};

#[derive(Debug, Error)]
pub enum ProcessSolverError {
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver not found: {0}")]
    NotFound(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("Failed to parse solver output: {0}")]
    ParseError(String),
}

/// Command-line and option conventions of a supported solver binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Cvc5,
    Z3,
    OpenSmt,
}

impl Dialect {
    pub fn default_command(self) -> &'static str {
        match self {
            Dialect::Cvc5 => "cvc5",
            Dialect::Z3 => "z3",
            Dialect::OpenSmt => "opensmt",
        }
    }

    fn args(self, timeout_ms: Option<u64>) -> Vec<String> {
        let mut args: Vec<String> = match self {
            Dialect::Cvc5 => vec![
                "--lang".into(),
                "smt2".into(),
                "--incremental".into(),
            ],
            Dialect::Z3 => vec!["-in".into(), "-smt2".into()],
            Dialect::OpenSmt => Vec::new(),
        };
        if let Some(ms) = timeout_ms {
            match self {
                Dialect::Cvc5 => args.push(format!("--tlimit-per={ms}")),
                Dialect::Z3 => args.push(format!("-t:{ms}")),
                Dialect::OpenSmt => debug!(timeout_ms = ms, "OpenSMT has no query timeout flag"),
            }
        }
        args
    }

    fn minimal_core_option(self) -> Option<&'static str> {
        match self {
            Dialect::Cvc5 => Some("(set-option :minimal-unsat-cores true)"),
            Dialect::Z3 => Some("(set-option :smt.core.minimize true)"),
            Dialect::OpenSmt => None,
        }
    }
}

/// An SMT-LIB2 solver driven over stdin/stdout.
///
/// Runs with `:print-success true`, so every command is acknowledged and a
/// rejected assertion is reported where it happens.
pub struct ProcessSolver {
    dialect: Dialect,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: ChildStderr,
    /// Live assertion names per push scope; index 0 is the base scope.
    named: Vec<Vec<String>>,
    anonymous_count: usize,
    minimal_core: bool,
    interpolation: Option<InterpolationOptions>,
}

impl ProcessSolver {
    pub fn new(dialect: Dialect) -> Result<Self, ProcessSolverError> {
        Self::with_command_and_timeout(dialect, dialect.default_command(), None)
    }

    pub fn with_timeout_secs(dialect: Dialect, timeout_secs: u64) -> Result<Self, ProcessSolverError> {
        let timeout_ms = (timeout_secs > 0).then(|| timeout_secs.saturating_mul(1000));
        Self::with_command_and_timeout(dialect, dialect.default_command(), timeout_ms)
    }

    pub fn with_command(dialect: Dialect, cmd: &str) -> Result<Self, ProcessSolverError> {
        Self::with_command_and_timeout(dialect, cmd, None)
    }

    pub fn with_command_and_timeout(
        dialect: Dialect,
        cmd: &str,
        timeout_ms: Option<u64>,
    ) -> Result<Self, ProcessSolverError> {
        let mut child = Command::new(cmd)
            .args(dialect.args(timeout_ms))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessSolverError::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessSolverError::SolverError("failed to capture stderr".into()))?;

        let mut solver = Self {
            dialect,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            named: vec![Vec::new()],
            anonymous_count: 0,
            minimal_core: false,
            // OpenSMT is only useful here for interpolation, so start in that mode.
            interpolation: (dialect == Dialect::OpenSmt).then(InterpolationOptions::default),
        };
        solver.startup()?;
        Ok(solver)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Option block sent before `set-logic`.
    fn startup_commands(&self) -> Vec<String> {
        let mut cmds = vec![
            "(set-option :print-success true)".to_string(),
            "(set-option :produce-models true)".to_string(),
            "(set-option :produce-unsat-cores true)".to_string(),
        ];
        if self.minimal_core {
            if let Some(opt) = self.dialect.minimal_core_option() {
                cmds.push(opt.to_string());
            }
        }
        if let Some(options) = &self.interpolation {
            cmds.extend(interpolation_commands(options));
        }
        cmds.push("(set-logic QF_LRA)".to_string());
        cmds
    }

    fn startup(&mut self) -> Result<(), ProcessSolverError> {
        for cmd in self.startup_commands() {
            self.send_ack(&cmd)?;
        }
        Ok(())
    }

    fn write_command(&mut self, cmd: &str) -> Result<(), ProcessSolverError> {
        debug!(dialect = ?self.dialect, cmd, "smt2 command");
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Send a command and read one complete (paren-balanced) response.
    fn send_command(&mut self, cmd: &str) -> Result<String, ProcessSolverError> {
        self.write_command(cmd)?;
        let mut response = String::new();
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                let mut stderr = String::new();
                let _ = self.stderr.read_to_string(&mut stderr);
                return Err(ProcessSolverError::SolverError(format!(
                    "No response for command `{cmd}`. stderr: {}",
                    stderr.trim()
                )));
            }
            response.push_str(&line);
            if !response.trim().is_empty() && sexpr::paren_balance(&response) <= 0 {
                break;
            }
        }
        let response = response.trim().to_string();
        if response.starts_with("(error") {
            return Err(ProcessSolverError::SolverError(response));
        }
        Ok(response)
    }

    fn send_ack(&mut self, cmd: &str) -> Result<(), ProcessSolverError> {
        let response = self.send_command(cmd)?;
        match response.as_str() {
            "success" => Ok(()),
            other => Err(ProcessSolverError::SolverError(format!(
                "`{cmd}` answered `{other}`"
            ))),
        }
    }

    fn read_sat_result(&self, response: &str) -> Result<SatResult, ProcessSolverError> {
        match response {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => Ok(SatResult::Unknown(format!(
                "{} returned unknown",
                self.dialect.default_command()
            ))),
            other => Err(ProcessSolverError::SolverError(other.to_string())),
        }
    }

    fn live_names(&self) -> impl Iterator<Item = &String> {
        self.named.iter().flatten()
    }

    fn assert_with_name(&mut self, name: &str, term: &SmtTerm) -> Result<(), ProcessSolverError> {
        let cmd = format!("(assert (! {} :named {}))", to_smtlib(term), quote_symbol(name));
        self.send_ack(&cmd)?;
        self.named
            .last_mut()
            .ok_or_else(|| ProcessSolverError::SolverError("missing base scope".into()))?
            .push(name.to_string());
        Ok(())
    }
}

impl Drop for ProcessSolver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

fn interpolation_commands(options: &InterpolationOptions) -> Vec<String> {
    let bool_alg = match options.bool_algorithm {
        BoolItpAlgorithm::Strong => 0,
        BoolItpAlgorithm::Weak => 2,
    };
    let (lra_alg, factor) = match options.arith_algorithm {
        ArithItpAlgorithm::Strong => (0, None),
        ArithItpAlgorithm::Weak => (2, None),
        ArithItpAlgorithm::Factor(f) => (3, Some(f)),
        ArithItpAlgorithm::Stronger => (4, None),
        ArithItpAlgorithm::Weaker => (5, None),
    };
    let mut cmds = vec![
        "(set-option :produce-interpolants true)".to_string(),
        format!("(set-option :interpolation-bool-algorithm {bool_alg})"),
        format!("(set-option :interpolation-lra-algorithm {lra_alg})"),
    ];
    if let Some(f) = factor {
        cmds.push(format!("(set-option :interpolation-lra-factor \"{f}\")"));
    }
    cmds
}

fn partition_expr(names: &[&String]) -> String {
    match names {
        [] => "true".to_string(),
        [single] => quote_symbol(single),
        many => {
            let body: Vec<String> = many.iter().map(|n| quote_symbol(n)).collect();
            format!("(and {})", body.join(" "))
        }
    }
}

const FORMULA_HEADS: &[&str] = &[
    "and", "or", "not", "=>", "=", "<=", ">=", "<", ">", "+", "-", "*", "/", "ite", "let",
];

/// Pick the interpolant out of a `get-interpolants` answer.
///
/// Solvers answer either with the formula itself or with a list of
/// interpolants; only the first one is requested here.
fn parse_interpolant(response: &str) -> Result<SmtTerm, ProcessSolverError> {
    let expr = sexpr::parse(response)
        .map_err(|e| ProcessSolverError::ParseError(format!("{e}: {response}")))?;
    let formula = match &expr {
        SExpr::List(items) => match items.first() {
            Some(SExpr::Atom(head)) if FORMULA_HEADS.contains(&head.as_str()) => &expr,
            Some(first) => first,
            None => {
                return Err(ProcessSolverError::ParseError(format!(
                    "empty interpolant list: {response}"
                )))
            }
        },
        SExpr::Atom(_) => &expr,
    };
    sexpr::to_term(formula).map_err(|e| ProcessSolverError::ParseError(format!("{e}: {response}")))
}

/// Real values of the requested variables in a `get-value` answer.
fn parse_values(
    response: &str,
    var_names: &[(&str, &SmtSort)],
) -> Result<HashMap<String, Rational>, ProcessSolverError> {
    let expr = sexpr::parse(response)
        .map_err(|e| ProcessSolverError::ParseError(format!("{e}: {response}")))?;
    let pairs = expr
        .as_list()
        .ok_or_else(|| ProcessSolverError::ParseError(response.to_string()))?;
    let mut values = HashMap::new();
    for pair in pairs {
        let Some([SExpr::Atom(name), value]) = pair.as_list() else {
            return Err(ProcessSolverError::ParseError(pair.to_string()));
        };
        if !var_names.iter().any(|(n, _)| *n == name.as_str()) {
            continue;
        }
        if let Ok(r) = sexpr::parse_rational(value) {
            values.insert(name.clone(), r);
        }
    }
    Ok(values)
}

fn parse_symbol_list(response: &str) -> Result<Vec<String>, ProcessSolverError> {
    let expr = sexpr::parse(response)
        .map_err(|e| ProcessSolverError::ParseError(format!("{e}: {response}")))?;
    let items = expr
        .as_list()
        .ok_or_else(|| ProcessSolverError::ParseError(response.to_string()))?;
    Ok(items
        .iter()
        .filter_map(|item| item.as_atom().map(str::to_string))
        .collect())
}

impl SmtSolver for ProcessSolver {
    type Error = ProcessSolverError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), ProcessSolverError> {
        let sort_str = sort_to_smtlib(sort);
        self.send_ack(&format!("(declare-const {} {sort_str})", quote_symbol(name)))
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), ProcessSolverError> {
        if self.interpolation.is_some() {
            // Interpolation partitions are built from names, so name everything.
            self.anonymous_count += 1;
            let name = format!("_a{}", self.anonymous_count);
            return self.assert_with_name(&name, term);
        }
        self.send_ack(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), ProcessSolverError> {
        self.send_ack("(push 1)")?;
        self.named.push(Vec::new());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), ProcessSolverError> {
        if self.named.len() <= 1 {
            return Err(ProcessSolverError::SolverError(
                "pop without matching push".into(),
            ));
        }
        self.send_ack("(pop 1)")?;
        self.named.pop();
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, ProcessSolverError> {
        let response = self.send_command("(check-sat)")?;
        self.read_sat_result(&response)
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), ProcessSolverError> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        if var_names.is_empty() {
            return Ok((SatResult::Sat, Some(Model::default())));
        }
        let names: Vec<String> = var_names.iter().map(|(n, _)| quote_symbol(n)).collect();
        let response = self.send_command(&format!("(get-value ({}))", names.join(" ")))?;
        let values = parse_values(&response, var_names)?;
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn supports_named_unsat_core(&self) -> bool {
        true
    }

    fn assert_named(&mut self, name: &str, term: &SmtTerm) -> Result<(), ProcessSolverError> {
        self.assert_with_name(name, term)
    }

    fn get_unsat_core(&mut self) -> Result<Vec<String>, ProcessSolverError> {
        let response = self.send_command("(get-unsat-core)")?;
        let core = parse_symbol_list(&response)?;
        Ok(core
            .into_iter()
            .filter(|name| !name.starts_with("_a") && self.live_names().any(|n| n == name))
            .collect())
    }

    fn set_minimal_unsat_core(&mut self, minimal: bool) -> Result<(), ProcessSolverError> {
        self.minimal_core = minimal;
        Ok(())
    }

    fn supports_interpolation(&self) -> bool {
        self.dialect == Dialect::OpenSmt
    }

    fn set_interpolation_options(
        &mut self,
        options: &InterpolationOptions,
    ) -> Result<(), ProcessSolverError> {
        if self.dialect != Dialect::OpenSmt {
            return Err(ProcessSolverError::SolverError(format!(
                "{} does not produce interpolants",
                self.dialect.default_command()
            )));
        }
        self.interpolation = Some(*options);
        Ok(())
    }

    fn get_interpolant(&mut self, partition_a: &[String]) -> Result<Option<SmtTerm>, ProcessSolverError> {
        if self.interpolation.is_none() {
            return Ok(None);
        }
        let (a, b): (Vec<&String>, Vec<&String>) =
            self.live_names().partition(|n| partition_a.contains(n));
        if a.is_empty() {
            return Ok(Some(SmtTerm::bool(true)));
        }
        if b.is_empty() {
            return Ok(Some(SmtTerm::bool(false)));
        }
        let cmd = format!("(get-interpolants {} {})", partition_expr(&a), partition_expr(&b));
        let response = self.send_command(&cmd)?;
        parse_interpolant(&response).map(Some)
    }

    fn reset(&mut self) -> Result<(), ProcessSolverError> {
        self.send_ack("(reset)")?;
        self.named = vec![Vec::new()];
        self.anonymous_count = 0;
        self.startup()
    }
}
