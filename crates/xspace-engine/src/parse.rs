//! Reader for explanation files: one SMT-LIB2 explanation per line, as
//! written by the `smtlib2` print format.

use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use xspace_smt::sexpr::{self, SExpr};
use xspace_smt::terms::rational_to_f64;

use crate::bound::Bound;
use crate::domain::{parse_feature_name, FeatureSpace};
use crate::explanation::Explanation;

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(xspace::parse::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed explanation at line {line}: {message}")]
    #[diagnostic(code(xspace::parse::syntax))]
    Syntax {
        line: usize,
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("found {found} explanations, expected one per sample ({expected})")]
    #[diagnostic(code(xspace::parse::count))]
    Count { found: usize, expected: usize },
}

/// Read `path` and require exactly `expected` explanations.
pub fn read_explanations(
    path: impl AsRef<Path>,
    space: &FeatureSpace,
    expected: usize,
) -> Result<Vec<Explanation>, ParseError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let explanations = parse_explanations(&src, &path.display().to_string(), space)?;
    expect_count(explanations, expected)
}

pub fn expect_count(explanations: Vec<Explanation>, expected: usize) -> Result<Vec<Explanation>, ParseError> {
    if explanations.len() != expected {
        return Err(ParseError::Count {
            found: explanations.len(),
            expected,
        });
    }
    Ok(explanations)
}

/// One explanation per non-empty line.
pub fn parse_explanations(src: &str, name: &str, space: &FeatureSpace) -> Result<Vec<Explanation>, ParseError> {
    let mut offset = 0;
    let mut explanations = Vec::new();
    for (idx, raw) in src.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let text = raw.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            continue;
        }
        let explanation = parse_line(text, space).map_err(|message| ParseError::Syntax {
            line: idx + 1,
            message,
            span: (start, text.len()).into(),
            src: NamedSource::new(name, src.to_string()),
        })?;
        explanations.push(explanation);
    }
    Ok(explanations)
}

fn parse_line(text: &str, space: &FeatureSpace) -> Result<Explanation, String> {
    let expr = sexpr::parse(text).map_err(|e| e.to_string())?;
    let mut explanation = Explanation::new();
    collect(&expr, space, &mut explanation)?;
    Ok(explanation)
}

fn collect(expr: &SExpr, space: &FeatureSpace, explanation: &mut Explanation) -> Result<(), String> {
    if expr.as_atom() == Some("true") {
        return Ok(());
    }
    let Some([head, args @ ..]) = expr.as_list() else {
        return Err(format!("expected a bound or `and`, found `{expr}`"));
    };
    let op = head.as_atom().unwrap_or_default();
    if op == "and" {
        for arg in args {
            collect(arg, space, explanation)?;
        }
        return Ok(());
    }
    let [var, value] = args else {
        return Err(format!("`{expr}` is not a bound"));
    };
    let name = var.as_atom().unwrap_or_default();
    let feature = parse_feature_name(name)
        .filter(|&i| i < space.len())
        .ok_or_else(|| format!("unknown variable `{var}`"))?;
    let value = sexpr::parse_rational(value).map_err(|e| e.to_string())?;
    let value = rational_to_f64(&value);
    let bound = match op {
        "=" => Bound::Eq(value),
        ">=" => Bound::Lower(value),
        "<=" => Bound::Upper(value),
        _ => return Err(format!("unsupported operator `{op}`")),
    };
    explanation
        .insert_bound(space, feature, bound)
        .map_err(|e| e.to_string())
}
