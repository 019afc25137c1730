//! Minimal S-expression reader for solver output.
//!
//! Solvers answer `get-value`, `get-unsat-core` and `get-interpolants` with
//! SMT-LIB2 S-expressions; this module turns them back into [`SmtTerm`]s and
//! rationals.

use num::Zero;
use thiserror::Error;

use crate::terms::{Rational, SmtTerm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SExprError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected `)` at offset {0}")]
    UnbalancedClose(usize),
    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
    #[error("invalid numeral `{0}`")]
    InvalidNumeral(String),
    #[error("unsupported term: {0}")]
    Unsupported(String),
}

impl SExpr {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a),
            SExpr::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            SExpr::Atom(_) => None,
        }
    }
}

impl std::fmt::Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(a) => write!(f, "{a}"),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Net parenthesis depth of `text`, ignoring quoted symbols and strings.
///
/// Used by line-oriented readers to know when a response is complete.
pub fn paren_balance(text: &str) -> i64 {
    let mut depth = 0i64;
    let mut in_quoted = false;
    let mut in_string = false;
    for ch in text.chars() {
        match ch {
            '|' if !in_string => in_quoted = !in_quoted,
            '"' if !in_quoted => in_string = !in_string,
            '(' if !in_quoted && !in_string => depth += 1,
            ')' if !in_quoted && !in_string => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Parse every top-level S-expression in `input`.
pub fn parse_all(input: &str) -> Result<Vec<SExpr>, SExprError> {
    let tokens = tokenize(input);
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < tokens.len() {
        out.push(parse_at(&tokens, &mut pos)?);
    }
    Ok(out)
}

/// Parse exactly one S-expression.
pub fn parse(input: &str) -> Result<SExpr, SExprError> {
    let tokens = tokenize(input);
    let mut pos = 0;
    let expr = parse_at(&tokens, &mut pos)?;
    if pos < tokens.len() {
        return Err(SExprError::TrailingInput(tokens[pos].1));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn tokenize(input: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            '(' => {
                tokens.push((Token::Open, offset));
                chars.next();
            }
            ')' => {
                tokens.push((Token::Close, offset));
                chars.next();
            }
            ';' => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                let mut buf = String::new();
                for (_, c) in chars.by_ref() {
                    if c == '|' {
                        break;
                    }
                    buf.push(c);
                }
                tokens.push((Token::Atom(buf), offset));
            }
            '"' => {
                chars.next();
                let mut buf = String::from("\"");
                for (_, c) in chars.by_ref() {
                    buf.push(c);
                    if c == '"' {
                        break;
                    }
                }
                tokens.push((Token::Atom(buf), offset));
            }
            _ => {
                let mut buf = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c == '(' || c == ')' || c == ';' || c.is_whitespace() {
                        break;
                    }
                    buf.push(c);
                    chars.next();
                }
                tokens.push((Token::Atom(buf), offset));
            }
        }
    }
    tokens
}

fn parse_at(tokens: &[(Token, usize)], pos: &mut usize) -> Result<SExpr, SExprError> {
    let Some((token, offset)) = tokens.get(*pos) else {
        return Err(SExprError::UnexpectedEof);
    };
    *pos += 1;
    match token {
        Token::Atom(a) => Ok(SExpr::Atom(a.clone())),
        Token::Close => Err(SExprError::UnbalancedClose(*offset)),
        Token::Open => {
            let mut items = Vec::new();
            loop {
                match tokens.get(*pos) {
                    None => return Err(SExprError::UnexpectedEof),
                    Some((Token::Close, _)) => {
                        *pos += 1;
                        return Ok(SExpr::List(items));
                    }
                    Some(_) => items.push(parse_at(tokens, pos)?),
                }
            }
        }
    }
}

/// Parse a numeral atom: `3`, `-3`, `0.25`, `1.0`.
pub fn parse_numeral(text: &str) -> Result<Rational, SExprError> {
    let invalid = || SExprError::InvalidNumeral(text.to_string());
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if digits.is_empty() {
        return Err(invalid());
    }
    let value = match digits.split_once('.') {
        None => Rational::from_integer(digits.parse::<i64>().map_err(|_| invalid())?),
        Some((int_part, frac_part)) => {
            if int_part.is_empty() && frac_part.is_empty() {
                return Err(invalid());
            }
            let int_value = if int_part.is_empty() {
                0
            } else {
                int_part.parse::<i64>().map_err(|_| invalid())?
            };
            let frac_digits = frac_part.trim_end_matches('0');
            let mut value = Rational::from_integer(int_value);
            if !frac_digits.is_empty() {
                let numer = frac_digits.parse::<i64>().map_err(|_| invalid())?;
                let exponent = u32::try_from(frac_digits.len()).map_err(|_| invalid())?;
                let denom = 10i64.checked_pow(exponent).ok_or_else(invalid)?;
                value += Rational::new(numer, denom);
            }
            value
        }
    };
    Ok(if negative { -value } else { value })
}

/// Evaluate a constant arithmetic expression: numerals, `(- e)`, `(/ a b)`,
/// `(* a b)`, `(+ a b)`.
pub fn parse_rational(expr: &SExpr) -> Result<Rational, SExprError> {
    match expr {
        SExpr::Atom(a) => parse_numeral(a),
        SExpr::List(items) => {
            let Some(op) = items.first().and_then(SExpr::as_atom) else {
                return Err(SExprError::Unsupported(expr.to_string()));
            };
            let args = items[1..]
                .iter()
                .map(parse_rational)
                .collect::<Result<Vec<_>, _>>()?;
            match (op, args.as_slice()) {
                ("-", [x]) => Ok(-*x),
                ("-", [x, rest @ ..]) => Ok(rest.iter().fold(*x, |acc, r| acc - r)),
                ("+", [x, rest @ ..]) => Ok(rest.iter().fold(*x, |acc, r| acc + r)),
                ("*", [x, rest @ ..]) => Ok(rest.iter().fold(*x, |acc, r| acc * r)),
                ("/", [x, y]) if !y.is_zero() => Ok(x / y),
                _ => Err(SExprError::Unsupported(expr.to_string())),
            }
        }
    }
}

/// Convert a quantifier-free linear S-expression into an [`SmtTerm`].
///
/// Constant subterms become real literals, so `(/ 1 2)` and `0.5` read the
/// same. `let` bindings are not supported.
pub fn to_term(expr: &SExpr) -> Result<SmtTerm, SExprError> {
    if let Ok(r) = parse_rational(expr) {
        return Ok(SmtTerm::RealLit(r));
    }
    match expr {
        SExpr::Atom(a) => Ok(match a.as_str() {
            "true" => SmtTerm::BoolLit(true),
            "false" => SmtTerm::BoolLit(false),
            name => SmtTerm::Var(name.to_string()),
        }),
        SExpr::List(items) => {
            let Some(op) = items.first().and_then(SExpr::as_atom) else {
                return Err(SExprError::Unsupported(expr.to_string()));
            };
            let args = items[1..]
                .iter()
                .map(to_term)
                .collect::<Result<Vec<_>, _>>()?;
            let unsupported = || SExprError::Unsupported(expr.to_string());
            match op {
                "and" => Ok(SmtTerm::And(args)),
                "or" => Ok(SmtTerm::Or(args)),
                "not" => single(args).map(SmtTerm::not).ok_or_else(unsupported),
                "=>" => pair(args)
                    .map(|(l, r)| l.implies(r))
                    .ok_or_else(unsupported),
                "=" => pair(args).map(|(l, r)| l.eq(r)).ok_or_else(unsupported),
                "<=" => pair(args).map(|(l, r)| l.le(r)).ok_or_else(unsupported),
                ">=" => pair(args).map(|(l, r)| l.ge(r)).ok_or_else(unsupported),
                "<" => pair(args).map(|(l, r)| l.lt(r)).ok_or_else(unsupported),
                ">" => pair(args).map(|(l, r)| l.gt(r)).ok_or_else(unsupported),
                "+" if !args.is_empty() => Ok(SmtTerm::sum(args)),
                "*" if !args.is_empty() => {
                    let mut iter = args.into_iter();
                    let first = iter.next().ok_or_else(unsupported)?;
                    Ok(iter.fold(first, SmtTerm::mul))
                }
                "-" if args.len() == 1 => single(args).map(SmtTerm::neg).ok_or_else(unsupported),
                "-" if args.len() >= 2 => {
                    let mut iter = args.into_iter();
                    let first = iter.next().ok_or_else(unsupported)?;
                    Ok(iter.fold(first, SmtTerm::sub))
                }
                "ite" if args.len() == 3 => {
                    let mut iter = args.into_iter();
                    match (iter.next(), iter.next(), iter.next()) {
                        (Some(c), Some(t), Some(e)) => Ok(SmtTerm::ite(c, t, e)),
                        _ => Err(unsupported()),
                    }
                }
                _ => Err(unsupported()),
            }
        }
    }
}

fn single(args: Vec<SmtTerm>) -> Option<SmtTerm> {
    let mut iter = args.into_iter();
    let first = iter.next()?;
    iter.next().is_none().then_some(first)
}

fn pair(args: Vec<SmtTerm>) -> Option<(SmtTerm, SmtTerm)> {
    let mut iter = args.into_iter();
    let l = iter.next()?;
    let r = iter.next()?;
    iter.next().is_none().then_some((l, r))
}
