use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::source::{csv_fields, line_span, named};

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("cannot read dataset {path}: {source}")]
    #[diagnostic(code(xspace::dataset::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset at line {line}: {message}")]
    #[diagnostic(code(xspace::dataset::syntax))]
    Syntax {
        line: usize,
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("dataset has no samples")]
    #[diagnostic(code(xspace::dataset::empty))]
    Empty,

    #[error("samples have {found} features, the model expects {expected}")]
    #[diagnostic(
        code(xspace::dataset::feature_count),
        help("the last column of every row is the expected class")
    )]
    FeatureCount { expected: usize, found: usize },

    #[error("sample {index} has {found} features, expected {expected}")]
    #[diagnostic(code(xspace::dataset::ragged))]
    Ragged {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// One input vector and the class recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Vec<f64>,
    pub expected_class: usize,
}

/// Samples of equal width.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Result<Self, DatasetError> {
        let Some(first) = samples.first() else {
            return Err(DatasetError::Empty);
        };
        let expected = first.values.len();
        if let Some((index, sample)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.values.len() != expected)
        {
            return Err(DatasetError::Ragged {
                index,
                expected,
                found: sample.values.len(),
            });
        }
        Ok(Self { samples })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&src, &path.display().to_string())
    }

    /// Parse CSV with a header row; the last field of each row is the class.
    pub fn parse(src: &str, name: &str) -> Result<Self, DatasetError> {
        let syntax = |line: usize, message: String| DatasetError::Syntax {
            line,
            message,
            span: line_span(src, line),
            src: named(name, src),
        };

        let mut samples = Vec::new();
        let mut width = None;
        let rows = src
            .lines()
            .enumerate()
            .map(|(idx, text)| (idx + 1, text.trim()))
            .filter(|(_, text)| !text.is_empty())
            .skip(1);
        for (line, text) in rows {
            let fields: Vec<&str> = csv_fields(text).collect();
            let Some((class_field, value_fields)) = fields.split_last() else {
                continue;
            };
            if value_fields.is_empty() {
                return Err(syntax(line, "row has no feature values".into()));
            }
            match width {
                None => width = Some(value_fields.len()),
                Some(w) if w != value_fields.len() => {
                    return Err(syntax(
                        line,
                        format!("expected {w} feature values, found {}", value_fields.len()),
                    ));
                }
                Some(_) => {}
            }
            let values = value_fields
                .iter()
                .map(|f| {
                    f.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| syntax(line, format!("invalid number `{f}`")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let class = class_field
                .parse::<f64>()
                .ok()
                .filter(|c| c.is_finite() && *c >= 0.0 && c.fract() == 0.0)
                .ok_or_else(|| syntax(line, format!("class `{class_field}` is not a class index")))?;
            samples.push(Sample {
                values,
                expected_class: class as usize,
            });
        }
        Self::new(samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.samples.first().map_or(0, |s| s.values.len())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn expected_classes(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.expected_class).collect()
    }

    /// Fail unless the samples match a model with `inputs` features.
    pub fn check_feature_count(&self, inputs: usize) -> Result<(), DatasetError> {
        if self.num_features() != inputs {
            return Err(DatasetError::FeatureCount {
                expected: inputs,
                found: self.num_features(),
            });
        }
        Ok(())
    }

    /// Indices of all samples, optionally restricted to an expected class.
    pub fn indices(&self, class: Option<usize>) -> Vec<usize> {
        self.select(|_, s| class.map_or(true, |c| s.expected_class == c))
    }

    /// Indices whose expected class equals the `computed` one.
    pub fn correct_indices(&self, computed: &[usize], class: Option<usize>) -> Vec<usize> {
        self.select(|i, s| {
            computed.get(i) == Some(&s.expected_class) && class.map_or(true, |c| s.expected_class == c)
        })
    }

    /// Indices whose expected class differs from the `computed` one.
    pub fn incorrect_indices(&self, computed: &[usize], class: Option<usize>) -> Vec<usize> {
        self.select(|i, s| {
            computed.get(i).is_some_and(|c| *c != s.expected_class)
                && class.map_or(true, |c| s.expected_class == c)
        })
    }

    fn select(&self, keep: impl Fn(usize, &Sample) -> bool) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(i, s)| keep(*i, s))
            .map(|(i, _)| i)
            .collect()
    }
}
