//! Feed-forward ReLU networks in the NNet text format.
//!
//! Layout of a `.nnet` file, one item per line:
//!
//! 1. any number of `//` header lines;
//! 2. `numLayers, numInputs, numOutputs, maxLayerSize` (layers exclude the input layer);
//! 3. layer sizes, starting with the input layer;
//! 4. an unused flag;
//! 5. per-input minimums, then per-input maximums;
//! 6. two normalization lines (ignored);
//! 7. per layer: one weight row per node, then one bias line per node.

use std::path::Path;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::debug;

use crate::source::{csv_fields, line_span, named};

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("cannot read model file {path}: {source}")]
    #[diagnostic(code(xspace::nnet::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model at line {line}: {message}")]
    #[diagnostic(code(xspace::nnet::syntax))]
    Syntax {
        line: usize,
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("model ends early: missing {expected}")]
    #[diagnostic(code(xspace::nnet::eof))]
    UnexpectedEof { expected: String },

    #[error("invalid network shape: {0}")]
    #[diagnostic(code(xspace::nnet::shape))]
    Shape(String),

    #[error("input has {found} values, network expects {expected}")]
    #[diagnostic(code(xspace::nnet::input_size))]
    InputSize { expected: usize, found: usize },
}

/// A fully connected ReLU network.
///
/// Layer `0` is the input layer; hidden layers apply ReLU, the last layer is
/// affine.
#[derive(Debug, Clone, PartialEq)]
pub struct NNet {
    layer_sizes: Vec<usize>,
    input_min: Vec<f64>,
    input_max: Vec<f64>,
    /// `weights[l - 1][node]` holds the incoming weights of node `node` in layer `l`.
    weights: Vec<Vec<Vec<f64>>>,
    biases: Vec<Vec<f64>>,
}

impl NNet {
    /// Build a network from its parameters, checking that the shapes agree.
    pub fn new(
        input_min: Vec<f64>,
        input_max: Vec<f64>,
        weights: Vec<Vec<Vec<f64>>>,
        biases: Vec<Vec<f64>>,
    ) -> Result<Self, ModelError> {
        let inputs = input_min.len();
        if inputs == 0 {
            return Err(ModelError::Shape("network has no inputs".into()));
        }
        if input_max.len() != inputs {
            return Err(ModelError::Shape(format!(
                "{} input minimums but {} maximums",
                inputs,
                input_max.len()
            )));
        }
        if let Some(i) = (0..inputs).find(|&i| !(input_min[i] <= input_max[i])) {
            return Err(ModelError::Shape(format!(
                "input {i} has minimum {} above maximum {}",
                input_min[i], input_max[i]
            )));
        }
        if weights.is_empty() || weights.len() != biases.len() {
            return Err(ModelError::Shape(format!(
                "{} weight layers and {} bias layers",
                weights.len(),
                biases.len()
            )));
        }
        let mut layer_sizes = vec![inputs];
        for (l, (rows, bias)) in weights.iter().zip(&biases).enumerate() {
            let prev = layer_sizes[l];
            if rows.is_empty() || rows.len() != bias.len() {
                return Err(ModelError::Shape(format!(
                    "layer {} has {} weight rows and {} biases",
                    l + 1,
                    rows.len(),
                    bias.len()
                )));
            }
            if let Some(node) = rows.iter().position(|row| row.len() != prev) {
                return Err(ModelError::Shape(format!(
                    "node {node} of layer {} has {} weights, expected {prev}",
                    l + 1,
                    rows[node].len()
                )));
            }
            layer_sizes.push(rows.len());
        }
        Ok(Self {
            layer_sizes,
            input_min,
            input_max,
            weights,
            biases,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&src, &path.display().to_string())
    }

    /// Parse the NNet text format; `name` labels diagnostics.
    pub fn parse(src: &str, name: &str) -> Result<Self, ModelError> {
        let mut reader = LineReader::new(src, name);

        let (line, arch) = reader.next_line("architecture line")?;
        let arch: Vec<usize> = reader.parse_fields(line, arch)?;
        let [num_layers, num_inputs, num_outputs, _max_layer_size] = arch[..] else {
            return Err(reader.syntax(
                line,
                format!("expected 4 architecture values, found {}", arch.len()),
            ));
        };

        let (line, sizes) = reader.next_line("layer sizes")?;
        let layer_sizes: Vec<usize> = reader.parse_fields(line, sizes)?;
        if layer_sizes.len() != num_layers + 1 {
            return Err(reader.syntax(
                line,
                format!(
                    "expected {} layer sizes (including the input layer), found {}",
                    num_layers + 1,
                    layer_sizes.len()
                ),
            ));
        }
        if layer_sizes.first() != Some(&num_inputs) || layer_sizes.last() != Some(&num_outputs) {
            return Err(reader.syntax(
                line,
                format!("layer sizes do not match {num_inputs} inputs and {num_outputs} outputs"),
            ));
        }
        if let Some(l) = layer_sizes.iter().position(|&s| s == 0) {
            return Err(reader.syntax(line, format!("layer {l} is empty")));
        }

        reader.next_line("flag line")?;

        let (line, text) = reader.next_line("input minimums")?;
        let input_min: Vec<f64> = reader.parse_fields(line, text)?;
        if input_min.len() != num_inputs {
            return Err(reader.syntax(
                line,
                format!("expected {num_inputs} input minimums, found {}", input_min.len()),
            ));
        }
        let (line, text) = reader.next_line("input maximums")?;
        let input_max: Vec<f64> = reader.parse_fields(line, text)?;
        if input_max.len() != num_inputs {
            return Err(reader.syntax(
                line,
                format!("expected {num_inputs} input maximums, found {}", input_max.len()),
            ));
        }
        if let Some(i) = (0..num_inputs).find(|&i| !(input_min[i] <= input_max[i])) {
            return Err(reader.syntax(
                line,
                format!(
                    "input {i} has minimum {} above maximum {}",
                    input_min[i], input_max[i]
                ),
            ));
        }

        reader.next_line("normalization means")?;
        reader.next_line("normalization ranges")?;

        let mut weights = Vec::with_capacity(num_layers);
        let mut biases = Vec::with_capacity(num_layers);
        for layer in 1..=num_layers {
            let prev = layer_sizes[layer - 1];
            let size = layer_sizes[layer];
            let mut rows = Vec::with_capacity(size);
            for node in 0..size {
                let (line, text) = reader.next_line(&format!("weights of node {node} in layer {layer}"))?;
                let row: Vec<f64> = reader.parse_fields(line, text)?;
                if row.len() != prev {
                    return Err(reader.syntax(
                        line,
                        format!("expected {prev} weights, found {}", row.len()),
                    ));
                }
                rows.push(row);
            }
            let mut layer_biases = Vec::with_capacity(size);
            for node in 0..size {
                let (line, text) = reader.next_line(&format!("bias of node {node} in layer {layer}"))?;
                let Some(first) = csv_fields(text).next() else {
                    return Err(reader.syntax(line, "empty bias line".into()));
                };
                layer_biases.push(reader.parse_value(line, first)?);
            }
            weights.push(rows);
            biases.push(layer_biases);
        }

        if let Ok((line, _)) = reader.next_line("trailing content") {
            debug!(line, "ignoring trailing content after the output layer");
        }

        Self::new(input_min, input_max, weights, biases)
    }

    /// Number of layers, including the input layer.
    pub fn num_layers(&self) -> usize {
        self.layer_sizes.len()
    }

    pub fn layer_size(&self, layer: usize) -> usize {
        self.layer_sizes.get(layer).copied().unwrap_or(0)
    }

    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    pub fn output_layer(&self) -> usize {
        self.layer_sizes.len() - 1
    }

    /// Incoming weights of `node` in `layer` (`layer >= 1`).
    pub fn weights(&self, layer: usize, node: usize) -> &[f64] {
        &self.weights[layer - 1][node]
    }

    pub fn bias(&self, layer: usize, node: usize) -> f64 {
        self.biases[layer - 1][node]
    }

    pub fn input_lower_bound(&self, feature: usize) -> f64 {
        self.input_min[feature]
    }

    pub fn input_upper_bound(&self, feature: usize) -> f64 {
        self.input_max[feature]
    }

    /// Forward pass: hidden layers are `relu(W x + b)`, the output layer is `W x + b`.
    pub fn compute_output(&self, input: &[f64]) -> Result<Vec<f64>, ModelError> {
        if input.len() != self.input_size() {
            return Err(ModelError::InputSize {
                expected: self.input_size(),
                found: input.len(),
            });
        }
        let last = self.weights.len();
        let mut values = input.to_vec();
        for (l, (rows, bias)) in self.weights.iter().zip(&self.biases).enumerate() {
            values = rows
                .iter()
                .zip(bias)
                .map(|(row, b)| {
                    let sum = row.iter().zip(&values).map(|(w, x)| w * x).sum::<f64>() + b;
                    if l + 1 < last {
                        sum.max(0.0)
                    } else {
                        sum
                    }
                })
                .collect();
        }
        Ok(values)
    }
}

/// Label of an output vector: a single output is binary (`1` iff `>= 0`),
/// otherwise the index of the first maximum.
pub fn classification_label(output: &[f64]) -> usize {
    if output.len() == 1 {
        return usize::from(output[0] >= 0.0);
    }
    let mut best = 0;
    for (i, v) in output.iter().enumerate().skip(1) {
        if *v > output[best] {
            best = i;
        }
    }
    best
}

/// Non-blank, non-header lines with their 1-based line numbers.
struct LineReader<'a> {
    src: &'a str,
    name: &'a str,
    lines: std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>,
    in_header: bool,
}

impl<'a> LineReader<'a> {
    fn new(src: &'a str, name: &'a str) -> Self {
        Self {
            src,
            name,
            lines: src.lines().enumerate().peekable(),
            in_header: true,
        }
    }

    fn next_line(&mut self, expected: &str) -> Result<(usize, &'a str), ModelError> {
        for (idx, text) in self.lines.by_ref() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if self.in_header && trimmed.starts_with("//") {
                continue;
            }
            self.in_header = false;
            return Ok((idx + 1, trimmed));
        }
        Err(ModelError::UnexpectedEof {
            expected: expected.to_string(),
        })
    }

    fn syntax(&self, line: usize, message: String) -> ModelError {
        ModelError::Syntax {
            line,
            message,
            span: line_span(self.src, line),
            src: named(self.name, self.src),
        }
    }

    fn parse_value<T: std::str::FromStr>(&self, line: usize, field: &str) -> Result<T, ModelError> {
        field
            .parse()
            .map_err(|_| self.syntax(line, format!("invalid number `{field}`")))
    }

    fn parse_fields<T: std::str::FromStr>(&self, line: usize, text: &str) -> Result<Vec<T>, ModelError> {
        csv_fields(text)
            .map(|field| self.parse_value(line, field))
            .collect()
    }
}
