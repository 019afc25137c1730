use xspace_nn::NNet;

use crate::bound::Interval;
use crate::error::ExplainError;

/// Per-feature domains and solver variable names (`x1`, `x2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpace {
    domains: Vec<Interval>,
    names: Vec<String>,
}

impl FeatureSpace {
    pub fn new(bounds: Vec<(f64, f64)>) -> Result<Self, ExplainError> {
        let mut domains = Vec::with_capacity(bounds.len());
        for (i, (lo, hi)) in bounds.into_iter().enumerate() {
            let domain = Interval::new(lo, hi).ok_or_else(|| {
                ExplainError::precondition(format!(
                    "domain of {} is empty: [{lo}, {hi}]",
                    feature_name(i)
                ))
            })?;
            domains.push(domain);
        }
        let names = (0..domains.len()).map(feature_name).collect();
        Ok(Self { domains, names })
    }

    pub fn from_network(network: &NNet) -> Result<Self, ExplainError> {
        Self::new(
            (0..network.input_size())
                .map(|i| (network.input_lower_bound(i), network.input_upper_bound(i)))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domain of feature `i`; `i` must be below [`len`](Self::len).
    pub fn domain(&self, i: usize) -> Interval {
        self.domains[i]
    }

    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Index of a variable name in this space.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        parse_feature_name(name).filter(|&i| i < self.len())
    }

    pub fn check_index(&self, i: usize) -> Result<(), ExplainError> {
        if i < self.len() {
            Ok(())
        } else {
            Err(ExplainError::precondition(format!(
                "feature {} is out of range (network has {} inputs)",
                feature_name(i),
                self.len()
            )))
        }
    }
}

/// Solver variable of feature `i`: `x{i+1}`.
pub fn feature_name(i: usize) -> String {
    format!("x{}", i + 1)
}

/// Inverse of [`feature_name`]: `x3` -> `2`.
pub fn parse_feature_name(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('x')?;
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok()?.checked_sub(1)
}
