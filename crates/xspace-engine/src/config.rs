use serde::{Deserialize, Serialize};

use crate::explanation::PrintFormat;
use crate::strategy::{Strategy, TrialAndErrorConfig, UnsatCoreConfig, VarOrdering};

/// Kind of explanation to compute when no strategy chain is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationType {
    /// Abductive: a subset of features pinned to the sample.
    #[default]
    Simple,
    /// Abductive followed by interval relaxation.
    General,
    UnsatCore,
    Interpolation,
}

/// Which samples of the dataset are explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFilter {
    #[default]
    All,
    /// Expected class equals the computed one.
    Correct,
    Incorrect,
}

/// Run configuration; every field has a default so partial JSON files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub explanation_type: ExplanationType,
    pub minimal_unsat_core: bool,
    pub reverse_features: bool,
    pub max_samples: Option<usize>,
    pub shuffle_samples: bool,
    pub shuffle_seed: u64,
    pub filter: SampleFilter,
    pub expected_class: Option<usize>,
    pub print_format: PrintFormat,
    pub print_free: bool,
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            explanation_type: ExplanationType::Simple,
            minimal_unsat_core: false,
            reverse_features: false,
            max_samples: None,
            shuffle_samples: false,
            shuffle_seed: 0,
            filter: SampleFilter::All,
            expected_class: None,
            print_format: PrintFormat::Bounds,
            print_free: false,
            verbosity: 0,
        }
    }
}

impl Config {
    pub fn from_json(src: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(src)
    }

    pub fn var_ordering(&self) -> VarOrdering {
        if self.reverse_features {
            VarOrdering::Reverse
        } else {
            VarOrdering::Regular
        }
    }

    /// Chain used when none is given explicitly.
    pub fn default_strategies(&self) -> Vec<Strategy> {
        match self.explanation_type {
            ExplanationType::Simple => vec![Strategy::Abductive],
            ExplanationType::General => vec![
                Strategy::Abductive,
                Strategy::TrialAndError(TrialAndErrorConfig::default()),
            ],
            ExplanationType::UnsatCore => vec![Strategy::UnsatCore(UnsatCoreConfig {
                split_eq: true,
                minimal: self.minimal_unsat_core,
            })],
            ExplanationType::Interpolation => vec![Strategy::Interpolation(Default::default())],
        }
    }
}
