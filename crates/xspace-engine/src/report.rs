//! Per-sample statistics and run summaries.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::explanation::Explanation;
use crate::var_bound::VarBound;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    pub index: usize,
    pub expected_class: usize,
    pub computed_class: usize,
    pub checks: u64,
    pub features: usize,
    pub total_features: usize,
    pub fixed_features: usize,
    pub terms: usize,
    /// Relative volume ignoring fixed features.
    pub relative_volume: f64,
    pub unknown_answers: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub explanation: IndexMap<String, VarBound>,
}

impl SampleReport {
    /// Log the statistics block of one sample.
    pub fn log(&self, sample: &[f64], dataset_size: usize, abductive_only: bool) {
        let values = sample.iter().map(f64::to_string).collect::<Vec<_>>().join(",");
        info!("sample [{}/{}]: {values}", self.index + 1, dataset_size);
        info!("expected output: {}", self.expected_class);
        info!("computed output: {}", self.computed_class);
        info!("#checks: {}", self.checks);
        info!("#features: {}/{}", self.features, self.total_features);
        if let Some(error) = &self.error {
            info!("error: {error}");
        }
        if abductive_only {
            return;
        }
        info!("#fixed features: {}/{}", self.fixed_features, self.total_features);
        info!("#terms: {}", self.terms);
        info!("relVolume*: {:.1}%", self.relative_volume * 100.0);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub dataset_size: usize,
    pub variables: usize,
    pub processed: usize,
    pub failed: usize,
    pub total_checks: u64,
    pub unknown_answers: u64,
    pub average_features: f64,
    pub average_fixed_features: f64,
    pub average_terms: f64,
    pub average_relative_volume: f64,
}

impl RunSummary {
    pub fn from_reports(dataset_size: usize, variables: usize, reports: &[SampleReport]) -> Self {
        let processed = reports.len();
        let mean = |f: &dyn Fn(&SampleReport) -> f64| {
            if processed == 0 {
                0.0
            } else {
                reports.iter().map(f).sum::<f64>() / processed as f64
            }
        };
        Self {
            dataset_size,
            variables,
            processed,
            failed: reports.iter().filter(|r| r.error.is_some()).count(),
            total_checks: reports.iter().map(|r| r.checks).sum(),
            unknown_answers: reports.iter().map(|r| r.unknown_answers).sum(),
            average_features: mean(&|r| r.features as f64),
            average_fixed_features: mean(&|r| r.fixed_features as f64),
            average_terms: mean(&|r| r.terms as f64),
            average_relative_volume: mean(&|r| r.relative_volume),
        }
    }
}

/// Result of explaining a dataset.
#[derive(Debug, Clone)]
pub struct ExplainRun {
    /// One per dataset sample; unselected samples stay fully fixed.
    pub explanations: Vec<Explanation>,
    pub reports: Vec<SampleReport>,
    pub summary: RunSummary,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a RunSummary,
    samples: &'a [SampleReport],
}

impl ExplainRun {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport {
            summary: &self.summary,
            samples: &self.reports,
        })
    }
}

/// Outcome of re-checking one explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CheckVerdict {
    Valid,
    /// An input inside the explanation that flips the classification.
    Invalid { counterexample: Vec<f64> },
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, features: usize, error: Option<&str>) -> SampleReport {
        SampleReport {
            index,
            expected_class: 1,
            computed_class: 1,
            checks: 3,
            features,
            total_features: 3,
            fixed_features: features,
            terms: features,
            relative_volume: 1.0,
            unknown_answers: 0,
            warnings: Vec::new(),
            error: error.map(str::to_string),
            explanation: IndexMap::new(),
        }
    }

    #[test]
    fn summary_averages() {
        let reports = [report(0, 1, None), report(1, 3, Some("solver error"))];
        let summary = RunSummary::from_reports(5, 3, &reports);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_checks, 6);
        assert_eq!(summary.average_features, 2.0);
        assert_eq!(RunSummary::from_reports(5, 3, &[]).average_terms, 0.0);
    }

    #[test]
    fn verdicts_serialize_with_tag() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&CheckVerdict::Invalid {
            counterexample: vec![0.5],
        })?;
        assert_eq!(json, r#"{"verdict":"invalid","counterexample":[0.5]}"#);
        assert_eq!(serde_json::to_string(&CheckVerdict::Valid)?, r#"{"verdict":"valid"}"#);
        Ok(())
    }

    #[test]
    fn errors_are_omitted_when_absent() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&report(0, 1, None))?;
        assert!(!json.contains("error"));
        assert!(!json.contains("warnings"));
        Ok(())
    }
}
