//! Runs a strategy chain over a dataset.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use xspace_nn::{classification_label, Dataset, NNet};

use crate::config::{Config, SampleFilter};
use crate::domain::FeatureSpace;
use crate::error::ExplainError;
use crate::explanation::Explanation;
use crate::report::{CheckVerdict, ExplainRun, RunSummary, SampleReport};
use crate::strategy::{parse_strategies, Session, Strategy, VarOrdering};
use crate::verifier::{Answer, Verifier};

/// Margin by which a binary output must cross zero to count as flipped.
pub const BINARY_PRECISION: f64 = 0.015625;

/// Assert that the network output differs from `label`.
pub fn assert_misclassification(
    verifier: &mut dyn Verifier,
    network: &NNet,
    label: usize,
) -> Result<(), ExplainError> {
    let output = network.output_layer();
    if network.output_size() > 1 {
        verifier.add_classification_constraint(label, 0.0)?;
    } else if label == 1 {
        verifier.add_upper_bound(output, 0, -BINARY_PRECISION, false)?;
    } else {
        verifier.add_lower_bound(output, 0, BINARY_PRECISION, false)?;
    }
    Ok(())
}

/// Outcome of running the chain on one sample.
#[derive(Default)]
struct ChainOutcome {
    unknown_answers: u64,
    warnings: Vec<String>,
    error: Option<ExplainError>,
}

pub struct Framework {
    config: Config,
    network: NNet,
    space: FeatureSpace,
    verifier: Box<dyn Verifier>,
    strategies: Vec<Strategy>,
    ordering: VarOrdering,
    /// Chain the current encoding was configured for.
    loaded_for: Option<Vec<Strategy>>,
}

impl Framework {
    /// Set up with the default chain of `config.explanation_type`.
    pub fn new(config: Config, network: NNet, verifier: Box<dyn Verifier>) -> Result<Self, ExplainError> {
        let space = FeatureSpace::from_network(&network)?;
        let ordering = config.var_ordering();
        let strategies = config.default_strategies();
        let mut framework = Self {
            config,
            network,
            space,
            verifier,
            strategies: Vec::new(),
            ordering,
            loaded_for: None,
        };
        framework.set_strategies(strategies)?;
        Ok(framework)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn network(&self) -> &NNet {
        &self.network
    }

    pub fn space(&self) -> &FeatureSpace {
        &self.space
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn set_ordering(&mut self, ordering: VarOrdering) -> Result<(), ExplainError> {
        ordering.resolve(self.space.len())?;
        self.ordering = ordering;
        Ok(())
    }

    /// Replace the chain after checking it against the verifier's capabilities.
    pub fn set_strategies(&mut self, strategies: Vec<Strategy>) -> Result<(), ExplainError> {
        if strategies.is_empty() {
            return Err(ExplainError::StrategySpec("no strategies given".into()));
        }
        for strategy in &strategies {
            strategy.validate(self.verifier.as_ref(), &self.space)?;
        }
        self.strategies = strategies;
        Ok(())
    }

    pub fn parse_strategies(&mut self, spec: &str) -> Result<(), ExplainError> {
        self.set_strategies(parse_strategies(spec)?)
    }

    /// Explain the selected samples, starting from fully fixed explanations.
    pub fn explain(&mut self, dataset: &Dataset) -> Result<ExplainRun, ExplainError> {
        dataset.check_feature_count(self.network.input_size())?;
        let explanations = dataset
            .samples()
            .iter()
            .map(|s| Explanation::from_sample(&self.space, &s.values))
            .collect::<Result<Vec<_>, _>>()?;
        self.run(dataset, explanations)
    }

    /// Continue the chain from given explanations, one per sample.
    pub fn expand(&mut self, explanations: Vec<Explanation>, dataset: &Dataset) -> Result<ExplainRun, ExplainError> {
        if explanations.len() != dataset.len() {
            return Err(ExplainError::precondition(format!(
                "{} explanations for {} samples",
                explanations.len(),
                dataset.len()
            )));
        }
        self.run(dataset, explanations)
    }

    /// Re-verify one explanation per sample.
    pub fn check_explanations(
        &mut self,
        explanations: &[Explanation],
        dataset: &Dataset,
    ) -> Result<Vec<CheckVerdict>, ExplainError> {
        if explanations.len() != dataset.len() {
            return Err(ExplainError::precondition(format!(
                "{} explanations for {} samples",
                explanations.len(),
                dataset.len()
            )));
        }
        let labels = self.compute_labels(dataset)?;
        self.ensure_loaded()?;
        let mut verdicts = Vec::with_capacity(explanations.len());
        for (index, (explanation, sample)) in explanations.iter().zip(dataset.samples()).enumerate() {
            let verdict = self.check_one(explanation, &sample.values, labels[index])?;
            debug!(sample = index, ?verdict, "explanation checked");
            verdicts.push(verdict);
        }
        Ok(verdicts)
    }

    fn check_one(
        &mut self,
        explanation: &Explanation,
        values: &[f64],
        label: usize,
    ) -> Result<CheckVerdict, ExplainError> {
        let mut session = Session::new(self.verifier.as_mut(), &self.space, values, &self.ordering);
        let network = &self.network;
        let answer = session.scoped(|s| {
            assert_misclassification(&mut *s.verifier, network, label)?;
            s.assert_explanation(explanation, None, |_| false, false)?;
            Ok(s.verifier.check_with_model())
        })?;
        self.verifier.reset_sample();
        match answer {
            (Answer::Unsat, _) => Ok(CheckVerdict::Valid),
            (Answer::Sat, model) => Ok(CheckVerdict::Invalid {
                counterexample: model.unwrap_or_default(),
            }),
            (Answer::Unknown, _) => Ok(CheckVerdict::Unknown),
            (Answer::Error, _) => Err(ExplainError::SolverError("explanation check failed".into())),
        }
    }

    fn compute_labels(&self, dataset: &Dataset) -> Result<Vec<usize>, ExplainError> {
        dataset.check_feature_count(self.network.input_size())?;
        dataset
            .samples()
            .iter()
            .map(|s| Ok(classification_label(&self.network.compute_output(&s.values)?)))
            .collect()
    }

    /// Indices to process: filtered, optionally shuffled, then capped.
    pub fn select_samples(&self, dataset: &Dataset, computed: &[usize]) -> Vec<usize> {
        let class = self.config.expected_class;
        let mut indices = match self.config.filter {
            SampleFilter::All => dataset.indices(class),
            SampleFilter::Correct => dataset.correct_indices(computed, class),
            SampleFilter::Incorrect => dataset.incorrect_indices(computed, class),
        };
        if self.config.shuffle_samples {
            let mut rng = StdRng::seed_from_u64(self.config.shuffle_seed);
            indices.shuffle(&mut rng);
        }
        if let Some(max) = self.config.max_samples {
            indices.truncate(max);
        }
        indices
    }

    /// Encode the network, configured for the current chain, unless it already is.
    fn ensure_loaded(&mut self) -> Result<(), ExplainError> {
        if self.loaded_for.as_ref() == Some(&self.strategies) {
            return Ok(());
        }
        let minimal = self
            .strategies
            .iter()
            .any(|s| matches!(s, Strategy::UnsatCore(c) if c.minimal));
        self.verifier.set_minimal_unsat_core(minimal)?;
        for strategy in &self.strategies {
            strategy.configure(self.verifier.as_mut())?;
        }
        self.verifier.reset()?;
        self.verifier.load_model(&self.network)?;
        self.loaded_for = Some(self.strategies.clone());
        Ok(())
    }

    fn run(&mut self, dataset: &Dataset, mut explanations: Vec<Explanation>) -> Result<ExplainRun, ExplainError> {
        let computed = self.compute_labels(dataset)?;
        let selected = self.select_samples(dataset, &computed);
        self.ensure_loaded()?;

        let abductive_only = self.strategies.iter().all(Strategy::is_abductive_only);
        info!("Dataset size: {}", dataset.len());
        info!("Number of variables: {}", self.space.len());
        info!("{}", "-".repeat(60));
        info!(
            selected = selected.len(),
            strategies = %self.strategies.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            "Explaining samples..."
        );

        let mut reports = Vec::with_capacity(selected.len());
        for index in selected {
            let sample = &dataset.samples()[index];
            let explanation = &mut explanations[index];
            self.verifier.reset_checks_count();
            let outcome = self.explain_sample(&sample.values, computed[index], explanation);
            if let Some(error) = &outcome.error {
                warn!(sample = index, %error, "sample failed");
            }
            let report = SampleReport {
                index,
                expected_class: sample.expected_class,
                computed_class: computed[index],
                checks: self.verifier.checks_count(),
                features: explanation.len(),
                total_features: self.space.len(),
                fixed_features: explanation.fixed_count(),
                terms: explanation.term_count(),
                relative_volume: explanation.relative_volume_skip_fixed(&self.space),
                unknown_answers: outcome.unknown_answers,
                warnings: outcome.warnings,
                error: outcome.error.map(|e| e.to_string()),
                explanation: explanation.named_bounds(&self.space),
            };
            report.log(&sample.values, dataset.len(), abductive_only);
            reports.push(report);
        }

        let summary = RunSummary::from_reports(dataset.len(), self.space.len(), &reports);
        info!(
            processed = summary.processed,
            failed = summary.failed,
            checks = summary.total_checks,
            "Run complete"
        );
        Ok(ExplainRun {
            explanations,
            reports,
            summary,
        })
    }

    fn explain_sample(&mut self, values: &[f64], label: usize, explanation: &mut Explanation) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        let base = self.verifier.depth();
        if let Err(error) = self.verifier.push() {
            outcome.error = Some(error.into());
            return outcome;
        }
        let result = assert_misclassification(self.verifier.as_mut(), &self.network, label)
            .and_then(|()| self.run_chain(values, explanation, &mut outcome));
        let popped = self.verifier.pop();
        self.verifier.reset_sample();
        outcome.error = match (result, popped) {
            (Err(e), _) => Some(e),
            (Ok(()), Err(e)) => Some(e.into()),
            (Ok(()), Ok(())) if self.verifier.depth() != base => Some(ExplainError::precondition(format!(
                "checkpoint depth {} after the sample, expected {base}",
                self.verifier.depth()
            ))),
            (Ok(()), Ok(())) => None,
        };
        outcome
    }

    fn run_chain(
        &mut self,
        values: &[f64],
        explanation: &mut Explanation,
        outcome: &mut ChainOutcome,
    ) -> Result<(), ExplainError> {
        for strategy in &self.strategies {
            let depth = self.verifier.depth();
            let before = explanation.clone();
            let mut session = Session::new(self.verifier.as_mut(), &self.space, values, &self.ordering);
            let result = strategy.execute(&mut session, explanation);
            outcome.unknown_answers += session.unknown_answers;
            outcome.warnings.append(&mut session.warnings);
            match result {
                Ok(()) => {}
                Err(ExplainError::PreconditionViolation(message)) if strategy.requires_interpolation() => {
                    let message = format!("{strategy} fell back to the previous explanation: {message}");
                    warn!("{message}");
                    outcome.warnings.push(message);
                    *explanation = before;
                }
                Err(e) => return Err(e),
            }
            if self.verifier.depth() != depth {
                return Err(ExplainError::precondition(format!(
                    "strategy {} left checkpoint depth {}, expected {depth}",
                    strategy.name(),
                    self.verifier.depth()
                )));
            }
        }
        Ok(())
    }
}
