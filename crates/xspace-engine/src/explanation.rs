//! Explanations: a sparse map from feature index to its [`VarBound`].
//!
//! A feature absent from the map is free. All domain-dependent operations
//! take the [`FeatureSpace`] the explanation belongs to.

use std::collections::btree_map;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use xspace_smt::backends::smtlib_printer::to_smtlib;
use xspace_smt::terms::SmtTerm;

use crate::bound::{Bound, Interval};
use crate::domain::FeatureSpace;
use crate::error::ExplainError;
use crate::var_bound::VarBound;

/// How explanations are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintFormat {
    #[default]
    Bounds,
    Smtlib2,
    Intervals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Explanation {
    bounds: BTreeMap<usize, VarBound>,
}

impl Explanation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every feature pinned to its sample value.
    pub fn from_sample(space: &FeatureSpace, values: &[f64]) -> Result<Self, ExplainError> {
        if values.len() != space.len() {
            return Err(ExplainError::precondition(format!(
                "sample has {} values, the network has {} inputs",
                values.len(),
                space.len()
            )));
        }
        let mut bounds = BTreeMap::new();
        for (i, &v) in values.iter().enumerate() {
            let vb = VarBound::point(space.domain(i), v).map_err(|_| {
                ExplainError::precondition(format!(
                    "sample value {v} of {} is outside its domain {}",
                    space.name(i),
                    space.domain(i)
                ))
            })?;
            bounds.insert(i, vb);
        }
        Ok(Self { bounds })
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn contains(&self, feature: usize) -> bool {
        self.bounds.contains_key(&feature)
    }

    pub fn get(&self, feature: usize) -> Option<&VarBound> {
        self.bounds.get(&feature)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, usize, VarBound> {
        self.bounds.iter()
    }

    /// Present feature indices in ascending order.
    pub fn features(&self) -> Vec<usize> {
        self.bounds.keys().copied().collect()
    }

    pub fn insert_var_bound(&mut self, feature: usize, bound: VarBound) {
        self.bounds.insert(feature, bound);
    }

    /// Set or clear (`None`) the entry of a feature.
    pub fn replace(&mut self, feature: usize, bound: Option<VarBound>) -> Option<VarBound> {
        match bound {
            Some(vb) => self.bounds.insert(feature, vb),
            None => self.bounds.remove(&feature),
        }
    }

    pub fn erase(&mut self, feature: usize) -> Option<VarBound> {
        self.bounds.remove(&feature)
    }

    /// Merge a single bound into the entry of `feature`.
    ///
    /// A lower bound at the domain low or an upper bound at the domain high
    /// adds nothing and is skipped.
    pub fn insert_bound(
        &mut self,
        space: &FeatureSpace,
        feature: usize,
        bound: Bound,
    ) -> Result<(), ExplainError> {
        space.check_index(feature)?;
        let domain = space.domain(feature);
        let merged = match (self.bounds.get(&feature), bound) {
            (_, Bound::Lower(v)) if v == domain.lower() => return Ok(()),
            (_, Bound::Upper(v)) if v == domain.upper() => return Ok(()),
            (None, b) => VarBound::from_bound(domain, b)?,
            (Some(_), Bound::Eq(v)) => Some(VarBound::point(domain, v)?),
            (Some(existing), Bound::Lower(v)) => existing.insert_lower(domain, v)?,
            (Some(existing), Bound::Upper(v)) => existing.insert_upper(domain, v)?,
        };
        self.replace(feature, merged);
        Ok(())
    }

    /// Features pinned to a single value.
    pub fn fixed_count(&self) -> usize {
        self.bounds.values().filter(|vb| vb.is_point()).count()
    }

    /// Atomic constraints: one per point or one-sided bound, two per interval.
    pub fn term_count(&self) -> usize {
        self.bounds.values().map(VarBound::term_count).sum()
    }

    /// Fraction of the input domain the explanation covers; `0` once any
    /// feature is a point.
    pub fn relative_volume(&self, space: &FeatureSpace) -> f64 {
        self.volume(space, false)
    }

    /// Like [`relative_volume`](Self::relative_volume), ignoring points.
    pub fn relative_volume_skip_fixed(&self, space: &FeatureSpace) -> f64 {
        self.volume(space, true)
    }

    fn volume(&self, space: &FeatureSpace, skip_fixed: bool) -> f64 {
        let mut volume = 1.0;
        for (&i, vb) in &self.bounds {
            if vb.is_point() {
                if skip_fixed {
                    continue;
                }
                return 0.0;
            }
            let domain = space.domain(i);
            volume *= vb.to_interval(domain).size() / domain.size();
        }
        volume
    }

    /// Slice combination: keep only features constrained in both, with their
    /// intervals intersected. A feature missing from either side ends up free.
    pub fn intersect(&mut self, space: &FeatureSpace, other: &Explanation) -> Result<(), ExplainError> {
        let mut result = BTreeMap::new();
        for (&i, vb) in &self.bounds {
            let Some(theirs) = other.get(i) else {
                continue;
            };
            let domain = space.domain(i);
            let Some(common) = vb.to_interval(domain).intersect(&theirs.to_interval(domain)) else {
                return Err(ExplainError::precondition(format!(
                    "bounds on {} do not overlap",
                    space.name(i)
                )));
            };
            if let Some(merged) = VarBound::interval(domain, common.lower(), common.upper())? {
                result.insert(i, merged);
            }
        }
        self.bounds = result;
        Ok(())
    }

    /// Whether `values` satisfy every entry.
    pub fn admits(&self, values: &[f64]) -> bool {
        self.bounds
            .iter()
            .all(|(&i, vb)| values.get(i).is_some_and(|v| vb.contains(*v)))
    }

    /// Conjunction of all entries over the feature variables.
    pub fn to_term(&self, space: &FeatureSpace) -> Result<SmtTerm, ExplainError> {
        let terms = self
            .bounds
            .iter()
            .map(|(&i, vb)| vb.to_term(space.name(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SmtTerm::and(terms))
    }

    /// Variable name -> entry, in feature order.
    pub fn named_bounds(&self, space: &FeatureSpace) -> IndexMap<String, VarBound> {
        self.bounds
            .iter()
            .map(|(&i, vb)| (space.name(i).to_string(), *vb))
            .collect()
    }

    pub fn render(
        &self,
        space: &FeatureSpace,
        format: PrintFormat,
        print_free: bool,
    ) -> Result<String, ExplainError> {
        Ok(match format {
            PrintFormat::Smtlib2 => to_smtlib(&self.to_term(space)?),
            PrintFormat::Bounds => self.render_lines(space, print_free, |name, vb, _| vb.render(name)),
            PrintFormat::Intervals => self.render_lines(space, print_free, |name, vb, domain| {
                format!("{name}: {}", vb.to_interval(domain))
            }),
        })
    }

    fn render_lines(
        &self,
        space: &FeatureSpace,
        print_free: bool,
        entry: impl Fn(&str, &VarBound, Interval) -> String,
    ) -> String {
        let mut out = String::new();
        for i in 0..space.len() {
            let name = space.name(i);
            let line = match self.bounds.get(&i) {
                Some(vb) => entry(name, vb, space.domain(i)),
                None if print_free => format!("{name}: {} free", space.domain(i)),
                None => continue,
            };
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&line);
        }
        out
    }
}

impl<'a> IntoIterator for &'a Explanation {
    type Item = (&'a usize, &'a VarBound);
    type IntoIter = btree_map::Iter<'a, usize, VarBound>;

    fn into_iter(self) -> Self::IntoIter {
        self.bounds.iter()
    }
}
