//! The per-feature entry of an explanation.
//!
//! Constructors take the feature's domain and normalize against it: a
//! one-sided bound on the far domain edge collapses to a point, an interval
//! touching one edge loses that side, and anything covering the whole domain
//! is free (`None`).

use serde::{Deserialize, Serialize};
use xspace_smt::terms::SmtTerm;

use crate::bound::{Bound, Interval};
use crate::error::ExplainError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VarBound {
    Point { value: f64 },
    Lower { value: f64 },
    Upper { value: f64 },
    /// Two-sided with `lower < upper`.
    Interval { lower: f64, upper: f64 },
}

impl VarBound {
    /// The feature pinned to `value`, which must lie in the closed domain.
    pub fn point(domain: Interval, value: f64) -> Result<VarBound, ExplainError> {
        if !domain.contains(value) {
            return Err(ExplainError::precondition(format!(
                "value {value} is outside the domain {domain}"
            )));
        }
        Ok(VarBound::Point { value })
    }

    /// Normalized entry for a single bound; `None` when it constrains nothing.
    pub fn from_bound(domain: Interval, bound: Bound) -> Result<Option<VarBound>, ExplainError> {
        match bound {
            Bound::Eq(v) => VarBound::point(domain, v).map(Some),
            Bound::Lower(v) => VarBound::interval(domain, v, domain.upper()),
            Bound::Upper(v) => VarBound::interval(domain, domain.lower(), v),
        }
    }

    /// Normalized entry for `[lower, upper]`; `None` when it is the whole domain.
    pub fn interval(domain: Interval, lower: f64, upper: f64) -> Result<Option<VarBound>, ExplainError> {
        let Some(interval) = Interval::new(lower, upper) else {
            return Err(ExplainError::precondition(format!(
                "empty interval [{lower}, {upper}]"
            )));
        };
        if !domain.contains_interval(&interval) {
            return Err(ExplainError::precondition(format!(
                "interval {interval} is outside the domain {domain}"
            )));
        }
        if interval.is_point() {
            return Ok(Some(VarBound::Point { value: lower }));
        }
        let at_low = lower == domain.lower();
        let at_high = upper == domain.upper();
        Ok(match (at_low, at_high) {
            (true, true) => None,
            (true, false) => Some(VarBound::Upper { value: upper }),
            (false, true) => Some(VarBound::Lower { value: lower }),
            (false, false) => Some(VarBound::Interval { lower, upper }),
        })
    }

    /// The closed interval this entry allows, missing sides taken from the domain.
    pub fn to_interval(&self, domain: Interval) -> Interval {
        let (lower, upper) = match *self {
            VarBound::Point { value } => (value, value),
            VarBound::Lower { value } => (value, domain.upper()),
            VarBound::Upper { value } => (domain.lower(), value),
            VarBound::Interval { lower, upper } => (lower, upper),
        };
        Interval::new(lower, upper).unwrap_or(Interval::point(lower))
    }

    /// Tighten the lower side to at least `value`.
    pub fn insert_lower(&self, domain: Interval, value: f64) -> Result<Option<VarBound>, ExplainError> {
        let current = self.to_interval(domain);
        VarBound::interval(domain, current.lower().max(value), current.upper())
    }

    /// Tighten the upper side to at most `value`.
    pub fn insert_upper(&self, domain: Interval, value: f64) -> Result<Option<VarBound>, ExplainError> {
        let current = self.to_interval(domain);
        VarBound::interval(domain, current.lower(), current.upper().min(value))
    }

    /// Drop the lower side (relax it to the domain edge).
    pub fn erase_lower(&self, domain: Interval) -> Result<Option<VarBound>, ExplainError> {
        VarBound::interval(domain, domain.lower(), self.to_interval(domain).upper())
    }

    /// Drop the upper side (relax it to the domain edge).
    pub fn erase_upper(&self, domain: Interval) -> Result<Option<VarBound>, ExplainError> {
        VarBound::interval(domain, self.to_interval(domain).lower(), domain.upper())
    }

    pub fn is_point(&self) -> bool {
        matches!(self, VarBound::Point { .. })
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, VarBound::Interval { .. })
    }

    pub fn lower(&self) -> Option<f64> {
        match *self {
            VarBound::Point { value } | VarBound::Lower { value } => Some(value),
            VarBound::Interval { lower, .. } => Some(lower),
            VarBound::Upper { .. } => None,
        }
    }

    pub fn upper(&self) -> Option<f64> {
        match *self {
            VarBound::Point { value } | VarBound::Upper { value } => Some(value),
            VarBound::Interval { upper, .. } => Some(upper),
            VarBound::Lower { .. } => None,
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower().map_or(true, |l| x >= l) && self.upper().map_or(true, |u| x <= u)
    }

    /// Number of atomic constraints: two for an interval, one otherwise.
    pub fn term_count(&self) -> usize {
        if self.is_interval() {
            2
        } else {
            1
        }
    }

    /// The entry as bounds (`Eq` for a point, one or two one-sided bounds otherwise).
    pub fn bounds(&self) -> Vec<Bound> {
        match *self {
            VarBound::Point { value } => vec![Bound::Eq(value)],
            VarBound::Lower { value } => vec![Bound::Lower(value)],
            VarBound::Upper { value } => vec![Bound::Upper(value)],
            VarBound::Interval { lower, upper } => vec![Bound::Lower(lower), Bound::Upper(upper)],
        }
    }

    pub fn to_term(&self, var: &str) -> Result<SmtTerm, ExplainError> {
        let mut terms = self
            .bounds()
            .iter()
            .map(|b| b.to_term(var))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            SmtTerm::and(terms)
        })
    }

    /// `x1 = 0.2`, `x2 >= 0.1`, `0.1 <= x4 <= 0.9`.
    pub fn render(&self, var: &str) -> String {
        match *self {
            VarBound::Interval { lower, upper } => format!("{lower} <= {var} <= {upper}"),
            _ => self
                .bounds()
                .iter()
                .map(|b| format!("{var} {} {}", b.operator(), b.value()))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xspace_smt::backends::smtlib_printer::to_smtlib;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn unit() -> Interval {
        Interval::new(0.0, 1.0).expect("valid domain")
    }

    #[test]
    fn normalization_table() -> TestResult {
        let d = unit();
        let cases: Vec<(Bound, Option<VarBound>)> = vec![
            (Bound::Eq(0.5), Some(VarBound::Point { value: 0.5 })),
            (Bound::Eq(0.0), Some(VarBound::Point { value: 0.0 })),
            (Bound::Lower(0.5), Some(VarBound::Lower { value: 0.5 })),
            (Bound::Lower(1.0), Some(VarBound::Point { value: 1.0 })),
            (Bound::Lower(0.0), None),
            (Bound::Upper(0.5), Some(VarBound::Upper { value: 0.5 })),
            (Bound::Upper(0.0), Some(VarBound::Point { value: 0.0 })),
            (Bound::Upper(1.0), None),
        ];
        for (bound, expected) in cases {
            assert_eq!(VarBound::from_bound(d, bound)?, expected, "{bound:?}");
        }
        Ok(())
    }

    #[test]
    fn interval_normalization() -> TestResult {
        let d = unit();
        assert_eq!(
            VarBound::interval(d, 0.25, 0.75)?,
            Some(VarBound::Interval { lower: 0.25, upper: 0.75 })
        );
        assert_eq!(VarBound::interval(d, 0.5, 0.5)?, Some(VarBound::Point { value: 0.5 }));
        assert_eq!(VarBound::interval(d, 0.0, 0.5)?, Some(VarBound::Upper { value: 0.5 }));
        assert_eq!(VarBound::interval(d, 0.5, 1.0)?, Some(VarBound::Lower { value: 0.5 }));
        assert_eq!(VarBound::interval(d, 0.0, 1.0)?, None);
        assert!(VarBound::interval(d, 0.75, 0.25).is_err());
        assert!(VarBound::interval(d, -0.5, 0.25).is_err());
        assert!(VarBound::point(d, 1.5).is_err());
        Ok(())
    }

    #[test]
    fn degenerate_domain_only_allows_points() -> TestResult {
        let d = Interval::point(0.5);
        assert_eq!(VarBound::from_bound(d, Bound::Lower(0.5))?, Some(VarBound::Point { value: 0.5 }));
        assert_eq!(VarBound::interval(d, 0.5, 0.5)?, Some(VarBound::Point { value: 0.5 }));
        Ok(())
    }

    #[test]
    fn inserting_second_side_builds_interval_or_point() -> TestResult {
        let d = unit();
        let lower = VarBound::Lower { value: 0.25 };
        assert_eq!(
            lower.insert_upper(d, 0.75)?,
            Some(VarBound::Interval { lower: 0.25, upper: 0.75 })
        );
        assert_eq!(lower.insert_upper(d, 0.25)?, Some(VarBound::Point { value: 0.25 }));
        // tighter lower replaces looser one
        assert_eq!(lower.insert_lower(d, 0.5)?, Some(VarBound::Lower { value: 0.5 }));
        assert_eq!(lower.insert_lower(d, 0.1)?, Some(lower));
        assert!(lower.insert_upper(d, 0.1).is_err());
        Ok(())
    }

    #[test]
    fn erasing_sides() -> TestResult {
        let d = unit();
        let iv = VarBound::Interval { lower: 0.25, upper: 0.75 };
        assert_eq!(iv.erase_lower(d)?, Some(VarBound::Upper { value: 0.75 }));
        assert_eq!(iv.erase_upper(d)?, Some(VarBound::Lower { value: 0.25 }));
        assert_eq!(VarBound::Lower { value: 0.25 }.erase_lower(d)?, None);
        assert_eq!(
            VarBound::Point { value: 0.5 }.erase_upper(d)?,
            Some(VarBound::Lower { value: 0.5 })
        );
        Ok(())
    }

    #[test]
    fn interval_view_and_membership() {
        let d = unit();
        assert_eq!(VarBound::Lower { value: 0.25 }.to_interval(d), Interval::new(0.25, 1.0).expect("valid"));
        assert!(VarBound::Upper { value: 0.25 }.contains(0.0));
        assert!(!VarBound::Upper { value: 0.25 }.contains(0.5));
        assert!(VarBound::Point { value: 0.5 }.contains(0.5));
        assert_eq!(VarBound::Interval { lower: 0.1, upper: 0.2 }.term_count(), 2);
        assert_eq!(VarBound::Point { value: 0.1 }.term_count(), 1);
    }

    #[test]
    fn renderings() -> TestResult {
        let iv = VarBound::Interval { lower: 0.1, upper: 0.9 };
        assert_eq!(iv.render("x4"), "0.1 <= x4 <= 0.9");
        assert_eq!(VarBound::Lower { value: 0.1 }.render("x2"), "x2 >= 0.1");
        assert_eq!(VarBound::Point { value: 0.2 }.render("x1"), "x1 = 0.2");
        assert_eq!(to_smtlib(&iv.to_term("x4")?), "(and (>= x4 (/ 1 10)) (<= x4 (/ 9 10)))");
        Ok(())
    }

    #[test]
    fn serializes_with_kind_tag() -> TestResult {
        let json = serde_json::to_string(&VarBound::Lower { value: 0.5 })?;
        assert_eq!(json, r#"{"kind":"lower","value":0.5}"#);
        Ok(())
    }
}
