use std::collections::BTreeMap;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

use tracing::debug;

use crate::core::validate::ValidationError;
use crate::domain::diff::{Difference, Differences};
use crate::domain::model::Key;

/// Element-wise acceptance test for a single difference.
#[derive(Clone)]
enum Filter {
    Missing,
    Extra,
    Invalid,
    Deviation { lower: f64, upper: f64 },
    PercentDeviation { lower: f64, upper: f64 },
    Where(Arc<dyn Fn(&Difference) -> bool + Send + Sync>),
    Key(Arc<dyn Fn(&Key) -> bool + Send + Sync>),
}

impl Filter {
    fn allows(&self, key: Option<&Key>, diff: &Difference) -> bool {
        match self {
            Filter::Missing => diff.is_missing(),
            Filter::Extra => diff.is_extra(),
            Filter::Invalid => diff.is_invalid(),
            Filter::Deviation { lower, upper } => match diff.deviation_parts() {
                Some((d, _)) => !d.is_nan() && *lower <= d && d <= *upper,
                None => false,
            },
            Filter::PercentDeviation { lower, upper } => match diff.deviation_parts() {
                Some((d, e)) => {
                    if d.is_nan() || e.is_nan() {
                        false
                    } else if e == 0.0 {
                        d == 0.0
                    } else {
                        let percent = d / e;
                        *lower <= percent && percent <= *upper
                    }
                }
                None => false,
            },
            Filter::Where(f) => f(diff),
            Filter::Key(f) => {
                let key = key.unwrap_or_else(|| {
                    panic!("key allowance requires keyed differences")
                });
                f(key)
            }
        }
    }
}

/// Allowed differences removed by identity, each entry cancelling one
/// observed difference.
#[derive(Clone)]
enum Specific {
    EachGroup(Vec<Difference>),
    PerKey(BTreeMap<Key, Vec<Difference>>),
}

impl Specific {
    fn budget(&self, key: Option<&Key>) -> Vec<Difference> {
        match self {
            Specific::EachGroup(list) => list.clone(),
            Specific::PerKey(map) => {
                let key = key.unwrap_or_else(|| {
                    panic!("keyed specific allowance requires keyed differences")
                });
                map.get(key).cloned().unwrap_or_default()
            }
        }
    }

    fn remove_allowed(&self, key: Option<&Key>, group: Vec<Difference>) -> Vec<Difference> {
        let mut budget = self.budget(key);
        group
            .into_iter()
            .filter(|diff| match budget.iter().position(|a| a == diff) {
                Some(pos) => {
                    budget.remove(pos);
                    false
                }
                None => true,
            })
            .collect()
    }
}

#[derive(Clone)]
enum Term {
    Filter(Filter),
    Specific(Specific),
    Limit(usize),
    Or(Vec<Term>),
    And(Vec<Term>),
}

impl Term {
    /// Whether this term, used inside a conjunction, accepts a single
    /// difference. Limits and specifics are counted at group level.
    fn allows_element(&self, key: Option<&Key>, diff: &Difference) -> bool {
        match self {
            Term::Filter(f) => f.allows(key, diff),
            Term::Or(terms) => terms
                .iter()
                .filter(|t| !matches!(t, Term::Limit(_)))
                .any(|t| t.allows_element(key, diff)),
            Term::And(terms) => terms
                .iter()
                .filter(|t| !matches!(t, Term::Limit(_)))
                .all(|t| t.allows_element(key, diff)),
            Term::Specific(_) | Term::Limit(_) => false,
        }
    }

    fn apply_group(&self, key: Option<&Key>, group: Vec<Difference>) -> Vec<Difference> {
        match self {
            Term::Filter(f) => group
                .into_iter()
                .filter(|diff| !f.allows(key, diff))
                .collect(),
            Term::Specific(s) => s.remove_allowed(key, group),
            Term::Limit(n) => {
                // All-or-nothing: a group over the limit keeps every
                // difference it started with.
                if group.len() <= *n {
                    Vec::new()
                } else {
                    group
                }
            }
            Term::Or(terms) => {
                let original = group.clone();
                let mut remaining = group;
                let mut limit: Option<usize> = None;
                for term in terms {
                    match term {
                        Term::Limit(n) => {
                            limit = Some(limit.map_or(*n, |prev| prev.max(*n)));
                        }
                        other => remaining = other.apply_group(key, remaining),
                    }
                }
                match limit {
                    Some(n) if remaining.len() <= n => Vec::new(),
                    Some(_) => original,
                    None => remaining,
                }
            }
            Term::And(terms) => {
                let mut limit: Option<usize> = None;
                let mut filters: Vec<&Term> = Vec::new();
                let mut budget: Option<Vec<Difference>> = None;
                for term in terms {
                    match term {
                        Term::Limit(n) => {
                            limit = Some(limit.map_or(*n, |prev| prev.min(*n)));
                        }
                        Term::Specific(s) => {
                            let mut combined = budget.unwrap_or_default();
                            combined.extend(s.budget(key));
                            budget = Some(combined);
                        }
                        other => filters.push(other),
                    }
                }

                // A difference is a candidate only if every conjunct
                // accepts it, consuming from the specific budget.
                let mut candidates = Vec::new();
                for (index, diff) in group.iter().enumerate() {
                    if !filters.iter().all(|t| t.allows_element(key, diff)) {
                        continue;
                    }
                    if let Some(list) = budget.as_mut() {
                        match list.iter().position(|a| a == diff) {
                            Some(pos) => {
                                list.remove(pos);
                            }
                            None => continue,
                        }
                    }
                    candidates.push(index);
                }

                if candidates.len() > limit.unwrap_or(usize::MAX) {
                    return group;
                }
                group
                    .into_iter()
                    .enumerate()
                    .filter(|(index, _)| !candidates.contains(index))
                    .map(|(_, diff)| diff)
                    .collect()
            }
        }
    }
}

/// A composable filter that excuses expected differences from a
/// validation failure. Allowances combine with `|` (either excuses)
/// and `&` (both must agree).
#[derive(Clone)]
pub struct Allowance {
    term: Term,
    message: Option<String>,
}

impl Allowance {
    fn from_term(term: Term) -> Self {
        Allowance {
            term,
            message: None,
        }
    }

    /// Message used on the remaining error when differences survive.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Remove allowed differences from a validation failure. Returns
    /// `Ok` when every difference was excused.
    pub fn apply(&self, error: ValidationError) -> Result<(), ValidationError> {
        let original_message = error.message().to_string();
        let remaining = match error.into_differences() {
            Differences::Unkeyed(list) => {
                Differences::Unkeyed(self.term.apply_group(None, list))
            }
            Differences::Keyed(map) => Differences::Keyed(
                map.into_iter()
                    .map(|(key, group)| {
                        let remaining = self.term.apply_group(Some(&key), group);
                        (key, remaining)
                    })
                    .collect(),
            ),
        };
        let message = self.message.clone().unwrap_or(original_message);
        match ValidationError::from_parts(message, remaining) {
            Some(err) => {
                debug!(remaining = err.differences().len(), "allowance left differences");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl BitOr for Allowance {
    type Output = Allowance;

    fn bitor(self, rhs: Allowance) -> Allowance {
        let mut terms = match self.term {
            Term::Or(terms) => terms,
            other => vec![other],
        };
        match rhs.term {
            Term::Or(more) => terms.extend(more),
            other => terms.push(other),
        }
        Allowance {
            term: Term::Or(terms),
            message: self.message.or(rhs.message),
        }
    }
}

impl BitAnd for Allowance {
    type Output = Allowance;

    fn bitand(self, rhs: Allowance) -> Allowance {
        let mut terms = match self.term {
            Term::And(terms) => terms,
            other => vec![other],
        };
        match rhs.term {
            Term::And(more) => terms.extend(more),
            other => terms.push(other),
        }
        Allowance {
            term: Term::And(terms),
            message: self.message.or(rhs.message),
        }
    }
}

/// Excuse every `Missing` difference.
pub fn allowed_missing() -> Allowance {
    Allowance::from_term(Term::Filter(Filter::Missing))
}

/// Excuse every `Extra` difference.
pub fn allowed_extra() -> Allowance {
    Allowance::from_term(Term::Filter(Filter::Extra))
}

/// Excuse every `Invalid` difference.
pub fn allowed_invalid() -> Allowance {
    Allowance::from_term(Term::Filter(Filter::Invalid))
}

/// Excuse deviations within plus-or-minus `tolerance`.
///
/// Panics if `tolerance` is negative.
pub fn allowed_deviation(tolerance: f64) -> Allowance {
    if tolerance < 0.0 {
        panic!("tolerance should not be negative, got {}", tolerance);
    }
    allowed_deviation_range(-tolerance, tolerance)
}

/// Excuse deviations within `lower..=upper`.
///
/// Panics if `lower` is greater than `upper`.
pub fn allowed_deviation_range(lower: f64, upper: f64) -> Allowance {
    if lower > upper {
        panic!("lower bound {} exceeds upper bound {}", lower, upper);
    }
    Allowance::from_term(Term::Filter(Filter::Deviation { lower, upper }))
}

/// Excuse deviations within plus-or-minus `tolerance` percent of the
/// expected value (as a fraction, so `0.02` allows two percent).
///
/// Panics if `tolerance` is negative.
pub fn allowed_percent_deviation(tolerance: f64) -> Allowance {
    if tolerance < 0.0 {
        panic!("tolerance should not be negative, got {}", tolerance);
    }
    allowed_percent_deviation_range(-tolerance, tolerance)
}

/// Excuse percent deviations within `lower..=upper`.
///
/// Panics if `lower` is greater than `upper`.
pub fn allowed_percent_deviation_range(lower: f64, upper: f64) -> Allowance {
    if lower > upper {
        panic!("lower bound {} exceeds upper bound {}", lower, upper);
    }
    Allowance::from_term(Term::Filter(Filter::PercentDeviation { lower, upper }))
}

/// Excuse differences whose group key satisfies the function.
///
/// Panics when applied to unkeyed differences.
pub fn allowed_key<F>(f: F) -> Allowance
where
    F: Fn(&Key) -> bool + Send + Sync + 'static,
{
    Allowance::from_term(Term::Filter(Filter::Key(Arc::new(f))))
}

/// Excuse differences that satisfy the function.
pub fn allowed_where<F>(f: F) -> Allowance
where
    F: Fn(&Difference) -> bool + Send + Sync + 'static,
{
    Allowance::from_term(Term::Filter(Filter::Where(Arc::new(f))))
}

/// Excuse the given differences by identity. Each entry cancels one
/// observed difference; the list applies afresh to every keyed group.
pub fn allowed_specific(differences: impl IntoIterator<Item = Difference>) -> Allowance {
    Allowance::from_term(Term::Specific(Specific::EachGroup(
        differences.into_iter().collect(),
    )))
}

/// Excuse specific differences per key.
///
/// Panics when applied to unkeyed differences.
pub fn allowed_specific_keyed<K>(
    items: impl IntoIterator<Item = (K, Vec<Difference>)>,
) -> Allowance
where
    K: Into<Key>,
{
    Allowance::from_term(Term::Specific(Specific::PerKey(
        items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    )))
}

/// Excuse up to `n` differences per group, all or nothing: a group
/// over the limit keeps every difference.
pub fn allowed_limit(n: usize) -> Allowance {
    Allowance::from_term(Term::Limit(n))
}
