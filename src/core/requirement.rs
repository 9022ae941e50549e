use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::core::compare::ResultSet;
use crate::core::predicate::Predicate;
use crate::domain::diff::Difference;
use crate::domain::model::{Key, Value};

/// The outcome of checking one group of elements.
#[derive(Debug, Clone)]
pub struct Checked {
    pub differences: Vec<Difference>,
    pub description: String,
}

impl Checked {
    pub fn passed(&self) -> bool {
        self.differences.is_empty()
    }
}

/// A reusable check applied to a group of elements.
pub trait Requirement: Send + Sync {
    fn check_group(&self, group: &[Value]) -> Checked;
}

/// A reference object that validation compares data against. Built by
/// conversion from plain values, predicates, sets, sequences, mappings,
/// or a custom [`Requirement`].
#[derive(Clone)]
pub enum Expected {
    Predicate(Predicate),
    Set(Vec<Value>),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<Key, Expected>),
    Custom(Arc<dyn Requirement>),
}

impl Expected {
    pub fn set<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Expected::Set(values.into_iter().map(Into::into).collect())
    }

    pub fn sequence<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Expected::Sequence(values.into_iter().map(Into::into).collect())
    }

    pub fn mapping<K, E>(items: impl IntoIterator<Item = (K, E)>) -> Self
    where
        K: Into<Key>,
        E: Into<Expected>,
    {
        Expected::Mapping(
            items
                .into_iter()
                .map(|(k, e)| (k.into(), e.into()))
                .collect(),
        )
    }

    pub fn custom(requirement: impl Requirement + 'static) -> Self {
        Expected::Custom(Arc::new(requirement))
    }

    /// Check a group of elements. `show_expected` controls whether a
    /// predicate failure reports the expected value (used when the
    /// data under test is a single element).
    pub fn check_group(&self, group: &[Value], show_expected: bool) -> Checked {
        match self {
            Expected::Predicate(pred) => check_predicate(pred, group, show_expected),
            Expected::Set(values) => check_set(values, group),
            Expected::Sequence(sequence) => check_order(sequence, group),
            Expected::Custom(req) => req.check_group(group),
            // Mapping requirements are matched key-by-key in validate().
            Expected::Mapping(_) => Checked {
                differences: group.iter().map(|v| Difference::invalid(v.clone())).collect(),
                description: "does not satisfy mapping requirements".to_string(),
            },
        }
    }
}

impl fmt::Debug for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Predicate(p) => f.debug_tuple("Predicate").field(p).finish(),
            Expected::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Expected::Sequence(v) => f.debug_tuple("Sequence").field(v).finish(),
            Expected::Mapping(m) => f.debug_tuple("Mapping").field(m).finish(),
            Expected::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl From<Predicate> for Expected {
    fn from(p: Predicate) -> Self {
        Expected::Predicate(p)
    }
}

impl From<Value> for Expected {
    fn from(v: Value) -> Self {
        Expected::Predicate(Predicate::Equals(v))
    }
}

impl From<&str> for Expected {
    fn from(v: &str) -> Self {
        Expected::Predicate(Predicate::from(v))
    }
}

impl From<i64> for Expected {
    fn from(v: i64) -> Self {
        Expected::Predicate(Predicate::from(v))
    }
}

impl From<f64> for Expected {
    fn from(v: f64) -> Self {
        Expected::Predicate(Predicate::from(v))
    }
}

impl From<regex::Regex> for Expected {
    fn from(re: regex::Regex) -> Self {
        Expected::Predicate(Predicate::Regex(re))
    }
}

impl From<ResultSet> for Expected {
    fn from(result: ResultSet) -> Self {
        Expected::Set(result.into_iter().collect())
    }
}

impl From<BTreeSet<Value>> for Expected {
    fn from(set: BTreeSet<Value>) -> Self {
        Expected::Set(set.into_iter().collect())
    }
}

impl From<Vec<Value>> for Expected {
    fn from(values: Vec<Value>) -> Self {
        Expected::Sequence(values)
    }
}

fn check_predicate(pred: &Predicate, group: &[Value], show_expected: bool) -> Checked {
    let expected = pred.expected_value();
    let differences = group
        .iter()
        .filter(|element| !pred.matches(element))
        .map(|element| match &expected {
            Some(expected) => Difference::from_mismatch(element, expected, show_expected),
            None => Difference::invalid(element.clone()),
        })
        .collect();
    Checked {
        differences,
        description: pred.description(),
    }
}

fn check_set(required: &[Value], group: &[Value]) -> Checked {
    let required_set: HashSet<&Value> = required.iter().collect();
    let mut matched: HashSet<&Value> = HashSet::new();
    let mut extras: Vec<Difference> = Vec::new();
    let mut extras_seen: HashSet<Value> = HashSet::new();

    for element in group {
        if required_set.contains(element) {
            matched.insert(element);
        } else if extras_seen.insert(element.clone()) {
            // Deduplicate extras so repeats report once.
            extras.push(Difference::Extra(element.clone()));
        }
    }

    let mut differences: Vec<Difference> = required
        .iter()
        .filter(|v| !matched.contains(*v))
        .map(|v| Difference::Missing(v.clone()))
        .collect();
    differences.extend(extras);

    Checked {
        differences,
        description: "does not satisfy set membership".to_string(),
    }
}

/// Opcode-style sequence comparison: required values absent at a data
/// index become `Missing((index, value))`, unexpected data values
/// become `Extra((index, value))`.
fn check_order(required: &[Value], group: &[Value]) -> Checked {
    let mut differences = Vec::new();
    for opcode in diff_opcodes(group, required) {
        match opcode {
            Opcode::Insert { istart, jstart, jstop } => {
                for value in &required[jstart..jstop] {
                    differences.push(Difference::Missing(indexed(istart, value)));
                }
            }
            Opcode::Delete { istart, istop } => {
                for (offset, value) in group[istart..istop].iter().enumerate() {
                    differences.push(Difference::Extra(indexed(istart + offset, value)));
                }
            }
            Opcode::Replace {
                istart,
                istop,
                jstart,
                jstop,
            } => {
                let ivalues = &group[istart..istop];
                let jvalues = &required[jstart..jstop];
                let paired = ivalues.len().min(jvalues.len());
                for offset in 0..paired {
                    differences.push(Difference::Missing(indexed(istart + offset, &jvalues[offset])));
                    differences.push(Difference::Extra(indexed(istart + offset, &ivalues[offset])));
                }
                for value in &jvalues[paired..] {
                    differences.push(Difference::Missing(indexed(istop, value)));
                }
                for (offset, value) in ivalues[paired..].iter().enumerate() {
                    differences.push(Difference::Extra(indexed(istart + paired + offset, value)));
                }
            }
        }
    }
    Checked {
        differences,
        description: "does not match required sequence".to_string(),
    }
}

fn indexed(index: usize, value: &Value) -> Value {
    Value::List(vec![Value::Int(index as i64), value.clone()])
}

enum Opcode {
    Insert {
        istart: usize,
        jstart: usize,
        jstop: usize,
    },
    Delete {
        istart: usize,
        istop: usize,
    },
    Replace {
        istart: usize,
        istop: usize,
        jstart: usize,
        jstop: usize,
    },
}

/// Longest-common-subsequence opcodes for two value sequences.
fn diff_opcodes(a: &[Value], b: &[Value]) -> Vec<Opcode> {
    // LCS length table; a and b are small reference sequences.
    let (n, m) = (a.len(), b.len());
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut opcodes = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut pending: Option<(usize, usize)> = None; // (istart, jstart) of a mismatched run.

    let mut flush = |pending: &mut Option<(usize, usize)>, i: usize, j: usize| {
        if let Some((istart, jstart)) = pending.take() {
            if istart == i {
                opcodes.push(Opcode::Insert {
                    istart,
                    jstart,
                    jstop: j,
                });
            } else if jstart == j {
                opcodes.push(Opcode::Delete { istart, istop: i });
            } else {
                opcodes.push(Opcode::Replace {
                    istart,
                    istop: i,
                    jstart,
                    jstop: j,
                });
            }
        }
    };

    while i < n && j < m {
        if a[i] == b[j] {
            flush(&mut pending, i, j);
            i += 1;
            j += 1;
        } else {
            if pending.is_none() {
                pending = Some((i, j));
            }
            if table[i + 1][j] >= table[i][j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
    }
    if i < n || j < m {
        if pending.is_none() {
            pending = Some((i, j));
        }
        i = n;
        j = m;
    }
    flush(&mut pending, i, j);
    opcodes
}

/// Requires that elements within a group appear only once.
pub struct RequiredUnique;

impl Requirement for RequiredUnique {
    fn check_group(&self, group: &[Value]) -> Checked {
        let mut seen = HashSet::new();
        let differences = group
            .iter()
            .filter(|element| !seen.insert((*element).clone()))
            .map(|element| Difference::Extra(element.clone()))
            .collect();
        Checked {
            differences,
            description: "elements should be unique".to_string(),
        }
    }
}

/// Requires that data contains every element of the given subset.
pub struct RequiredSubset {
    subset: BTreeSet<Value>,
}

impl RequiredSubset {
    pub fn new<V: Into<Value>>(subset: impl IntoIterator<Item = V>) -> Self {
        RequiredSubset {
            subset: subset.into_iter().map(Into::into).collect(),
        }
    }
}

impl Requirement for RequiredSubset {
    fn check_group(&self, group: &[Value]) -> Checked {
        let mut missing = self.subset.clone();
        for element in group {
            if missing.is_empty() {
                break;
            }
            missing.remove(element);
        }
        Checked {
            differences: missing.into_iter().map(Difference::Missing).collect(),
            description: "must contain all elements of given subset".to_string(),
        }
    }
}

/// Requires that data contains only elements of the given superset.
pub struct RequiredSuperset {
    superset: BTreeSet<Value>,
}

impl RequiredSuperset {
    pub fn new<V: Into<Value>>(superset: impl IntoIterator<Item = V>) -> Self {
        RequiredSuperset {
            superset: superset.into_iter().map(Into::into).collect(),
        }
    }
}

impl Requirement for RequiredSuperset {
    fn check_group(&self, group: &[Value]) -> Checked {
        let extras: BTreeSet<Value> = group
            .iter()
            .filter(|element| !self.superset.contains(*element))
            .cloned()
            .collect();
        Checked {
            differences: extras.into_iter().map(Difference::Extra).collect(),
            description: "may contain only elements of given superset".to_string(),
        }
    }
}

/// Requires numeric values approximately equal to a target, either
/// within a number of decimal places (default 7) or an absolute delta.
pub struct RequiredApprox {
    target: f64,
    places: Option<u32>,
    delta: Option<f64>,
}

impl RequiredApprox {
    pub fn new(target: f64) -> Self {
        Self::places(target, 7)
    }

    pub fn places(target: f64, places: u32) -> Self {
        RequiredApprox {
            target,
            places: Some(places),
            delta: None,
        }
    }

    pub fn delta(target: f64, delta: f64) -> Self {
        RequiredApprox {
            target,
            places: None,
            delta: Some(delta),
        }
    }

    fn is_close(&self, value: f64) -> bool {
        let gap = (value - self.target).abs();
        match (self.places, self.delta) {
            (_, Some(delta)) => gap <= delta,
            (Some(places), None) => {
                let scale = 10f64.powi(places as i32);
                (gap * scale).round() == 0.0
            }
            (None, None) => unreachable!("constructors always set places or delta"),
        }
    }
}

impl Requirement for RequiredApprox {
    fn check_group(&self, group: &[Value]) -> Checked {
        let differences = group
            .iter()
            .filter_map(|element| match element.as_number() {
                Some(n) if self.is_close(n) => None,
                Some(n) => Some(Difference::deviation(n - self.target, self.target)),
                None => Some(Difference::invalid(element.clone())),
            })
            .collect();
        let description = match self.delta {
            Some(delta) => format!("not equal within delta of {}", delta),
            None => format!(
                "not equal within {} decimal places",
                self.places.unwrap_or(7)
            ),
        };
        Checked {
            differences,
            description,
        }
    }
}

/// Requires that values fall inside Tukey-style outlier fences built
/// from a reference sample (interquartile range times a multiplier,
/// 2.2 by default).
pub struct RequiredOutliers {
    lower: f64,
    upper: f64,
}

impl RequiredOutliers {
    pub fn new(sample: &[f64]) -> Self {
        Self::with_multiplier(sample, 2.2, true)
    }

    pub fn with_multiplier(sample: &[f64], multiplier: f64, rounding: bool) -> Self {
        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);

        if sorted.len() < 2 {
            let only = sorted.first().copied().unwrap_or(0.0);
            return RequiredOutliers {
                lower: only,
                upper: only,
            };
        }

        let midpoint = ((sorted.len() as f64) / 2.0).round() as usize;
        let q1 = median(&sorted[..midpoint]);
        let q3 = median(&sorted[midpoint..]);
        let iqr = q3 - q1;
        let reach = iqr * multiplier;
        let mut lower = q1 - reach;
        let mut upper = q3 + reach;

        if iqr > 0.0 && rounding {
            // Snap fences to a power-of-two quantile of the IQR for
            // concise float representations.
            let reciprocal = 100.0 / iqr;
            // At least one bit: a wide IQR (one percent >= 1) still
            // snaps to halves, not whole numbers.
            let bits = (64 - ((reciprocal - 1.0) as u64).leading_zeros()).max(1);
            let quantile = 1.0 / (1u64 << bits) as f64;
            lower = (lower / quantile).round() * quantile;
            upper = (upper / quantile).round() * quantile;
        }

        RequiredOutliers { lower, upper }
    }

    pub fn fences(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

impl Requirement for RequiredOutliers {
    fn check_group(&self, group: &[Value]) -> Checked {
        let differences = group
            .iter()
            .filter_map(|element| match element.as_number() {
                Some(n) if n < self.lower => {
                    Some(Difference::deviation(n - self.lower, self.lower))
                }
                Some(n) if n > self.upper => {
                    Some(Difference::deviation(n - self.upper, self.upper))
                }
                Some(_) => None,
                None => Some(Difference::invalid(element.clone())),
            })
            .collect();
        Checked {
            differences,
            description: "contains outliers".to_string(),
        }
    }
}

/// Requires that strings match a target with a similarity ratio at or
/// above a cutoff (0.6 by default).
pub struct RequiredFuzzy {
    target: String,
    cutoff: f64,
}

impl RequiredFuzzy {
    pub fn new(target: impl Into<String>) -> Self {
        Self::with_cutoff(target, 0.6)
    }

    pub fn with_cutoff(target: impl Into<String>, cutoff: f64) -> Self {
        RequiredFuzzy {
            target: target.into(),
            cutoff,
        }
    }
}

/// Similarity of two strings as `2*M / T`, where `M` is the length of
/// their longest common subsequence and `T` the total length.
pub(crate) fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let matches = prev[b.len()];
    (2 * matches) as f64 / total as f64
}

impl Requirement for RequiredFuzzy {
    fn check_group(&self, group: &[Value]) -> Checked {
        let differences = group
            .iter()
            .filter(|element| match element.as_text() {
                Some(s) => similarity_ratio(s, &self.target) < self.cutoff,
                None => true,
            })
            .map(|element| Difference::invalid(element.clone()))
            .collect();
        Checked {
            differences,
            description: format!(
                "does not satisfy '{}', fuzzy matching at ratio {} or greater",
                self.target, self.cutoff
            ),
        }
    }
}
