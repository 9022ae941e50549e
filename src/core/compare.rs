use std::collections::{BTreeMap, BTreeSet};

use crate::core::predicate::Predicate;
use crate::domain::diff::Difference;
use crate::domain::model::{Key, Value};

/// Set relation to check with [`ResultSet::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    Subset,
    ProperSubset,
    Superset,
    ProperSuperset,
}

/// Distinct values returned by a data source query.
///
/// Stored in sorted order so comparisons produce deterministic
/// difference lists. Single-item list values are unwrapped on
/// construction, matching how single-column query tuples collapse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    values: BTreeSet<Value>,
}

impl ResultSet {
    pub fn new<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let values = values
            .into_iter()
            .map(Into::into)
            .map(|v| match v {
                Value::List(mut items) if items.len() == 1 => items.remove(0),
                other => other,
            })
            .collect();
        ResultSet { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// True if every member satisfies the predicate.
    pub fn all<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Value) -> bool,
    {
        self.values.iter().all(predicate)
    }

    /// Compare against a reference set. Values in `self` but not the
    /// reference become `Extra`; reference values absent from `self`
    /// become `Missing`. A proper-subset/superset check against an
    /// equal set yields the corresponding marker difference.
    pub fn compare(&self, other: &ResultSet, op: CompareOp) -> Vec<Difference> {
        let surplus: Vec<&Value> = self.values.difference(&other.values).collect();
        let absent: Vec<&Value> = other.values.difference(&self.values).collect();

        let mut differences = Vec::new();
        match op {
            CompareOp::Equal => {
                differences.extend(surplus.iter().map(|v| Difference::Extra((*v).clone())));
                differences.extend(absent.iter().map(|v| Difference::Missing((*v).clone())));
            }
            CompareOp::Subset => {
                differences.extend(surplus.iter().map(|v| Difference::Extra((*v).clone())));
            }
            CompareOp::ProperSubset => {
                if surplus.is_empty() && absent.is_empty() {
                    differences.push(Difference::NotProperSubset);
                } else {
                    differences.extend(surplus.iter().map(|v| Difference::Extra((*v).clone())));
                }
            }
            CompareOp::Superset => {
                differences.extend(absent.iter().map(|v| Difference::Missing((*v).clone())));
            }
            CompareOp::ProperSuperset => {
                if surplus.is_empty() && absent.is_empty() {
                    differences.push(Difference::NotProperSuperset);
                } else {
                    differences.extend(absent.iter().map(|v| Difference::Missing((*v).clone())));
                }
            }
        }
        differences
    }

    /// Check every member against a predicate, collecting `Invalid`
    /// differences for values that fail.
    pub fn compare_with(&self, predicate: &Predicate) -> Vec<Difference> {
        self.values
            .iter()
            .filter(|v| !predicate.matches(v))
            .map(|v| Difference::invalid(v.clone()))
            .collect()
    }
}

impl<V: Into<Value>> FromIterator<V> for ResultSet {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        ResultSet::new(iter)
    }
}

impl IntoIterator for ResultSet {
    type Item = Value;
    type IntoIter = std::collections::btree_set::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Grouped query result: one value per key, with the column names the
/// keys were built from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultMap {
    key_names: Vec<String>,
    values: BTreeMap<Key, Value>,
}

impl ResultMap {
    pub fn new<K, V>(
        key_names: impl IntoIterator<Item = impl Into<String>>,
        items: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        ResultMap {
            key_names: key_names.into_iter().map(Into::into).collect(),
            values: items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.values.iter()
    }

    pub fn into_inner(self) -> BTreeMap<Key, Value> {
        self.values
    }

    /// True if every value satisfies the predicate.
    pub fn all<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Value) -> bool,
    {
        self.values.values().all(predicate)
    }

    /// Compare against a reference mapping over the union of keys.
    ///
    /// When either side of a pair is numeric the other side defaults
    /// to zero if absent or empty, and a nonzero difference becomes a
    /// `Deviation`. Non-numeric mismatches become `Invalid`.
    pub fn compare(&self, other: &ResultMap) -> BTreeMap<Key, Vec<Difference>> {
        let keys: BTreeSet<&Key> = self.values.keys().chain(other.values.keys()).collect();

        let mut differences = BTreeMap::new();
        for key in keys {
            let self_val = self.values.get(key);
            let other_val = other.values.get(key);

            let self_num = self_val.and_then(numeric_or_empty);
            let other_num = other_val.and_then(numeric_or_empty);

            let one_num = matches!(self_num, Some(Some(_))) || matches!(other_num, Some(Some(_)));
            let num_or_none = (self_val.is_none() || self_num.is_some())
                && (other_val.is_none() || other_num.is_some());

            if one_num && num_or_none {
                let a = self_num.flatten().unwrap_or(0.0);
                let b = other_num.flatten().unwrap_or(0.0);
                if a != b {
                    let expected = other_val.cloned().unwrap_or(Value::Null);
                    differences.insert(
                        key.clone(),
                        vec![Difference::deviation(a - b, expected)],
                    );
                }
            } else if self_val != other_val {
                let actual = self_val.cloned().unwrap_or(Value::Null);
                let expected = other_val.cloned().unwrap_or(Value::Null);
                differences.insert(
                    key.clone(),
                    vec![Difference::invalid_expected(actual, expected)],
                );
            }
        }
        differences
    }
}

/// `Some(Some(n))` for numbers, `Some(None)` for empty-like values
/// (which aggregate as zero), `None` for anything else.
fn numeric_or_empty(v: &Value) -> Option<Option<f64>> {
    if v.is_empty_like() {
        Some(None)
    } else {
        match v {
            Value::Int(_) | Value::Float(_) => Some(v.as_number()),
            _ => None,
        }
    }
}
