use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::model::{Key, Value};

/// One observed difference between data under test and its reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difference {
    /// A required value that the data does not contain.
    Missing(Value),
    /// A value in the data that the reference does not contain.
    Extra(Value),
    /// A value that fails a requirement outright.
    Invalid {
        actual: Value,
        expected: Option<Value>,
    },
    /// A numeric difference from an expected quantity.
    Deviation { deviation: Value, expected: Value },
    /// The data was expected to be a proper subset but equals the reference.
    NotProperSubset,
    /// The data was expected to be a proper superset but equals the reference.
    NotProperSuperset,
}

impl Difference {
    pub fn missing(value: impl Into<Value>) -> Self {
        Difference::Missing(value.into())
    }

    pub fn extra(value: impl Into<Value>) -> Self {
        Difference::Extra(value.into())
    }

    pub fn invalid(actual: impl Into<Value>) -> Self {
        Difference::Invalid {
            actual: actual.into(),
            expected: None,
        }
    }

    pub fn invalid_expected(actual: impl Into<Value>, expected: impl Into<Value>) -> Self {
        Difference::Invalid {
            actual: actual.into(),
            expected: Some(expected.into()),
        }
    }

    pub fn deviation(deviation: impl Into<Value>, expected: impl Into<Value>) -> Self {
        Difference::Deviation {
            deviation: deviation.into(),
            expected: expected.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Difference::Missing(_))
    }

    pub fn is_extra(&self) -> bool {
        matches!(self, Difference::Extra(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Difference::Invalid { .. })
    }

    pub fn is_deviation(&self) -> bool {
        matches!(self, Difference::Deviation { .. })
    }

    /// The deviation and expected amounts as numbers. `Null` and empty
    /// text count as zero; NaN passes through so range checks reject it.
    /// Returns `None` for non-deviation differences and for values that
    /// are neither numeric nor empty-like.
    pub fn deviation_parts(&self) -> Option<(f64, f64)> {
        let (deviation, expected) = match self {
            Difference::Deviation {
                deviation,
                expected,
            } => (deviation, expected),
            _ => return None,
        };
        let coerce = |v: &Value| {
            if v.is_empty_like() {
                Some(0.0)
            } else {
                v.as_number()
            }
        };
        Some((coerce(deviation)?, coerce(expected)?))
    }

    /// Build a difference for an element that failed its requirement.
    /// Numeric pairs become a `Deviation`; everything else `Invalid`.
    pub fn from_mismatch(actual: &Value, expected: &Value, show_expected: bool) -> Self {
        if let (Some(a), Some(e)) = (actual.as_number(), expected.as_number()) {
            if !matches!(actual, Value::Text(_)) && !matches!(expected, Value::Text(_)) {
                return Difference::deviation(a - e, expected.clone());
            }
        }
        if show_expected {
            Difference::invalid_expected(actual.clone(), expected.clone())
        } else {
            Difference::invalid(actual.clone())
        }
    }

    /// Build a difference for a requirement key with no matching data.
    pub fn from_absent(expected: &Value) -> Self {
        match expected.as_number() {
            Some(e) if !matches!(expected, Value::Text(_)) => {
                Difference::deviation(-e, expected.clone())
            }
            _ => Difference::Missing(expected.clone()),
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Missing(v) => write!(f, "Missing({})", v),
            Difference::Extra(v) => write!(f, "Extra({})", v),
            Difference::Invalid {
                actual,
                expected: None,
            } => write!(f, "Invalid({})", actual),
            Difference::Invalid {
                actual,
                expected: Some(expected),
            } => write!(f, "Invalid({}, expected={})", actual, expected),
            Difference::Deviation {
                deviation,
                expected,
            } => {
                match deviation.as_number() {
                    // Keep an explicit sign on the deviation amount.
                    Some(d) if d > 0.0 => write!(f, "Deviation(+{}, {})", d, expected),
                    _ => write!(f, "Deviation({}, {})", deviation, expected),
                }
            }
            Difference::NotProperSubset => write!(f, "NotProperSubset()"),
            Difference::NotProperSuperset => write!(f, "NotProperSuperset()"),
        }
    }
}

/// The differences attached to a validation failure: either a flat
/// list, or groups of differences keyed by the data's keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Differences {
    Unkeyed(Vec<Difference>),
    Keyed(BTreeMap<Key, Vec<Difference>>),
}

impl Differences {
    pub fn len(&self) -> usize {
        match self {
            Differences::Unkeyed(list) => list.len(),
            Differences::Keyed(map) => map.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize into `(key, difference)` items; unkeyed differences
    /// carry no key.
    pub fn iter_items(&self) -> impl Iterator<Item = (Option<&Key>, &Difference)> {
        let unkeyed = match self {
            Differences::Unkeyed(list) => Some(list.iter().map(|d| (None, d))),
            Differences::Keyed(_) => None,
        };
        let keyed = match self {
            Differences::Keyed(map) => Some(
                map.iter()
                    .flat_map(|(k, group)| group.iter().map(move |d| (Some(k), d))),
            ),
            Differences::Unkeyed(_) => None,
        };
        unkeyed.into_iter().flatten().chain(keyed.into_iter().flatten())
    }

    pub fn as_unkeyed(&self) -> Option<&[Difference]> {
        match self {
            Differences::Unkeyed(list) => Some(list),
            Differences::Keyed(_) => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&BTreeMap<Key, Vec<Difference>>> {
        match self {
            Differences::Keyed(map) => Some(map),
            Differences::Unkeyed(_) => None,
        }
    }

    /// Drop empty groups; used after allowances filter keyed differences.
    pub(crate) fn prune(self) -> Self {
        match self {
            Differences::Unkeyed(list) => Differences::Unkeyed(list),
            Differences::Keyed(map) => {
                Differences::Keyed(map.into_iter().filter(|(_, g)| !g.is_empty()).collect())
            }
        }
    }
}

impl From<Vec<Difference>> for Differences {
    fn from(list: Vec<Difference>) -> Self {
        Differences::Unkeyed(list)
    }
}

impl From<BTreeMap<Key, Vec<Difference>>> for Differences {
    fn from(map: BTreeMap<Key, Vec<Difference>>) -> Self {
        Differences::Keyed(map)
    }
}
