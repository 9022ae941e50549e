use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::core::compare::{ResultMap, ResultSet};
use crate::core::requirement::Expected;
use crate::domain::diff::{Difference, Differences};
use crate::domain::model::{Key, Value};

/// Data under test: a single element, a group of elements, or groups
/// keyed by the data's keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Element(Value),
    Group(Vec<Value>),
    Mapping(BTreeMap<Key, Subject>),
}

impl Subject {
    pub fn mapping<K, S>(items: impl IntoIterator<Item = (K, S)>) -> Self
    where
        K: Into<Key>,
        S: Into<Subject>,
    {
        Subject::Mapping(
            items
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
        )
    }

    fn as_group(&self) -> Vec<Value> {
        match self {
            Subject::Element(v) => vec![v.clone()],
            Subject::Group(vs) => vs.clone(),
            // Mapping entries never nest further.
            Subject::Mapping(_) => Vec::new(),
        }
    }

    fn is_element(&self) -> bool {
        matches!(self, Subject::Element(_))
    }
}

impl From<Value> for Subject {
    fn from(v: Value) -> Self {
        Subject::Element(v)
    }
}

impl From<&str> for Subject {
    fn from(v: &str) -> Self {
        Subject::Element(Value::from(v))
    }
}

impl From<i64> for Subject {
    fn from(v: i64) -> Self {
        Subject::Element(Value::Int(v))
    }
}

impl From<f64> for Subject {
    fn from(v: f64) -> Self {
        Subject::Element(Value::Float(v))
    }
}

impl From<Vec<Value>> for Subject {
    fn from(vs: Vec<Value>) -> Self {
        Subject::Group(vs)
    }
}

impl From<ResultSet> for Subject {
    fn from(result: ResultSet) -> Self {
        Subject::Group(result.into_iter().collect())
    }
}

impl From<ResultMap> for Subject {
    fn from(result: ResultMap) -> Self {
        Subject::Mapping(
            result
                .into_inner()
                .into_iter()
                .map(|(k, v)| match v {
                    Value::List(items) => (k, Subject::Group(items)),
                    other => (k, Subject::Element(other)),
                })
                .collect(),
        )
    }
}

impl From<BTreeMap<Key, Value>> for Subject {
    fn from(map: BTreeMap<Key, Value>) -> Self {
        Subject::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, Subject::Element(v)))
                .collect(),
        )
    }
}

impl From<BTreeMap<Key, Vec<Value>>> for Subject {
    fn from(map: BTreeMap<Key, Vec<Value>>) -> Self {
        Subject::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, Subject::Group(v)))
                .collect(),
        )
    }
}

/// Validation failure carrying the observed differences.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    message: String,
    differences: Differences,
}

const MAX_DISPLAYED: usize = 10;

impl ValidationError {
    pub fn new(message: impl Into<String>, differences: impl Into<Differences>) -> Self {
        ValidationError {
            message: message.into(),
            differences: differences.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn differences(&self) -> &Differences {
        &self.differences
    }

    pub fn into_differences(self) -> Differences {
        self.differences
    }

    /// Replace the default description with a caller-supplied message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub(crate) fn from_parts(message: String, differences: Differences) -> Option<Self> {
        let differences = differences.prune();
        if differences.is_empty() {
            None
        } else {
            Some(ValidationError {
                message,
                differences,
            })
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.differences.len();
        writeln!(f, "{} ({} difference{}): [", self.message, total, plural(total))?;
        for (shown, (key, diff)) in self.differences.iter_items().enumerate() {
            if shown == MAX_DISPLAYED {
                writeln!(f, "    ...")?;
                break;
            }
            match key {
                Some(key) => writeln!(f, "    {}: {},", key, diff)?,
                None => writeln!(f, "    {},", diff)?,
            }
        }
        write!(f, "]")
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

impl std::error::Error for ValidationError {}

/// Check data against a reference requirement.
///
/// The requirement is auto-detected from the reference: mappings are
/// matched key-by-key, sets check membership, sequences check order,
/// and everything else becomes an element predicate. Returns the
/// observed differences as a [`ValidationError`] when the check fails.
pub fn validate(
    data: impl Into<Subject>,
    expected: impl Into<Expected>,
) -> Result<(), ValidationError> {
    let data = data.into();
    let expected = expected.into();
    let outcome = match &expected {
        Expected::Mapping(required) => check_mapping(&data, required),
        _ => check_flat(&data, &expected),
    };
    if let Some(err) = &outcome {
        debug!(differences = err.differences().len(), "validation failed");
    }
    match outcome {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn check_flat(data: &Subject, expected: &Expected) -> Option<ValidationError> {
    match data {
        Subject::Element(value) => {
            let checked = expected.check_group(std::slice::from_ref(value), true);
            ValidationError::from_parts(checked.description, checked.differences.into())
        }
        Subject::Group(values) => {
            let checked = expected.check_group(values, false);
            ValidationError::from_parts(checked.description, checked.differences.into())
        }
        Subject::Mapping(groups) => {
            // One requirement applied to every keyed group.
            let mut keyed = BTreeMap::new();
            let mut descriptions = BTreeSet::new();
            for (key, entry) in groups {
                let checked = expected.check_group(&entry.as_group(), entry.is_element());
                if !checked.differences.is_empty() {
                    descriptions.insert(checked.description);
                    keyed.insert(key.clone(), checked.differences);
                }
            }
            ValidationError::from_parts(collapse(descriptions), keyed.into())
        }
    }
}

fn check_mapping(data: &Subject, required: &BTreeMap<Key, Expected>) -> Option<ValidationError> {
    let empty = BTreeMap::new();
    let groups = match data {
        Subject::Mapping(groups) => groups,
        // Non-mapping data has no keys, so every required key is absent.
        _ => &empty,
    };

    let mut keyed: BTreeMap<Key, Vec<Difference>> = BTreeMap::new();
    let mut descriptions = BTreeSet::new();

    for (key, expected) in required {
        match groups.get(key) {
            Some(entry) => {
                let checked = expected.check_group(&entry.as_group(), entry.is_element());
                if !checked.differences.is_empty() {
                    descriptions.insert(checked.description);
                    keyed.insert(key.clone(), checked.differences);
                }
            }
            None => {
                let differences = absent_key_differences(expected);
                if !differences.is_empty() {
                    descriptions.insert("required key is missing".to_string());
                    keyed.insert(key.clone(), differences);
                }
            }
        }
    }

    // Data keys the requirement does not mention are unexpected.
    for (key, entry) in groups {
        if !required.contains_key(key) {
            let extras: Vec<Difference> = entry
                .as_group()
                .into_iter()
                .map(Difference::Extra)
                .collect();
            if !extras.is_empty() {
                descriptions.insert("unexpected key in data".to_string());
                keyed.insert(key.clone(), extras);
            }
        }
    }

    ValidationError::from_parts(collapse(descriptions), keyed.into())
}

/// Differences for a required key with no data: numbers deviate from
/// zero, other expected values report as missing.
fn absent_key_differences(expected: &Expected) -> Vec<Difference> {
    match expected {
        Expected::Predicate(pred) => match pred.expected_value() {
            Some(value) => vec![Difference::from_absent(&value)],
            None => vec![Difference::invalid(Value::Null)],
        },
        Expected::Set(values) | Expected::Sequence(values) => {
            values.iter().map(Difference::from_absent).collect()
        }
        Expected::Custom(req) => req.check_group(&[]).differences,
        Expected::Mapping(_) => Vec::new(),
    }
}

fn collapse(descriptions: BTreeSet<String>) -> String {
    let mut iter = descriptions.into_iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => only,
        _ => "does not satisfy mapping requirements".to_string(),
    }
}

/// Panic with a formatted difference report when validation fails.
#[macro_export]
macro_rules! assert_valid {
    ($data:expr, $expected:expr $(,)?) => {
        if let Err(err) = $crate::core::validate::validate($data, $expected) {
            panic!("{}", err);
        }
    };
    ($data:expr, $expected:expr, $message:expr $(,)?) => {
        if let Err(err) = $crate::core::validate::validate($data, $expected) {
            panic!("{}", err.with_message($message));
        }
    };
}
