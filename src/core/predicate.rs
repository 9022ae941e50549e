use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::domain::model::Value;
use crate::utils::error::Result;

/// A matcher applied to individual elements during validation.
///
/// Predicates are built from plain values, regular expressions, sets
/// of accepted values, functions, or tuples of any of these (matched
/// element-wise against list values). `Wildcard` accepts anything.
#[derive(Clone)]
pub enum Predicate {
    Equals(Value),
    Regex(Regex),
    OneOf(HashSet<Value>),
    Wildcard,
    Func(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
    Tuple(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(value: impl Into<Value>) -> Self {
        Predicate::Equals(value.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Predicate::Regex(Regex::new(pattern)?))
    }

    pub fn one_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Predicate::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate::Func(Arc::new(f))
    }

    pub fn tuple(parts: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Tuple(parts.into_iter().collect())
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Equals(expected) => expected == value,
            Predicate::Regex(re) => match value {
                // Search semantics, not full-match.
                Value::Text(s) => re.is_match(s),
                _ => false,
            },
            Predicate::OneOf(set) => set.contains(value),
            Predicate::Wildcard => true,
            Predicate::Func(f) => f(value),
            Predicate::Tuple(parts) => match value {
                Value::List(items) => {
                    items.len() == parts.len()
                        && parts.iter().zip(items).all(|(p, v)| p.matches(v))
                }
                _ => false,
            },
        }
    }

    /// The expected value for difference reporting, where one exists.
    pub fn expected_value(&self) -> Option<Value> {
        match self {
            Predicate::Equals(v) => Some(v.clone()),
            Predicate::Tuple(parts) => {
                let values: Option<Vec<Value>> =
                    parts.iter().map(|p| p.expected_value()).collect();
                values.map(Value::List)
            }
            _ => None,
        }
    }

    /// Failure description used in validation error messages.
    pub fn description(&self) -> String {
        match self {
            Predicate::Equals(v) => format!("does not satisfy {}", v),
            Predicate::Regex(re) => format!("does not satisfy /{}/", re.as_str()),
            Predicate::OneOf(_) => "does not satisfy set membership".to_string(),
            Predicate::Wildcard => "does not satisfy wildcard".to_string(),
            Predicate::Func(_) => "does not satisfy predicate function".to_string(),
            Predicate::Tuple(_) => "does not satisfy tuple of predicates".to_string(),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Predicate::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Predicate::OneOf(set) => f.debug_tuple("OneOf").field(set).finish(),
            Predicate::Wildcard => write!(f, "Wildcard"),
            Predicate::Func(_) => write!(f, "Func(..)"),
            Predicate::Tuple(parts) => f.debug_tuple("Tuple").field(parts).finish(),
        }
    }
}

impl From<Value> for Predicate {
    fn from(v: Value) -> Self {
        Predicate::Equals(v)
    }
}

impl From<&str> for Predicate {
    fn from(v: &str) -> Self {
        Predicate::Equals(Value::from(v))
    }
}

impl From<i64> for Predicate {
    fn from(v: i64) -> Self {
        Predicate::Equals(Value::Int(v))
    }
}

impl From<f64> for Predicate {
    fn from(v: f64) -> Self {
        Predicate::Equals(Value::Float(v))
    }
}

impl From<Regex> for Predicate {
    fn from(re: Regex) -> Self {
        Predicate::Regex(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals_is_numeric_aware() {
        let pred = Predicate::equals(2);
        assert!(pred.matches(&Value::Int(2)));
        assert!(pred.matches(&Value::Float(2.0)));
        assert!(!pred.matches(&Value::text("2")));
    }

    #[test]
    fn test_regex_searches_text() {
        let pred = Predicate::regex("^[A-Z]+$").unwrap();
        assert!(pred.matches(&Value::text("ABC")));
        assert!(!pred.matches(&Value::text("abc")));
        assert!(!pred.matches(&Value::Int(3)));
    }

    #[test]
    fn test_one_of() {
        let pred = Predicate::one_of(["x", "y"]);
        assert!(pred.matches(&Value::text("x")));
        assert!(!pred.matches(&Value::text("z")));
    }

    #[test]
    fn test_func() {
        let pred = Predicate::func(|v| v.as_number().map(|n| n > 10.0).unwrap_or(false));
        assert!(pred.matches(&Value::Int(11)));
        assert!(!pred.matches(&Value::Int(9)));
    }

    #[test]
    fn test_tuple_matches_lists_elementwise() {
        let pred = Predicate::tuple([
            Predicate::from("foo"),
            Predicate::Wildcard,
            Predicate::func(|v| v.as_number().is_some()),
        ]);
        let row = Value::list([Value::text("foo"), Value::text("anything"), Value::Int(5)]);
        assert!(pred.matches(&row));

        let wrong_len = Value::list([Value::text("foo")]);
        assert!(!pred.matches(&wrong_len));
    }

    #[test]
    fn test_description() {
        assert_eq!(
            Predicate::from("foo").description(),
            "does not satisfy 'foo'"
        );
        assert_eq!(
            Predicate::regex("a+").unwrap().description(),
            "does not satisfy /a+/"
        );
    }
}
