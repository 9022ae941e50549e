use std::collections::BTreeMap;

use crate::core::compare::{ResultMap, ResultSet};
use crate::domain::model::{Key, Record, Value};
use crate::utils::error::{CheckError, Result};

/// Row selection clauses applied before querying a source: equality
/// on a column, or membership in a set of accepted values.
#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Eq(Value),
    OneOf(Vec<Value>),
}

impl Clause {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Clause::Eq(expected) => expected == value,
            Clause::OneOf(accepted) => accepted.contains(value),
        }
    }
}

/// Filter built from column clauses; all clauses must match a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    clauses: BTreeMap<String, Clause>,
}

impl RowFilter {
    pub fn new() -> Self {
        RowFilter::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.insert(column.into(), Clause::Eq(value.into()));
        self
    }

    pub fn one_of<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.clauses.insert(
            column.into(),
            Clause::OneOf(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses
            .iter()
            .all(|(column, clause)| clause.matches(&record.get_or_empty(column)))
    }

    /// Restrict to the columns a sub-source actually has. Clauses on
    /// absent columns must accept empty text (the fill value for those
    /// columns) or the whole sub-source is excluded (`None`).
    pub(crate) fn restrict_to(&self, available: &[String]) -> Option<RowFilter> {
        let empty = Value::Text(String::new());
        let mut clauses = BTreeMap::new();
        for (column, clause) in &self.clauses {
            if available.iter().any(|c| c == column) {
                clauses.insert(column.clone(), clause.clone());
            } else if !clause.matches(&empty) {
                return None;
            }
        }
        Some(RowFilter { clauses })
    }
}

/// A queryable tabular data source.
///
/// Implementors provide `name`, `columns`, and `rows`; the aggregation
/// methods have default implementations that scan rows, which concrete
/// sources may override with something faster.
pub trait DataSource {
    fn name(&self) -> String;

    fn columns(&self) -> Vec<String>;

    fn rows(&self) -> Box<dyn Iterator<Item = Record> + '_>;

    fn filtered_rows<'a>(&'a self, filter: &'a RowFilter) -> Box<dyn Iterator<Item = Record> + 'a> {
        Box::new(self.rows().filter(move |record| filter.matches(record)))
    }

    /// Distinct values of the given columns among matching rows.
    /// Multiple columns yield list values.
    fn distinct(&self, columns: &[&str], filter: &RowFilter) -> Result<ResultSet> {
        self.check_columns(columns)?;
        self.check_filter(filter)?;
        let values = self.filtered_rows(filter).map(|record| {
            if columns.len() == 1 {
                record.get_or_empty(columns[0])
            } else {
                Value::List(columns.iter().map(|c| record.get_or_empty(c)).collect())
            }
        });
        Ok(values.collect())
    }

    /// Sum a column over matching rows. Empty cells count as zero;
    /// non-numeric cells are an error.
    fn sum(&self, column: &str, filter: &RowFilter) -> Result<Value> {
        self.check_columns(&[column])?;
        self.check_filter(filter)?;
        let mut total = 0.0;
        for record in self.filtered_rows(filter) {
            total += cell_number(&record.get_or_empty(column), column, &self.name())?;
        }
        Ok(normalize_number(total))
    }

    /// Sum a column per group of key columns.
    fn sum_by(&self, column: &str, keys: &[&str], filter: &RowFilter) -> Result<ResultMap> {
        self.check_columns(&[column])?;
        self.check_columns(keys)?;
        self.check_filter(filter)?;
        let mut totals: BTreeMap<Key, f64> = BTreeMap::new();
        for record in self.filtered_rows(filter) {
            let amount = cell_number(&record.get_or_empty(column), column, &self.name())?;
            *totals.entry(record_key(&record, keys)).or_insert(0.0) += amount;
        }
        Ok(ResultMap::new(
            keys.iter().copied(),
            totals.into_iter().map(|(k, v)| (k, normalize_number(v))),
        ))
    }

    /// Number of matching rows.
    fn count(&self, filter: &RowFilter) -> Result<u64> {
        self.check_filter(filter)?;
        Ok(self.filtered_rows(filter).count() as u64)
    }

    /// Number of matching rows per group of key columns.
    fn count_by(&self, keys: &[&str], filter: &RowFilter) -> Result<ResultMap> {
        self.check_columns(keys)?;
        self.check_filter(filter)?;
        let mut counts: BTreeMap<Key, i64> = BTreeMap::new();
        for record in self.filtered_rows(filter) {
            *counts.entry(record_key(&record, keys)).or_insert(0) += 1;
        }
        Ok(ResultMap::new(
            keys.iter().copied(),
            counts.into_iter().map(|(k, n)| (k, Value::Int(n))),
        ))
    }

    /// Fold a column's values over matching rows.
    fn reduce<T, F>(&self, column: &str, filter: &RowFilter, init: T, f: F) -> Result<T>
    where
        Self: Sized,
        F: Fn(T, &Value) -> T,
    {
        self.check_columns(&[column])?;
        self.check_filter(filter)?;
        let mut acc = init;
        for record in self.filtered_rows(filter) {
            acc = f(acc, &record.get_or_empty(column));
        }
        Ok(acc)
    }

    /// Fold a column's values per group of key columns.
    fn reduce_by<T, F>(
        &self,
        column: &str,
        keys: &[&str],
        filter: &RowFilter,
        init: T,
        f: F,
    ) -> Result<BTreeMap<Key, T>>
    where
        Self: Sized,
        T: Clone,
        F: Fn(T, &Value) -> T,
    {
        self.check_columns(&[column])?;
        self.check_columns(keys)?;
        self.check_filter(filter)?;
        let mut groups: BTreeMap<Key, T> = BTreeMap::new();
        for record in self.filtered_rows(filter) {
            let entry = groups
                .entry(record_key(&record, keys))
                .or_insert_with(|| init.clone());
            let current = std::mem::replace(entry, init.clone());
            *entry = f(current, &record.get_or_empty(column));
        }
        Ok(groups)
    }

    fn check_columns(&self, requested: &[&str]) -> Result<()> {
        let available = self.columns();
        for column in requested {
            if !available.iter().any(|c| c == column) {
                return Err(CheckError::unknown_column(*column, self.name()));
            }
        }
        Ok(())
    }

    fn check_filter(&self, filter: &RowFilter) -> Result<()> {
        let available = self.columns();
        for column in filter.columns() {
            if !available.iter().any(|c| c == column) {
                return Err(CheckError::unknown_column(column, self.name()));
            }
        }
        Ok(())
    }
}

fn record_key(record: &Record, keys: &[&str]) -> Key {
    Key::new(keys.iter().map(|k| record.get_or_empty(k)))
}

fn cell_number(value: &Value, column: &str, source: &str) -> Result<f64> {
    if value.is_empty_like() {
        return Ok(0.0);
    }
    value.as_number().ok_or_else(|| {
        CheckError::source_error(format!(
            "non-numeric value {} in column {:?} of {}",
            value, column, source
        ))
    })
}

/// Collapse whole-number totals back to integers so sums over integer
/// columns display without a trailing fraction.
fn normalize_number(total: f64) -> Value {
    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        Value::Int(total as i64)
    } else {
        Value::Float(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let record = Record::from_pairs([("town", "aaa"), ("state", "x")]);
        assert!(RowFilter::new().eq("town", "aaa").matches(&record));
        assert!(!RowFilter::new().eq("town", "bbb").matches(&record));
        assert!(RowFilter::new()
            .one_of("town", ["aaa", "bbb"])
            .matches(&record));
    }

    #[test]
    fn test_filter_missing_column_reads_empty() {
        let record = Record::from_pairs([("town", "aaa")]);
        assert!(RowFilter::new().eq("state", "").matches(&record));
        assert!(!RowFilter::new().eq("state", "x").matches(&record));
    }

    #[test]
    fn test_restrict_to() {
        let filter = RowFilter::new().eq("town", "aaa").eq("state", "x");
        let available = vec!["town".to_string()];

        // Clause on the absent column rejects non-empty, so the whole
        // sub-source is excluded.
        assert_eq!(filter.restrict_to(&available), None);

        let filter = RowFilter::new().eq("town", "aaa").eq("state", "");
        let restricted = filter.restrict_to(&available).unwrap();
        assert_eq!(restricted, RowFilter::new().eq("town", "aaa"));
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number(5.0), Value::Int(5));
        assert_eq!(normalize_number(5.5), Value::Float(5.5));
    }
}
