use std::collections::{BTreeSet, HashSet};

use crate::domain::model::{Record, Value};
use crate::domain::ports::DataSource;
use crate::utils::error::{CheckError, Result};

/// In-memory source built from rows of values or from maps.
#[derive(Debug, Clone)]
pub struct RecordsSource {
    name: String,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RecordsSource {
    /// Build from a header and rows. Rows must match the header width
    /// and column names must be unique.
    pub fn from_records<C, V>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
        rows: impl IntoIterator<Item = Vec<V>>,
    ) -> Result<Self>
    where
        C: Into<String>,
        V: Into<Value>,
    {
        let name = name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(CheckError::source_error(format!(
                    "duplicate column {:?} in {}",
                    column, name
                )));
            }
        }

        let mut records = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(CheckError::source_error(format!(
                    "row {} has {} values, expected {} in {}",
                    index,
                    row.len(),
                    columns.len(),
                    name
                )));
            }
            records.push(Record::from_pairs(
                columns.iter().cloned().zip(row.into_iter().map(Into::into)),
            ));
        }

        Ok(RecordsSource {
            name,
            columns,
            records,
        })
    }

    /// Build from records directly; columns are the sorted union of
    /// every record's keys.
    pub fn from_maps(name: impl Into<String>, records: Vec<Record>) -> Self {
        let columns: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();
        RecordsSource {
            name: name.into(),
            columns: columns.into_iter().collect(),
            records,
        }
    }
}

impl DataSource for RecordsSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        Box::new(self.records.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Key;
    use crate::domain::ports::RowFilter;

    fn sample() -> RecordsSource {
        RecordsSource::from_records(
            "sample",
            ["town", "amount"],
            vec![
                vec![Value::text("aaa"), Value::text("10")],
                vec![Value::text("aaa"), Value::text("5")],
                vec![Value::text("bbb"), Value::text("20")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = RecordsSource::from_records(
            "bad",
            ["a", "b"],
            vec![vec![Value::text("only one")]],
        );
        assert!(matches!(result, Err(CheckError::Source { .. })));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result =
            RecordsSource::from_records("bad", ["a", "a"], Vec::<Vec<Value>>::new());
        assert!(matches!(result, Err(CheckError::Source { .. })));
    }

    #[test]
    fn test_distinct_and_count() {
        let source = sample();
        let distinct = source.distinct(&["town"], &RowFilter::new()).unwrap();
        assert_eq!(distinct.len(), 2);
        assert_eq!(source.count(&RowFilter::new()).unwrap(), 3);
        let filtered = RowFilter::new().eq("town", "aaa");
        assert_eq!(source.count(&filtered).unwrap(), 2);
    }

    #[test]
    fn test_sum_parses_text_cells() {
        let source = sample();
        let total = source.sum("amount", &RowFilter::new()).unwrap();
        assert_eq!(total, Value::Int(35));
    }

    #[test]
    fn test_count_by_groups_rows() {
        let source = sample();
        let counts = source.count_by(&["town"], &RowFilter::new()).unwrap();
        assert_eq!(counts.key_names(), ["town"]);
        assert_eq!(counts.get(&Key::from("aaa")), Some(&Value::Int(2)));
        assert_eq!(counts.get(&Key::from("bbb")), Some(&Value::Int(1)));

        let filtered = RowFilter::new().eq("town", "bbb");
        let counts = source.count_by(&["town"], &filtered).unwrap();
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn test_reduce_folds_column_values() {
        let source = sample();
        let longest = source
            .reduce("amount", &RowFilter::new(), 0usize, |acc, v| {
                acc.max(v.as_text().map(str::len).unwrap_or(0))
            })
            .unwrap();
        assert_eq!(longest, 2);
    }

    #[test]
    fn test_reduce_by_accumulates_per_key() {
        let source = sample();
        let maxima = source
            .reduce_by("amount", &["town"], &RowFilter::new(), f64::MIN, |acc, v| {
                acc.max(v.as_number().unwrap_or(f64::MIN))
            })
            .unwrap();
        assert_eq!(maxima.len(), 2);
        assert_eq!(maxima[&Key::from("aaa")], 10.0);
        assert_eq!(maxima[&Key::from("bbb")], 20.0);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let source = sample();
        let result = source.distinct(&["nope"], &RowFilter::new());
        assert!(matches!(result, Err(CheckError::UnknownColumn { .. })));
    }

    #[test]
    fn test_from_maps_infers_columns() {
        let source = RecordsSource::from_maps(
            "maps",
            vec![
                Record::from_pairs([("b", "1"), ("a", "2")]),
                Record::from_pairs([("c", "3")]),
            ],
        );
        assert_eq!(source.columns(), vec!["a", "b", "c"]);
    }
}
