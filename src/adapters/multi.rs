use tracing::debug;

use crate::core::compare::ResultSet;
use crate::domain::model::{Record, Value};
use crate::domain::ports::{DataSource, RowFilter};
use crate::utils::error::Result;

/// Several sources presented as one table.
///
/// Columns are the union of the sub-source columns in first-seen
/// order; rows from a source that lacks a column read as empty text.
pub struct MultiSource {
    sources: Vec<Box<dyn DataSource>>,
    columns: Vec<String>,
}

impl MultiSource {
    pub fn new(sources: Vec<Box<dyn DataSource>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for source in &sources {
            for column in source.columns() {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        debug!(sources = sources.len(), columns = columns.len(), "built multi source");
        MultiSource { sources, columns }
    }

    pub fn push(&mut self, source: Box<dyn DataSource>) {
        for column in source.columns() {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self.sources.push(source);
    }
}

impl DataSource for MultiSource {
    fn name(&self) -> String {
        let names: Vec<String> = self.sources.iter().map(|s| s.name()).collect();
        format!("MultiSource({})", names.join(", "))
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        let columns = &self.columns;
        Box::new(self.sources.iter().flat_map(move |source| {
            source.rows().map(move |record| {
                let mut filled = record;
                for column in columns {
                    if filled.get(column).is_none() {
                        filled.insert(column.clone(), Value::Text(String::new()));
                    }
                }
                filled
            })
        }))
    }

    /// Delegates to each sub-source with the filter restricted to its
    /// columns, padding requested columns a sub-source lacks with
    /// empty text.
    fn distinct(&self, columns: &[&str], filter: &RowFilter) -> Result<ResultSet> {
        self.check_columns(columns)?;
        self.check_filter(filter)?;

        let mut values: Vec<Value> = Vec::new();
        for source in &self.sources {
            let available = source.columns();
            let sub_filter = match filter.restrict_to(&available) {
                Some(f) => f,
                None => continue,
            };
            let present: Vec<&str> = columns
                .iter()
                .copied()
                .filter(|c| available.iter().any(|a| a == c))
                .collect();

            if present.is_empty() {
                // Every requested column is absent; any matching row
                // contributes a single all-empty entry.
                if source.count(&sub_filter)? > 0 {
                    values.push(padded(columns, &present, Vec::new()));
                }
                continue;
            }

            for value in source.distinct(&present, &sub_filter)? {
                let parts = match value {
                    Value::List(items) => items,
                    single => vec![single],
                };
                values.push(padded(columns, &present, parts));
            }
        }
        Ok(values.into_iter().collect())
    }

    /// Sums delegate to the sub-sources that have the column; the
    /// others contribute nothing.
    fn sum(&self, column: &str, filter: &RowFilter) -> Result<Value> {
        self.check_columns(&[column])?;
        self.check_filter(filter)?;

        let mut total = 0.0;
        for source in &self.sources {
            let available = source.columns();
            let sub_filter = match filter.restrict_to(&available) {
                Some(f) => f,
                None => continue,
            };
            if !available.iter().any(|c| c == column) {
                continue;
            }
            total += source
                .sum(column, &sub_filter)?
                .as_number()
                .unwrap_or(0.0);
        }
        Ok(if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
            Value::Int(total as i64)
        } else {
            Value::Float(total)
        })
    }
}

/// Rebuild a requested-column tuple from a sub-source result, filling
/// absent columns with empty text.
fn padded(requested: &[&str], present: &[&str], parts: Vec<Value>) -> Value {
    let mut parts = parts.into_iter();
    let mut full: Vec<Value> = Vec::with_capacity(requested.len());
    for column in requested {
        if present.contains(column) {
            full.push(parts.next().unwrap_or_else(|| Value::Text(String::new())));
        } else {
            full.push(Value::Text(String::new()));
        }
    }
    // ResultSet unwraps single-item lists on insert.
    Value::List(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::records::RecordsSource;

    fn multi() -> MultiSource {
        let first = RecordsSource::from_records(
            "first",
            ["town", "amount"],
            vec![
                vec![Value::text("aaa"), Value::text("10")],
                vec![Value::text("bbb"), Value::text("20")],
            ],
        )
        .unwrap();
        let second = RecordsSource::from_records(
            "second",
            ["town", "state"],
            vec![vec![Value::text("ccc"), Value::text("x")]],
        )
        .unwrap();
        MultiSource::new(vec![Box::new(first), Box::new(second)])
    }

    #[test]
    fn test_columns_are_first_seen_union() {
        assert_eq!(multi().columns(), vec!["town", "amount", "state"]);
    }

    #[test]
    fn test_rows_fill_missing_columns() {
        let source = multi();
        let rows: Vec<Record> = source.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("state"), Some(&Value::text("")));
        assert_eq!(rows[2].get("amount"), Some(&Value::text("")));
    }

    #[test]
    fn test_distinct_pads_absent_columns() {
        let source = multi();
        let result = source.distinct(&["state"], &RowFilter::new()).unwrap();
        assert!(result.contains(&Value::text("x")));
        assert!(result.contains(&Value::text("")));
    }

    #[test]
    fn test_distinct_multi_column() {
        let source = multi();
        let result = source
            .distinct(&["town", "state"], &RowFilter::new())
            .unwrap();
        assert!(result.contains(&Value::list([Value::text("aaa"), Value::text("")])));
        assert!(result.contains(&Value::list([Value::text("ccc"), Value::text("x")])));
    }

    #[test]
    fn test_filter_on_absent_column_excludes_source() {
        let source = multi();
        // Only the second source has a state, so filtering on a
        // non-empty state excludes the first entirely.
        let filter = RowFilter::new().eq("state", "x");
        let result = source.distinct(&["town"], &filter).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains(&Value::text("ccc")));
    }

    #[test]
    fn test_filter_accepting_empty_keeps_other_sources() {
        let source = multi();
        let filter = RowFilter::new().eq("state", "");
        let result = source.distinct(&["town"], &filter).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.contains(&Value::text("aaa")));
        assert!(result.contains(&Value::text("bbb")));
    }

    #[test]
    fn test_sum_skips_sources_without_column() {
        let source = multi();
        assert_eq!(
            source.sum("amount", &RowFilter::new()).unwrap(),
            Value::Int(30)
        );
    }

    #[test]
    fn test_count_spans_all_sources() {
        let source = multi();
        assert_eq!(source.count(&RowFilter::new()).unwrap(), 3);
    }
}
