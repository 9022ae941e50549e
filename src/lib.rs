//! Validate tabular data against reference values.
//!
//! Data loaded from CSV files or built in memory is checked against
//! requirements: plain values, regular expressions, sets, sequences,
//! or mappings of any of these. Failures report precise differences
//! (`Missing`, `Extra`, `Invalid`, `Deviation`) which composable
//! allowances can excuse.
//!
//! ```no_run
//! use tablecheck::{validate, CsvSource, DataSource, Expected, RowFilter};
//!
//! # fn main() -> tablecheck::Result<()> {
//! let source = CsvSource::open("towns.csv")?;
//! let towns = source.distinct(&["town"], &RowFilter::new())?;
//! validate(towns, Expected::set(["aaa", "bbb", "ccc"]))?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{CsvEncoding, CsvOptions, CsvSource, MultiSource, RecordsSource};
pub use crate::core::allowance::{
    allowed_deviation, allowed_deviation_range, allowed_extra, allowed_invalid, allowed_key,
    allowed_limit, allowed_missing, allowed_percent_deviation, allowed_percent_deviation_range,
    allowed_specific, allowed_specific_keyed, allowed_where, Allowance,
};
pub use crate::core::compare::{CompareOp, ResultMap, ResultSet};
pub use crate::core::predicate::Predicate;
pub use crate::core::requirement::{
    Checked, Expected, Requirement, RequiredApprox, RequiredFuzzy, RequiredOutliers,
    RequiredSubset, RequiredSuperset, RequiredUnique,
};
pub use crate::core::validate::{validate, Subject, ValidationError};
pub use domain::diff::{Difference, Differences};
pub use domain::model::{Key, Record, Value};
pub use domain::ports::{DataSource, RowFilter};
pub use utils::error::{CheckError, Result};
