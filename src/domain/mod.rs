pub mod diff;
pub mod model;
pub mod ports;

pub use diff::{Difference, Differences};
pub use model::{Key, Record, Value};
pub use ports::{DataSource, RowFilter};
