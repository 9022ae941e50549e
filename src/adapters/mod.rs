pub mod csv_source;
pub mod multi;
pub mod records;

pub use csv_source::{CsvEncoding, CsvOptions, CsvSource};
pub use multi::MultiSource;
pub use records::RecordsSource;
