use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::domain::model::{Record, Value};
use crate::domain::ports::DataSource;
use crate::utils::error::{CheckError, Result};

/// Text encoding policy for [`CsvSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvEncoding {
    /// UTF-8, falling back to Latin-1 with a warning on invalid bytes.
    #[default]
    Auto,
    /// Strict UTF-8; invalid bytes are an error.
    Utf8,
    /// Latin-1, each byte mapped to the code point of the same value.
    Latin1,
}

/// Parsing options for [`CsvSource`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub trim: bool,
    pub encoding: CsvEncoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            trim: false,
            encoding: CsvEncoding::Auto,
        }
    }
}

/// A CSV file loaded eagerly into memory. Every cell stays text-typed;
/// aggregation parses numbers on demand.
///
/// Files are decoded as UTF-8 first, falling back to Latin-1 with a
/// warning when the bytes are not valid UTF-8.
#[derive(Debug, Clone)]
pub struct CsvSource {
    name: String,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &CsvOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = fs::read(path)?;
        let text = decode(bytes, &name, options.encoding)?;
        Self::parse(name, &text, options)
    }

    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> Result<Self> {
        let name = name.into();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode(bytes, &name, CsvEncoding::Auto)?;
        Self::parse(name, &text, &CsvOptions::default())
    }

    pub fn from_str(name: impl Into<String>, text: &str) -> Result<Self> {
        Self::parse(name.into(), text, &CsvOptions::default())
    }

    fn parse(name: String, text: &str, options: &CsvOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .trim(if options.trim { Trim::All } else { Trim::None })
            .flexible(false)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

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
        for row in reader.records() {
            let row = row?;
            records.push(Record::from_pairs(
                columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|cell| Value::text(cell))),
            ));
        }
        debug!(source = %name, rows = records.len(), "loaded csv source");

        Ok(CsvSource {
            name,
            columns,
            records,
        })
    }
}

/// Latin-1 maps each byte to the code point of the same value, so
/// decoding it cannot fail; only strict UTF-8 can reject input.
fn decode(bytes: Vec<u8>, name: &str, encoding: CsvEncoding) -> Result<String> {
    match encoding {
        CsvEncoding::Auto => Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(source = %name, "not valid utf-8, falling back to latin-1");
                latin1(&err.into_bytes())
            }
        }),
        CsvEncoding::Utf8 => String::from_utf8(bytes).map_err(|_| {
            CheckError::source_error(format!("{} is not valid utf-8", name))
        }),
        CsvEncoding::Latin1 => Ok(latin1(&bytes)),
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl DataSource for CsvSource {
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
    use crate::domain::ports::RowFilter;

    #[test]
    fn test_parses_header_and_rows() {
        let source =
            CsvSource::from_str("test.csv", "town,amount\naaa,10\nbbb,20\n").unwrap();
        assert_eq!(source.columns(), vec!["town", "amount"]);
        assert_eq!(source.count(&RowFilter::new()).unwrap(), 2);
        assert_eq!(
            source.sum("amount", &RowFilter::new()).unwrap(),
            Value::Int(30)
        );
    }

    #[test]
    fn test_cells_stay_text() {
        let source = CsvSource::from_str("test.csv", "n\n1\n").unwrap();
        let row = source.rows().next().unwrap();
        assert_eq!(row.get("n"), Some(&Value::text("1")));
    }

    #[test]
    fn test_rejects_duplicate_headers() {
        let result = CsvSource::from_str("test.csv", "a,a\n1,2\n");
        assert!(matches!(result, Err(CheckError::Source { .. })));
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xE9 is 'é' in Latin-1 but not valid UTF-8 on its own.
        let bytes = b"name\ncaf\xe9\n".to_vec();
        let source = CsvSource::from_reader("latin.csv", &bytes[..]).unwrap();
        let row = source.rows().next().unwrap();
        assert_eq!(row.get("name"), Some(&Value::text("café")));
    }

    #[test]
    fn test_custom_delimiter_and_trim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "town|amount\n aaa |10\n").unwrap();
        let options = CsvOptions {
            delimiter: b'|',
            trim: true,
            ..CsvOptions::default()
        };
        let source = CsvSource::open_with(&path, &options).unwrap();
        let row = source.rows().next().unwrap();
        assert_eq!(row.get("town"), Some(&Value::text("aaa")));
    }

    #[test]
    fn test_strict_utf8_rejects_invalid_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        fs::write(&path, b"name\ncaf\xe9\n").unwrap();
        let options = CsvOptions {
            encoding: CsvEncoding::Utf8,
            ..CsvOptions::default()
        };
        let result = CsvSource::open_with(&path, &options);
        assert!(matches!(result, Err(CheckError::Source { .. })));
    }

    #[test]
    fn test_forced_latin1_decodes_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        fs::write(&path, b"name\ncaf\xe9\n").unwrap();
        let options = CsvOptions {
            encoding: CsvEncoding::Latin1,
            ..CsvOptions::default()
        };
        let source = CsvSource::open_with(&path, &options).unwrap();
        let row = source.rows().next().unwrap();
        assert_eq!(row.get("name"), Some(&Value::text("café")));
    }
}
