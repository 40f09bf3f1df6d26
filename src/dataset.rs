//! # Tabular Dataset
//!
//! Parses uploaded spreadsheet bytes into an ordered sequence of rows, each
//! mapping a column name to a scalar value. The header row defines the field
//! names and their order; the first data row doubles as the live-preview
//! sample.
//!
//! Loading a dataset is all-or-nothing: a parse failure leaves the caller's
//! prior state untouched.

use std::collections::HashMap;
use std::fmt;

use crate::error::SelloError;

/// A single cell value. Numeric-looking cells are inferred as numbers so
/// their string form is normalized (no trailing zeros from the source
/// formatting); blank cells are distinct from empty text.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Empty,
}

impl Scalar {
    /// Blank cells count as nullish for preview/export text resolution.
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Empty)
    }

    fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>()
            && n.is_finite()
        {
            return Scalar::Number(n);
        }
        Scalar::Text(trimmed.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => {
                // Integral values print without a fractional part.
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Scalar::Empty => Ok(()),
        }
    }
}

/// One data row: column name → value.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: HashMap<String, Scalar>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.values.get(name)
    }

    #[cfg(test)]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Scalar)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Parsed dataset: header order plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Parse CSV bytes into a dataset.
    ///
    /// Fails when the file is malformed, has no usable columns, or has a
    /// header but no data rows. Column titles are trimmed; later duplicate
    /// titles are ignored (first occurrence wins).
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, SelloError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        // Keep each column's source index: skipping a blank title must not
        // shift the remaining columns' values.
        let columns: Vec<(usize, String)> = reader
            .headers()
            .map_err(|e| SelloError::Parse(format!("Could not read header row: {}", e)))?
            .iter()
            .enumerate()
            .map(|(idx, h)| (idx, h.trim().to_string()))
            .filter(|(_, h)| !h.is_empty())
            .collect();

        if columns.is_empty() {
            return Err(SelloError::InvalidInput(
                "The file has no usable columns".to_string(),
            ));
        }
        let header: Vec<String> = columns.iter().map(|(_, name)| name.clone()).collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| SelloError::Parse(format!("Malformed row {}: {}", line + 2, e)))?;
            let mut values = HashMap::with_capacity(columns.len());
            for (idx, name) in &columns {
                let cell = record.get(*idx).unwrap_or("");
                values
                    .entry(name.clone())
                    .or_insert_with(|| Scalar::infer(cell));
            }
            rows.push(Row { values });
        }

        if rows.is_empty() {
            return Err(SelloError::InvalidInput(
                "The file contains no data rows".to_string(),
            ));
        }

        Ok(Self { header, rows })
    }

    /// Column names in source order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// First data row, used as the live-preview sample.
    pub fn sample_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn from_parts(header: Vec<String>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "name,score,notes\nAda,91.5,first\nGrace,88,\n";

    #[test]
    fn parses_header_order_and_rows() {
        let ds = Dataset::from_csv_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.header(), &["name", "score", "notes"]);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn infers_scalar_types() {
        let ds = Dataset::from_csv_bytes(SAMPLE.as_bytes()).unwrap();
        let first = ds.sample_row().unwrap();
        assert_eq!(first.get("name"), Some(&Scalar::Text("Ada".into())));
        assert_eq!(first.get("score"), Some(&Scalar::Number(91.5)));
        let second = &ds.rows()[1];
        assert_eq!(second.get("notes"), Some(&Scalar::Empty));
    }

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(Scalar::Number(88.0).to_string(), "88");
        assert_eq!(Scalar::Number(91.5).to_string(), "91.5");
        assert_eq!(Scalar::Empty.to_string(), "");
    }

    #[test]
    fn rejects_header_only_file() {
        let err = Dataset::from_csv_bytes(b"a,b,c\n").unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn rejects_empty_file() {
        let err = Dataset::from_csv_bytes(b"").unwrap_err();
        assert!(matches!(
            err,
            SelloError::InvalidInput(_) | SelloError::Parse(_)
        ));
    }

    #[test]
    fn short_rows_fill_remaining_columns_as_empty() {
        let ds = Dataset::from_csv_bytes(b"a,b,c\n1,2\n").unwrap();
        let row = ds.sample_row().unwrap();
        assert_eq!(row.get("c"), Some(&Scalar::Empty));
    }

    #[test]
    fn blank_header_titles_do_not_shift_columns() {
        let ds = Dataset::from_csv_bytes(b"name,,email\nAda,junk,a@b\n").unwrap();
        assert_eq!(ds.header(), &["name", "email"]);
        // The blank column's cell is skipped, not slid into "email".
        let row = ds.sample_row().unwrap();
        assert_eq!(row.get("email"), Some(&Scalar::Text("a@b".into())));
        assert_eq!(row.get("name"), Some(&Scalar::Text("Ada".into())));
    }

    #[test]
    fn duplicate_header_titles_keep_first_value() {
        let ds = Dataset::from_csv_bytes(b"a,a,b\nx,y,z\n").unwrap();
        // Duplicate title "a": the first column's value wins.
        let row = ds.sample_row().unwrap();
        assert_eq!(row.get("a"), Some(&Scalar::Text("x".into())));
    }
}
