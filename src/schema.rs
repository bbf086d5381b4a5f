//! Declared workbook schemas and the typed ingestion error.
//!
//! Each page declares the columns it reads as `(name, type, nullability)`.
//! The loader validates the header row against the declaration before any
//! transform runs, so a misnamed column is reported by name instead of
//! failing deep inside an aggregate.

use polars::prelude::DataFrame;

/// Logical type of a declared column and its coercion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Any non-empty cell rendered as text.
    Text,
    /// Whole numbers. Cells that are not integers fail the load.
    Integer,
    /// Numbers; cells that do not parse become null.
    Float,
    /// Calendar dates; cells that do not parse become null.
    Date,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Where the table lives in the workbook and which columns must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormat {
    /// 0-based index or sheet name; first sheet when None.
    pub sheet: Option<String>,
    /// Rows above the header row (absolute sheet rows).
    pub header_rows: usize,
    pub columns: Vec<ColumnSpec>,
}

impl SourceFormat {
    pub fn new(header_rows: usize, columns: Vec<ColumnSpec>) -> Self {
        Self {
            sheet: None,
            header_rows,
            columns,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check that every declared column is in `headers`.
    pub fn validate_headers(&self, headers: &[String]) -> Result<(), MalformedInputError> {
        for spec in &self.columns {
            if !headers.iter().any(|h| h == &spec.name) {
                return Err(MalformedInputError::MissingColumn {
                    column: spec.name.clone(),
                    available: headers.to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Check non-nullable columns after coercion.
    pub fn validate_nulls(&self, df: &DataFrame) -> Result<(), MalformedInputError> {
        for spec in self.columns.iter().filter(|c| !c.nullable) {
            let Ok(column) = df.column(&spec.name) else {
                continue;
            };
            let nulls = column.null_count();
            if nulls > 0 {
                return Err(MalformedInputError::NullValues {
                    column: spec.name.clone(),
                    count: nulls,
                });
            }
        }
        Ok(())
    }
}

/// The uploaded workbook does not have the shape a page expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedInputError {
    #[error("missing column '{column}' (found: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("column '{column}' record {row}: cannot read '{value}' as {expected}")]
    UnparseableValue {
        column: String,
        /// 1-based record number, counted from the first row under the header.
        row: usize,
        value: String,
        expected: &'static str,
    },
    #[error("column '{column}' record {row}: '{value}' does not end with '{suffix}'")]
    MissingSuffix {
        column: String,
        row: usize,
        value: String,
        suffix: String,
    },
    #[error("column '{column}' has {count} empty value(s)")]
    NullValues { column: String, count: usize },
    #[error("header row {header_row} is past the end of the sheet ({rows} rows)")]
    HeaderOutOfRange { header_row: usize, rows: usize },
    #[error("no worksheet {0}")]
    NoWorksheet(String),
}

impl MalformedInputError {
    /// The column the error is about, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::MissingColumn { column, .. }
            | Self::UnparseableValue { column, .. }
            | Self::MissingSuffix { column, .. }
            | Self::NullValues { column, .. } => Some(column),
            Self::HeaderOutOfRange { .. } | Self::NoWorksheet(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn format() -> SourceFormat {
        SourceFormat::new(
            0,
            vec![
                ColumnSpec::new("umur", ColumnType::Integer).required(),
                ColumnSpec::new("SITK", ColumnType::Text),
            ],
        )
    }

    #[test]
    fn test_missing_column_is_named() {
        let headers = vec!["umur".to_string(), "nama".to_string()];
        let err = format().validate_headers(&headers).unwrap_err();
        assert_eq!(err.column(), Some("SITK"));
        assert_eq!(err.to_string(), "missing column 'SITK' (found: umur, nama)");
    }

    #[test]
    fn test_all_columns_present() {
        let headers = vec!["SITK".to_string(), "umur".to_string()];
        assert!(format().validate_headers(&headers).is_ok());
    }

    #[test]
    fn test_required_column_with_nulls() {
        let df = df!(
            "umur" => [Some(30i64), None],
            "SITK" => [None::<&str>, None]
        )
        .unwrap();
        let err = format().validate_nulls(&df).unwrap_err();
        assert_eq!(
            err,
            MalformedInputError::NullValues {
                column: "umur".to_string(),
                count: 1
            }
        );
    }
}
