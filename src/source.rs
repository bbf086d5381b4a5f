//! Workbook ingestion: one sheet of an `.xlsx` into a polars `DataFrame`.
//!
//! Declared columns are coerced to their [`ColumnType`]; every other column
//! keeps an inferred type so downloads and duplicate checks see full rows.

use calamine::{open_workbook_auto, Data, DataType as CellValue, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use crate::schema::{ColumnSpec, ColumnType, MalformedInputError, SourceFormat};

/// Column type inferred for undeclared columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
}

/// Cells of one sheet addressed by absolute (row, column), 0-based.
///
/// calamine ranges start at the first used cell; the origin keeps header
/// offsets and `Unnamed: N` indices relative to cell A1.
pub struct CellGrid {
    origin: (usize, usize),
    rows: Vec<Vec<Data>>,
}

impl CellGrid {
    pub fn new(origin: (usize, usize), rows: Vec<Vec<Data>>) -> Self {
        Self { origin, rows }
    }

    fn from_range(range: &Range<Data>) -> Self {
        let origin = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let rows = range.rows().map(|r| r.to_vec()).collect();
        Self { origin, rows }
    }

    fn height(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.origin.0 + self.rows.len()
        }
    }

    fn width(&self) -> usize {
        let used = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        if used == 0 {
            0
        } else {
            self.origin.1 + used
        }
    }

    fn cell(&self, row: usize, col: usize) -> Option<&Data> {
        let r = row.checked_sub(self.origin.0)?;
        let c = col.checked_sub(self.origin.1)?;
        self.rows.get(r)?.get(c).filter(|d| !is_blank(d))
    }
}

/// Load the sheet described by `format` from the workbook at `path`.
pub fn load_workbook(path: &Path, format: &SourceFormat) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| match e {
        calamine::Error::Io(io) | calamine::Error::Xlsx(calamine::XlsxError::Io(io)) => {
            color_eyre::Report::new(io)
        }
        e => eyre!("Excel: {}", e),
    })?;
    let range = read_sheet(&mut workbook, format.sheet.as_deref())?;
    let grid = CellGrid::from_range(&range);
    let df = frame_from_grid(&grid, format)?;
    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "loaded workbook"
    );
    Ok(df)
}

fn read_sheet<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    sheet: Option<&str>,
) -> Result<Range<Data>> {
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(MalformedInputError::NoWorksheet("in workbook".to_string()).into());
    }
    let range = match sheet {
        Some(sel) => {
            if let Ok(idx) = sel.parse::<usize>() {
                workbook
                    .worksheet_range_at(idx)
                    .ok_or_else(|| MalformedInputError::NoWorksheet(format!("at index {idx}")))?
                    .map_err(|e| eyre!("Excel: {}", e))?
            } else if sheet_names.iter().any(|n| n == sel) {
                workbook
                    .worksheet_range(sel)
                    .map_err(|e| eyre!("Excel: {}", e))?
            } else {
                return Err(MalformedInputError::NoWorksheet(format!(
                    "named '{sel}' (found: {})",
                    sheet_names.join(", ")
                ))
                .into());
            }
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| MalformedInputError::NoWorksheet("at index 0".to_string()))?
            .map_err(|e| eyre!("Excel: {}", e))?,
    };
    Ok(range)
}

/// Build the table: header at `format.header_rows`, data below it.
pub fn frame_from_grid(grid: &CellGrid, format: &SourceFormat) -> Result<DataFrame> {
    let header_row = format.header_rows;
    let height = grid.height();
    if header_row >= height {
        return Err(MalformedInputError::HeaderOutOfRange {
            header_row: header_row + 1,
            rows: height,
        }
        .into());
    }

    let headers = header_names(grid, header_row);
    format.validate_headers(&headers)?;

    // Fully blank rows inside the used range carry no record.
    let data_rows: Vec<usize> = (header_row + 1..height)
        .filter(|&r| (0..headers.len()).any(|c| grid.cell(r, c).is_some()))
        .collect();

    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    for (col_idx, name) in headers.iter().enumerate() {
        let cells: Vec<(usize, Option<&Data>)> = data_rows
            .iter()
            .enumerate()
            .map(|(record, &r)| (record + 1, grid.cell(r, col_idx)))
            .collect();
        let series = match format.column(name) {
            Some(spec) => declared_column_to_series(spec, &cells)?,
            None => inferred_column_to_series(name, &cells)?,
        };
        columns.push(series.into());
    }

    let df = DataFrame::new(columns)?;
    format.validate_nulls(&df)?;
    Ok(df)
}

/// Header names with `Unnamed: N` for blanks and `.1`, `.2` suffixes for repeats.
fn header_names(grid: &CellGrid, header_row: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..grid.width())
        .map(|col| {
            let base = grid
                .cell(header_row, col)
                .and_then(cell_text)
                .unwrap_or_else(|| format!("Unnamed: {col}"));
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn is_whole(f: f64) -> bool {
    f.is_finite() && (f - f.trunc()).abs() < 1e-10
}

/// Render a cell as text; None for blanks and error cells.
pub(crate) fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if s.trim().is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if is_whole(*f) => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| format_naive_datetime(&dt))
            .or_else(|| cell.as_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn format_naive_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == midnight() {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn midnight() -> NaiveTime {
    NaiveTime::MIN
}

fn cell_i64(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) if is_whole(*f) => Some(*f as i64),
        Data::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| is_whole(*f))
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        Data::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Converts a cell to NaiveDateTime (Excel serial with date format, ISO, or day-first string).
pub(crate) fn cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(_) => cell.as_datetime(),
        Data::DateTimeIso(s) | Data::String(s) => parse_naive_datetime_str(s),
        _ => None,
    }
}

/// Parses ISO or day-first date/datetime strings; tries FORMATS in order.
pub(crate) fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d-%m-%Y %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(midnight()));
        }
    }
    None
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Days since the Unix epoch, the physical representation of polars `Date`.
pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub(crate) fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    epoch().checked_add_signed(chrono::Duration::days(days as i64))
}

pub(crate) fn date_series(name: &str, values: Vec<Option<i32>>) -> Result<Series> {
    Ok(Series::new(name.into(), values).cast(&DataType::Date)?)
}

fn declared_column_to_series(spec: &ColumnSpec, cells: &[(usize, Option<&Data>)]) -> Result<Series> {
    let name = spec.name.as_str();
    let series = match spec.ty {
        ColumnType::Text => {
            let v: Vec<Option<String>> = cells.iter().map(|(_, c)| c.and_then(cell_text)).collect();
            Series::new(name.into(), v)
        }
        ColumnType::Integer => {
            let mut v: Vec<Option<i64>> = Vec::with_capacity(cells.len());
            for (row, cell) in cells {
                let value = match cell {
                    None => None,
                    Some(c) => Some(cell_i64(c).ok_or_else(|| {
                        MalformedInputError::UnparseableValue {
                            column: spec.name.clone(),
                            row: *row,
                            value: cell_text(c).unwrap_or_default(),
                            expected: ColumnType::Integer.as_str(),
                        }
                    })?),
                };
                v.push(value);
            }
            Series::new(name.into(), v)
        }
        ColumnType::Float => {
            let v: Vec<Option<f64>> = cells.iter().map(|(_, c)| c.and_then(cell_f64)).collect();
            Series::new(name.into(), v)
        }
        ColumnType::Date => {
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|(_, c)| c.and_then(cell_to_naive_datetime).map(|dt| epoch_days(dt.date())))
                .collect();
            let parsed = v.iter().flatten().count();
            let present = cells.iter().filter(|(_, c)| c.is_some()).count();
            if parsed < present {
                tracing::debug!(
                    column = name,
                    unparsed = present - parsed,
                    "date cells coerced to null"
                );
            }
            date_series(name, v)?
        }
    };
    Ok(series)
}

fn infer_column_type(cells: &[(usize, Option<&Data>)]) -> InferredType {
    let present: Vec<&Data> = cells.iter().filter_map(|(_, c)| *c).collect();
    if present.is_empty() {
        return InferredType::Utf8;
    }
    if present
        .iter()
        .all(|c| matches!(c, Data::Int(_)) || matches!(c, Data::Float(f) if is_whole(*f)))
    {
        return InferredType::Int64;
    }
    if present
        .iter()
        .all(|c| matches!(c, Data::Int(_) | Data::Float(_)))
    {
        return InferredType::Float64;
    }
    if present.iter().all(|c| matches!(c, Data::Bool(_))) {
        return InferredType::Boolean;
    }
    let all_dates = present.iter().all(|c| {
        matches!(c, Data::DateTime(_) | Data::DateTimeIso(_))
            && cell_to_naive_datetime(c).is_some_and(|dt| dt.time() == midnight())
    });
    if all_dates {
        return InferredType::Date;
    }
    InferredType::Utf8
}

fn inferred_column_to_series(name: &str, cells: &[(usize, Option<&Data>)]) -> Result<Series> {
    let series = match infer_column_type(cells) {
        InferredType::Int64 => {
            let v: Vec<Option<i64>> = cells.iter().map(|(_, c)| c.and_then(cell_i64)).collect();
            Series::new(name.into(), v)
        }
        InferredType::Float64 => {
            let v: Vec<Option<f64>> = cells.iter().map(|(_, c)| c.and_then(cell_f64)).collect();
            Series::new(name.into(), v)
        }
        InferredType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|(_, c)| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        InferredType::Date => {
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|(_, c)| c.and_then(cell_to_naive_datetime).map(|dt| epoch_days(dt.date())))
                .collect();
            date_series(name, v)?
        }
        InferredType::Utf8 => {
            let v: Vec<Option<String>> = cells.iter().map(|(_, c)| c.and_then(cell_text)).collect();
            Series::new(name.into(), v)
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn bridging_format() -> SourceFormat {
        SourceFormat::new(
            0,
            vec![
                ColumnSpec::new("tgl", ColumnType::Date),
                ColumnSpec::new("umur", ColumnType::Integer),
            ],
        )
    }

    #[test]
    fn test_unparseable_dates_become_null() {
        let grid = CellGrid::new(
            (0, 0),
            vec![
                vec![s("tgl"), s("umur")],
                vec![s("2024-03-01"), Data::Float(30.0)],
                vec![s("bukan tanggal"), Data::Int(41)],
                vec![s("15/03/2024"), s("7")],
            ],
        );
        let df = frame_from_grid(&grid, &bridging_format()).unwrap();
        assert_eq!(df.height(), 3);
        let tgl = df.column("tgl").unwrap();
        assert_eq!(tgl.dtype(), &DataType::Date);
        assert_eq!(tgl.null_count(), 1);
        let umur = df.column("umur").unwrap().as_materialized_series().clone();
        let ages: Vec<Option<i64>> = umur.i64().unwrap().into_iter().collect();
        assert_eq!(ages, vec![Some(30), Some(41), Some(7)]);
    }

    #[test]
    fn test_unparseable_integer_names_column_and_row() {
        let grid = CellGrid::new(
            (0, 0),
            vec![
                vec![s("tgl"), s("umur")],
                vec![s("2024-03-01"), s("tiga puluh")],
            ],
        );
        let err = frame_from_grid(&grid, &bridging_format()).unwrap_err();
        let err = err.downcast_ref::<MalformedInputError>().unwrap();
        assert_eq!(
            err,
            &MalformedInputError::UnparseableValue {
                column: "umur".to_string(),
                row: 1,
                value: "tiga puluh".to_string(),
                expected: "integer",
            }
        );
    }

    #[test]
    fn test_missing_declared_column() {
        let grid = CellGrid::new((0, 0), vec![vec![s("tgl")], vec![s("2024-03-01")]]);
        let err = frame_from_grid(&grid, &bridging_format()).unwrap_err();
        let err = err.downcast_ref::<MalformedInputError>().unwrap();
        assert_eq!(err.column(), Some("umur"));
    }

    #[test]
    fn test_header_offset_and_unnamed_columns_use_absolute_positions() {
        // Used range starts at B3; header is on sheet row 3 (two rows skipped).
        let grid = CellGrid::new(
            (2, 1),
            vec![
                vec![s("KATEGORI"), Data::Empty, s("KATEGORI")],
                vec![s("Kec A"), s("PKM A"), s("x")],
            ],
        );
        let format = SourceFormat::new(2, vec![]);
        let df = frame_from_grid(&grid, &format).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["Unnamed: 0", "KATEGORI", "Unnamed: 2", "KATEGORI.1"]
        );
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_header_past_end_of_sheet() {
        let grid = CellGrid::new((0, 0), vec![vec![s("a")]]);
        let err = frame_from_grid(&grid, &SourceFormat::new(6, vec![])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MalformedInputError>(),
            Some(MalformedInputError::HeaderOutOfRange { .. })
        ));
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let grid = CellGrid::new(
            (0, 0),
            vec![
                vec![s("a"), s("b")],
                vec![s("x"), Data::Int(1)],
                vec![Data::Empty, s("  ")],
                vec![s("y"), Data::Int(2)],
            ],
        );
        let df = frame_from_grid(&grid, &SourceFormat::new(0, vec![])).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_parse_day_first_dates() {
        let d = parse_naive_datetime_str("31-01-2024").unwrap();
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(parse_naive_datetime_str("2024-13-01").is_none());
        assert!(parse_naive_datetime_str("").is_none());
    }
}
