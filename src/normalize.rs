//! Column transforms applied after ingestion.
//!
//! A page declares an ordered list of [`Transform`]s. Each one is pure over
//! the table it is given and applying the same list twice yields the same
//! table.

use chrono::Datelike;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use regex::Regex;
use std::sync::LazyLock;

use crate::bucket::BucketDefinition;
use crate::cli::{AgeParsing, MonthNames};
use crate::schema::MalformedInputError;
use crate::source::{
    date_from_epoch_days, date_series, epoch_days, parse_naive_datetime_str,
};

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const INDONESIAN_MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

static LEADING_INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\D*$").unwrap_or_else(|e| panic!("invalid age pattern: {e}"))
});

/// Full month name for a 1-based month number.
pub fn month_name(month: u32, names: MonthNames) -> &'static str {
    let table = match names {
        MonthNames::English => &ENGLISH_MONTHS,
        MonthNames::Indonesian => &INDONESIAN_MONTHS,
    };
    table
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Coerce a column to `Date`; unparseable values become null.
    ParseDate { column: String },
    /// Month name of a date column.
    MonthName {
        from: String,
        into: String,
        names: MonthNames,
    },
    /// First day of the month of a date column.
    MonthStart { from: String, into: String },
    /// Week-of-month label (`1`-`4`) from the day of a date column.
    WeekOfMonth { from: String, into: String },
    /// Integer from text with a unit suffix, e.g. `"34 Thn"`.
    StripSuffixInt {
        column: String,
        suffix: String,
        policy: AgeParsing,
    },
    /// Fixed-width bracket label of an integer column, edges from 0 to the
    /// column max.
    Bucket {
        from: String,
        into: String,
        width: i64,
    },
    /// `complete` when `source` is non-null, else `pending`.
    StatusFlag {
        source: String,
        into: String,
        complete: String,
        pending: String,
    },
    /// Numeric coercion; invalid values become null.
    ToNumeric { column: String },
    /// `"{primary} ({secondary})"`, null parts shown as `-`.
    Label {
        into: String,
        primary: String,
        secondary: String,
    },
    Rename { from: String, into: String },
    Select { columns: Vec<String> },
    /// Drop rows where any of the columns is null.
    DropNulls { columns: Vec<String> },
    /// Keep rows before the first row whose `column` contains `marker`.
    TruncateAtMarker { column: String, marker: String },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ParseDate { .. } => "parse_date",
            Self::MonthName { .. } => "month_name",
            Self::MonthStart { .. } => "month_start",
            Self::WeekOfMonth { .. } => "week_of_month",
            Self::StripSuffixInt { .. } => "strip_suffix_int",
            Self::Bucket { .. } => "bucket",
            Self::StatusFlag { .. } => "status_flag",
            Self::ToNumeric { .. } => "to_numeric",
            Self::Label { .. } => "label",
            Self::Rename { .. } => "rename",
            Self::Select { .. } => "select",
            Self::DropNulls { .. } => "drop_nulls",
            Self::TruncateAtMarker { .. } => "truncate_at_marker",
        }
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            Self::ParseDate { column } => parse_date(df, column),
            Self::MonthName { from, into, names } => {
                let names = *names;
                let values: Vec<Option<&'static str>> = date_values(df, from)?
                    .into_iter()
                    .map(|d| d.map(|d| month_name(d.month(), names)))
                    .collect();
                with_series(df, Series::new(into.as_str().into(), values))
            }
            Self::MonthStart { from, into } => {
                let values: Vec<Option<i32>> = date_values(df, from)?
                    .into_iter()
                    .map(|d| d.and_then(|d| d.with_day(1)).map(epoch_days))
                    .collect();
                with_series(df, date_series(into, values)?)
            }
            Self::WeekOfMonth { from, into } => {
                let weeks = BucketDefinition::week_of_month();
                let values: Vec<Option<String>> = date_values(df, from)?
                    .into_iter()
                    .map(|d| d.and_then(|d| weeks.assign(d.day() as i64)).map(str::to_string))
                    .collect();
                with_series(df, Series::new(into.as_str().into(), values))
            }
            Self::StripSuffixInt {
                column,
                suffix,
                policy,
            } => strip_suffix_int(df, column, suffix, *policy),
            Self::Bucket { from, into, width } => bucket_column(df, from, into, *width),
            Self::StatusFlag {
                source,
                into,
                complete,
                pending,
            } => {
                let src = df.column(source).map_err(|_| missing(df, source))?;
                let values: Vec<&str> = (0..df.height())
                    .map(|i| {
                        if src.get(i).is_ok_and(|v| !v.is_null()) {
                            complete.as_str()
                        } else {
                            pending.as_str()
                        }
                    })
                    .collect();
                with_series(df, Series::new(into.as_str().into(), values))
            }
            Self::ToNumeric { column } => to_numeric(df, column),
            Self::Label {
                into,
                primary,
                secondary,
            } => {
                let a = string_values(df, primary)?;
                let b = string_values(df, secondary)?;
                let values: Vec<String> = a
                    .into_iter()
                    .zip(b)
                    .map(|(a, b)| {
                        format!(
                            "{} ({})",
                            a.as_deref().unwrap_or("-"),
                            b.as_deref().unwrap_or("-")
                        )
                    })
                    .collect();
                with_series(df, Series::new(into.as_str().into(), values))
            }
            Self::Rename { from, into } => {
                let mut out = df.clone();
                if out.column(from).is_ok() {
                    out.rename(from, into.as_str().into())?;
                } else if out.column(into).is_err() {
                    return Err(missing(df, from).into());
                }
                Ok(out)
            }
            Self::Select { columns } => {
                for c in columns {
                    if df.column(c).is_err() {
                        return Err(missing(df, c).into());
                    }
                }
                Ok(df.select(columns.iter().map(|c| c.as_str()))?)
            }
            Self::DropNulls { columns } => {
                let mut mask = vec![true; df.height()];
                for c in columns {
                    let column = df.column(c).map_err(|_| missing(df, c))?;
                    for (i, keep) in mask.iter_mut().enumerate() {
                        if column.get(i).map(|v| v.is_null()).unwrap_or(true) {
                            *keep = false;
                        }
                    }
                }
                filter_rows(df, &mask)
            }
            Self::TruncateAtMarker { column, marker } => {
                let cut = string_values(df, column)?
                    .iter()
                    .position(|v| v.as_deref().is_some_and(|s| s.contains(marker.as_str())));
                match cut {
                    Some(idx) => Ok(df.slice(0, idx)),
                    None => Ok(df.clone()),
                }
            }
        }
    }
}

/// Apply `transforms` in order.
pub fn apply_all(df: DataFrame, transforms: &[Transform]) -> Result<DataFrame> {
    let mut df = df;
    for transform in transforms {
        let before = df.height();
        df = transform.apply(&df)?;
        tracing::debug!(
            transform = transform.name(),
            rows_before = before,
            rows_after = df.height(),
            "applied transform"
        );
    }
    Ok(df)
}

fn missing(df: &DataFrame, column: &str) -> MalformedInputError {
    MalformedInputError::MissingColumn {
        column: column.to_string(),
        available: df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect(),
    }
}

fn column_series(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df.column(name).map_err(|_| missing(df, name))?;
    Ok(column.as_materialized_series().clone())
}

fn with_series(df: &DataFrame, series: Series) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(series)?;
    Ok(out)
}

pub(crate) fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Values of a `Date` column as calendar dates.
pub(crate) fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Option<chrono::NaiveDate>>> {
    let series = column_series(df, name)?;
    if series.dtype() != &DataType::Date {
        return Err(eyre!("column '{}' is {}, expected date", name, series.dtype()));
    }
    let days = series.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(date_from_epoch_days))
        .collect())
}

/// Any column rendered as text.
pub(crate) fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column_series(df, name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|s| s.map(str::to_string))
        .collect())
}

pub(crate) fn int_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = column_series(df, name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn parse_date(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let series = column_series(df, column)?;
    let parsed = match series.dtype() {
        DataType::Date => return Ok(df.clone()),
        DataType::Datetime(_, _) => series.cast(&DataType::Date)?,
        _ => {
            let values: Vec<Option<i32>> = string_values(df, column)?
                .into_iter()
                .map(|s| {
                    s.and_then(|s| parse_naive_datetime_str(&s))
                        .map(|dt| epoch_days(dt.date()))
                })
                .collect();
            date_series(column, values)?
        }
    };
    with_series(df, parsed)
}

/// Parse one suffixed value. `record` is 1-based for error messages.
pub fn parse_suffixed_int(
    value: &str,
    suffix: &str,
    policy: AgeParsing,
    column: &str,
    record: usize,
) -> std::result::Result<i64, MalformedInputError> {
    let unparseable = || MalformedInputError::UnparseableValue {
        column: column.to_string(),
        row: record,
        value: value.to_string(),
        expected: "integer",
    };
    match policy {
        AgeParsing::Strict => {
            let number = value
                .trim()
                .strip_suffix(suffix)
                .ok_or_else(|| MalformedInputError::MissingSuffix {
                    column: column.to_string(),
                    row: record,
                    value: value.to_string(),
                    suffix: suffix.to_string(),
                })?;
            number.trim().parse::<i64>().map_err(|_| unparseable())
        }
        AgeParsing::Lenient => LEADING_INTEGER
            .captures(value)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(unparseable),
    }
}

fn strip_suffix_int(
    df: &DataFrame,
    column: &str,
    suffix: &str,
    policy: AgeParsing,
) -> Result<DataFrame> {
    let series = column_series(df, column)?;
    if series.dtype().is_integer() {
        return Ok(df.clone());
    }
    let mut values: Vec<Option<i64>> = Vec::with_capacity(df.height());
    for (i, value) in string_values(df, column)?.into_iter().enumerate() {
        let parsed = match value {
            Some(v) => Some(parse_suffixed_int(&v, suffix, policy, column, i + 1)?),
            None => None,
        };
        values.push(parsed);
    }
    with_series(df, Series::new(column.into(), values))
}

fn bucket_column(df: &DataFrame, from: &str, into: &str, width: i64) -> Result<DataFrame> {
    let values = int_values(df, from)?;
    let labels: Vec<Option<String>> = match values.iter().flatten().max() {
        Some(&max) => {
            let buckets = BucketDefinition::fixed_width(max, width)?;
            values
                .iter()
                .map(|v| v.and_then(|v| buckets.assign(v)).map(str::to_string))
                .collect()
        }
        None => vec![None; values.len()],
    };
    with_series(df, Series::new(into.into(), labels))
}

fn to_numeric(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let series = column_series(df, column)?;
    if series.dtype().is_integer() || series.dtype().is_float() {
        return with_series(df, series.cast(&DataType::Float64)?);
    }
    let values: Vec<Option<f64>> = string_values(df, column)?
        .into_iter()
        .map(|s| {
            s.and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|f| f.is_finite())
        })
        .collect();
    with_series(df, Series::new(column.into(), values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(days: &[u32]) -> DataFrame {
        let values: Vec<Option<i32>> = days
            .iter()
            .map(|&d| {
                chrono::NaiveDate::from_ymd_opt(2024, 3, d).map(epoch_days)
            })
            .collect();
        DataFrame::new(vec![date_series("tgl", values).unwrap().into()]).unwrap()
    }

    #[test]
    fn test_week_of_month_and_month_name() {
        let df = dates(&[1, 7, 8, 21, 22, 31]);
        let df = apply_all(
            df,
            &[
                Transform::WeekOfMonth {
                    from: "tgl".into(),
                    into: "week".into(),
                },
                Transform::MonthName {
                    from: "tgl".into(),
                    into: "bulan".into(),
                    names: MonthNames::Indonesian,
                },
            ],
        )
        .unwrap();
        let weeks = string_values(&df, "week").unwrap();
        let weeks: Vec<&str> = weeks.iter().map(|w| w.as_deref().unwrap()).collect();
        assert_eq!(weeks, vec!["1", "1", "2", "3", "4", "4"]);
        assert_eq!(
            string_values(&df, "bulan").unwrap()[0].as_deref(),
            Some("Maret")
        );
    }

    #[test]
    fn test_status_flag() {
        let df = df!(
            "SITK" => [Some("123"), None, Some("x")]
        )
        .unwrap();
        let t = Transform::StatusFlag {
            source: "SITK".into(),
            into: "IK_status".into(),
            complete: "Sudah IK".into(),
            pending: "Belum IK".into(),
        };
        let out = t.apply(&df).unwrap();
        let flags = string_values(&out, "IK_status").unwrap();
        assert_eq!(
            flags,
            vec![
                Some("Sudah IK".to_string()),
                Some("Belum IK".to_string()),
                Some("Sudah IK".to_string())
            ]
        );
    }

    #[test]
    fn test_strict_suffix_parsing() {
        let df = df!("Usia" => [Some("34 Thn"), None, Some("7 Thn")]).unwrap();
        let t = Transform::StripSuffixInt {
            column: "Usia".into(),
            suffix: " Thn".into(),
            policy: AgeParsing::Strict,
        };
        let out = t.apply(&df).unwrap();
        assert_eq!(
            int_values(&out, "Usia").unwrap(),
            vec![Some(34), None, Some(7)]
        );

        let padded = df!("Usia" => ["34 Thn ", " 7 Thn"]).unwrap();
        let out = t.apply(&padded).unwrap();
        assert_eq!(int_values(&out, "Usia").unwrap(), vec![Some(34), Some(7)]);

        let bad = df!("Usia" => ["34 Thn", "12"]).unwrap();
        let err = t.apply(&bad).unwrap_err();
        let err = err.downcast_ref::<MalformedInputError>().unwrap();
        assert_eq!(
            err,
            &MalformedInputError::MissingSuffix {
                column: "Usia".into(),
                row: 2,
                value: "12".into(),
                suffix: " Thn".into(),
            }
        );
    }

    #[test]
    fn test_lenient_suffix_parsing() {
        assert_eq!(
            parse_suffixed_int("12", " Thn", AgeParsing::Lenient, "Usia", 1).unwrap(),
            12
        );
        assert_eq!(
            parse_suffixed_int("5 Bln", " Thn", AgeParsing::Lenient, "Usia", 1).unwrap(),
            5
        );
        assert!(parse_suffixed_int("Thn", " Thn", AgeParsing::Lenient, "Usia", 1).is_err());
    }

    #[test]
    fn test_transforms_are_idempotent() {
        let df = df!(
            "Usia" => ["34 Thn", "7 Thn", "61 Thn"],
            "tgl" => ["2024-03-02", "bukan", "2024-04-20"]
        )
        .unwrap();
        let transforms = vec![
            Transform::ParseDate {
                column: "tgl".into(),
            },
            Transform::StripSuffixInt {
                column: "Usia".into(),
                suffix: " Thn".into(),
                policy: AgeParsing::Strict,
            },
            Transform::Bucket {
                from: "Usia".into(),
                into: "Kelompok Usia".into(),
                width: 10,
            },
            Transform::MonthStart {
                from: "tgl".into(),
                into: "Bulan".into(),
            },
        ];
        let once = apply_all(df, &transforms).unwrap();
        let twice = apply_all(once.clone(), &transforms).unwrap();
        assert!(once.equals_missing(&twice));
        assert_eq!(once.column("tgl").unwrap().null_count(), 1);
        assert_eq!(
            string_values(&once, "Kelompok Usia").unwrap(),
            vec![
                Some("30-39".to_string()),
                Some("0-9".to_string()),
                Some("60-69".to_string())
            ]
        );
    }

    #[test]
    fn test_label_and_truncate_at_marker() {
        let df = df!(
            "KATEGORI" => [Some("Kec A"), Some("Kec B"), Some("TOTAL"), Some("Kec C")],
            "Unnamed: 3" => [Some("PKM A"), None, Some(""), Some("PKM C")]
        )
        .unwrap();
        let out = apply_all(
            df,
            &[
                Transform::Label {
                    into: "label".into(),
                    primary: "KATEGORI".into(),
                    secondary: "Unnamed: 3".into(),
                },
                Transform::TruncateAtMarker {
                    column: "label".into(),
                    marker: "TOTAL".into(),
                },
            ],
        )
        .unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            string_values(&out, "label").unwrap(),
            vec![
                Some("Kec A (PKM A)".to_string()),
                Some("Kec B (-)".to_string())
            ]
        );
    }

    #[test]
    fn test_to_numeric_and_drop_nulls() {
        let df = df!(
            "a" => ["1", "x", "3"],
            "b" => [Some(1.0), Some(2.0), None]
        )
        .unwrap();
        let out = apply_all(
            df,
            &[
                Transform::ToNumeric { column: "a".into() },
                Transform::DropNulls {
                    columns: vec!["a".into(), "b".into()],
                },
            ],
        )
        .unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_rename_missing_column_is_reported() {
        let df = df!("a" => [1i64]).unwrap();
        let err = Transform::Rename {
            from: "Unnamed: 11".into(),
            into: "Total".into(),
        }
        .apply(&df)
        .unwrap_err();
        let err = err.downcast_ref::<MalformedInputError>().unwrap();
        assert_eq!(err.column(), Some("Unnamed: 11"));
    }
}
