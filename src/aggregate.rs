//! Group-and-count aggregates over a normalized table.
//!
//! Counting runs through a polars lazy `group_by`; ordering of the result is
//! decided here so every chart and table sees a stable category order.

use color_eyre::Result;
use polars::prelude::*;
use std::collections::HashMap;

use crate::normalize::{filter_rows, int_values, string_values};

const COUNT: &str = "__count";

/// Counts per value of one column. Null keys are not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountTable {
    pub key: String,
    pub entries: Vec<(String, u64)>,
}

impl CountTable {
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, n)| *n as f64).collect()
    }

    /// Order by count, largest first; ties by key.
    pub fn sorted_by_count(mut self) -> Self {
        self.entries
            .sort_by(|(ka, a), (kb, b)| b.cmp(a).then_with(|| ka.cmp(kb)));
        self
    }

    pub fn sorted_by_key(mut self) -> Self {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        self
    }

    /// Entries in `labels` order, zero for labels with no rows. Keys not in
    /// `labels` are dropped.
    pub fn reindex(&self, labels: &[String]) -> Self {
        Self {
            key: self.key.clone(),
            entries: labels.iter().map(|l| (l.clone(), self.get(l))).collect(),
        }
    }

    pub fn map_labels(mut self, f: impl Fn(&str) -> String) -> Self {
        for (k, _) in &mut self.entries {
            *k = f(k);
        }
        self
    }
}

/// Counts per (row key, column key) pair. Pairs with a null part are not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossCounts {
    pub row_key: String,
    pub col_key: String,
    pub entries: Vec<(String, String, u64)>,
}

impl CrossCounts {
    pub fn get(&self, row: &str, col: &str) -> u64 {
        self.entries
            .iter()
            .find(|(r, c, _)| r == row && c == col)
            .map(|(_, _, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, _, n)| n).sum()
    }

    pub fn row_labels(&self) -> Vec<String> {
        sorted_unique(self.entries.iter().map(|(r, _, _)| r.clone()))
    }

    pub fn col_labels(&self) -> Vec<String> {
        sorted_unique(self.entries.iter().map(|(_, c, _)| c.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotRow {
    pub key: String,
    pub counts: Vec<u64>,
    pub total: u64,
}

/// Count matrix with a row-total column, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    pub row_key: String,
    pub columns: Vec<String>,
    pub total_label: String,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.columns.len() + 2);
        headers.push(self.row_key.clone());
        headers.extend(self.columns.iter().cloned());
        headers.push(self.total_label.clone());
        headers
    }

    pub fn row(&self, key: &str) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

/// Sum of a numeric column per key, keys in first-appearance order.
#[derive(Debug, Clone, PartialEq)]
pub struct SumTable {
    pub key: String,
    pub value: String,
    pub entries: Vec<(String, f64)>,
}

impl SumTable {
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }
}

fn sorted_unique(iter: impl Iterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = iter.collect();
    v.sort();
    v.dedup();
    v
}

fn grouped_lengths(df: &DataFrame, keys: &[&str]) -> Result<DataFrame> {
    let mut lf = df.clone().lazy();
    for key in keys {
        lf = lf.filter(col(*key).is_not_null());
    }
    let by: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let out = lf.group_by(by).agg([len().alias(COUNT)]).collect()?;
    Ok(out)
}

fn counts(out: &DataFrame) -> Result<Vec<u64>> {
    Ok(int_values(out, COUNT)?
        .into_iter()
        .map(|n| n.unwrap_or(0).max(0) as u64)
        .collect())
}

/// Rows per non-null value of `column`, largest count first.
pub fn value_counts(df: &DataFrame, column: &str) -> Result<CountTable> {
    let out = grouped_lengths(df, &[column])?;
    let keys = string_values(&out, column)?;
    let entries = keys
        .into_iter()
        .zip(counts(&out)?)
        .map(|(k, n)| (k.unwrap_or_default(), n))
        .collect();
    let table = CountTable {
        key: column.to_string(),
        entries,
    }
    .sorted_by_count();
    tracing::debug!(column, groups = table.entries.len(), "value counts");
    Ok(table)
}

/// Rows per non-null (`row`, `col`) pair, ordered by row key then column key.
pub fn group_counts(df: &DataFrame, row: &str, col: &str) -> Result<CrossCounts> {
    let out = grouped_lengths(df, &[row, col])?;
    let rows = string_values(&out, row)?;
    let cols = string_values(&out, col)?;
    let mut entries: Vec<(String, String, u64)> = rows
        .into_iter()
        .zip(cols)
        .zip(counts(&out)?)
        .map(|((r, c), n)| (r.unwrap_or_default(), c.unwrap_or_default(), n))
        .collect();
    entries.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    Ok(CrossCounts {
        row_key: row.to_string(),
        col_key: col.to_string(),
        entries,
    })
}

/// `row` x `col` count matrix with a total column named `total_label`.
pub fn pivot_counts(df: &DataFrame, row: &str, col: &str, total_label: &str) -> Result<PivotTable> {
    let cross = group_counts(df, row, col)?;
    let columns = cross.col_labels();
    let rows = cross
        .row_labels()
        .into_iter()
        .map(|key| {
            let counts: Vec<u64> = columns.iter().map(|c| cross.get(&key, c)).collect();
            let total = counts.iter().sum();
            PivotRow { key, counts, total }
        })
        .collect();
    Ok(PivotTable {
        row_key: row.to_string(),
        columns,
        total_label: total_label.to_string(),
        rows,
    })
}

/// Counts of a bucket-label column in bucket order, including empty buckets.
pub fn bucket_counts(df: &DataFrame, column: &str, labels: &[String]) -> Result<CountTable> {
    Ok(value_counts(df, column)?.reindex(labels))
}

/// Sum of `value` per `key`; null keys and null values are skipped.
pub fn sum_by(df: &DataFrame, key: &str, value: &str) -> Result<SumTable> {
    let keys = string_values(df, key)?;
    let series = df
        .column(value)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = series.f64()?.into_iter().collect();

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(String, f64)> = Vec::new();
    for (k, v) in keys.into_iter().zip(values) {
        let (Some(k), Some(v)) = (k, v) else {
            continue;
        };
        match index.get(&k) {
            Some(&i) => entries[i].1 += v,
            None => {
                index.insert(k.clone(), entries.len());
                entries.push((k, v));
            }
        }
    }
    Ok(SumTable {
        key: key.to_string(),
        value: value.to_string(),
        entries,
    })
}

/// Every row that has at least one exact full-row duplicate; all copies are kept.
pub fn duplicate_rows(df: &DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut rows: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(names.len()); df.height()];
    for name in &names {
        for (row, value) in rows.iter_mut().zip(string_values(df, name)?) {
            row.push(value);
        }
    }
    let mut seen: HashMap<&Vec<Option<String>>, usize> = HashMap::new();
    for row in &rows {
        *seen.entry(row).or_insert(0) += 1;
    }
    let mask: Vec<bool> = rows.iter().map(|r| seen[r] > 1).collect();
    let out = filter_rows(df, &mask)?;
    tracing::debug!(duplicates = out.height(), "duplicate row check");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases() -> DataFrame {
        df!(
            "kecamatan" => [Some("Kota"), Some("Desa"), None, Some("Kota"), Some("Pantai")],
            "gender" => [Some("L"), Some("P"), Some("P"), None, Some("L")]
        )
        .unwrap()
    }

    #[test]
    fn test_value_counts_sum_to_non_null_rows() {
        let df = cases();
        for column in ["kecamatan", "gender"] {
            let table = value_counts(&df, column).unwrap();
            let non_null = df.height() - df.column(column).unwrap().null_count();
            assert_eq!(table.total() as usize, non_null);
        }
    }

    #[test]
    fn test_value_counts_order() {
        let table = value_counts(&cases(), "kecamatan").unwrap();
        assert_eq!(
            table.entries,
            vec![
                ("Kota".to_string(), 2),
                ("Desa".to_string(), 1),
                ("Pantai".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_pivot_counts_with_total() {
        let df = df!(
            "Kader" => ["Ani", "Ani", "Budi", "Ani"],
            "Tipe Pasien" => ["Baru", "Kambuh", "Baru", "Baru"]
        )
        .unwrap();
        let pivot = pivot_counts(&df, "Kader", "Tipe Pasien", "Total Kasus").unwrap();
        assert_eq!(pivot.columns, vec!["Baru", "Kambuh"]);
        assert_eq!(
            pivot.headers(),
            vec!["Kader", "Baru", "Kambuh", "Total Kasus"]
        );
        let ani = pivot.row("Ani").unwrap();
        assert_eq!(ani.counts, vec![2, 1]);
        assert_eq!(ani.total, 3);
        let budi = pivot.row("Budi").unwrap();
        assert_eq!(budi.counts, vec![1, 0]);
        assert_eq!(budi.total, 1);
    }

    #[test]
    fn test_bucket_counts_keep_empty_buckets() {
        let df = df!("age_group" => [Some("0-9"), Some("20-29"), None, Some("20-29")]).unwrap();
        let labels: Vec<String> = ["0-9", "10-19", "20-29"].iter().map(|s| s.to_string()).collect();
        let table = bucket_counts(&df, "age_group", &labels).unwrap();
        assert_eq!(
            table.entries,
            vec![
                ("0-9".to_string(), 1),
                ("10-19".to_string(), 0),
                ("20-29".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_duplicate_rows_flags_all_copies() {
        let df = df!(
            "nik" => ["1", "2", "1", "3"],
            "umur" => [30i64, 40, 30, 50]
        )
        .unwrap();
        let dups = duplicate_rows(&df).unwrap();
        assert_eq!(dups.height(), 2);

        let unique = df!("nik" => ["1", "2"], "umur" => [30i64, 30]).unwrap();
        assert_eq!(duplicate_rows(&unique).unwrap().height(), 0);
    }

    #[test]
    fn test_null_and_empty_string_are_different_values() {
        let df = df!("a" => [Some(""), None]).unwrap();
        assert_eq!(duplicate_rows(&df).unwrap().height(), 0);
    }

    #[test]
    fn test_sum_by_first_appearance_order() {
        let df = df!(
            "label" => ["B", "A", "B"],
            "n" => [Some(1.0), Some(2.0), Some(3.5)]
        )
        .unwrap();
        let sums = sum_by(&df, "label", "n").unwrap();
        assert_eq!(
            sums.entries,
            vec![("B".to_string(), 4.5), ("A".to_string(), 2.0)]
        );
        assert_eq!(sums.total(), 6.5);
    }

    #[test]
    fn test_group_counts() {
        let df = df!(
            "week" => [Some("1"), Some("1"), Some("4"), None],
            "status" => ["Belum IK", "Sudah IK", "Belum IK", "Belum IK"]
        )
        .unwrap();
        let cross = group_counts(&df, "week", "status").unwrap();
        assert_eq!(cross.get("1", "Belum IK"), 1);
        assert_eq!(cross.get("4", "Sudah IK"), 0);
        assert_eq!(cross.total(), 3);
        assert_eq!(cross.row_labels(), vec!["1", "4"]);
    }
}
