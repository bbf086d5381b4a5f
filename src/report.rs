//! Page reports: the ordered sections a page presents, plus its download.

use color_eyre::Result;
use polars::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::aggregate::{CountTable, PivotTable};
use crate::chart_data::ChartSpec;
use crate::chart_export::{chart_path, write_chart};
use crate::cli::{ChartFormat, Page};
use crate::export::Download;
use crate::normalize::string_values;

/// A table rendered as text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn float_cell(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        format!("{}", v)
    }
}

impl TableData {
    /// Every column of `df`, nulls as empty cells.
    pub fn from_frame(title: &str, df: &DataFrame) -> Result<Self> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let mut rows = vec![Vec::with_capacity(headers.len()); df.height()];
        for name in &headers {
            let column = df.column(name)?;
            let cells: Vec<String> = if column.dtype().is_float() {
                column
                    .as_materialized_series()
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.map(float_cell).unwrap_or_default())
                    .collect()
            } else {
                string_values(df, name)?
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect()
            };
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.push(cell);
            }
        }
        Ok(Self {
            title: title.to_string(),
            headers,
            rows,
        })
    }

    pub fn from_counts(title: &str, key_header: &str, count_header: &str, counts: &CountTable) -> Self {
        Self {
            title: title.to_string(),
            headers: vec![key_header.to_string(), count_header.to_string()],
            rows: counts
                .entries
                .iter()
                .map(|(k, n)| vec![k.clone(), n.to_string()])
                .collect(),
        }
    }

    pub fn from_pivot(title: &str, pivot: &PivotTable) -> Self {
        Self {
            title: title.to_string(),
            headers: pivot.headers(),
            rows: pivot
                .rows
                .iter()
                .map(|r| {
                    let mut cells = Vec::with_capacity(r.counts.len() + 2);
                    cells.push(r.key.clone());
                    cells.extend(r.counts.iter().map(u64::to_string));
                    cells.push(r.total.to_string());
                    cells
                })
                .collect(),
        }
    }

    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        widths
    }

    /// Plain-text rendering with aligned columns, at most `limit` rows.
    pub fn render_text(&self, limit: usize) -> String {
        let widths = self.column_widths();
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        let mut out = String::new();
        let _ = writeln!(out, "{}", line(&self.headers));
        let _ = writeln!(
            out,
            "{}",
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  ")
        );
        for row in self.rows.iter().take(limit) {
            let _ = writeln!(out, "{}", line(row));
        }
        if self.rows.len() > limit {
            let _ = writeln!(out, "... {} more rows", self.rows.len() - limit);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum Section {
    Chart(ChartSpec),
    Table(TableData),
    Notice { title: String, message: String },
}

impl Section {
    pub fn title(&self) -> &str {
        match self {
            Self::Chart(spec) => &spec.title,
            Self::Table(table) => &table.title,
            Self::Notice { title, .. } => title,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Chart(spec) => spec.kind.as_str(),
            Self::Table(_) => "table",
            Self::Notice { .. } => "note",
        }
    }
}

/// Everything one page shows for one workbook.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page: Page,
    pub title: String,
    pub sections: Vec<Section>,
    pub download: Option<Download>,
}

impl PageReport {
    pub fn new(page: Page, title: &str) -> Self {
        Self {
            page,
            title: title.to_string(),
            sections: Vec::new(),
            download: None,
        }
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title() == title)
    }

    pub fn chart(&self, title: &str) -> Option<&ChartSpec> {
        match self.section(title)? {
            Section::Chart(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn table(&self, title: &str) -> Option<&TableData> {
        match self.section(title)? {
            Section::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn charts(&self) -> impl Iterator<Item = &ChartSpec> {
        self.sections.iter().filter_map(|s| match s {
            Section::Chart(spec) => Some(spec),
            _ => None,
        })
    }

    /// Text rendering for headless mode: tables in full (up to `limit` rows),
    /// charts as their category/value listing.
    pub fn render_text(&self, limit: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n{}\n", self.title, "=".repeat(self.title.chars().count()));
        for section in &self.sections {
            let _ = writeln!(out, "## {} ({})", section.title(), section.kind_label());
            match section {
                Section::Table(table) => out.push_str(&table.render_text(limit)),
                Section::Chart(spec) => {
                    let mut headers = vec![spec.x_title.clone().unwrap_or_default()];
                    headers.extend(spec.series.iter().map(|s| s.name.clone()));
                    let rows = spec
                        .categories
                        .iter()
                        .enumerate()
                        .map(|(i, c)| {
                            let mut row = vec![c.clone()];
                            row.extend(
                                spec.series
                                    .iter()
                                    .map(|s| s.values.get(i).copied().map(float_cell).unwrap_or_default()),
                            );
                            row
                        })
                        .collect();
                    let table = TableData {
                        title: spec.title.clone(),
                        headers,
                        rows,
                    };
                    out.push_str(&table.render_text(limit));
                }
                Section::Notice { message, .. } => {
                    let _ = writeln!(out, "{}", message);
                }
            }
            out.push('\n');
        }
        if let Some(download) = &self.download {
            let _ = writeln!(
                out,
                "Download: {} ({} rows, sheet '{}')",
                download.file_name,
                download.rows.height(),
                download.sheet_name
            );
        }
        out
    }

    /// Write every non-empty chart into `out_dir`.
    pub fn export_charts(&self, out_dir: &Path, format: ChartFormat, size: (u32, u32)) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();
        for spec in self.charts() {
            if spec.is_empty() {
                tracing::warn!(chart = %spec.title, "skipping chart with no data");
                continue;
            }
            let path = chart_path(out_dir, spec, format);
            write_chart(&path, spec, format, size)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Write the download workbook into `out_dir`, if the page offers one.
    pub fn write_download(&self, out_dir: &Path) -> Result<Option<PathBuf>> {
        match &self.download {
            Some(download) => Ok(Some(download.write_to(out_dir)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame_formats_cells() {
        let df = df!(
            "label" => [Some("Kec A (PKM A)"), None],
            "Terduga TB" => [Some(12.0), Some(2.5)]
        )
        .unwrap();
        let table = TableData::from_frame("Data Terduga TB", &df).unwrap();
        assert_eq!(table.headers, vec!["label", "Terduga TB"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Kec A (PKM A)".to_string(), "12".to_string()],
                vec!["".to_string(), "2.5".to_string()]
            ]
        );
    }

    #[test]
    fn test_render_text_truncates() {
        let table = TableData {
            title: "t".into(),
            headers: vec!["Kader".into(), "n".into()],
            rows: vec![
                vec!["Ani".into(), "3".into()],
                vec!["Budi".into(), "1".into()],
                vec!["Citra".into(), "2".into()],
            ],
        };
        let text = table.render_text(2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Kader  n");
        assert_eq!(lines[1], "-----  -");
        assert_eq!(lines[2], "Ani    3");
        assert_eq!(lines[4], "... 1 more rows");
    }

    #[test]
    fn test_report_lookup() {
        let mut report = PageReport::new(Page::Rekap, "Analisis Data TB");
        report.push(Section::Notice {
            title: "Catatan".into(),
            message: "kosong".into(),
        });
        assert!(report.section("Catatan").is_some());
        assert!(report.table("Catatan").is_none());
        assert!(report.render_text(10).contains("## Catatan (note)"));
    }
}
