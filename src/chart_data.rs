//! Chart specifications built from aggregate results.
//!
//! A [`ChartSpec`] is backend-neutral: the terminal widget and the image
//! exporter both draw from it. Categories are plotted at integer x positions
//! `0..n` and labelled by index.

use crate::aggregate::{CountTable, CrossCounts, SumTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    GroupedBar,
    Pie,
    Histogram,
    Line,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::GroupedBar => "grouped bar",
            Self::Pie => "pie",
            Self::Histogram => "histogram",
            Self::Line => "line",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    /// One value per category.
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    /// Title of the legend when series are split by a second key.
    pub legend_title: Option<String>,
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartSpec {
    fn single(
        kind: ChartKind,
        title: &str,
        x_title: Option<&str>,
        y_title: Option<&str>,
        counts: &CountTable,
    ) -> Self {
        Self {
            kind,
            title: title.to_string(),
            x_title: x_title.map(str::to_string),
            y_title: y_title.map(str::to_string),
            legend_title: None,
            categories: counts.labels(),
            series: vec![ChartSeries {
                name: y_title.unwrap_or("count").to_string(),
                values: counts.values(),
            }],
        }
    }

    pub fn bar(title: &str, x_title: &str, y_title: &str, counts: &CountTable) -> Self {
        Self::single(ChartKind::Bar, title, Some(x_title), Some(y_title), counts)
    }

    pub fn histogram(title: &str, x_title: &str, y_title: &str, counts: &CountTable) -> Self {
        Self::single(ChartKind::Histogram, title, Some(x_title), Some(y_title), counts)
    }

    pub fn line(title: &str, x_title: &str, y_title: &str, counts: &CountTable) -> Self {
        Self::single(ChartKind::Line, title, Some(x_title), Some(y_title), counts)
    }

    pub fn pie(title: &str, counts: &CountTable) -> Self {
        Self::single(ChartKind::Pie, title, None, None, counts)
    }

    /// One bar per category and series from a sum table.
    pub fn sum_bar(title: &str, x_title: &str, sums: &SumTable) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: title.to_string(),
            x_title: Some(x_title.to_string()),
            y_title: Some(sums.value.clone()),
            legend_title: None,
            categories: sums.entries.iter().map(|(k, _)| k.clone()).collect(),
            series: vec![ChartSeries {
                name: sums.value.clone(),
                values: sums.entries.iter().map(|(_, v)| *v).collect(),
            }],
        }
    }

    /// Bars grouped by the row key of `cross`, one series per column key.
    /// `categories` fixes the group order and keeps groups with no rows.
    pub fn grouped_bar(
        title: &str,
        x_title: &str,
        y_title: &str,
        legend_title: &str,
        cross: &CrossCounts,
        categories: &[String],
    ) -> Self {
        let series = cross
            .col_labels()
            .into_iter()
            .map(|name| ChartSeries {
                values: categories
                    .iter()
                    .map(|c| cross.get(c, &name) as f64)
                    .collect(),
                name,
            })
            .collect();
        Self {
            kind: ChartKind::GroupedBar,
            title: title.to_string(),
            x_title: Some(x_title.to_string()),
            y_title: Some(y_title.to_string()),
            legend_title: Some(legend_title.to_string()),
            categories: categories.to_vec(),
            series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() || self.series.iter().all(|s| s.values.is_empty())
    }

    pub fn value_max(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    /// Category label at an x position, or empty when off-axis.
    pub fn category_at(&self, x: f64) -> &str {
        let rounded = x.round();
        if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
            return "";
        }
        self.categories
            .get(rounded as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// File name stem derived from the title.
    pub fn file_stem(&self) -> String {
        slugify(&self.title)
    }
}

/// Lowercase ASCII alphanumerics joined by single underscores.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        out.push_str("chart");
    }
    out
}

pub fn format_axis_label(v: f64) -> String {
    if v.abs() >= 1e6 || (v.abs() < 1e-2 && v != 0.0) {
        format!("{:.2e}", v)
    } else if (v - v.round()).abs() < 1e-10 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}
