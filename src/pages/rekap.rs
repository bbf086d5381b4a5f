//! District and facility recapitulation of TB case counts.

use color_eyre::Result;
use polars::prelude::DataFrame;

use super::{DashboardPage, PageOptions};
use crate::aggregate::sum_by;
use crate::chart_data::ChartSpec;
use crate::cli::Page;
use crate::normalize::Transform;
use crate::report::{PageReport, Section, TableData};
use crate::schema::{ColumnSpec, ColumnType, SourceFormat};

pub const CATEGORY: &str = "KATEGORI";
pub const FACILITY: &str = "Unnamed: 3";
pub const SUSPECTED: &str = "Terduga TB";
pub const PREVENTIVE: &str = "Anak yang Mendapatkan TPT";
pub const NOTIFIED_SOURCE: &str = "Unnamed: 11";
pub const NOTIFIED: &str = "Total Kasus TB Ternotifikasi";

pub const LABEL: &str = "Nama Kecamatan & Fasyankes";
pub const TOTAL_MARKER: &str = "TOTAL";
pub const HEADER_ROWS: usize = 9;

pub const METRICS: [&str; 3] = [SUSPECTED, PREVENTIVE, NOTIFIED];

pub struct Rekap;

pub fn table_title(metric: &str) -> String {
    format!("Data {}", metric)
}

pub fn chart_title(metric: &str) -> String {
    format!("Visualisasi {} per Kecamatan & Fasyankes", metric)
}

impl DashboardPage for Rekap {
    fn page(&self) -> Page {
        Page::Rekap
    }

    fn title(&self) -> &'static str {
        "Analisis Data TB"
    }

    fn source_format(&self, _options: &PageOptions) -> SourceFormat {
        SourceFormat::new(
            HEADER_ROWS,
            vec![
                ColumnSpec::new(CATEGORY, ColumnType::Text),
                ColumnSpec::new(FACILITY, ColumnType::Text),
                ColumnSpec::new(SUSPECTED, ColumnType::Float),
                ColumnSpec::new(PREVENTIVE, ColumnType::Float),
                ColumnSpec::new(NOTIFIED_SOURCE, ColumnType::Float),
            ],
        )
    }

    fn transforms(&self, _options: &PageOptions) -> Vec<Transform> {
        let mut transforms = vec![
            Transform::Label {
                into: LABEL.into(),
                primary: CATEGORY.into(),
                secondary: FACILITY.into(),
            },
            Transform::Rename {
                from: NOTIFIED_SOURCE.into(),
                into: NOTIFIED.into(),
            },
        ];
        transforms.extend(METRICS.iter().map(|m| Transform::ToNumeric {
            column: m.to_string(),
        }));
        transforms.extend([
            Transform::Select {
                columns: std::iter::once(LABEL)
                    .chain(METRICS)
                    .map(str::to_string)
                    .collect(),
            },
            Transform::DropNulls {
                columns: METRICS.iter().map(|m| m.to_string()).collect(),
            },
            Transform::TruncateAtMarker {
                column: LABEL.into(),
                marker: TOTAL_MARKER.into(),
            },
        ]);
        transforms
    }

    fn report(&self, df: &DataFrame, _options: &PageOptions) -> Result<PageReport> {
        let mut report = PageReport::new(self.page(), self.title());
        if df.height() == 0 {
            report.push(Section::Notice {
                title: "Tidak ada data".to_string(),
                message: format!(
                    "No rows with all of {} above the first {} row",
                    METRICS.join(", "),
                    TOTAL_MARKER
                ),
            });
        }
        for metric in METRICS {
            let table = df.select([LABEL, metric])?;
            report.push(Section::Table(TableData::from_frame(
                &table_title(metric),
                &table,
            )?));
            let sums = sum_by(df, LABEL, metric)?;
            report.push(Section::Chart(ChartSpec::sum_bar(
                &chart_title(metric),
                "Kecamatan & Fasyankes",
                &sums,
            )));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::report_from_frame;
    use polars::prelude::*;

    fn recap() -> DataFrame {
        df!(
            CATEGORY => [Some("Kec A"), Some("Kec A"), Some("Kec B"), Some("TOTAL"), Some("Kec C")],
            FACILITY => [Some("PKM 1"), Some("PKM 2"), None, None, Some("PKM 3")],
            SUSPECTED => [Some(10.0), Some(4.0), None, Some(14.0), Some(1.0)],
            PREVENTIVE => [Some(1.0), Some(0.0), Some(2.0), Some(3.0), Some(1.0)],
            NOTIFIED_SOURCE => [Some(3.0), Some(1.0), Some(5.0), Some(9.0), Some(1.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_rows_before_total_with_metrics() {
        let report = report_from_frame(Page::Rekap, recap(), &PageOptions::default()).unwrap();
        let table = report.table(&table_title(SUSPECTED)).unwrap();
        assert_eq!(table.headers, vec![LABEL, SUSPECTED]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Kec A (PKM 1)".to_string(), "10".to_string()],
                vec!["Kec A (PKM 2)".to_string(), "4".to_string()]
            ]
        );

        let chart = report.chart(&chart_title(NOTIFIED)).unwrap();
        assert_eq!(chart.x_title.as_deref(), Some("Kecamatan & Fasyankes"));
        assert_eq!(chart.categories, vec!["Kec A (PKM 1)", "Kec A (PKM 2)"]);
        assert_eq!(chart.series[0].values, vec![3.0, 1.0]);
        assert_eq!(report.sections.len(), 6);
    }

    #[test]
    fn test_no_rows_gives_notice() {
        let df = df!(
            CATEGORY => ["TOTAL"],
            FACILITY => [None::<&str>],
            SUSPECTED => [1.0],
            PREVENTIVE => [1.0],
            NOTIFIED_SOURCE => [1.0]
        )
        .unwrap();
        let report = report_from_frame(Page::Rekap, df, &PageOptions::default()).unwrap();
        assert!(matches!(report.sections[0], Section::Notice { .. }));
        assert!(report.chart(&chart_title(SUSPECTED)).unwrap().is_empty());
    }
}
