//! Case finding by community health workers (kader).

use color_eyre::Result;
use polars::prelude::DataFrame;

use super::bridging::age_histogram;
use super::{DashboardPage, PageOptions};
use crate::aggregate::{pivot_counts, value_counts};
use crate::bucket::AGE_BIN_WIDTH;
use crate::chart_data::ChartSpec;
use crate::cli::Page;
use crate::normalize::Transform;
use crate::report::{PageReport, Section, TableData};
use crate::schema::{ColumnSpec, ColumnType, SourceFormat};

pub const SPUTUM_DATE: &str = "Tanggal Hasil Pemeriksaan Dahak";
pub const PATIENT_TYPE: &str = "Tipe Pasien";
pub const KADER: &str = "Kader";
pub const AGE: &str = "Usia";
pub const GENDER: &str = "Jenis Kelamin";
pub const DISTRICT: &str = "Kecamatan";
pub const OUTCOME: &str = "Hasil Pengobatan";

pub const MONTH: &str = "Bulan";
pub const AGE_GROUP: &str = "Kelompok Usia";

pub const HEADER_ROWS: usize = 6;
pub const TOTAL_LABEL: &str = "Total Kasus";

pub const PATIENT_TYPE_TITLE: &str = "Distribusi Tipe Pasien";
pub const PIVOT_TITLE: &str = "Jumlah Kasus per Kader berdasarkan Tipe Pasien";
pub const PERFORMANCE_TITLE: &str = "Performance by Kader";
pub const MONTHLY_TITLE: &str = "Monthly TB Case Trends";
pub const AGE_TITLE: &str = "Distribusi Usia Pasien";
pub const GENDER_TITLE: &str = "Distribusi Pasien TB Berdasarkan Gender";
pub const DISTRICT_TITLE: &str = "Distribusi Kasus Per Kecamatan";
pub const OUTCOME_TITLE: &str = "Hasil Pengobatan";

pub struct Kader;

impl DashboardPage for Kader {
    fn page(&self) -> Page {
        Page::Kader
    }

    fn title(&self) -> &'static str {
        "Analisis Data Temuan Kasus TB oleh Kader"
    }

    fn source_format(&self, _options: &PageOptions) -> SourceFormat {
        SourceFormat::new(
            HEADER_ROWS,
            vec![
                ColumnSpec::new(SPUTUM_DATE, ColumnType::Date),
                ColumnSpec::new(PATIENT_TYPE, ColumnType::Text),
                ColumnSpec::new(KADER, ColumnType::Text),
                ColumnSpec::new(AGE, ColumnType::Text),
                ColumnSpec::new(GENDER, ColumnType::Text),
                ColumnSpec::new(DISTRICT, ColumnType::Text),
                ColumnSpec::new(OUTCOME, ColumnType::Text),
            ],
        )
    }

    fn transforms(&self, options: &PageOptions) -> Vec<Transform> {
        vec![
            Transform::ParseDate {
                column: SPUTUM_DATE.into(),
            },
            Transform::MonthStart {
                from: SPUTUM_DATE.into(),
                into: MONTH.into(),
            },
            Transform::StripSuffixInt {
                column: AGE.into(),
                suffix: options.age_suffix.clone(),
                policy: options.age_parsing,
            },
            Transform::Bucket {
                from: AGE.into(),
                into: AGE_GROUP.into(),
                width: AGE_BIN_WIDTH,
            },
        ]
    }

    fn report(&self, df: &DataFrame, _options: &PageOptions) -> Result<PageReport> {
        let mut report = PageReport::new(self.page(), self.title());

        let patient_types = value_counts(df, PATIENT_TYPE)?;
        report.push(Section::Table(TableData::from_counts(
            PATIENT_TYPE_TITLE,
            PATIENT_TYPE,
            "Jumlah",
            &patient_types,
        )));

        let pivot = pivot_counts(df, KADER, PATIENT_TYPE, TOTAL_LABEL)?;
        report.push(Section::Table(TableData::from_pivot(PIVOT_TITLE, &pivot)));

        let per_kader = value_counts(df, KADER)?.sorted_by_key();
        report.push(Section::Chart(ChartSpec::bar(
            PERFORMANCE_TITLE,
            KADER,
            "Jumlah Kasus",
            &per_kader,
        )));

        // Month starts render as YYYY-MM-DD; the day is always 01.
        let monthly = value_counts(df, MONTH)?
            .sorted_by_key()
            .map_labels(|k| k.get(..7).unwrap_or(k).to_string());
        report.push(Section::Chart(ChartSpec::line(
            MONTHLY_TITLE,
            MONTH,
            "Jumlah Kasus",
            &monthly,
        )));

        let ages = age_histogram(df, AGE, AGE_GROUP)?;
        report.push(Section::Chart(ChartSpec::histogram(
            AGE_TITLE,
            AGE_GROUP,
            "Jumlah Pasien",
            &ages,
        )));

        let genders = value_counts(df, GENDER)?;
        report.push(Section::Chart(ChartSpec::pie(GENDER_TITLE, &genders)));

        let districts = value_counts(df, DISTRICT)?;
        report.push(Section::Chart(ChartSpec::bar(
            DISTRICT_TITLE,
            DISTRICT,
            "Jumlah Kasus",
            &districts,
        )));

        let outcomes = value_counts(df, OUTCOME)?;
        report.push(Section::Chart(ChartSpec::pie(OUTCOME_TITLE, &outcomes)));

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AgeParsing;
    use crate::pages::report_from_frame;
    use crate::schema::MalformedInputError;
    use polars::prelude::*;

    fn register(ages: &[&str]) -> DataFrame {
        let n = ages.len();
        let cycle = |opts: &[&'static str]| -> Vec<&'static str> {
            (0..n).map(|i| opts[i % opts.len()]).collect()
        };
        df!(
            SPUTUM_DATE => cycle(&["2024-01-15", "2024-02-03", "2024-01-20"]),
            PATIENT_TYPE => cycle(&["Baru", "Kambuh"]),
            KADER => cycle(&["Siti", "Ani", "Budi"]),
            AGE => ages.to_vec(),
            GENDER => cycle(&["P", "L"]),
            DISTRICT => cycle(&["Kota"]),
            OUTCOME => cycle(&["Sembuh", "Pengobatan Lengkap"])
        )
        .unwrap()
    }

    #[test]
    fn test_kader_sections() {
        let df = register(&["34 Thn", "7 Thn", "61 Thn", "45 Thn"]);
        let report = report_from_frame(Page::Kader, df, &PageOptions::default()).unwrap();

        let titles: Vec<&str> = report.sections.iter().map(|s| s.title()).collect();
        assert_eq!(
            titles,
            vec![
                PATIENT_TYPE_TITLE,
                PIVOT_TITLE,
                PERFORMANCE_TITLE,
                MONTHLY_TITLE,
                AGE_TITLE,
                GENDER_TITLE,
                DISTRICT_TITLE,
                OUTCOME_TITLE
            ]
        );

        let pivot = report.table(PIVOT_TITLE).unwrap();
        assert_eq!(pivot.headers, vec![KADER, "Baru", "Kambuh", TOTAL_LABEL]);
        assert_eq!(pivot.rows[0], vec!["Ani", "0", "1", "1"]);
        assert_eq!(pivot.rows[2], vec!["Siti", "1", "1", "2"]);

        let performance = report.chart(PERFORMANCE_TITLE).unwrap();
        assert_eq!(performance.categories, vec!["Ani", "Budi", "Siti"]);
        assert_eq!(performance.series[0].values, vec![1.0, 1.0, 2.0]);

        let monthly = report.chart(MONTHLY_TITLE).unwrap();
        assert_eq!(monthly.categories, vec!["2024-01", "2024-02"]);
        assert_eq!(monthly.series[0].values, vec![3.0, 1.0]);

        let ages = report.chart(AGE_TITLE).unwrap();
        assert_eq!(ages.categories.len(), 7);
        assert_eq!(ages.series[0].values.iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn test_age_without_suffix_fails_strict() {
        let df = register(&["34 Thn", "12"]);
        let err = report_from_frame(Page::Kader, df, &PageOptions::default()).unwrap_err();
        let err = err.downcast_ref::<MalformedInputError>().unwrap();
        assert!(matches!(err, MalformedInputError::MissingSuffix { row: 2, .. }));
    }

    #[test]
    fn test_age_without_suffix_lenient() {
        let df = register(&["34 Thn", "12"]);
        let options = PageOptions {
            age_parsing: AgeParsing::Lenient,
            ..PageOptions::default()
        };
        let report = report_from_frame(Page::Kader, df, &options).unwrap();
        let ages = report.chart(AGE_TITLE).unwrap();
        assert_eq!(ages.categories, vec!["0-9", "10-19", "20-29", "30-39"]);
        assert_eq!(ages.series[0].values, vec![0.0, 1.0, 0.0, 1.0]);
    }
}
