//! SITB vs SITK bridging reconciliation.

use chrono::Datelike;
use color_eyre::Result;
use polars::prelude::DataFrame;

use super::{DashboardPage, PageOptions};
use crate::aggregate::{bucket_counts, duplicate_rows, group_counts, value_counts, CountTable};
use crate::bucket::{BucketDefinition, AGE_BIN_WIDTH};
use crate::chart_data::ChartSpec;
use crate::cli::{MonthNames, Page};
use crate::export::{download_file_name, Download};
use crate::normalize::{date_values, filter_rows, int_values, month_name, string_values, Transform};
use crate::report::{PageReport, Section, TableData};
use crate::schema::{ColumnSpec, ColumnType, SourceFormat};

pub const DIAGNOSIS_DATE: &str = "tgl_hasil_diagnosis";
pub const SITK: &str = "SITK";
pub const AGE: &str = "umur";
pub const DISTRICT: &str = "person_kecamatan";
pub const GENDER: &str = "jenis_kelamin_id";

pub const MONTH_NAME: &str = "nama_bulan";
pub const WEEK: &str = "Week of Month";
pub const IK_STATUS: &str = "IK_status";
pub const AGE_GROUP: &str = "age_group";

pub const DONE: &str = "Sudah IK";
pub const PENDING: &str = "Belum IK";

pub const DUPLICATES_TITLE: &str = "Data Duplikat";
pub const PENDING_TITLE: &str = "Data yang Belum Melakukan IK";
pub const PENDING_SHEET: &str = "Data Belum IK";
pub const AGE_TITLE: &str = "Distribusi Umur Pasien";
pub const DISTRICT_TITLE: &str = "Jumlah Kasus per Kecamatan";
pub const GENDER_TITLE: &str = "Distribusi Jenis Kelamin Pasien";

pub struct Bridging;

/// Month name of the first dated row, `unknown` when no row has a date.
pub fn report_month(df: &DataFrame, names: MonthNames) -> Result<String> {
    Ok(date_values(df, DIAGNOSIS_DATE)?
        .into_iter()
        .flatten()
        .next()
        .map(|d| month_name(d.month(), names).to_string())
        .unwrap_or_else(|| "unknown".to_string()))
}

pub fn traffic_title(month: &str) -> String {
    format!("Trafik Data Hasil Bridging Bulan {}", month)
}

/// Age histogram over `[0, max age]`, empty when no row has an age.
pub(crate) fn age_histogram(df: &DataFrame, age: &str, group: &str) -> Result<CountTable> {
    match int_values(df, age)?.into_iter().flatten().max() {
        Some(max) => {
            let buckets = BucketDefinition::age_groups(max)?;
            bucket_counts(df, group, buckets.labels())
        }
        None => Ok(CountTable {
            key: group.to_string(),
            entries: Vec::new(),
        }),
    }
}

impl DashboardPage for Bridging {
    fn page(&self) -> Page {
        Page::Bridging
    }

    fn title(&self) -> &'static str {
        "Analisis Data Bridging IK dan Non-IK"
    }

    fn source_format(&self, _options: &PageOptions) -> SourceFormat {
        SourceFormat::new(
            0,
            vec![
                ColumnSpec::new(DIAGNOSIS_DATE, ColumnType::Date),
                ColumnSpec::new(SITK, ColumnType::Text),
                ColumnSpec::new(AGE, ColumnType::Integer),
                ColumnSpec::new(DISTRICT, ColumnType::Text),
                ColumnSpec::new(GENDER, ColumnType::Text),
            ],
        )
    }

    fn transforms(&self, options: &PageOptions) -> Vec<Transform> {
        vec![
            Transform::ParseDate {
                column: DIAGNOSIS_DATE.into(),
            },
            Transform::MonthName {
                from: DIAGNOSIS_DATE.into(),
                into: MONTH_NAME.into(),
                names: options.month_names,
            },
            Transform::WeekOfMonth {
                from: DIAGNOSIS_DATE.into(),
                into: WEEK.into(),
            },
            Transform::StatusFlag {
                source: SITK.into(),
                into: IK_STATUS.into(),
                complete: DONE.into(),
                pending: PENDING.into(),
            },
            Transform::Bucket {
                from: AGE.into(),
                into: AGE_GROUP.into(),
                width: AGE_BIN_WIDTH,
            },
        ]
    }

    fn report(&self, df: &DataFrame, options: &PageOptions) -> Result<PageReport> {
        let month = report_month(df, options.month_names)?;
        let mut report = PageReport::new(self.page(), self.title());

        let weeks = BucketDefinition::week_of_month().labels().to_vec();
        let weekly = group_counts(df, WEEK, IK_STATUS)?;
        report.push(Section::Chart(ChartSpec::grouped_bar(
            &traffic_title(&month),
            "Minggu Ke-",
            "Jumlah Kasus",
            "Status IK",
            &weekly,
            &weeks,
        )));

        let duplicates = duplicate_rows(df)?;
        if duplicates.height() > 0 {
            tracing::warn!(rows = duplicates.height(), "workbook has duplicate rows");
            report.push(Section::Table(TableData::from_frame(
                DUPLICATES_TITLE,
                &duplicates,
            )?));
        }

        let mask: Vec<bool> = string_values(df, IK_STATUS)?
            .iter()
            .map(|s| s.as_deref() == Some(PENDING))
            .collect();
        let pending = filter_rows(df, &mask)?.drop(AGE_GROUP)?;
        if pending.height() > 0 {
            report.push(Section::Table(TableData::from_frame(PENDING_TITLE, &pending)?));
            report.download = Some(Download {
                file_name: download_file_name(&month),
                sheet_name: PENDING_SHEET.to_string(),
                rows: pending,
            });
        }

        let ages = age_histogram(df, AGE, AGE_GROUP)?;
        report.push(Section::Chart(ChartSpec::histogram(
            AGE_TITLE,
            "Kelompok Umur",
            "Jumlah Pasien",
            &ages,
        )));

        let districts = value_counts(df, DISTRICT)?;
        report.push(Section::Chart(ChartSpec::bar(
            DISTRICT_TITLE,
            "Kecamatan",
            "Jumlah Kasus",
            &districts,
        )));

        let genders = value_counts(df, GENDER)?;
        report.push(Section::Chart(ChartSpec::pie(GENDER_TITLE, &genders)));

        Ok(report)
    }
}
