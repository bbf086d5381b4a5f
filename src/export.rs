//! Spreadsheet download: a filtered table written back as `.xlsx`.

use chrono::Datelike;
use color_eyre::Result;
use polars::prelude::*;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::Path;

use crate::normalize::{date_values, string_values};

/// A table offered back to the user as a workbook.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub sheet_name: String,
    pub rows: DataFrame,
}

/// `data_belum_ik_{month}.xlsx`
pub fn download_file_name(month: &str) -> String {
    format!("data_belum_ik_{}.xlsx", month)
}

/// Write `df` to a single-sheet workbook at `path`. Null cells are left blank.
pub fn write_xlsx(path: &Path, sheet_name: &str, df: &DataFrame) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let col = u16::try_from(col_idx)?;
        let name = column.name().as_str();
        worksheet.write_string_with_format(0, col, name, &header)?;

        let dtype = column.dtype();
        if dtype.is_integer() || dtype.is_float() {
            let values = column.as_materialized_series().cast(&DataType::Float64)?;
            for (row, value) in values.f64()?.into_iter().enumerate() {
                if let Some(value) = value {
                    worksheet.write_number(u32::try_from(row + 1)?, col, value)?;
                }
            }
        } else if dtype == &DataType::Boolean {
            for (row, value) in column.as_materialized_series().bool()?.into_iter().enumerate() {
                if let Some(value) = value {
                    worksheet.write_boolean(u32::try_from(row + 1)?, col, value)?;
                }
            }
        } else if dtype == &DataType::Date {
            for (row, value) in date_values(df, name)?.into_iter().enumerate() {
                if let Some(d) = value {
                    let cell = ExcelDateTime::from_ymd(
                        u16::try_from(d.year())?,
                        d.month() as u8,
                        d.day() as u8,
                    )?;
                    worksheet.write_datetime_with_format(u32::try_from(row + 1)?, col, &cell, &date)?;
                }
            }
        } else {
            for (row, value) in string_values(df, name)?.into_iter().enumerate() {
                if let Some(value) = value {
                    worksheet.write_string(u32::try_from(row + 1)?, col, value)?;
                }
            }
        }
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), rows = df.height(), sheet = sheet_name, "wrote workbook");
    Ok(())
}

impl Download {
    /// Write into `out_dir` under the download's file name.
    pub fn write_to(&self, out_dir: &Path) -> Result<std::path::PathBuf> {
        std::fs::create_dir_all(out_dir)?;
        let path = out_dir.join(&self.file_name);
        write_xlsx(&path, &self.sheet_name, &self.rows)?;
        Ok(path)
    }
}
