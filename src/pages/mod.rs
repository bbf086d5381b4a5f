//! Dashboard pages: each one is a source format, a transform list and a
//! report built from the normalized table.

pub mod bridging;
pub mod kader;
pub mod rekap;

pub use bridging::Bridging;
pub use kader::Kader;
pub use rekap::Rekap;

use color_eyre::Result;
use polars::prelude::DataFrame;
use std::path::Path;

use crate::cli::{AgeParsing, MonthNames, Page};
use crate::normalize::{apply_all, Transform};
use crate::report::PageReport;
use crate::schema::SourceFormat;
use crate::source::load_workbook;

/// Per-run settings shared by all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub sheet: Option<String>,
    /// Overrides the page's header offset.
    pub header_rows: Option<usize>,
    pub age_parsing: AgeParsing,
    pub age_suffix: String,
    pub month_names: MonthNames,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_rows: None,
            age_parsing: AgeParsing::Strict,
            age_suffix: " Thn".to_string(),
            month_names: MonthNames::English,
        }
    }
}

pub trait DashboardPage {
    fn page(&self) -> Page;

    fn title(&self) -> &'static str;

    /// Columns the page reads, at the page's default header offset.
    fn source_format(&self, options: &PageOptions) -> SourceFormat;

    fn transforms(&self, options: &PageOptions) -> Vec<Transform>;

    fn report(&self, df: &DataFrame, options: &PageOptions) -> Result<PageReport>;
}

pub fn page_for(page: Page) -> Box<dyn DashboardPage> {
    match page {
        Page::Bridging => Box::new(Bridging),
        Page::Kader => Box::new(Kader),
        Page::Rekap => Box::new(Rekap),
    }
}

fn resolved_format(page: &dyn DashboardPage, options: &PageOptions) -> SourceFormat {
    let format = page.source_format(options).with_sheet(options.sheet.clone());
    match options.header_rows {
        Some(rows) => format.with_header_rows(rows),
        None => format,
    }
}

/// Normalize an already-loaded table and build the page report.
pub fn report_from_frame(page: Page, df: DataFrame, options: &PageOptions) -> Result<PageReport> {
    let dashboard = page_for(page);
    let df = apply_all(df, &dashboard.transforms(options))?;
    let report = dashboard.report(&df, options)?;
    tracing::info!(
        page = page.as_str(),
        rows = df.height(),
        sections = report.sections.len(),
        "built page report"
    );
    Ok(report)
}

/// Load `path`, normalize and build the page report.
pub fn build_report(page: Page, path: &Path, options: &PageOptions) -> Result<PageReport> {
    let dashboard = page_for(page);
    let format = resolved_format(dashboard.as_ref(), options);
    let df = load_workbook(path, &format)?;
    report_from_frame(page, df, options)
}
