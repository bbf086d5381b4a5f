//! Shared CLI definitions for tbdash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};

/// Dashboard page to build from the workbook.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum Page {
    /// SITB vs SITK bridging reconciliation (IK status per week)
    #[value(alias = "sitb-sitk")]
    Bridging,
    /// Case finding by community health workers (Kader)
    Kader,
    /// District/facility recapitulation of TB case counts
    #[value(alias = "rekapitulasi")]
    Rekap,
}

impl Page {
    pub const ALL: [Self; 3] = [Self::Bridging, Self::Kader, Self::Rekap];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bridging => "bridging",
            Self::Kader => "kader",
            Self::Rekap => "rekap",
        }
    }
}

/// Image format for exported charts.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ChartFormat {
    /// Portable Network Graphics (bitmap)
    Png,
    /// Scalable Vector Graphics
    Svg,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// How unit-suffixed age values (e.g. "34 Thn") are parsed.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum AgeParsing {
    /// Every non-empty value must end with the configured suffix
    Strict,
    /// Strip any trailing non-digit characters before parsing
    Lenient,
}

/// Language used for month names in titles and file names.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MonthNames {
    English,
    Indonesian,
}

/// Command-line arguments for tbdash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tbdash",
    version,
    about = "Tuberculosis surveillance dashboards in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Dashboard page to build (bridging, kader, rekap)
    #[arg(value_enum, required_unless_present = "generate_config", value_name = "PAGE")]
    pub page: Option<Page>,

    /// Path to the .xlsx workbook exported from SITB / the Kader register / the recap report
    #[arg(required_unless_present = "generate_config", value_name = "PATH")]
    pub path: Option<std::path::PathBuf>,

    /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sheet1")
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Number of rows above the header row. Defaults per page: bridging 0, kader 6, rekap 9
    #[arg(long = "header-rows", value_name = "N")]
    pub header_rows: Option<usize>,

    /// Directory for exported charts and the download workbook (default: current directory)
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<std::path::PathBuf>,

    /// Image format for exported charts
    #[arg(long = "chart-format", value_enum)]
    pub chart_format: Option<ChartFormat>,

    /// Width in pixels of exported charts
    #[arg(long = "chart-width", value_name = "PX")]
    pub chart_width: Option<u32>,

    /// Height in pixels of exported charts
    #[arg(long = "chart-height", value_name = "PX")]
    pub chart_height: Option<u32>,

    /// Age parsing policy for unit-suffixed ages (kader page)
    #[arg(long = "age-parsing", value_enum)]
    pub age_parsing: Option<AgeParsing>,

    /// Month name language used in chart titles and the download file name
    #[arg(long = "month-names", value_enum)]
    pub month_names: Option<MonthNames>,

    /// Run the page without the terminal UI: print tables, write charts and the download, then exit
    #[arg(long = "export-only", action)]
    pub export_only: bool,

    /// Enable debug logging
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/tbdash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let value_names = || -> String {
            arg.get_value_names()
                .map(|names| {
                    names
                        .iter()
                        .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default()
        };

        let option_str = if arg.is_positional() {
            let placeholder = value_names();
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_names()
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
