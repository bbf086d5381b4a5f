use clap::ValueEnum;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::{AgeParsing, ChartFormat, MonthNames, Page};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read `config.toml` from this directory. A missing file is the default config.
    pub fn load_config(&self) -> Result<AppConfig> {
        let config_path = self.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        AppConfig::from_toml(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub output: OutputConfig,
    pub pages: PagesConfig,
    pub display: DisplayConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    pub chart_format: String,
    pub chart_width: u32,
    pub chart_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub age_parsing: String,
    pub age_suffix: String,
    pub bridging_header_rows: usize,
    pub kader_header_rows: usize,
    pub rekap_header_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub month_names: String,
    pub table_row_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            output: OutputConfig::default(),
            pages: PagesConfig::default(),
            display: DisplayConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            chart_format: "png".to_string(),
            chart_width: 1000,
            chart_height: 600,
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            age_parsing: "strict".to_string(),
            age_suffix: " Thn".to_string(),
            bridging_header_rows: 0,
            kader_header_rows: 6,
            rekap_header_rows: 9,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            month_names: "english".to_string(),
            table_row_limit: 500,
        }
    }
}

fn parse_choice<T: ValueEnum>(value: &str, field: &str) -> Result<T> {
    T::from_str(value, true).map_err(|_| {
        let choices: Vec<String> = T::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|p| format!("'{}'", p.get_name()))
            .collect();
        eyre!(
            "Invalid {}: {}. Must be one of {}",
            field,
            value,
            choices.join(", ")
        )
    })
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        let user_config = ConfigManager::new(app_name)?.load_config()?;
        config.merge(user_config);

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.output.merge(other.output);
        self.pages.merge(other.pages);
        self.display.merge(other.display);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.output.chart_width == 0 || self.output.chart_height == 0 {
            return Err(eyre!("chart_width and chart_height must be greater than 0"));
        }

        if self.display.table_row_limit == 0 {
            return Err(eyre!("table_row_limit must be greater than 0"));
        }

        self.output.chart_format()?;
        self.pages.age_parsing()?;
        self.display.month_names()?;

        Ok(())
    }
}

impl OutputConfig {
    pub fn merge(&mut self, other: Self) {
        let default = OutputConfig::default();
        if other.dir.is_some() {
            self.dir = other.dir;
        }
        if other.chart_format != default.chart_format {
            self.chart_format = other.chart_format;
        }
        if other.chart_width != default.chart_width {
            self.chart_width = other.chart_width;
        }
        if other.chart_height != default.chart_height {
            self.chart_height = other.chart_height;
        }
    }

    pub fn chart_format(&self) -> Result<ChartFormat> {
        parse_choice(&self.chart_format, "chart_format")
    }
}

impl PagesConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PagesConfig::default();
        if other.age_parsing != default.age_parsing {
            self.age_parsing = other.age_parsing;
        }
        if other.age_suffix != default.age_suffix {
            self.age_suffix = other.age_suffix;
        }
        if other.bridging_header_rows != default.bridging_header_rows {
            self.bridging_header_rows = other.bridging_header_rows;
        }
        if other.kader_header_rows != default.kader_header_rows {
            self.kader_header_rows = other.kader_header_rows;
        }
        if other.rekap_header_rows != default.rekap_header_rows {
            self.rekap_header_rows = other.rekap_header_rows;
        }
    }

    pub fn age_parsing(&self) -> Result<AgeParsing> {
        parse_choice(&self.age_parsing, "age_parsing")
    }

    pub fn header_rows(&self, page: Page) -> usize {
        match page {
            Page::Bridging => self.bridging_header_rows,
            Page::Kader => self.kader_header_rows,
            Page::Rekap => self.rekap_header_rows,
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.month_names != default.month_names {
            self.month_names = other.month_names;
        }
        if other.table_row_limit != default.table_row_limit {
            self.table_row_limit = other.table_row_limit;
        }
    }

    pub fn month_names(&self) -> Result<MonthNames> {
        parse_choice(&self.month_names, "month_names")
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
        if other.log_file.is_some() {
            self.log_file = other.log_file;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses_to_default_config() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_parse_choice_is_case_insensitive() {
        let format: ChartFormat = parse_choice("SVG", "chart_format").unwrap();
        assert_eq!(format, ChartFormat::Svg);
        let err = parse_choice::<ChartFormat>("gif", "chart_format").unwrap_err();
        assert!(err.to_string().contains("'png', 'svg'"));
    }

    #[test]
    fn test_header_rows_per_page() {
        let pages = PagesConfig::default();
        assert_eq!(pages.header_rows(Page::Bridging), 0);
        assert_eq!(pages.header_rows(Page::Kader), 6);
        assert_eq!(pages.header_rows(Page::Rekap), 9);
    }
}
