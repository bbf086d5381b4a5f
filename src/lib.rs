use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

pub mod aggregate;
pub mod bucket;
pub mod chart_data;
pub mod chart_export;
pub mod cli;
pub mod config;
pub mod error_display;
pub mod export;
pub mod logging;
pub mod normalize;
pub mod pages;
pub mod report;
pub mod schema;
pub mod source;
pub mod widgets;

pub use cli::{AgeParsing, Args, ChartFormat, MonthNames, Page};
pub use config::{AppConfig, ConfigManager};
pub use error_display::user_message;
pub use pages::{build_report, PageOptions};
pub use report::{PageReport, Section};

use widgets::controls::Controls;
use widgets::debug::DebugState;
use widgets::report::{SectionList, SectionView};

/// Application name used for config, cache and log directories.
pub const APP_NAME: &str = "tbdash";

const PAGE_SCROLL: usize = 10;

/// Everything needed to build and export one page.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    pub page: Page,
    pub page_options: PageOptions,
    pub out_dir: PathBuf,
    pub chart_format: ChartFormat,
    pub chart_size: (u32, u32),
    /// Rows shown per table, on screen and on stdout.
    pub table_row_limit: usize,
}

impl OpenOptions {
    pub fn new(page: Page) -> Self {
        let config = AppConfig::default();
        Self {
            page,
            page_options: PageOptions::default(),
            out_dir: PathBuf::from("."),
            chart_format: ChartFormat::Png,
            chart_size: (config.output.chart_width, config.output.chart_height),
            table_row_limit: config.display.table_row_limit,
        }
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    /// Create OpenOptions from CLI args and config, with CLI args taking precedence
    pub fn from_args_and_config(args: &cli::Args, config: &AppConfig) -> Result<Self> {
        let page = args
            .page
            .ok_or_else(|| eyre!("A page is required (bridging, kader or rekap)"))?;

        let page_options = PageOptions {
            sheet: args.sheet.clone(),
            header_rows: Some(
                args.header_rows
                    .unwrap_or_else(|| config.pages.header_rows(page)),
            ),
            age_parsing: match args.age_parsing {
                Some(policy) => policy,
                None => config.pages.age_parsing()?,
            },
            age_suffix: config.pages.age_suffix.clone(),
            month_names: match args.month_names {
                Some(names) => names,
                None => config.display.month_names()?,
            },
        };

        let chart_format = match args.chart_format {
            Some(format) => format,
            None => config.output.chart_format()?,
        };
        let chart_size = (
            args.chart_width.unwrap_or(config.output.chart_width),
            args.chart_height.unwrap_or(config.output.chart_height),
        );
        if chart_size.0 == 0 || chart_size.1 == 0 {
            return Err(eyre!("Chart width and height must be greater than 0"));
        }

        let out_dir = args
            .out_dir
            .clone()
            .or_else(|| config.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            page,
            page_options,
            out_dir,
            chart_format,
            chart_size,
            table_row_limit: config.display.table_row_limit,
        })
    }
}

impl TryFrom<&cli::Args> for OpenOptions {
    type Error = color_eyre::Report;

    fn try_from(args: &cli::Args) -> Result<Self> {
        // Use default config if creating from args alone
        Self::from_args_and_config(args, &AppConfig::default())
    }
}

/// Headless run: print every table to `out`, then write charts and the download.
///
/// Returns the user-facing message on failure. Only errors from reading the
/// workbook are prefixed with the workbook path.
pub fn export_only<W: std::io::Write>(
    path: &Path,
    opts: &OpenOptions,
    out: &mut W,
) -> std::result::Result<(), String> {
    let report = build_report(opts.page, path, &opts.page_options).map_err(|e| {
        tracing::debug!(error = ?e, "load failed");
        user_message(&e, Some(path))
    })?;
    write_report_outputs(&report, opts, out).map_err(|e| {
        tracing::debug!(error = ?e, "export failed");
        user_message(&e, None)
    })
}

fn write_report_outputs<W: std::io::Write>(
    report: &PageReport,
    opts: &OpenOptions,
    out: &mut W,
) -> Result<()> {
    write!(out, "{}", report.render_text(opts.table_row_limit))?;
    let charts = report.export_charts(&opts.out_dir, opts.chart_format, opts.chart_size)?;
    for chart in &charts {
        writeln!(out, "Wrote {}", chart.display())?;
    }
    if let Some(download) = report.write_download(&opts.out_dir)? {
        writeln!(out, "Wrote {}", download.display())?;
    }
    Ok(())
}

pub enum AppEvent {
    Key(KeyEvent),
    Open(PathBuf, OpenOptions),
    DoLoad(PathBuf, OpenOptions), // Internal event to actually perform loading after UI update
    ExportCharts,
    WriteDownload,
    Exit,
    Resize(u16, u16), // resized (width, height)
}

#[derive(Default)]
pub struct ErrorModal {
    pub active: bool,
    pub message: String,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, message: String) {
        self.active = true;
        self.message = message;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.message.clear();
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadingState {
    #[default]
    Idle,
    Loading {
        file_path: PathBuf,
        page: Page,
    },
}

impl LoadingState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadingState::Loading { .. })
    }
}

pub struct App {
    events: Sender<AppEvent>,
    path: Option<PathBuf>,
    options: Option<OpenOptions>,
    report: Option<PageReport>,
    selected: usize,
    scroll: usize,
    status: Option<String>,
    debug: DebugState,
    error_modal: ErrorModal,
    loading_state: LoadingState,
}

impl App {
    pub fn new(events: Sender<AppEvent>) -> App {
        App {
            events,
            path: None,
            options: None,
            report: None,
            selected: 0,
            scroll: 0,
            status: None,
            debug: DebugState::default(),
            error_modal: ErrorModal::new(),
            loading_state: LoadingState::Idle,
        }
    }

    pub fn send_event(&mut self, event: AppEvent) -> Result<()> {
        self.events.send(event)?;
        Ok(())
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn report(&self) -> Option<&PageReport> {
        self.report.as_ref()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_modal
            .active
            .then_some(self.error_modal.message.as_str())
    }

    pub fn loading_state(&self) -> &LoadingState {
        &self.loading_state
    }

    fn selected_section(&self) -> Option<&Section> {
        self.report.as_ref()?.sections.get(self.selected)
    }

    fn section_count(&self) -> usize {
        self.report.as_ref().map(|r| r.sections.len()).unwrap_or(0)
    }

    /// Last row index a table section can scroll to.
    fn max_scroll(&self) -> usize {
        let limit = self
            .options
            .as_ref()
            .map(|o| o.table_row_limit)
            .unwrap_or(usize::MAX);
        match self.selected_section() {
            Some(Section::Table(table)) => table.rows.len().min(limit).saturating_sub(1),
            _ => 0,
        }
    }

    fn select(&mut self, idx: usize) {
        if idx != self.selected {
            self.selected = idx;
            self.scroll = 0;
        }
    }

    /// `path` is the workbook when the error came from loading it.
    fn show_error(&mut self, err: &color_eyre::Report, path: Option<&Path>) {
        tracing::error!(error = ?err, "operation failed");
        let message = user_message(err, path);
        self.error_modal.show(message);
    }

    fn load(&mut self, path: &Path, options: &OpenOptions) -> Result<()> {
        let report = build_report(options.page, path, &options.page_options)?;
        self.report = Some(report);
        self.selected = 0;
        self.scroll = 0;
        Ok(())
    }

    fn export_charts(&self) -> Result<String> {
        let (Some(report), Some(options)) = (&self.report, &self.options) else {
            return Ok("Nothing loaded".to_string());
        };
        let written = report.export_charts(&options.out_dir, options.chart_format, options.chart_size)?;
        Ok(format!(
            "Wrote {} charts to {}",
            written.len(),
            options.out_dir.display()
        ))
    }

    fn write_download(&self) -> Result<String> {
        let (Some(report), Some(options)) = (&self.report, &self.options) else {
            return Ok("Nothing loaded".to_string());
        };
        Ok(match report.write_download(&options.out_dir)? {
            Some(path) => format!("Wrote {}", path.display()),
            None => "This page has no download".to_string(),
        })
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);

        // Handle error modal first - it has highest priority
        if self.error_modal.active {
            match event.code {
                KeyCode::Esc | KeyCode::Enter => {
                    self.error_modal.hide();
                }
                _ => {}
            }
            return None;
        }

        if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppEvent::Exit);
        }

        let sections = self.section_count();
        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(AppEvent::Exit),
            KeyCode::Down | KeyCode::Char('j') => {
                if sections > 0 {
                    self.select((self.selected + 1).min(sections - 1));
                }
                self.debug.last_action = "select_next".to_string();
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select(self.selected.saturating_sub(1));
                self.debug.last_action = "select_previous".to_string();
                None
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.select(0);
                None
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.select(sections.saturating_sub(1));
                None
            }
            KeyCode::PageDown => {
                self.scroll = (self.scroll + PAGE_SCROLL).min(self.max_scroll());
                self.debug.last_action = "scroll_down".to_string();
                None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(PAGE_SCROLL);
                self.debug.last_action = "scroll_up".to_string();
                None
            }
            KeyCode::Char('e') if self.report.is_some() => {
                self.debug.last_action = "export_charts".to_string();
                Some(AppEvent::ExportCharts)
            }
            KeyCode::Char('d') if self.report.is_some() => {
                self.debug.last_action = "write_download".to_string();
                Some(AppEvent::WriteDownload)
            }
            _ => None,
        }
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Open(path, options) => {
                // Set loading state first, then trigger a render before actually loading
                self.path = Some(path.clone());
                self.options = Some(options.clone());
                self.loading_state = LoadingState::Loading {
                    file_path: path.clone(),
                    page: options.page,
                };
                Some(AppEvent::DoLoad(path.clone(), options.clone()))
            }
            AppEvent::DoLoad(path, options) => {
                let result = self.load(path, options);
                self.loading_state = LoadingState::Idle;
                match result {
                    Ok(()) => {
                        self.status = Some(format!("Loaded {}", path.display()));
                    }
                    Err(e) => self.show_error(&e, Some(path.as_path())),
                }
                None
            }
            AppEvent::ExportCharts => {
                match self.export_charts() {
                    Ok(status) => self.status = Some(status),
                    Err(e) => self.show_error(&e, None),
                }
                None
            }
            AppEvent::WriteDownload => {
                match self.write_download() {
                    Ok(status) => self.status = Some(status),
                    Err(e) => self.show_error(&e, None),
                }
                None
            }
            AppEvent::Exit | AppEvent::Resize(_, _) => None,
        }
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        let mut constraints = vec![
            Constraint::Length(1), // Title
            Constraint::Fill(1),
            Constraint::Length(1), // Controls
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let title = match (&self.report, &self.path) {
            (Some(report), Some(path)) => format!(" {}  |  {}", report.title, path.display()),
            (Some(report), None) => format!(" {}", report.title),
            (None, Some(path)) => format!(" {}", path.display()),
            _ => format!(" {}", APP_NAME),
        };
        Paragraph::new(title)
            .style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .render(layout[0], buf);

        let main_area = layout[1];
        if let LoadingState::Loading { file_path, page } = &self.loading_state {
            Paragraph::new(format!(
                "Loading {} page from {}...",
                page.as_str(),
                file_path.display()
            ))
            .centered()
            .block(Block::default().borders(Borders::ALL))
            .render(main_area, buf);
        } else if let Some(report) = &self.report {
            let row_limit = self
                .options
                .as_ref()
                .map(|o| o.table_row_limit)
                .unwrap_or(usize::MAX);
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(44), Constraint::Fill(1)])
                .split(main_area);
            SectionList::new(&report.sections, self.selected).render(chunks[0], buf);
            match report.sections.get(self.selected) {
                Some(section) => SectionView::new(section, self.scroll)
                    .with_row_limit(row_limit)
                    .render(chunks[1], buf),
                None => Paragraph::new("This page has no sections")
                    .centered()
                    .block(Block::default().borders(Borders::ALL))
                    .render(chunks[1], buf),
            }
        } else {
            Block::default().borders(Borders::ALL).render(main_area, buf);
        }

        let controls = Controls::new()
            .with_status(self.status.clone())
            .with_dimmed(self.error_modal.active)
            .with_download_available(
                self.report
                    .as_ref()
                    .is_some_and(|r| r.download.is_some()),
            );
        (&controls).render(layout[2], buf);

        if self.debug.enabled {
            (&self.debug).render(layout[3], buf);
        }

        // Render error modal (has highest priority, shows on top of everything)
        if self.error_modal.active {
            let popup_area = centered_rect(area, 70, 40);
            Clear.render(popup_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .border_style(Style::default().fg(Color::Red));
            let inner_area = block.inner(popup_area);
            block.render(popup_area, buf);

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(0),    // Message (takes available space)
                    Constraint::Length(3), // OK button
                ])
                .split(inner_area);

            Paragraph::new(self.error_modal.message.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true })
                .render(chunks[0], buf);

            Paragraph::new("[ OK ]")
                .centered()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .render(chunks[1], buf);
        }
    }
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::sync::mpsc::channel;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app_with_report() -> App {
        let (tx, _rx) = channel();
        let mut app = App::new(tx);
        let mut report = PageReport::new(Page::Rekap, "Analisis Data TB");
        report.push(Section::Table(report::TableData {
            title: "Data Terduga TB".into(),
            headers: vec!["Nama".into(), "n".into()],
            rows: (0..25).map(|i| vec![format!("PKM {}", i), i.to_string()]).collect(),
        }));
        report.push(Section::Notice {
            title: "Catatan".into(),
            message: "-".into(),
        });
        app.report = Some(report);
        app
    }

    #[test]
    fn test_options_cli_overrides_config() {
        let args = Args::try_parse_from([
            "tbdash",
            "kader",
            "data.xlsx",
            "--chart-format",
            "svg",
            "--header-rows",
            "3",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        config.output.chart_width = 800;
        config.display.month_names = "indonesian".into();

        let opts = OpenOptions::from_args_and_config(&args, &config).unwrap();
        assert_eq!(opts.page, Page::Kader);
        assert_eq!(opts.chart_format, ChartFormat::Svg);
        assert_eq!(opts.chart_size, (800, 600));
        assert_eq!(opts.page_options.header_rows, Some(3));
        assert_eq!(opts.page_options.month_names, MonthNames::Indonesian);
        assert_eq!(opts.out_dir, PathBuf::from("."));
    }

    #[test]
    fn test_options_use_config_header_rows() {
        let args = Args::try_parse_from(["tbdash", "rekap", "data.xlsx"]).unwrap();
        let opts = OpenOptions::try_from(&args).unwrap();
        assert_eq!(opts.page_options.header_rows, Some(9));
        assert_eq!(opts.page_options.age_parsing, AgeParsing::Strict);
    }

    #[test]
    fn test_section_navigation_resets_scroll() {
        let mut app = app_with_report();
        assert!(app.event(&key(KeyCode::PageDown)).is_none());
        assert_eq!(app.scroll(), 10);
        app.event(&key(KeyCode::PageDown));
        app.event(&key(KeyCode::PageDown));
        assert_eq!(app.scroll(), 24);

        app.event(&key(KeyCode::Char('j')));
        assert_eq!(app.selected(), 1);
        assert_eq!(app.scroll(), 0);
        app.event(&key(KeyCode::Char('j')));
        assert_eq!(app.selected(), 1);
        app.event(&key(KeyCode::Up));
        assert_eq!(app.selected(), 0);
    }

    #[test]
    fn test_quit_and_action_keys() {
        let mut app = app_with_report();
        assert!(matches!(app.event(&key(KeyCode::Char('q'))), Some(AppEvent::Exit)));
        assert!(matches!(
            app.event(&key(KeyCode::Char('e'))),
            Some(AppEvent::ExportCharts)
        ));
        assert!(matches!(
            app.event(&key(KeyCode::Char('d'))),
            Some(AppEvent::WriteDownload)
        ));
        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(matches!(app.event(&ctrl_c), Some(AppEvent::Exit)));
    }

    #[test]
    fn test_load_failure_shows_error_modal() {
        let (tx, _rx) = channel();
        let mut app = App::new(tx);
        let path = PathBuf::from("/nonexistent/tbdash/data.xlsx");
        let next = app.event(&AppEvent::Open(path.clone(), OpenOptions::new(Page::Bridging)));
        assert!(app.loading_state().is_loading());
        let next = next.unwrap();
        assert!(app.event(&next).is_none());
        assert_eq!(app.loading_state(), &LoadingState::Idle);
        let message = app.error_message().unwrap().to_string();
        assert!(
            message.starts_with("Failed to load /nonexistent/tbdash/data.xlsx: File or directory not found."),
            "got: {}",
            message
        );

        // Keys are swallowed until the modal is dismissed
        assert!(app.event(&key(KeyCode::Char('q'))).is_none());
        app.event(&key(KeyCode::Enter));
        assert!(app.error_message().is_none());
        assert!(matches!(app.event(&key(KeyCode::Char('q'))), Some(AppEvent::Exit)));
    }

    #[test]
    fn test_render_shows_sections() {
        let mut app = app_with_report();
        let area = Rect::new(0, 0, 100, 20);
        let mut buf = Buffer::empty(area);
        (&mut app).render(area, &mut buf);
        let text: String = (0..area.height)
            .flat_map(|y| (0..area.width).map(move |x| (x, y)))
            .map(|(x, y)| buf[(x, y)].symbol().to_string())
            .collect();
        assert!(text.contains("Analisis Data TB"));
        assert!(text.contains("Data Terduga TB"));
        assert!(text.contains("PKM 0"));
    }
}
