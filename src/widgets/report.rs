//! Terminal rendering of page report sections.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType, List,
        ListItem, ListState, Paragraph, Row, StatefulWidget, Table, Widget, Wrap,
    },
};

use crate::chart_data::{format_axis_label, ChartKind, ChartSpec};
use crate::report::{Section, TableData};

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];
const MAX_COLUMN_WIDTH: usize = 40;

fn series_color(idx: usize) -> Color {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

/// Left-hand list of section titles.
pub struct SectionList<'a> {
    sections: &'a [Section],
    selected: usize,
}

impl<'a> SectionList<'a> {
    pub fn new(sections: &'a [Section], selected: usize) -> Self {
        Self { sections, selected }
    }
}

impl Widget for SectionList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let items: Vec<ListItem> = self
            .sections
            .iter()
            .map(|s| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<11} ", s.kind_label()),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(s.title().to_string()),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title("Sections"),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default().with_selected(Some(self.selected));
        StatefulWidget::render(list, area, buf, &mut state);
    }
}

/// Body of the selected section.
pub struct SectionView<'a> {
    section: &'a Section,
    scroll: usize,
    row_limit: usize,
}

impl<'a> SectionView<'a> {
    pub fn new(section: &'a Section, scroll: usize) -> Self {
        Self {
            section,
            scroll,
            row_limit: usize::MAX,
        }
    }

    /// Table sections show at most `limit` rows.
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = limit;
        self
    }
}

impl Widget for SectionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.section.title().to_string());
        match self.section {
            Section::Table(table) => {
                render_table(table, self.scroll, self.row_limit, block, area, buf)
            }
            Section::Chart(spec) if spec.is_empty() => {
                Paragraph::new("No data for this chart")
                    .style(Style::default().fg(Color::DarkGray))
                    .centered()
                    .block(block)
                    .render(area, buf);
            }
            Section::Chart(spec) => match spec.kind {
                ChartKind::Line => render_line(spec, block, area, buf),
                ChartKind::Pie => render_pie(spec, block, area, buf),
                ChartKind::Bar | ChartKind::Histogram | ChartKind::GroupedBar => {
                    render_bars(spec, block, area, buf)
                }
            },
            Section::Notice { message, .. } => {
                Paragraph::new(message.as_str())
                    .wrap(Wrap { trim: true })
                    .block(block)
                    .render(area, buf);
            }
        }
    }
}

fn render_table(
    table: &TableData,
    scroll: usize,
    limit: usize,
    block: Block,
    area: Rect,
    buf: &mut Buffer,
) {
    let widths: Vec<Constraint> = table
        .column_widths()
        .into_iter()
        .map(|w| Constraint::Length(w.min(MAX_COLUMN_WIDTH) as u16))
        .collect();
    let header = Row::new(table.headers.iter().map(|h| Cell::from(h.as_str())))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let shown = table.rows.len().min(limit);
    let rows = table
        .rows
        .iter()
        .take(shown)
        .skip(scroll)
        .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));
    let footer = if shown < table.rows.len() {
        format!(" row {} of {} (first {} shown) ", (scroll + 1).min(shown), table.rows.len(), shown)
    } else {
        format!(" row {} of {} ", (scroll + 1).min(shown), shown)
    };
    let block = block.title_bottom(Line::from(footer));
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(block);
    Widget::render(table, area, buf);
}

fn legend(spec: &ChartSpec) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(title) = &spec.legend_title {
        spans.push(Span::raw(format!(" {}: ", title)));
    }
    for (idx, series) in spec.series.iter().enumerate() {
        spans.push(Span::styled("■ ", Style::default().fg(series_color(idx))));
        spans.push(Span::raw(format!("{} ", series.name)));
    }
    Line::from(spans)
}

fn render_bars(spec: &ChartSpec, block: Block, area: Rect, buf: &mut Buffer) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let per_group = spec.series.len().max(1);
    let total_bars = spec.categories.len() * per_group + spec.categories.len();
    let bar_width = (inner_width / total_bars.max(1)).saturating_sub(1).clamp(1, 12) as u16;
    let max = spec.value_max().ceil() as u64;

    let mut block = block;
    if let Some(x_title) = &spec.x_title {
        block = block.title_bottom(Line::from(format!(" {} ", x_title)));
    }
    if spec.kind == ChartKind::GroupedBar {
        block = block.title_bottom(legend(spec).right_aligned());
    }

    let mut chart = BarChart::default()
        .block(block)
        .bar_width(bar_width)
        .bar_gap(if spec.kind == ChartKind::Histogram { 0 } else { 1 })
        .group_gap(1)
        .max(max.max(1));

    if spec.kind == ChartKind::GroupedBar {
        for (i, category) in spec.categories.iter().enumerate() {
            let bars: Vec<Bar> = spec
                .series
                .iter()
                .enumerate()
                .map(|(si, s)| {
                    let v = s.values.get(i).copied().unwrap_or(0.0);
                    Bar::default()
                        .value(v.max(0.0).round() as u64)
                        .style(Style::default().fg(series_color(si)))
                })
                .collect();
            chart = chart.data(BarGroup::default().label(Line::from(category.clone())).bars(&bars));
        }
    } else {
        let values = spec.series.first().map(|s| s.values.as_slice()).unwrap_or(&[]);
        let bars: Vec<Bar> = spec
            .categories
            .iter()
            .zip(values)
            .map(|(c, v)| {
                Bar::default()
                    .value(v.max(0.0).round() as u64)
                    .label(Line::from(c.clone()))
                    .style(Style::default().fg(series_color(0)))
            })
            .collect();
        chart = chart.data(BarGroup::default().bars(&bars));
    }
    chart.render(area, buf);
}

fn render_pie(spec: &ChartSpec, block: Block, area: Rect, buf: &mut Buffer) {
    let values = spec.series.first().map(|s| s.values.as_slice()).unwrap_or(&[]);
    let total: f64 = values.iter().sum();
    let bars: Vec<Bar> = spec
        .categories
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (c, v))| {
            let share = if total > 0.0 { v / total * 100.0 } else { 0.0 };
            Bar::default()
                .value(v.max(0.0).round() as u64)
                .label(Line::from(c.clone()))
                .text_value(format!("{} ({:.1}%)", format_axis_label(*v), share))
                .style(Style::default().fg(series_color(i)))
        })
        .collect();
    BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars))
        .render(area, buf);
}

fn render_line(spec: &ChartSpec, block: Block, area: Rect, buf: &mut Buffer) {
    let points: Vec<Vec<(f64, f64)>> = spec
        .series
        .iter()
        .map(|s| s.values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect())
        .collect();
    let datasets: Vec<Dataset> = spec
        .series
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(idx, (s, data))| {
            Dataset::default()
                .name(s.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(idx)))
                .data(data)
        })
        .collect();

    let n = spec.categories.len();
    let x_max = (n.saturating_sub(1) as f64).max(1.0);
    let x_labels: Vec<String> = match n {
        0 => vec![],
        1 => vec![spec.categories[0].clone()],
        _ => vec![
            spec.categories[0].clone(),
            spec.category_at(((n - 1) / 2) as f64).to_string(),
            spec.categories[n - 1].clone(),
        ],
    };
    let y_max = match spec.value_max() {
        m if m > 0.0 => m * 1.1,
        _ => 1.0,
    };
    let y_labels = vec![
        format_axis_label(0.0),
        format_axis_label(y_max / 2.0),
        format_axis_label(y_max),
    ];

    let x_axis = Axis::default()
        .title(spec.x_title.clone().unwrap_or_default())
        .bounds([0.0, x_max])
        .labels(x_labels);
    let y_axis = Axis::default()
        .title(spec.y_title.clone().unwrap_or_default())
        .bounds([0.0, y_max])
        .labels(y_labels);

    Chart::new(datasets)
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis)
        .legend_position(None)
        .render(area, buf);
}
