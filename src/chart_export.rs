//! Chart export to PNG (plotters bitmap) and SVG (plotters svg backend).

use color_eyre::eyre::eyre;
use color_eyre::{Report, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::chart_data::{format_axis_label, ChartKind, ChartSpec};
use crate::cli::ChartFormat;

const FONT: &str = "sans-serif";
/// Categories past this count get vertical axis labels.
const ROTATE_LABELS_AFTER: usize = 8;

fn plot_err<E: std::fmt::Display>(e: E) -> Report {
    eyre!("Chart rendering failed: {}", e)
}

fn series_color(idx: usize) -> RGBColor {
    let (r, g, b) = Palette99::pick(idx).rgb();
    RGBColor(r, g, b)
}

/// `{out_dir}/{slug of title}.{ext}`
pub fn chart_path(out_dir: &Path, spec: &ChartSpec, format: ChartFormat) -> PathBuf {
    out_dir.join(format!("{}.{}", spec.file_stem(), format.extension()))
}

/// Render `spec` to `path` at `size` pixels.
pub fn write_chart(path: &Path, spec: &ChartSpec, format: ChartFormat, size: (u32, u32)) -> Result<()> {
    if spec.is_empty() {
        return Err(eyre!("No data to export for chart '{}'", spec.title));
    }
    match format {
        ChartFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_chart(&root, spec)?;
            root.present().map_err(plot_err)?;
        }
        ChartFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_chart(&root, spec)?;
            root.present().map_err(plot_err)?;
        }
    }
    tracing::info!(path = %path.display(), kind = spec.kind.as_str(), "wrote chart");
    Ok(())
}

fn draw_chart<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;
    match spec.kind {
        ChartKind::Pie => draw_pie(root, spec),
        _ => draw_cartesian(root, spec),
    }
}

fn draw_cartesian<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()> {
    let n = spec.categories.len();
    let y_max = match spec.value_max() {
        m if m > 0.0 => m * 1.1,
        _ => 1.0,
    };
    let rotate = n > ROTATE_LABELS_AFTER;
    let longest = spec.categories.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    let x_label_area = if rotate {
        (longest as u32 * 7 + 20).clamp(40, 220)
    } else {
        50
    };

    let mut chart = ChartBuilder::on(root)
        .caption(spec.title.as_str(), (FONT, 24))
        .margin(20)
        .x_label_area_size(x_label_area)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)
        .map_err(plot_err)?;

    let x_label_style = if rotate {
        (FONT, 12).into_font().transform(FontTransform::Rotate90)
    } else {
        (FONT, 12).into_font()
    };
    let format_x = |v: &f64| spec.category_at(*v).to_string();
    let format_y = |v: &f64| format_axis_label(*v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_style(x_label_style)
        .x_label_formatter(&format_x)
        .y_label_formatter(&format_y)
        .x_desc(spec.x_title.as_deref().unwrap_or(""))
        .y_desc(spec.y_title.as_deref().unwrap_or(""))
        .draw()
        .map_err(plot_err)?;

    let groups = spec.series.len().max(1) as f64;
    let slot = 0.8 / groups;
    for (idx, series) in spec.series.iter().enumerate() {
        let color = series_color(idx);
        match spec.kind {
            ChartKind::Line => {
                let points: Vec<(f64, f64)> = series
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i as f64, *v))
                    .collect();
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                    .map_err(plot_err)?;
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|&p| Circle::new(p, 4, color.filled())),
                    )
                    .map_err(plot_err)?;
            }
            ChartKind::Histogram => {
                chart
                    .draw_series(series.values.iter().enumerate().map(|(i, &v)| {
                        let x = i as f64;
                        Rectangle::new([(x - 0.5, 0.0), (x + 0.5, v)], color.filled())
                    }))
                    .map_err(plot_err)?;
            }
            ChartKind::Bar | ChartKind::GroupedBar | ChartKind::Pie => {
                let drawn = chart
                    .draw_series(series.values.iter().enumerate().map(|(i, &v)| {
                        let x0 = i as f64 - 0.4 + slot * idx as f64;
                        Rectangle::new([(x0, 0.0), (x0 + slot, v)], color.filled())
                    }))
                    .map_err(plot_err)?;
                if spec.kind == ChartKind::GroupedBar {
                    let label = match &spec.legend_title {
                        Some(legend) => format!("{}: {}", legend, series.name),
                        None => series.name.clone(),
                    };
                    drawn.label(label).legend(move |(x, y)| {
                        Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                    });
                }
            }
        }
    }

    if spec.kind == ChartKind::GroupedBar {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }
    Ok(())
}

fn draw_pie<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> Result<()> {
    let area = root.titled(spec.title.as_str(), (FONT, 24)).map_err(plot_err)?;
    let (w, h) = area.dim_in_pixel();
    let values = spec.series.first().map(|s| s.values.as_slice()).unwrap_or(&[]);
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        return Err(eyre!("No data to export for chart '{}'", spec.title));
    }

    let legend_width = (w / 3) as i32;
    let cx = ((w as i32 - legend_width) / 2).max(1);
    let cy = (h / 2) as i32;
    let radius = (cx.min(cy) as f64 * 0.85).max(1.0);

    let mut start = -std::f64::consts::FRAC_PI_2;
    for (idx, (label, &value)) in spec.categories.iter().zip(values).enumerate() {
        if value <= 0.0 {
            continue;
        }
        let sweep = value / total * std::f64::consts::TAU;
        let steps = ((sweep / 0.05).ceil() as usize).max(2);
        let mut points = vec![(cx, cy)];
        points.extend((0..=steps).map(|s| {
            let a = start + sweep * s as f64 / steps as f64;
            (
                cx + (radius * a.cos()).round() as i32,
                cy + (radius * a.sin()).round() as i32,
            )
        }));
        let color = series_color(idx);
        area.draw(&Polygon::new(points, color.filled()))
            .map_err(plot_err)?;

        let mid = start + sweep / 2.0;
        let text_at = (
            cx + (radius * 0.6 * mid.cos()) as i32,
            cy + (radius * 0.6 * mid.sin()) as i32,
        );
        let percent = format!("{:.1}%", value / total * 100.0);
        area.draw(&Text::new(percent, text_at, (FONT, 14).into_font()))
            .map_err(plot_err)?;

        let row = 30 + idx as i32 * 22;
        let lx = w as i32 - legend_width + 10;
        area.draw(&Rectangle::new([(lx, row), (lx + 14, row + 14)], color.filled()))
            .map_err(plot_err)?;
        area.draw(&Text::new(
            format!("{} ({})", label, format_axis_label(value)),
            (lx + 20, row),
            (FONT, 14).into_font(),
        ))
        .map_err(plot_err)?;
        start += sweep;
    }
    Ok(())
}
