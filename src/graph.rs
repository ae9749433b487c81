// Raster renderer: draws a RenderSpec to PNG with plotters

use crate::data::{Row, RowSource};
use crate::render::{ChartRenderer, EmbedOptions};
use crate::spec::{RenderSpec, TOOLTIP_FIELD};
use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use log::debug;
use plotters::prelude::*;
use serde_json::Value;
use std::ops::Range;

/// Number of equal-width bins for binned continuous axes
pub const BIN_COUNT: usize = 10;

/// Categorical palette shared by color groups
const CATEGORY10: [RGBColor; 10] = [
    RGBColor(0x4c, 0x78, 0xa8),
    RGBColor(0xf5, 0x85, 0x18),
    RGBColor(0xe4, 0x57, 0x56),
    RGBColor(0x72, 0xb7, 0xb2),
    RGBColor(0x54, 0xa2, 0x4b),
    RGBColor(0xee, 0xca, 0x3b),
    RGBColor(0xb2, 0x79, 0xa2),
    RGBColor(0xff, 0x9d, 0xa6),
    RGBColor(0x9d, 0x75, 0x5d),
    RGBColor(0xba, 0xb0, 0xac),
];

const MIN_RADIUS: f64 = 3.0;
const MAX_RADIUS: f64 = 12.0;

/// Look up a field in a row; `team.label` walks into nested objects
pub fn field_value<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(field) {
        return Some(value);
    }
    let mut parts = field.split('.');
    let first = row.get(parts.next()?)?;
    parts.try_fold(first, |value, key| value.get(key))
}

/// Display text for a cell
fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equal-width bins over a numeric domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bins {
    pub start: f64,
    pub step: f64,
}

impl Bins {
    pub fn over(min: f64, max: f64) -> Self {
        let span = max - min;
        let step = if span > 0.0 { span / BIN_COUNT as f64 } else { 1.0 };
        Self { start: min, step }
    }

    /// Midpoint of the bin holding `value`
    pub fn snap(&self, value: f64) -> f64 {
        let index = ((value - self.start) / self.step).floor();
        let index = index.clamp(0.0, (BIN_COUNT - 1) as f64);
        self.start + (index + 0.5) * self.step
    }

    fn end(&self) -> f64 {
        self.start + self.step * BIN_COUNT as f64
    }
}

/// How one positional channel maps values onto the canvas
#[derive(Debug, Clone, PartialEq)]
pub enum AxisScale {
    Continuous {
        min: f64,
        max: f64,
        bins: Option<Bins>,
    },
    Categorical(Vec<String>),
}

impl AxisScale {
    /// Continuous for numeric quantitative/temporal data, categorical otherwise
    pub fn fit(values: &[Option<&Value>], vega_type: &str, bin: bool) -> Self {
        let present: Vec<&Value> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| !v.is_null())
            .collect();
        let wants_continuous = matches!(vega_type, "quantitative" | "temporal");
        let numbers: Option<Vec<f64>> = present.iter().map(|v| v.as_f64()).collect();

        match numbers {
            Some(numbers) if wants_continuous && !numbers.is_empty() => {
                let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let bins = bin.then(|| Bins::over(min, max));
                AxisScale::Continuous { min, max, bins }
            }
            _ => {
                let mut labels: Vec<String> = Vec::new();
                for value in present {
                    let label = value_label(value);
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
                AxisScale::Categorical(labels)
            }
        }
    }

    /// Canvas coordinate of a cell, if it can be placed
    pub fn position(&self, value: &Value) -> Option<f64> {
        if value.is_null() {
            return None;
        }
        match self {
            AxisScale::Continuous { bins, .. } => {
                let v = value.as_f64()?;
                Some(bins.map_or(v, |b| b.snap(v)))
            }
            AxisScale::Categorical(labels) => {
                let label = value_label(value);
                labels.iter().position(|l| *l == label).map(|i| i as f64)
            }
        }
    }

    pub fn range(&self) -> Range<f64> {
        match self {
            AxisScale::Continuous {
                bins: Some(bins), ..
            } => pad_range(bins.start, bins.end()),
            AxisScale::Continuous { min, max, .. } => pad_range(*min, *max),
            AxisScale::Categorical(labels) => -0.5..(labels.len() as f64 - 0.5),
        }
    }

    fn tick_count(&self) -> usize {
        match self {
            AxisScale::Categorical(labels) => labels.len().max(1),
            AxisScale::Continuous { .. } => 10,
        }
    }

    fn tick_label(&self, coord: f64) -> String {
        match self {
            AxisScale::Categorical(labels) => {
                let index = coord.round();
                if (coord - index).abs() > 1e-6 || index < 0.0 {
                    return String::new();
                }
                labels.get(index as usize).cloned().unwrap_or_default()
            }
            AxisScale::Continuous { .. } => format!("{}", (coord * 100.0).round() / 100.0),
        }
    }

    fn is_categorical(&self) -> bool {
        matches!(self, AxisScale::Categorical(_))
    }
}

fn pad_range(min: f64, max: f64) -> Range<f64> {
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Mark {
    x: f64,
    y: f64,
    group: usize,
    radius: f64,
}

/// Rows resolved against a spec's encoding
struct Plot {
    kind: String,
    x_field: String,
    y_field: String,
    x_scale: AxisScale,
    y_scale: AxisScale,
    marks: Vec<Mark>,
}

impl Plot {
    fn build(spec: &RenderSpec, rows: &[Row]) -> Result<Self> {
        let x = &spec.encoding.x;
        let y = &spec.encoding.y;
        let x_values: Vec<Option<&Value>> = rows.iter().map(|r| field_value(r, &x.field)).collect();
        let y_values: Vec<Option<&Value>> = rows.iter().map(|r| field_value(r, &y.field)).collect();
        let x_scale = AxisScale::fit(&x_values, &x.type_, x.bin);
        let y_scale = AxisScale::fit(&y_values, &y.type_, y.bin);

        let color_labels: Vec<Option<String>> = match &spec.encoding.color {
            Some(color) => rows
                .iter()
                .map(|r| field_value(r, &color.field).map(value_label))
                .collect(),
            None => vec![None; rows.len()],
        };
        let mut groups: Vec<String> = Vec::new();

        let sizes: Vec<Option<f64>> = match &spec.encoding.size {
            Some(size) => rows
                .iter()
                .map(|r| field_value(r, &size.field).and_then(Value::as_f64))
                .collect(),
            None => vec![None; rows.len()],
        };
        let size_min = sizes.iter().flatten().cloned().fold(f64::INFINITY, f64::min);
        let size_max = sizes.iter().flatten().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mut marks = Vec::new();
        for i in 0..rows.len() {
            let (Some(xv), Some(yv)) = (x_values[i], y_values[i]) else {
                continue;
            };
            let (Some(px), Some(py)) = (x_scale.position(xv), y_scale.position(yv)) else {
                continue;
            };
            let group = match &color_labels[i] {
                Some(label) => match groups.iter().position(|g| g == label) {
                    Some(index) => index,
                    None => {
                        groups.push(label.clone());
                        groups.len() - 1
                    }
                },
                None => 0,
            };
            let radius = match sizes[i] {
                Some(s) if size_max > size_min => {
                    MIN_RADIUS + (MAX_RADIUS - MIN_RADIUS) * (s - size_min) / (size_max - size_min)
                }
                Some(_) => (MIN_RADIUS + MAX_RADIUS) / 2.0,
                None => MIN_RADIUS + 1.0,
            };
            marks.push(Mark {
                x: px,
                y: py,
                group,
                radius,
            });
        }

        if marks.is_empty() {
            bail!(
                "No plottable rows for fields '{}' and '{}'",
                x.field,
                y.field
            );
        }

        Ok(Self {
            kind: spec.mark.clone(),
            x_field: x.field.clone(),
            y_field: y.field.clone(),
            x_scale,
            y_scale,
            marks,
        })
    }

    fn bar_width(&self) -> f64 {
        match &self.x_scale {
            AxisScale::Categorical(_) => 0.8,
            AxisScale::Continuous {
                bins: Some(bins), ..
            } => bins.step * 0.9,
            AxisScale::Continuous { min, max, .. } => {
                let mut xs: Vec<f64> = self.marks.iter().map(|m| m.x).collect();
                xs.sort_by(f64::total_cmp);
                xs.dedup();
                let span = if max > min { max - min } else { 1.0 };
                span / xs.len().max(1) as f64 * 0.8
            }
        }
    }
}

/// Background and foreground for a named theme
fn theme_colors(theme: &str) -> (RGBColor, RGBColor) {
    match theme {
        "dark" => (RGBColor(0x33, 0x33, 0x33), WHITE),
        _ => (WHITE, RGBColor(0x44, 0x44, 0x44)),
    }
}

fn group_color(group: usize) -> RGBColor {
    CATEGORY10[group % CATEGORY10.len()]
}

/// Bytes in an RGB buffer, None when it does not fit in usize
fn buffer_len(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)?.checked_mul(3)
}

/// Draws the chart as PNG, fetching its rows through a RowSource
pub struct PngRenderer<S: RowSource> {
    source: S,
    width: u32,
    height: u32,
    surface: Option<Vec<u8>>,
}

impl<S: RowSource> PngRenderer<S> {
    pub fn new(source: S, width: u32, height: u32) -> Self {
        Self {
            source,
            width,
            height,
            surface: None,
        }
    }

    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.surface.take()
    }

    fn draw(&self, plot: &Plot, options: &EmbedOptions) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            bail!("Cannot draw a {}x{} image", self.width, self.height);
        }
        let (background, foreground) = theme_colors(&options.theme);
        let len = buffer_len(self.width, self.height)
            .with_context(|| format!("A {}x{} image is too large", self.width, self.height))?;
        let mut buffer = vec![0u8; len];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();
            root.fill(&background).context("Failed to fill background")?;

            let y_range = plot.y_scale.range();
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(plot.x_scale.range(), y_range.clone())
                .context("Failed to build chart")?;

            let x_formatter = |v: &f64| plot.x_scale.tick_label(*v);
            let y_formatter = |v: &f64| plot.y_scale.tick_label(*v);
            chart
                .configure_mesh()
                .x_labels(plot.x_scale.tick_count())
                .y_labels(plot.y_scale.tick_count())
                .x_label_formatter(&x_formatter)
                .y_label_formatter(&y_formatter)
                .x_desc(plot.x_field.as_str())
                .y_desc(plot.y_field.as_str())
                .axis_style(foreground)
                .label_style(("sans-serif", 12).into_font().color(&foreground))
                .axis_desc_style(("sans-serif", 14).into_font().color(&foreground))
                .draw()
                .context("Failed to draw mesh")?;

            match plot.kind.as_str() {
                "bar" => {
                    let half = plot.bar_width() / 2.0;
                    let baseline = if plot.y_scale.is_categorical() {
                        y_range.start
                    } else {
                        0.0_f64.clamp(y_range.start, y_range.end)
                    };
                    chart
                        .draw_series(plot.marks.iter().map(|m| {
                            Rectangle::new(
                                [(m.x - half, baseline), (m.x + half, m.y)],
                                group_color(m.group).mix(0.85).filled(),
                            )
                        }))
                        .context("Failed to draw bars")?;
                }
                "line" => {
                    let group_count = plot.marks.iter().map(|m| m.group + 1).max().unwrap_or(0);
                    for group in 0..group_count {
                        let mut points: Vec<(f64, f64)> = plot
                            .marks
                            .iter()
                            .filter(|m| m.group == group)
                            .map(|m| (m.x, m.y))
                            .collect();
                        points.sort_by(|a, b| a.0.total_cmp(&b.0));
                        chart
                            .draw_series(LineSeries::new(
                                points,
                                group_color(group).stroke_width(2),
                            ))
                            .context("Failed to draw line series")?;
                    }
                }
                _ => {
                    chart
                        .draw_series(plot.marks.iter().map(|m| {
                            Circle::new(
                                (m.x, m.y),
                                m.radius.round() as i32,
                                group_color(m.group).mix(0.7).filled(),
                            )
                        }))
                        .context("Failed to draw points")?;
                }
            }

            root.present().context("Failed to present drawing")?;
        }

        let mut png_bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png_bytes)
            .write_image(&buffer, self.width, self.height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
        Ok(png_bytes)
    }
}

impl<S: RowSource> ChartRenderer for PngRenderer<S> {
    fn render(&mut self, spec: &RenderSpec, options: &EmbedOptions) -> Result<()> {
        let rows = self
            .source
            .fetch_rows(&spec.data.url)
            .with_context(|| format!("Failed to fetch rows from {}", spec.data.url))?;
        if options.tooltip && spec.encoding.tooltip.is_some() {
            debug!("Raster output has no hover, dropping {}", TOOLTIP_FIELD);
        }
        let plot = Plot::build(spec, &rows)?;
        self.surface = Some(self.draw(&plot, options)?);
        Ok(())
    }
}
