#[cfg(test)]
mod tests;

use std::f64::consts::PI;
use std::fmt::Write as _;

use super::{ChartImage, ChartKind, ChartRenderer, ChartSpec};
use crate::{AskDbError, Result};

pub const SVG_MIME_TYPE: &str = "image/svg+xml";

const PALETTE: [&str; 8] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
];
const BAR_FILL: &str = "#87ceeb";
const LINE_STROKE: &str = "#1f4e9c";
const SCATTER_FILL: &str = "#d62728";
const Y_TICKS: usize = 5;

/// Plain SVG output with no rendering dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
        }
    }
}

struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

impl SvgRenderer {
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(200),
            height: height.max(150),
        }
    }

    fn plot_area(&self) -> PlotArea {
        let left = 80.0;
        let top = 60.0;
        PlotArea {
            left,
            top,
            width: f64::from(self.width) - left - 30.0,
            height: f64::from(self.height) - top - 110.0,
        }
    }

    fn render_svg(&self, spec: &ChartSpec) -> Result<String> {
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = self.width,
            h = self.height
        );
        let _ = write!(
            svg,
            r#"<rect width="{}" height="{}" fill="white"/>"#,
            self.width, self.height
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="32" text-anchor="middle" font-size="20" font-weight="bold">{}</text>"#,
            f64::from(self.width) / 2.0,
            escape(&spec.title)
        );

        match spec.kind {
            ChartKind::Pie => self.draw_pie(&mut svg, spec)?,
            ChartKind::Bar | ChartKind::Line | ChartKind::Scatter => {
                self.draw_axes_chart(&mut svg, spec);
            }
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    fn draw_axes_chart(&self, svg: &mut String, spec: &ChartSpec) {
        let area = self.plot_area();
        let (min, max) = value_range(&spec.values);
        let scale_y = |v: f64| area.bottom() - (v - min) / (max - min) * area.height;

        // Gridlines and y tick labels
        for tick in 0..=Y_TICKS {
            let value = min + (max - min) * tick as f64 / Y_TICKS as f64;
            let y = scale_y(value);
            let _ = write!(
                svg,
                r##"<line x1="{l}" y1="{y:.2}" x2="{r}" y2="{y:.2}" stroke="#e0e0e0"/><text x="{tx}" y="{ty:.2}" text-anchor="end" font-size="11">{label}</text>"##,
                l = area.left,
                r = area.left + area.width,
                tx = area.left - 6.0,
                ty = y + 4.0,
                label = format_tick(value)
            );
        }

        let _ = write!(
            svg,
            r#"<line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="black"/><line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/>"#,
            l = area.left,
            t = area.top,
            b = area.bottom(),
            r = area.left + area.width
        );

        let count = spec.values.len().max(1);
        let band = area.width / count as f64;
        let center = |i: usize| area.left + band * (i as f64 + 0.5);
        let baseline = scale_y(0.0_f64.clamp(min, max));

        match spec.kind {
            ChartKind::Bar => {
                for (i, value) in spec.values.iter().enumerate() {
                    let y = scale_y(*value);
                    let _ = write!(
                        svg,
                        r#"<rect x="{x:.2}" y="{top:.2}" width="{w:.2}" height="{h:.2}" fill="{BAR_FILL}" stroke="black"/>"#,
                        x = center(i) - band * 0.35,
                        top = y.min(baseline),
                        w = band * 0.7,
                        h = (baseline - y).abs()
                    );
                }
            }
            ChartKind::Line => {
                let points: Vec<String> = spec
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("{:.2},{:.2}", center(i), scale_y(*v)))
                    .collect();
                let _ = write!(
                    svg,
                    r#"<polyline points="{}" fill="none" stroke="{LINE_STROKE}" stroke-width="2"/>"#,
                    points.join(" ")
                );
                for (i, value) in spec.values.iter().enumerate() {
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{LINE_STROKE}"/>"#,
                        center(i),
                        scale_y(*value)
                    );
                }
            }
            ChartKind::Scatter => {
                for (i, value) in spec.values.iter().enumerate() {
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.2}" cy="{:.2}" r="5" fill="{SCATTER_FILL}" fill-opacity="0.6"/>"#,
                        center(i),
                        scale_y(*value)
                    );
                }
            }
            ChartKind::Pie => {}
        }

        // x labels, rotated like the axis labels of a dense category axis
        for (i, label) in spec.labels.iter().enumerate() {
            let x = center(i);
            let y = area.bottom() + 14.0;
            let _ = write!(
                svg,
                r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" font-size="11" transform="rotate(-45 {x:.2} {y:.2})">{}</text>"#,
                escape(label)
            );
        }

        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">{}</text>"#,
            area.left + area.width / 2.0,
            f64::from(self.height) - 12.0,
            escape(&spec.x_label)
        );
        let _ = write!(
            svg,
            r#"<text x="20" y="{y}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {y})">{}</text>"#,
            escape(&spec.y_label),
            y = area.top + area.height / 2.0
        );
    }

    fn draw_pie(&self, svg: &mut String, spec: &ChartSpec) -> Result<()> {
        if spec.values.iter().any(|v| *v < 0.0) {
            return Err(AskDbError::InvalidChartData(format!(
                "pie charts cannot show negative values in {}",
                spec.y_label
            )));
        }
        let total: f64 = spec.values.iter().sum();
        if total <= 0.0 {
            return Err(AskDbError::InvalidChartData(format!(
                "pie chart values in {} sum to zero",
                spec.y_label
            )));
        }

        let cx = f64::from(self.width) / 2.0;
        let cy = (f64::from(self.height) + 40.0) / 2.0;
        let radius = (f64::from(self.width).min(f64::from(self.height) - 40.0) / 2.0 - 60.0).max(20.0);

        let mut angle = -PI / 2.0;
        for (i, (value, label)) in spec.values.iter().zip(&spec.labels).enumerate() {
            let fraction = value / total;
            let color = PALETTE[i % PALETTE.len()];

            if fraction >= 1.0 {
                let _ = write!(
                    svg,
                    r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{radius:.2}" fill="{color}" stroke="white"/>"#
                );
            } else if fraction > 0.0 {
                let end = angle + fraction * 2.0 * PI;
                let large_arc = u8::from(fraction > 0.5);
                let _ = write!(
                    svg,
                    r#"<path d="M {cx:.2} {cy:.2} L {x1:.2} {y1:.2} A {radius:.2} {radius:.2} 0 {large_arc} 1 {x2:.2} {y2:.2} Z" fill="{color}" stroke="white"/>"#,
                    x1 = radius.mul_add(angle.cos(), cx),
                    y1 = radius.mul_add(angle.sin(), cy),
                    x2 = radius.mul_add(end.cos(), cx),
                    y2 = radius.mul_add(end.sin(), cy),
                );
            }

            let middle = fraction.mul_add(PI, angle);
            let label_radius = radius + 24.0;
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="12">{} ({:.1}%)</text>"#,
                label_radius.mul_add(middle.cos(), cx),
                label_radius.mul_add(middle.sin(), cy),
                escape(label),
                fraction * 100.0
            );

            angle += fraction * 2.0 * PI;
        }

        Ok(())
    }
}

impl ChartRenderer for SvgRenderer {
    fn render(&self, spec: &ChartSpec) -> Result<ChartImage> {
        let svg = self.render_svg(spec)?;
        Ok(ChartImage {
            mime_type: SVG_MIME_TYPE.to_string(),
            bytes: svg.into_bytes(),
        })
    }
}

/// Axis range always containing zero and never degenerate
fn value_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(0.0_f64, f64::min);
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if (max - min).abs() < f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

fn format_tick(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
