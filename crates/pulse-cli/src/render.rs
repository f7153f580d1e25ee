use anyhow::Result;
use plotters::prelude::*;
use pulse_lib::plot::{Figure, PlotBackend, Series};
use std::path::{Path, PathBuf};

const LIVE_SIZE: (u32, u32) = (1400, 800);
const SNAPSHOT_SIZE: (u32, u32) = (4200, 2400);
const SNAPSHOT_BACKGROUND: RGBColor = RGBColor(252, 252, 252);

/// Draws the live figure to a PNG that is rewritten on every refresh.
pub struct PngBackend {
    live_path: PathBuf,
}

impl PngBackend {
    pub fn new(live_path: impl Into<PathBuf>) -> Self {
        Self {
            live_path: live_path.into(),
        }
    }
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        draw_plotters_figure(&self.live_path, fig, LIVE_SIZE, WHITE, 1)
    }

    fn export(&mut self, fig: &Figure, path: &Path) -> Result<()> {
        draw_plotters_figure(path, fig, SNAPSHOT_SIZE, SNAPSHOT_BACKGROUND, 3)
    }
}

fn draw_plotters_figure(
    path: &Path,
    fig: &Figure,
    size: (u32, u32),
    background: RGBColor,
    scale: u32,
) -> Result<()> {
    let backend = BitMapBackend::new(path, size);
    let root = backend.into_drawing_area();
    root.fill(&background)?;
    let (x_min, x_max) = axis_range(fig.x.range, fig, |p| p[0]);
    let (y_min, y_max) = axis_range(fig.y.range, fig, |p| p[1]);
    let mut chart = ChartBuilder::on(&root)
        .margin(10 * scale)
        .caption(
            fig.title.clone().unwrap_or_default(),
            ("sans-serif", 24 * scale),
        )
        .x_label_area_size(40 * scale)
        .y_label_area_size(70 * scale)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .label_style(("sans-serif", 16 * scale))
        .draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let color = RGBColor(r, g, b);
                let width = (line.style.width.round() as u32).max(1) * scale;
                chart
                    .draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        color.stroke_width(width),
                    ))?
                    .label(line.name.clone())
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width))
                    });
            }
            Series::Scatter(scatter) => {
                let (r, g, b) = scatter.color.rgb();
                let color = RGBColor(r, g, b);
                let radius = scatter.marker_size * scale / 2;
                chart
                    .draw_series(
                        scatter
                            .points
                            .iter()
                            .map(|p| Circle::new((p[0], p[1]), radius, color.filled())),
                    )?
                    .label(scatter.name.clone())
                    .legend(move |(x, y)| Circle::new((x + 10, y), radius, color.filled()));
            }
        }
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16 * scale))
        .draw()?;
    root.present()?;
    Ok(())
}

/// Use the figure's range when set, otherwise fit all points; never return an empty span.
fn axis_range(range: Option<[f64; 2]>, fig: &Figure, pick: fn(&[f64; 2]) -> f64) -> (f64, f64) {
    let (lo, hi) = match range {
        Some([lo, hi]) => (lo, hi),
        None => fig
            .series
            .iter()
            .flat_map(|s| s.points().iter().map(pick))
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            }),
    };
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}
