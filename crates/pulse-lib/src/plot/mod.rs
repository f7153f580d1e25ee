use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    /// Visible `[min, max]`; `None` lets the backend fit the data.
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub marker_size: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Scatter(ScatterSeries),
}

impl Series {
    pub fn name(&self) -> &str {
        match self {
            Series::Line(line) => &line.name,
            Series::Scatter(scatter) => &scatter.name,
        }
    }

    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Scatter(scatter) => &scatter.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    /// Replace the series with the same name, or append it.
    pub fn upsert_series(&mut self, series: Series) {
        match self.series.iter_mut().find(|s| s.name() == series.name()) {
            Some(slot) => *slot = series,
            None => self.series.push(series),
        }
    }

    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name() == name)
    }
}

pub trait PlotBackend {
    /// Redraw the live view.
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
    /// Write a standalone image of the figure.
    fn export(&mut self, fig: &Figure, path: &Path) -> anyhow::Result<()>;
}

/// Where each cycle's waveform, peaks, and rate end up.
pub trait RenderSink {
    fn set_waveform(&mut self, timestamps: &[f64], amplitudes: &[f64]);
    fn set_peak_markers(&mut self, timestamps: &[f64], amplitudes: &[f64]);
    fn set_title(&mut self, text: &str);
    fn refresh(&mut self) -> anyhow::Result<()>;
    fn save_snapshot(&mut self, path: &Path) -> anyhow::Result<()>;
}

pub const WAVEFORM_SERIES: &str = "Smoothed Data";
pub const PEAK_SERIES: &str = "Gradient Peaks";

/// Keeps one persistent figure and hands it to a backend on refresh.
pub struct FigureSink<B> {
    figure: Figure,
    backend: B,
    max_points: usize,
}

impl<B: PlotBackend> FigureSink<B> {
    pub fn new(backend: B) -> Self {
        let mut figure = Figure::new(None::<String>);
        figure.x.label = Some("Time [s]".into());
        figure.y.label = Some("Amplitude".into());
        Self {
            figure,
            backend,
            max_points: 4096,
        }
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points.max(1);
        self
    }

    pub fn figure(&self) -> &Figure {
        &self.figure
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: PlotBackend> RenderSink for FigureSink<B> {
    fn set_waveform(&mut self, timestamps: &[f64], amplitudes: &[f64]) {
        let points = zip_points(timestamps, amplitudes);
        if let Some((lo, hi)) = bounds(timestamps) {
            self.figure.x.range = Some([lo, hi]);
        }
        if let Some((lo, hi)) = bounds(amplitudes) {
            self.figure.y.range = Some(update_y_range(self.figure.y.range, lo, hi));
        }
        self.figure.upsert_series(Series::Line(LineSeries {
            name: WAVEFORM_SERIES.into(),
            points: decimate_points(&points, self.max_points),
            style: Style {
                width: 4.0,
                dash: None,
                color: Color(0xE24A33),
            },
        }));
    }

    fn set_peak_markers(&mut self, timestamps: &[f64], amplitudes: &[f64]) {
        self.figure.upsert_series(Series::Scatter(ScatterSeries {
            name: PEAK_SERIES.into(),
            points: zip_points(timestamps, amplitudes),
            marker_size: 10,
            color: Color(0x000000),
        }));
    }

    fn set_title(&mut self, text: &str) {
        self.figure.title = Some(text.to_string());
    }

    fn refresh(&mut self) -> anyhow::Result<()> {
        self.backend.draw(&self.figure)
    }

    fn save_snapshot(&mut self, path: &Path) -> anyhow::Result<()> {
        self.backend.export(&self.figure, path)
    }
}

/// Keep the y range unless the data escapes it or sits far above its lower edge.
pub fn update_y_range(current: Option<[f64; 2]>, data_min: f64, data_max: f64) -> [f64; 2] {
    match current {
        Some([lo, hi]) if lo >= 0.95 * data_min && data_max <= hi && data_min >= lo => [lo, hi],
        _ => [data_min, data_max],
    }
}

fn zip_points(xs: &[f64], ys: &[f64]) -> Vec<[f64; 2]> {
    xs.iter().zip(ys).map(|(&x, &y)| [x, y]).collect()
}

fn bounds(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Headless backend that remembers what it was asked to draw.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub last: Option<Figure>,
    pub draws: usize,
    pub exports: Vec<PathBuf>,
}

impl PlotBackend for MemoryBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()> {
        self.last = Some(fig.clone());
        self.draws += 1;
        Ok(())
    }

    fn export(&mut self, fig: &Figure, path: &Path) -> anyhow::Result<()> {
        self.last = Some(fig.clone());
        self.exports.push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn y_range_is_sticky_until_data_escapes() {
        let first = update_y_range(None, 100.0, 200.0);
        assert_eq!(first, [100.0, 200.0]);
        assert_eq!(update_y_range(Some(first), 104.0, 190.0), first);
        assert_eq!(update_y_range(Some(first), 90.0, 190.0), [90.0, 190.0]);
        assert_eq!(update_y_range(Some(first), 101.0, 210.0), [101.0, 210.0]);
        // Lower edge far below the data.
        assert_eq!(update_y_range(Some(first), 150.0, 190.0), [150.0, 190.0]);
    }

    #[test]
    fn sink_replaces_series_each_cycle() {
        let mut sink = FigureSink::new(MemoryBackend::default());
        sink.set_waveform(&[0.0, 1.0], &[5.0, 6.0]);
        sink.set_waveform(&[1.0, 2.0, 3.0], &[5.0, 6.0, 5.5]);
        sink.set_peak_markers(&[2.0], &[6.0]);
        sink.set_title("72 BPM");
        sink.refresh().expect("draw");

        let fig = sink.backend().last.as_ref().expect("drawn");
        assert_eq!(fig.series.len(), 2);
        assert_eq!(
            fig.series_named(WAVEFORM_SERIES).map(|s| s.points().len()),
            Some(3)
        );
        assert_eq!(
            fig.series_named(PEAK_SERIES).map(|s| s.points().to_vec()),
            Some(vec![[2.0, 6.0]])
        );
        assert_eq!(fig.x.range, Some([1.0, 3.0]));
        assert_eq!(fig.title.as_deref(), Some("72 BPM"));
        assert_eq!(sink.backend().draws, 1);
    }

    #[test]
    fn snapshot_goes_to_backend_export() {
        let mut sink = FigureSink::new(MemoryBackend::default());
        sink.set_waveform(&[0.0], &[1.0]);
        sink.save_snapshot(Path::new("snap.png")).expect("export");
        assert_eq!(sink.backend().exports, vec![PathBuf::from("snap.png")]);
    }

    #[test]
    fn waveform_is_decimated() {
        let mut sink = FigureSink::new(MemoryBackend::default()).with_max_points(10);
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        sink.set_waveform(&xs, &xs);
        let points = sink.figure().series[0].points();
        assert_eq!(points.len(), 10);
        assert_eq!(points[1], [10.0, 10.0]);
    }

    #[test]
    fn color_channels() {
        assert_eq!(Color(0xE24A33).rgb(), (0xE2, 0x4A, 0x33));
    }
}
