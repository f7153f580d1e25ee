use crate::{
    metrics::rate::{estimate_bpm, mean_sample_rate},
    signal::{Events, RRSeries, Window},
};
use serde::{Deserialize, Serialize};

/// Configurable parameters for the PPG smoothing + gradient peak pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PpgPipelineConfig {
    /// Width of the box smoothing kernel (samples). Must be even.
    pub smoothing_size: usize,
    /// Slowest plausible heart rate (BPM); estimates below it are flagged.
    pub min_heart_rate: f64,
    /// Fastest plausible heart rate (BPM); sets the minimum gap between beats.
    pub max_heart_rate: f64,
}

impl Default for PpgPipelineConfig {
    fn default() -> Self {
        Self {
            smoothing_size: 20,
            min_heart_rate: 10.0,
            max_heart_rate: 250.0,
        }
    }
}

impl PpgPipelineConfig {
    /// Candidates closer than this (seconds) belong to the same beat.
    pub fn min_time_bw_samps(&self) -> f64 {
        60.0 / self.max_heart_rate
    }

    pub fn in_span(&self, bpm: f64) -> bool {
        bpm >= self.min_heart_rate && bpm <= self.max_heart_rate
    }
}

/// Everything derived from one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpgPipelineResult {
    pub sample_count: usize,
    pub sample_rate_hz: Option<f64>,
    pub threshold: f64,
    pub candidates: Events,
    pub peaks: Events,
    pub peak_times: Vec<f64>,
    pub rr: RRSeries,
    pub bpm: Option<f64>,
    pub in_span: bool,
    #[serde(skip)]
    pub smoothed: Vec<f64>,
    #[serde(skip)]
    pub gradient: Vec<f64>,
}

/// Output of the gradient stage.
#[derive(Debug, Clone)]
pub struct GradientDetection {
    pub gradient: Vec<f64>,
    pub threshold: f64,
    pub candidates: Events,
}

/// Smooth, detect, resolve, and estimate the rate for one window.
pub fn run_ppg_pipeline(window: &Window, cfg: &PpgPipelineConfig) -> PpgPipelineResult {
    let smoothed = smooth(&window.amplitudes, cfg.smoothing_size);
    let detection = detect_candidates(&smoothed, &window.timestamps, cfg.smoothing_size);
    let peaks = resolve_peaks(
        &detection.candidates.indices,
        &window.timestamps,
        cfg.min_time_bw_samps(),
    );
    let peak_times = peaks.times(&window.timestamps);
    let rr = RRSeries::from_times(&peak_times);
    let bpm = estimate_bpm(&peak_times);
    PpgPipelineResult {
        sample_count: window.len(),
        sample_rate_hz: mean_sample_rate(&window.timestamps),
        threshold: detection.threshold,
        candidates: detection.candidates,
        peaks,
        peak_times,
        rr,
        bpm,
        in_span: bpm.map(|b| cfg.in_span(b)).unwrap_or(false),
        smoothed,
        gradient: detection.gradient,
    }
}

/// Centered moving average with the zero-padded ends replaced by the nearest trusted value.
///
/// The output always has the input's length. The first `smoothing_size / 2` values take the
/// value at index `smoothing_size / 2`, the last `smoothing_size / 2` the value at
/// `len - smoothing_size / 2`.
pub fn smooth(data: &[f64], smoothing_size: usize) -> Vec<f64> {
    if smoothing_size <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let mut out = box_convolve_same(data, smoothing_size);
    let half = smoothing_size / 2;
    let n = out.len();
    if n <= half {
        return out;
    }
    let head = out[half];
    let tail = out[n - half];
    out[..half].fill(head);
    out[n - half..].fill(tail);
    out
}

/// `same`-length convolution with a uniform kernel, implicit zeros outside the input.
fn box_convolve_same(data: &[f64], win: usize) -> Vec<f64> {
    let n = data.len();
    let mut prefix = Vec::with_capacity(n + 1);
    let mut acc = 0.0;
    prefix.push(acc);
    for &x in data {
        acc += x;
        prefix.push(acc);
    }
    // Full convolution index i + offset is centered on sample i.
    let offset = (win - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset + 1).saturating_sub(win);
            (prefix[hi + 1] - prefix[lo]) / win as f64
        })
        .collect()
}

/// Threshold the time derivative of the smoothed series at minus its standard deviation.
pub fn detect_candidates(
    smoothed: &[f64],
    timestamps: &[f64],
    smoothing_size: usize,
) -> GradientDetection {
    let mut slope = gradient(smoothed, timestamps);
    zero_borders(&mut slope, smoothing_size / 2 + 1);
    let threshold = -population_std(&slope);
    let candidates = slope
        .iter()
        .enumerate()
        .filter(|&(_, &g)| g < threshold)
        .map(|(i, _)| i)
        .collect();
    GradientDetection {
        gradient: slope,
        threshold,
        candidates: Events::from_indices(candidates),
    }
}

/// Derivative of `values` with respect to `times`.
///
/// Second-order centered differences on the (possibly uneven) grid in the interior, one-sided
/// differences at both ends. Non-positive spacing yields 0 at that index.
pub fn gradient(values: &[f64], times: &[f64]) -> Vec<f64> {
    let n = values.len().min(times.len());
    if n < 2 {
        return vec![0.0; n];
    }
    let mut out = vec![0.0; n];
    out[0] = forward_difference(values[0], values[1], times[1] - times[0]);
    out[n - 1] = forward_difference(values[n - 2], values[n - 1], times[n - 1] - times[n - 2]);
    for i in 1..n - 1 {
        let h1 = times[i] - times[i - 1];
        let h2 = times[i + 1] - times[i];
        if h1 <= 0.0 || h2 <= 0.0 {
            continue;
        }
        let a = -h2 / (h1 * (h1 + h2));
        let b = (h2 - h1) / (h1 * h2);
        let c = h1 / (h2 * (h1 + h2));
        out[i] = a * values[i - 1] + b * values[i] + c * values[i + 1];
    }
    out
}

fn forward_difference(from: f64, to: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else {
        (to - from) / dt
    }
}

fn zero_borders(data: &mut [f64], border: usize) {
    let n = data.len();
    let border = border.min(n);
    data[..border].fill(0.0);
    data[n - border..].fill(0.0);
}

fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

/// Merge candidate indices that belong to the same beat.
///
/// Each candidate is compared with the previous candidate. While the gap stays under
/// `min_gap_s` the candidate joins the open cluster; a larger gap closes the cluster and emits
/// its mean index (rounded down), or emits the previous candidate when no cluster was open.
/// In that second case the candidate that opened the gap is not emitted; it only becomes the
/// new reference point. A cluster still open after the last candidate is not emitted.
/// The first candidate is compared with itself, so it always opens a cluster.
pub fn resolve_peaks(candidates: &[usize], timestamps: &[f64], min_gap_s: f64) -> Events {
    let Some(&first) = candidates.first() else {
        return Events::default();
    };
    let mut peaks = Vec::new();
    let mut cluster: Vec<usize> = Vec::new();
    let mut prev = first;
    for &idx in candidates {
        let (Some(&t), Some(&t_prev)) = (timestamps.get(idx), timestamps.get(prev)) else {
            continue;
        };
        if t - t_prev < min_gap_s {
            cluster.push(idx);
        } else if cluster.is_empty() {
            peaks.push(prev);
        } else {
            let sum: usize = cluster.iter().sum();
            peaks.push(sum / cluster.len());
            cluster.clear();
        }
        prev = idx;
    }
    Events::from_indices(peaks)
}
