use crate::signal::RRSeries;

/// Beats per minute from the mean gap between consecutive peak times.
///
/// Needs at least two peaks; a non-positive mean gap (unordered timestamps) gives `None`.
pub fn estimate_bpm(peak_times: &[f64]) -> Option<f64> {
    let mean_rr = RRSeries::from_times(peak_times).mean()?;
    if mean_rr > 0.0 {
        Some(60.0 / mean_rr)
    } else {
        None
    }
}

/// Average sampling rate (Hz) of a timestamp series.
pub fn mean_sample_rate(timestamps: &[f64]) -> Option<f64> {
    let mean_dt = RRSeries::from_times(timestamps).mean()?;
    if mean_dt > 0.0 {
        Some(1.0 / mean_dt)
    } else {
        None
    }
}
