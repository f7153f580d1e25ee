use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::detectors::ppg::PpgPipelineResult;
use crate::signal::Window;

/// Write one analyzed window as CSV: raw and derived series plus candidate/peak flags.
pub fn write_window_csv(path: &Path, window: &Window, result: &PpgPipelineResult) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record([
        "time_s",
        "raw",
        "smoothed",
        "gradient",
        "candidate",
        "peak",
    ])?;
    let candidates: HashSet<usize> = result.candidates.indices.iter().copied().collect();
    let peaks: HashSet<usize> = result.peaks.indices.iter().copied().collect();
    for (i, (&t, &raw)) in window.timestamps.iter().zip(&window.amplitudes).enumerate() {
        writer.write_record(&[
            t.to_string(),
            raw.to_string(),
            result.smoothed.get(i).map(|v| v.to_string()).unwrap_or_default(),
            result.gradient.get(i).map(|v| v.to_string()).unwrap_or_default(),
            u8::from(candidates.contains(&i)).to_string(),
            u8::from(peaks.contains(&i)).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
