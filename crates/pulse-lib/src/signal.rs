use serde::{Deserialize, Serialize};

/// One parsed sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the sensor booted
    pub timestamp: f64,
    /// Selected optical channel value
    pub amplitude: f64,
}

/// Fixed-size batch of time-ordered samples analyzed as a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Window {
    pub timestamps: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl Window {
    pub fn with_capacity(pts: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(pts),
            amplitudes: Vec::with_capacity(pts),
        }
    }

    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut window = Self::with_capacity(samples.len());
        for sample in samples {
            window.push(*sample);
        }
        window
    }

    pub fn push(&mut self, sample: Sample) {
        self.timestamps.push(sample.timestamp);
        self.amplitudes.push(sample.amplitude);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Seconds spanned by the first and last sample.
    pub fn duration(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// Point events on a timeline (e.g., beat indices)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Look up the timestamp of every event in `timestamps`, skipping out-of-range indices.
    pub fn times(&self, timestamps: &[f64]) -> Vec<f64> {
        self.indices
            .iter()
            .filter_map(|&idx| timestamps.get(idx).copied())
            .collect()
    }
}

/// Inter-beat intervals (seconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_times(times: &[f64]) -> Self {
        let rr = times.windows(2).map(|w| w[1] - w[0]).collect();
        Self { rr }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.rr.is_empty() {
            return None;
        }
        Some(self.rr.iter().sum::<f64>() / self.rr.len() as f64)
    }
}
