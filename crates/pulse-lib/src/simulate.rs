use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of a synthetic sensor stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub sample_rate_hz: f64,
    pub heart_rate_bpm: f64,
    pub duration_s: f64,
    /// Peak amplitude of uniform noise added to both channels
    pub noise: f64,
    pub seed: u64,
    pub sentinel: String,
    /// Boot chatter emitted before the sentinel
    pub preamble_lines: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 400.0,
            heart_rate_bpm: 72.0,
            duration_s: 10.0,
            noise: 5.0,
            seed: 0,
            sentinel: "MAX30102".into(),
            preamble_lines: 3,
        }
    }
}

const BASELINE: f64 = 50_000.0;
const PULSE_AMPLITUDE: f64 = 1_000.0;
const EDGE_S: f64 = 0.05;

/// Normalized pulse shape: a sharp drop over the first 50 ms of each beat, then a slow recovery.
pub fn pulse_shape(t: f64, heart_rate_bpm: f64) -> f64 {
    let period = 60.0 / heart_rate_bpm;
    let phase = t.rem_euclid(period);
    if phase < EDGE_S {
        1.0 - phase / EDGE_S
    } else {
        (phase - EDGE_S) / (period - EDGE_S)
    }
}

/// Lines as the sensor would send them, each ending in `\r\n`.
///
/// Timestamps are whole milliseconds; field 1 carries a scaled copy of the pulse, field 2 the
/// full-amplitude pulse.
pub fn synthetic_stream(cfg: &SimulationConfig) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let samples = (cfg.duration_s * cfg.sample_rate_hz).max(0.0) as usize;
    let mut lines = Vec::with_capacity(samples + cfg.preamble_lines + 1);
    for i in 0..cfg.preamble_lines {
        lines.push(format!("boot {}\r\n", i));
    }
    lines.push(format!("{}\r\n", cfg.sentinel));
    for i in 0..samples {
        let t = i as f64 / cfg.sample_rate_hz;
        let millis = (i as f64 * 1000.0 / cfg.sample_rate_hz).floor() as u64;
        let shape = pulse_shape(t, cfg.heart_rate_bpm);
        let mut jitter = || {
            if cfg.noise > 0.0 {
                rng.gen_range(-cfg.noise..=cfg.noise)
            } else {
                0.0
            }
        };
        let red = BASELINE * 0.9 + 0.6 * PULSE_AMPLITUDE * shape + jitter();
        let ir = BASELINE + PULSE_AMPLITUDE * shape + jitter();
        lines.push(format!("{},{:.0},{:.0}\r\n", millis, red, ir));
    }
    lines
}
