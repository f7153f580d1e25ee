use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detectors::ppg::PpgPipelineConfig;
use crate::error::{PulseError, Result};
use crate::io::frame::Channel;

/// Serial acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Samples per analysis window
    pub pts: usize,
    pub sentinel: String,
    pub channel: Channel,
    /// Drop synchronization before every acquisition and wait for a fresh sentinel.
    pub resync_each_cycle: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            pts: 1800,
            sentinel: "MAX30102".into(),
            channel: Channel::B,
            resync_each_cycle: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub live_plot: PathBuf,
    pub snapshot: PathBuf,
    pub dump_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            live_plot: PathBuf::from("pulse_live.png"),
            snapshot: PathBuf::from("gradient_plot.png"),
            dump_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub acquisition: AcquisitionConfig,
    pub detector: PpgPipelineConfig,
    pub output: OutputConfig,
}

impl MonitorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: MonitorConfig = toml::from_str(text)?;
        Ok(cfg)
    }

    /// Read a TOML config file; missing sections and keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let acq = &self.acquisition;
        let det = &self.detector;
        if det.smoothing_size == 0 || det.smoothing_size % 2 != 0 {
            return Err(PulseError::InvalidConfig(format!(
                "smoothing_size must be a positive even number, got {}",
                det.smoothing_size
            )));
        }
        let border = 2 * (det.smoothing_size / 2 + 1);
        if acq.pts <= border {
            return Err(PulseError::InvalidConfig(format!(
                "pts ({}) must exceed the zeroed gradient borders ({})",
                acq.pts, border
            )));
        }
        if !(det.min_heart_rate > 0.0 && det.max_heart_rate > det.min_heart_rate) {
            return Err(PulseError::InvalidConfig(format!(
                "heart-rate span [{}, {}] is not a positive increasing range",
                det.min_heart_rate, det.max_heart_rate
            )));
        }
        if acq.baud_rate == 0 {
            return Err(PulseError::InvalidConfig("baud_rate must be non-zero".into()));
        }
        if acq.sentinel.trim().is_empty() {
            return Err(PulseError::InvalidConfig("sentinel must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.acquisition.pts, 1800);
        assert_eq!(cfg.detector.smoothing_size, 20);
        assert_eq!(cfg.acquisition.channel, Channel::B);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = MonitorConfig::from_toml_str(
            r#"
            [acquisition]
            pts = 800
            channel = "a"

            [detector]
            max_heart_rate = 200.0
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.acquisition.pts, 800);
        assert_eq!(cfg.acquisition.channel, Channel::A);
        assert_eq!(cfg.acquisition.sentinel, "MAX30102");
        assert_eq!(cfg.detector.smoothing_size, 20);
        assert!((cfg.detector.max_heart_rate - 200.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_odd_smoothing_size() {
        let mut cfg = MonitorConfig::default();
        cfg.detector.smoothing_size = 21;
        assert!(matches!(cfg.validate(), Err(PulseError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_window_smaller_than_borders() {
        let mut cfg = MonitorConfig::default();
        cfg.acquisition.pts = 22;
        assert!(cfg.validate().is_err());
        cfg.acquisition.pts = 23;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_heart_rate_span() {
        let mut cfg = MonitorConfig::default();
        cfg.detector.min_heart_rate = 300.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[output]\nsnapshot = \"beats.png\"").expect("write");
        let cfg = MonitorConfig::load(file.path()).expect("load");
        assert_eq!(cfg.output.snapshot, PathBuf::from("beats.png"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = MonitorConfig::from_toml_str("[acquisition]\npts = \"many\"").unwrap_err();
        assert!(matches!(err, PulseError::ConfigParse(_)));
    }
}
