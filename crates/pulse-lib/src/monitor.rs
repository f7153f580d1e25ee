use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;

use crate::{
    acquire::{acquire_window, Acquisition, CancelFlag},
    config::MonitorConfig,
    detectors::ppg::{run_ppg_pipeline, PpgPipelineResult},
    error::PulseError,
    io::{
        csv::write_window_csv,
        frame::{FrameParser, SyncState},
        LineSource,
    },
    plot::RenderSink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// No gradient sample crossed the threshold.
    NoCandidates,
    /// Fewer than two beats were resolved.
    TooFewPeaks { peaks: usize },
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Estimated(Box<PpgPipelineResult>),
    Abandoned(AbandonReason),
    Cancelled,
    SourceClosed,
}

/// Runs acquisition + analysis cycles against one line source.
///
/// Holds the stream's synchronization state across cycles.
pub struct Monitor {
    cfg: MonitorConfig,
    parser: FrameParser,
    sync: SyncState,
    cycles: usize,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Result<Self, PulseError> {
        cfg.validate()?;
        let parser = FrameParser::new(&cfg.acquisition.sentinel, cfg.acquisition.channel);
        Ok(Self {
            cfg,
            parser,
            sync: SyncState::default(),
            cycles: 0,
        })
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync
    }

    /// Number of windows analyzed so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Acquire one window, analyze it, and push the results to `sink`.
    ///
    /// The waveform is always drawn; peak markers and the title only change when a rate was
    /// estimated, so the previous reading stays on screen otherwise.
    pub fn run_cycle<S, R>(
        &mut self,
        source: &mut S,
        sink: &mut R,
        cancel: &CancelFlag,
    ) -> Result<CycleOutcome>
    where
        S: LineSource + ?Sized,
        R: RenderSink + ?Sized,
    {
        if self.cfg.acquisition.resync_each_cycle {
            self.sync.reset();
        }
        source
            .flush_pending_input()
            .context("flushing sensor input")?;
        info!("Place finger on sensor...");
        let acquisition = acquire_window(
            source,
            &self.parser,
            &mut self.sync,
            self.cfg.acquisition.pts,
            cancel,
        )
        .context("reading sensor stream")?;
        let (window, stats) = match acquisition {
            Acquisition::Window(window, stats) => (window, stats),
            Acquisition::Cancelled => return Ok(CycleOutcome::Cancelled),
            Acquisition::SourceClosed { partial } => {
                debug!("source closed, dropped {} buffered sample(s)", partial);
                return Ok(CycleOutcome::SourceClosed);
            }
        };
        source
            .flush_pending_input()
            .context("flushing sensor input")?;
        debug!(
            "acquisition stats: {:?}, {:.2} s of signal",
            stats,
            window.duration()
        );

        let result = run_ppg_pipeline(&window, &self.cfg.detector);
        self.cycles += 1;
        if let Some(dir) = &self.cfg.output.dump_dir {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let path = dir.join(format!("window_{:04}.csv", self.cycles));
            write_window_csv(&path, &window, &result)?;
        }

        sink.set_waveform(&window.timestamps, &result.smoothed);
        sink.refresh()?;

        if result.candidates.is_empty() {
            debug!("no gradient candidates, skipping window");
            return Ok(CycleOutcome::Abandoned(AbandonReason::NoCandidates));
        }
        let Some(bpm) = result.bpm else {
            debug!("only {} peak(s) resolved, skipping window", result.peaks.indices.len());
            return Ok(CycleOutcome::Abandoned(AbandonReason::TooFewPeaks {
                peaks: result.peaks.indices.len(),
            }));
        };
        if !result.in_span {
            warn!(
                "estimate {:.1} BPM outside [{}, {}]",
                bpm, self.cfg.detector.min_heart_rate, self.cfg.detector.max_heart_rate
            );
        }
        debug!(
            "{} candidate(s) -> {} peak(s), {:.1} BPM",
            result.candidates.indices.len(),
            result.peaks.indices.len(),
            bpm
        );

        let marker_y: Vec<f64> = result
            .peaks
            .indices
            .iter()
            .filter_map(|&idx| result.smoothed.get(idx).copied())
            .collect();
        sink.set_title(&format!("{:.0} BPM", bpm));
        sink.set_peak_markers(&result.peak_times, &marker_y);
        sink.refresh()?;
        Ok(CycleOutcome::Estimated(Box::new(result)))
    }
}
