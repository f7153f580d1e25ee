mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use pulse_lib::{
    acquire::CancelFlag,
    config::MonitorConfig,
    io::{frame::Channel, serial::SerialLineSource, text::ReaderLineSource, LineSource},
    monitor::{CycleOutcome, Monitor},
    plot::{FigureSink, MemoryBackend, RenderSink},
    simulate::{synthetic_stream, SimulationConfig},
};
use render::PngBackend;
use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Live heart rate from a pulse-oximeter serial stream"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ChannelArg {
    A,
    B,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::A => Channel::A,
            ChannelArg::B => Channel::B,
        }
    }
}

/// Settings shared by every analysis command; each one overrides the config file.
#[derive(Args)]
struct AnalysisArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Samples per analysis window
    #[arg(long)]
    pts: Option<usize>,
    /// Box smoothing width (even)
    #[arg(long)]
    smoothing_size: Option<usize>,
    #[arg(long)]
    min_heart_rate: Option<f64>,
    #[arg(long)]
    max_heart_rate: Option<f64>,
    #[arg(long)]
    sentinel: Option<String>,
    #[arg(long, value_enum)]
    channel: Option<ChannelArg>,
    /// Wait for a fresh sentinel line before every window
    #[arg(long)]
    resync_each_cycle: bool,
    /// Write every analyzed window as CSV into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

impl AnalysisArgs {
    fn load(&self) -> Result<MonitorConfig> {
        let mut cfg = match &self.config {
            Some(path) => MonitorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => MonitorConfig::default(),
        };
        let acq = &mut cfg.acquisition;
        if let Some(pts) = self.pts {
            acq.pts = pts;
        }
        if let Some(sentinel) = &self.sentinel {
            acq.sentinel = sentinel.clone();
        }
        if let Some(channel) = self.channel {
            acq.channel = channel.into();
        }
        if self.resync_each_cycle {
            acq.resync_each_cycle = true;
        }
        let det = &mut cfg.detector;
        if let Some(size) = self.smoothing_size {
            det.smoothing_size = size;
        }
        if let Some(rate) = self.min_heart_rate {
            det.min_heart_rate = rate;
        }
        if let Some(rate) = self.max_heart_rate {
            det.max_heart_rate = rate;
        }
        if let Some(dir) = &self.dump_dir {
            cfg.output.dump_dir = Some(dir.clone());
        }
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read the sensor over a serial port and estimate heart rate window by window
    Monitor {
        /// Serial device, e.g. /dev/ttyUSB0 or COM3
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// PNG rewritten after every window
        #[arg(long)]
        live_plot: Option<PathBuf>,
        /// Where a saved snapshot goes
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Keep going without asking after each estimate
        #[arg(long)]
        no_prompt: bool,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Run the same analysis over a captured stream; prints one JSON object per estimate
    Replay {
        /// Capture file, or `-` for stdin
        #[arg(long)]
        input: PathBuf,
        /// Also render the last window to this PNG
        #[arg(long)]
        plot: Option<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Emit a synthetic sensor stream
    Simulate {
        #[arg(long, default_value_t = 400.0)]
        fs: f64,
        #[arg(long, default_value_t = 72.0)]
        bpm: f64,
        #[arg(long, default_value_t = 10.0)]
        duration_s: f64,
        #[arg(long, default_value_t = 5.0)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Finished,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptAction {
    Save,
    Stop,
    Continue,
}

const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let cancel = CancelFlag::new();
    let at_prompt = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        let at_prompt = at_prompt.clone();
        // A blocked stdin read is restarted after the signal, so leave straight away there.
        ctrlc::set_handler(move || {
            cancel.cancel();
            if at_prompt.load(Ordering::SeqCst) {
                println!();
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })
        .context("installing Ctrl-C handler")?;
    }
    let status = match cli.command {
        Commands::Monitor {
            port,
            baud,
            live_plot,
            snapshot,
            no_prompt,
            analysis,
        } => {
            let mut cfg = analysis.load()?;
            if let Some(port) = port {
                cfg.acquisition.port = port;
            }
            if let Some(baud) = baud {
                cfg.acquisition.baud_rate = baud;
            }
            if let Some(path) = live_plot {
                cfg.output.live_plot = path;
            }
            if let Some(path) = snapshot {
                cfg.output.snapshot = path;
            }
            cmd_monitor(cfg, !no_prompt, &cancel, &at_prompt)?
        }
        Commands::Replay {
            input,
            plot,
            analysis,
        } => cmd_replay(analysis.load()?, &input, plot.as_deref(), &cancel)?,
        Commands::Simulate {
            fs,
            bpm,
            duration_s,
            noise,
            seed,
            out,
        } => {
            let sim = SimulationConfig {
                sample_rate_hz: fs,
                heart_rate_bpm: bpm,
                duration_s,
                noise,
                seed,
                ..Default::default()
            };
            cmd_simulate(&sim, out.as_deref())?
        }
    };
    if status == RunStatus::Interrupted {
        info!("interrupted");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}

fn cmd_monitor(
    cfg: MonitorConfig,
    prompt: bool,
    cancel: &CancelFlag,
    at_prompt: &AtomicBool,
) -> Result<RunStatus> {
    let acq = &cfg.acquisition;
    let mut source = SerialLineSource::open(
        &acq.port,
        acq.baud_rate,
        Duration::from_millis(acq.read_timeout_ms),
    )?;
    let mut sink = FigureSink::new(PngBackend::new(cfg.output.live_plot.clone()));
    let snapshot = cfg.output.snapshot.clone();
    let mut monitor = Monitor::new(cfg)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        match monitor.run_cycle(&mut source, &mut sink, cancel)? {
            CycleOutcome::Estimated(result) => {
                if let Some(bpm) = result.bpm {
                    println!("BPM: {:.1}", bpm);
                }
                if !prompt {
                    continue;
                }
                let action = ask_after_estimate(&mut input, at_prompt)?;
                if let Some(status) = handle_answer(action, cancel.is_cancelled()) {
                    return Ok(status);
                }
                if action == PromptAction::Save {
                    sink.save_snapshot(&snapshot)?;
                    info!("saved {}", snapshot.display());
                }
            }
            CycleOutcome::Abandoned(_) => {}
            CycleOutcome::Cancelled => return Ok(RunStatus::Interrupted),
            CycleOutcome::SourceClosed => {
                info!("serial port closed");
                return Ok(RunStatus::Finished);
            }
        }
    }
}

fn cmd_replay(
    cfg: MonitorConfig,
    input: &Path,
    plot: Option<&Path>,
    cancel: &CancelFlag,
) -> Result<RunStatus> {
    let mut source: Box<dyn LineSource> = if input == Path::new("-") {
        Box::new(ReaderLineSource::new(BufReader::new(io::stdin())))
    } else {
        Box::new(ReaderLineSource::open(input)?)
    };
    let mut sink: Box<dyn RenderSink> = match plot {
        Some(path) => Box::new(FigureSink::new(PngBackend::new(path))),
        None => Box::new(FigureSink::new(MemoryBackend::default())),
    };
    let mut monitor = Monitor::new(cfg)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    loop {
        match monitor.run_cycle(source.as_mut(), sink.as_mut(), cancel)? {
            CycleOutcome::Estimated(result) => {
                writeln!(out, "{}", serde_json::to_string(&result)?)?;
            }
            CycleOutcome::Abandoned(_) => {}
            CycleOutcome::Cancelled => return Ok(RunStatus::Interrupted),
            CycleOutcome::SourceClosed => break,
        }
    }
    info!("analyzed {} window(s)", monitor.cycles());
    Ok(RunStatus::Finished)
}

fn cmd_simulate(sim: &SimulationConfig, out: Option<&Path>) -> Result<RunStatus> {
    let lines = synthetic_stream(sim);
    match out {
        Some(path) => {
            fs::write(path, lines.concat())
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for line in &lines {
                handle.write_all(line.as_bytes())?;
            }
            handle.flush()?;
        }
    }
    Ok(RunStatus::Finished)
}

fn ask_after_estimate(input: &mut impl BufRead, at_prompt: &AtomicBool) -> Result<PromptAction> {
    print!("Save figure? ");
    io::stdout().flush()?;
    let mut answer = String::new();
    at_prompt.store(true, Ordering::SeqCst);
    let read = input.read_line(&mut answer);
    at_prompt.store(false, Ordering::SeqCst);
    read?;
    Ok(parse_prompt(&answer))
}

/// Decide whether the monitor loop ends after an answer. An interrupt wins over any answer.
fn handle_answer(action: PromptAction, cancelled: bool) -> Option<RunStatus> {
    if cancelled {
        return Some(RunStatus::Interrupted);
    }
    match action {
        PromptAction::Stop => Some(RunStatus::Finished),
        PromptAction::Save | PromptAction::Continue => None,
    }
}

/// `y` saves a snapshot, `no` stops; anything else, including end of input, carries on.
fn parse_prompt(answer: &str) -> PromptAction {
    match answer.trim() {
        "y" => PromptAction::Save,
        "no" => PromptAction::Stop,
        _ => PromptAction::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_answers() {
        assert_eq!(parse_prompt("y\n"), PromptAction::Save);
        assert_eq!(parse_prompt("no\r\n"), PromptAction::Stop);
        assert_eq!(parse_prompt("n\n"), PromptAction::Continue);
        assert_eq!(parse_prompt(""), PromptAction::Continue);
    }

    #[test]
    fn interrupt_overrides_prompt_answer() {
        assert_eq!(
            handle_answer(PromptAction::Stop, true),
            Some(RunStatus::Interrupted)
        );
        assert_eq!(
            handle_answer(PromptAction::Save, true),
            Some(RunStatus::Interrupted)
        );
        assert_eq!(
            handle_answer(PromptAction::Stop, false),
            Some(RunStatus::Finished)
        );
        assert_eq!(handle_answer(PromptAction::Save, false), None);
        assert_eq!(handle_answer(PromptAction::Continue, false), None);
    }

    #[test]
    fn prompt_flag_is_cleared_after_reading() {
        let at_prompt = AtomicBool::new(false);
        let mut input = io::Cursor::new(b"y\n".to_vec());
        let action = ask_after_estimate(&mut input, &at_prompt).expect("answer");
        assert_eq!(action, PromptAction::Save);
        assert!(!at_prompt.load(Ordering::SeqCst));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "pulse",
            "replay",
            "--input",
            "capture.txt",
            "--pts",
            "900",
            "--channel",
            "a",
            "--max-heart-rate",
            "180",
        ]);
        let Commands::Replay { analysis, .. } = cli.command else {
            panic!("expected replay");
        };
        let cfg = analysis.load().expect("config");
        assert_eq!(cfg.acquisition.pts, 900);
        assert_eq!(cfg.acquisition.channel, Channel::A);
        assert!((cfg.detector.max_heart_rate - 180.0).abs() < 1e-12);
        assert_eq!(cfg.detector.smoothing_size, 20);
    }
}
