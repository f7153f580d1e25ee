use log::debug;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::io::{
    frame::{Frame, FrameParser, SyncState},
    LineEvent, LineSource,
};
use crate::signal::{Sample, Window};

/// Shared interrupt flag, set from a signal handler and polled between line reads.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects samples until exactly `pts` are held.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    pts: usize,
    window: Window,
}

impl WindowAccumulator {
    pub fn new(pts: usize) -> Self {
        Self {
            pts,
            window: Window::with_capacity(pts),
        }
    }

    /// Add a sample unless the window is already full. Returns whether it is full now.
    pub fn push(&mut self, sample: Sample) -> bool {
        if !self.is_full() {
            self.window.push(sample);
        }
        self.is_full()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() >= self.pts
    }

    /// Hand over the completed window; a partial window is dropped.
    pub fn finish(self) -> Option<Window> {
        if self.is_full() {
            Some(self.window)
        } else {
            None
        }
    }
}

/// Line accounting for one acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub lines: usize,
    pub unsynced: usize,
    pub malformed: usize,
    pub samples: usize,
}

#[derive(Debug, Clone)]
pub enum Acquisition {
    Window(Window, AcquisitionStats),
    Cancelled,
    /// The source ran dry; `partial` samples were collected and discarded.
    SourceClosed {
        partial: usize,
    },
}

/// Read lines until a full window of `pts` samples is available.
///
/// Blocks for as long as the source produces nothing useful; there is no overall deadline.
pub fn acquire_window<S: LineSource + ?Sized>(
    source: &mut S,
    parser: &FrameParser,
    sync: &mut SyncState,
    pts: usize,
    cancel: &CancelFlag,
) -> io::Result<Acquisition> {
    let mut acc = WindowAccumulator::new(pts);
    let mut stats = AcquisitionStats::default();
    while !acc.is_full() {
        if cancel.is_cancelled() {
            debug!("acquisition cancelled with {} sample(s) buffered", acc.len());
            return Ok(Acquisition::Cancelled);
        }
        let line = match source.read_line()? {
            LineEvent::Line(line) => line,
            LineEvent::Idle => continue,
            LineEvent::Eof => {
                if !acc.is_empty() {
                    debug!("source closed mid-window");
                }
                return Ok(Acquisition::SourceClosed { partial: acc.len() });
            }
        };
        stats.lines += 1;
        match parser.parse_line(sync, &line) {
            Frame::Sample(sample) => {
                stats.samples += 1;
                acc.push(sample);
            }
            Frame::Unsynced => stats.unsynced += 1,
            Frame::Malformed => stats.malformed += 1,
            Frame::Start => {}
        }
    }
    debug!(
        "window complete: {} line(s), {} unsynced, {} malformed",
        stats.lines, stats.unsynced, stats.malformed
    );
    Ok(match acc.finish() {
        Some(window) => Acquisition::Window(window, stats),
        None => Acquisition::SourceClosed { partial: 0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::frame::Channel;
    use crate::io::text::source_from_text;

    fn parser() -> FrameParser {
        FrameParser::new("MAX30102", Channel::B)
    }

    #[test]
    fn accumulator_stops_at_pts() {
        let mut acc = WindowAccumulator::new(2);
        let s = Sample {
            timestamp: 0.0,
            amplitude: 1.0,
        };
        assert!(!acc.push(s));
        assert!(acc.push(s));
        assert!(acc.push(s));
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.finish().map(|w| w.len()), Some(2));
    }

    #[test]
    fn partial_window_is_dropped() {
        let mut acc = WindowAccumulator::new(3);
        acc.push(Sample {
            timestamp: 0.0,
            amplitude: 1.0,
        });
        assert!(acc.finish().is_none());
    }

    #[test]
    fn acquires_after_sentinel_and_skips_noise() {
        let text = "boot\r\n1,2,3\r\nMAX30102\r\n1000,5,6\r\nbad\r\n1002,5,7\r\n1004,5\r\n1006,5,8\r\n1008,5,9\r\n";
        let mut source = source_from_text(text);
        let mut sync = SyncState::default();
        let acq = acquire_window(&mut source, &parser(), &mut sync, 3, &CancelFlag::new())
            .expect("acquire");
        match acq {
            Acquisition::Window(window, stats) => {
                assert_eq!(window.timestamps, vec![1.0, 1.002, 1.006]);
                assert_eq!(window.amplitudes, vec![6.0, 7.0, 8.0]);
                assert_eq!(stats.unsynced, 2);
                assert_eq!(stats.malformed, 2);
                assert_eq!(stats.samples, 3);
                assert_eq!(stats.lines, 8);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(sync.synchronized);
    }

    #[test]
    fn sync_survives_between_windows() {
        let text = "MAX30102\r\n0,1,1\r\n2,1,2\r\n4,1,3\r\n6,1,4\r\n";
        let mut source = source_from_text(text);
        let mut sync = SyncState::default();
        let cancel = CancelFlag::new();
        let first = acquire_window(&mut source, &parser(), &mut sync, 2, &cancel).expect("first");
        assert!(matches!(first, Acquisition::Window(..)));
        let second = acquire_window(&mut source, &parser(), &mut sync, 2, &cancel).expect("second");
        match second {
            Acquisition::Window(window, _) => assert_eq!(window.amplitudes, vec![3.0, 4.0]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn eof_discards_partial_window() {
        let mut source = source_from_text("MAX30102\r\n0,1,1\r\n");
        let mut sync = SyncState::default();
        let acq = acquire_window(&mut source, &parser(), &mut sync, 5, &CancelFlag::new())
            .expect("acquire");
        assert!(matches!(acq, Acquisition::SourceClosed { partial: 1 }));
    }

    #[test]
    fn cancellation_stops_before_reading() {
        let mut source = source_from_text("MAX30102\r\n0,1,1\r\n");
        let mut sync = SyncState::default();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let acq = acquire_window(&mut source, &parser(), &mut sync, 1, &cancel).expect("acquire");
        assert!(matches!(acq, Acquisition::Cancelled));
        assert!(!sync.synchronized);
    }

    #[test]
    fn never_synchronized_stream_yields_nothing() {
        let mut source = source_from_text("0,1,1\r\n2,1,2\r\n");
        let mut sync = SyncState::default();
        let acq = acquire_window(&mut source, &parser(), &mut sync, 1, &CancelFlag::new())
            .expect("acquire");
        assert!(matches!(acq, Acquisition::SourceClosed { partial: 0 }));
    }
}
