use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::signal::Sample;

/// Optical channel carried in the data line. The sensor sends `ms,A,B`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    A,
    #[default]
    B,
}

impl Channel {
    /// Position of the channel among the comma-separated fields.
    pub fn field(self) -> usize {
        match self {
            Channel::A => 1,
            Channel::B => 2,
        }
    }
}

/// Whether the sentinel line has been seen on the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncState {
    pub synchronized: bool,
}

impl SyncState {
    pub fn reset(&mut self) {
        self.synchronized = false;
    }
}

/// What a single line turned into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    /// Line discarded while waiting for the sentinel.
    Unsynced,
    /// The sentinel itself; the stream is now synchronized.
    Start,
    Sample(Sample),
    /// Synchronized, but the line did not hold a valid record.
    Malformed,
}

const FIELD_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct FrameParser {
    sentinel: Vec<u8>,
    channel: Channel,
}

impl FrameParser {
    pub fn new(sentinel: &str, channel: Channel) -> Self {
        Self {
            sentinel: sentinel.trim().as_bytes().to_vec(),
            channel,
        }
    }

    /// Classify one raw line. Never fails: anything unusable is `Unsynced` or `Malformed`.
    pub fn parse_line(&self, state: &mut SyncState, line: &[u8]) -> Frame {
        let payload = strip_terminator(line);
        if !state.synchronized {
            if payload == self.sentinel.as_slice() {
                state.synchronized = true;
                info!("Program start");
                return Frame::Start;
            }
            trace!("waiting for sentinel, dropped {} byte(s)", line.len());
            return Frame::Unsynced;
        }
        match self.parse_record(payload) {
            Some(sample) => Frame::Sample(sample),
            None => {
                trace!("discarding malformed line {:?}", String::from_utf8_lossy(payload));
                Frame::Malformed
            }
        }
    }

    fn parse_record(&self, payload: &[u8]) -> Option<Sample> {
        let text = std::str::from_utf8(payload).ok()?;
        let fields: Vec<&str> = text.split(',').collect();
        if fields.len() != FIELD_COUNT {
            return None;
        }
        let millis: f64 = fields[0].trim().parse().ok()?;
        let amplitude: f64 = fields[self.channel.field()].trim().parse().ok()?;
        Some(Sample {
            timestamp: millis / 1000.0,
            amplitude,
        })
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n') {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced() -> SyncState {
        SyncState { synchronized: true }
    }

    #[test]
    fn waits_for_sentinel() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = SyncState::default();
        assert_eq!(parser.parse_line(&mut state, b"10,20,30\r\n"), Frame::Unsynced);
        assert_eq!(parser.parse_line(&mut state, b"MAX3010\r\n"), Frame::Unsynced);
        assert!(!state.synchronized);
        assert_eq!(parser.parse_line(&mut state, b"MAX30102\r\n"), Frame::Start);
        assert!(state.synchronized);
    }

    #[test]
    fn three_fields_yield_one_sample() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = synced();
        let frame = parser.parse_line(&mut state, b"2500,51234,48765\r\n");
        assert_eq!(
            frame,
            Frame::Sample(Sample {
                timestamp: 2.5,
                amplitude: 48765.0
            })
        );
    }

    #[test]
    fn channel_a_reads_middle_field() {
        let parser = FrameParser::new("MAX30102", Channel::A);
        let mut state = synced();
        match parser.parse_line(&mut state, b"1000,7,9\n") {
            Frame::Sample(sample) => assert_eq!(sample.amplitude, 7.0),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn discards_wrong_field_counts() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = synced();
        assert_eq!(parser.parse_line(&mut state, b"1000,7\r\n"), Frame::Malformed);
        assert_eq!(parser.parse_line(&mut state, b"1000,7,9,11\r\n"), Frame::Malformed);
        assert_eq!(parser.parse_line(&mut state, b"\r\n"), Frame::Malformed);
    }

    #[test]
    fn discards_non_numeric_and_bad_encoding() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = synced();
        assert_eq!(parser.parse_line(&mut state, b"abc,7,9\r\n"), Frame::Malformed);
        assert_eq!(parser.parse_line(&mut state, b"1000,7,x\r\n"), Frame::Malformed);
        assert_eq!(
            parser.parse_line(&mut state, &[0xff, 0xfe, b',', b'1', b',', b'2']),
            Frame::Malformed
        );
        assert!(state.synchronized);
    }

    #[test]
    fn sentinel_after_sync_is_malformed() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = synced();
        assert_eq!(parser.parse_line(&mut state, b"MAX30102\r\n"), Frame::Malformed);
    }

    #[test]
    fn reset_requires_new_sentinel() {
        let parser = FrameParser::new("MAX30102", Channel::B);
        let mut state = synced();
        state.reset();
        assert_eq!(parser.parse_line(&mut state, b"1,2,3\r\n"), Frame::Unsynced);
    }
}
