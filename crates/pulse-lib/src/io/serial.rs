use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use super::{LineEvent, LineSource};

/// Line reader over a serial port.
///
/// Reads time out after `timeout` so callers get a chance to notice cancellation; a line that
/// is only partially received when the timeout hits is kept and completed on the next call.
pub struct SerialLineSource {
    reader: BufReader<Box<dyn SerialPort>>,
    pending: Vec<u8>,
}

impl SerialLineSource {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .with_context(|| format!("failed to open serial port at {}", path))?;
        log::info!("opened {} at {} baud", path, baud_rate);
        Ok(Self {
            reader: BufReader::new(port),
            pending: Vec::new(),
        })
    }
}

impl LineSource for SerialLineSource {
    fn read_line(&mut self) -> io::Result<LineEvent> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(LineEvent::Eof),
            Ok(_) => Ok(LineEvent::Line(std::mem::take(&mut self.pending))),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(LineEvent::Idle)
            }
            Err(e) => Err(e),
        }
    }

    fn flush_pending_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        let buffered = self.reader.buffer().len();
        self.reader.consume(buffered);
        self.reader.get_ref().clear(ClearBuffer::Input)?;
        Ok(())
    }
}
