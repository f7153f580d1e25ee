pub mod csv;
pub mod frame;
pub mod serial;
pub mod text;

use std::io;

/// Result of a single blocking line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One complete line, terminator included when present.
    Line(Vec<u8>),
    /// Nothing arrived before the transport's read timeout.
    Idle,
    /// The source will never produce another line.
    Eof,
}

/// Line-oriented byte source feeding the frame parser.
pub trait LineSource {
    fn read_line(&mut self) -> io::Result<LineEvent>;

    /// Drop anything buffered but not yet read.
    fn flush_pending_input(&mut self) -> io::Result<()>;
}
