use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::{LineEvent, LineSource};

/// Replays a captured sensor stream from any buffered reader.
///
/// Flushing is a no-op so that a recording is analyzed without gaps.
pub struct ReaderLineSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl ReaderLineSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn read_line(&mut self) -> io::Result<LineEvent> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(LineEvent::Eof);
        }
        Ok(LineEvent::Line(buf))
    }

    fn flush_pending_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parse a whole capture held in memory into a line source.
pub fn source_from_text(text: &str) -> ReaderLineSource<io::Cursor<Vec<u8>>> {
    ReaderLineSource::new(io::Cursor::new(text.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yields_lines_then_eof() {
        let mut source = source_from_text("MAX30102\r\n1,2,3\r\n4,5,6");
        assert_eq!(
            source.read_line().expect("read"),
            LineEvent::Line(b"MAX30102\r\n".to_vec())
        );
        assert_eq!(
            source.read_line().expect("read"),
            LineEvent::Line(b"1,2,3\r\n".to_vec())
        );
        assert_eq!(
            source.read_line().expect("read"),
            LineEvent::Line(b"4,5,6".to_vec())
        );
        assert_eq!(source.read_line().expect("read"), LineEvent::Eof);
    }

    #[test]
    fn opens_capture_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "MAX30102\r\n").expect("write");
        let mut source = ReaderLineSource::open(file.path()).expect("open");
        assert!(matches!(source.read_line().expect("read"), LineEvent::Line(_)));
        assert_eq!(source.read_line().expect("read"), LineEvent::Eof);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ReaderLineSource::open(Path::new("/nonexistent/capture.txt"))
            .err()
            .expect("should fail");
        assert!(format!("{err:#}").contains("capture.txt"));
    }
}
