//! Scanners for a terminal: the payload arrives as text, pasted or piped
//! from a camera app, or saved to a file.

use std::io::{self, BufRead};
use std::path::PathBuf;

use talita_handshake::{CodeScanner, ScanOutcome};

/// Reads one line. End of input or a blank line cancels the scan.
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: R,
}

impl<R: BufRead> LineScanner<R> {
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineScanner<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> CodeScanner for LineScanner<R> {
    fn scan(&mut self) -> ScanOutcome {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => ScanOutcome::Cancelled,
            Ok(_) if line.trim().is_empty() => ScanOutcome::Cancelled,
            Ok(_) => ScanOutcome::Scanned(line),
            Err(e) => ScanOutcome::Unavailable(format!("Failed to read input: {e}")),
        }
    }
}

/// Reads the whole of a file, for codes decoded by another tool.
#[derive(Debug, Clone)]
pub struct FileScanner {
    path: PathBuf,
}

impl FileScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CodeScanner for FileScanner {
    fn scan(&mut self) -> ScanOutcome {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => ScanOutcome::Scanned(text),
            Err(e) => ScanOutcome::Unavailable(format!("{}: {e}", self.path.display())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn line_scanner_reads_one_line_at_a_time() {
        let mut scanner = LineScanner::new(Cursor::new("first\nsecond\n"));
        assert_eq!(scanner.scan(), ScanOutcome::Scanned("first\n".into()));
        assert_eq!(scanner.scan(), ScanOutcome::Scanned("second\n".into()));
        assert_eq!(scanner.scan(), ScanOutcome::Cancelled);
    }

    #[test]
    fn blank_line_cancels() {
        let mut scanner = LineScanner::new(Cursor::new("   \n"));
        assert_eq!(scanner.scan(), ScanOutcome::Cancelled);
    }

    #[test]
    fn file_scanner_reads_file_or_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.txt");
        std::fs::write(&path, "AAAA\n").unwrap();
        assert_eq!(
            FileScanner::new(&path).scan(),
            ScanOutcome::Scanned("AAAA\n".into())
        );

        let missing = FileScanner::new(dir.path().join("missing.txt")).scan();
        assert!(matches!(missing, ScanOutcome::Unavailable(msg) if msg.contains("missing.txt")));
    }
}
