//! Record Stream Reader
//!
//! Streams records out of a gzip-compressed SDF archive one line at a time,
//! so memory use is bounded by the largest record rather than the archive.
//!
//! - A record ends at a line that equals the delimiter once trailing
//!   whitespace is removed (`$$$$`, `$$$$ `, `$$$$\r\n` all count).
//! - The delimiter line is not part of the record text.
//! - A delimiter sharing a line with other text (`A$$$$`) is not a boundary.
//! - Text after the last delimiter is never emitted (malformed tail).
//! - Invalid UTF-8 is replaced, never raised.

use flate2::read::MultiGzDecoder;
use sdf_protocol::Record;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not a gzip archive: {path}")]
    NotGzip { path: PathBuf },

    #[error("Failed to decompress archive {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Read error at line {line}: {source}")]
    Io {
        line: u64,
        #[source]
        source: io::Error,
    },
}

/// Reader over a decompressed archive.
pub type ArchiveReader = RecordReader<BufReader<MultiGzDecoder<File>>>;

/// Open a gzip archive and prepare it for streaming.
///
/// Fails up front if the file is missing, is not gzip, or its first block
/// cannot be decompressed. Concatenated gzip members are read as one stream.
pub fn open_archive(path: &Path, delimiter: &str) -> Result<ArchiveReader, ReaderError> {
    let open_err = |source| ReaderError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_err)?;

    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) if magic == GZIP_MAGIC => {}
        Ok(()) => {
            return Err(ReaderError::NotGzip {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ReaderError::NotGzip {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(open_err(e)),
    }
    file.seek(SeekFrom::Start(0)).map_err(open_err)?;

    let mut reader = BufReader::new(MultiGzDecoder::new(file));
    // Forces header parsing and the first inflate before any worker starts.
    reader.fill_buf().map_err(|source| ReaderError::Decompress {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Opened archive {}", path.display());
    Ok(RecordReader::new(reader, delimiter))
}

/// Lazy, finite, non-restartable iterator of records.
pub struct RecordReader<R> {
    inner: R,
    delimiter: String,
    line_buf: Vec<u8>,
    current: String,
    next_seq: u64,
    lines_read: u64,
    finished: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R, delimiter: &str) -> Self {
        Self {
            inner,
            delimiter: delimiter.to_string(),
            line_buf: Vec::new(),
            current: String::new(),
            next_seq: 0,
            lines_read: 0,
            finished: false,
        }
    }

    /// Records emitted so far.
    pub fn records_read(&self) -> u64 {
        self.next_seq
    }

    fn is_delimiter(&self, line: &str) -> bool {
        line.trim_end() == self.delimiter
    }

    fn finish(&mut self) {
        self.finished = true;
        if !self.current.trim().is_empty() {
            debug!(
                bytes = self.current.len(),
                after_record = self.next_seq,
                "Dropping trailing data without a closing delimiter"
            );
        }
        self.current.clear();
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line_buf.clear();
            match self.inner.read_until(b'\n', &mut self.line_buf) {
                Ok(0) => {
                    self.finish();
                    return None;
                }
                Ok(_) => {
                    self.lines_read += 1;
                    let line = String::from_utf8_lossy(&self.line_buf);
                    if self.is_delimiter(&line) {
                        let text = std::mem::take(&mut self.current);
                        let record = Record::new(self.next_seq, text);
                        self.next_seq += 1;
                        return Some(Ok(record));
                    }
                    self.current.push_str(&line);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    self.finish();
                    return Some(Err(ReaderError::Io {
                        line: self.lines_read + 1,
                        source,
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &[u8]) -> Vec<String> {
        RecordReader::new(Cursor::new(input.to_vec()), "$$$$")
            .map(|r| r.unwrap().into_text())
            .collect()
    }

    #[test]
    fn test_unterminated_tail_is_dropped() {
        let records = read_all(b"A\n$$$$\nB\n$$$$\nC\n");
        assert_eq!(records, vec!["A\n", "B\n"]);
    }

    #[test]
    fn test_tail_without_newline_is_dropped() {
        let records = read_all(b"A\n$$$$\nB\n$$$$\nC");
        assert_eq!(records, vec!["A\n", "B\n"]);
    }

    #[test]
    fn test_delimiter_with_trailing_whitespace_and_crlf() {
        let records = read_all(b"A\r\n$$$$ \r\nB\n$$$$\r\n");
        assert_eq!(records, vec!["A\r\n", "B\n"]);
    }

    #[test]
    fn test_delimiter_inside_line_is_not_a_boundary() {
        let records = read_all(b"title $$$$ here\nbody\n$$$$\n");
        assert_eq!(records, vec!["title $$$$ here\nbody\n"]);
    }

    #[test]
    fn test_delimiter_glued_to_data_is_not_a_boundary() {
        let records = read_all(b"A$$$$\nB$$$$\nC\n");
        assert!(records.is_empty());

        let records = read_all(b"A$$$$\nB\n$$$$\nC");
        assert_eq!(records, vec!["A$$$$\nB\n"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let records = read_all(b"caf\xff\n$$$$\n");
        assert_eq!(records, vec!["caf\u{fffd}\n"]);
    }

    #[test]
    fn test_sequence_numbers_and_empty_records() {
        let reader = RecordReader::new(Cursor::new(b"$$$$\nX\n$$$$\n".to_vec()), "$$$$");
        let records: Vec<Record> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq(), 0);
        assert!(records[0].is_empty());
        assert_eq!(records[1].seq(), 1);
        assert_eq!(records[1].text(), "X\n");
    }

    #[test]
    fn test_custom_delimiter() {
        let reader = RecordReader::new(Cursor::new(b"a\n//\nb\n//\n".to_vec()), "//");
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn test_iterator_is_fused_after_end() {
        let mut reader = RecordReader::new(Cursor::new(b"A\n$$$$\n".to_vec()), "$$$$");
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 1);
    }
}
