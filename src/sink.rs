use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::models::ReviewRecord;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only destination for accepted records. A successful return means the
/// records are durable.
pub trait RecordSink: Send + Sync {
    fn append(&self, records: &[ReviewRecord]) -> Result<(), SinkError>;
}

/// Dataset written as one JSON object per line.
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Read every record back from a dataset file.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<ReviewRecord>, SinkError> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl RecordSink for JsonlSink {
    fn append(&self, records: &[ReviewRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        // Serialize the whole batch first so a bad record never leaves a torn write.
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = self.file.lock();
        append_batch(&mut *file, &buffer)?;
        Ok(())
    }
}

/// File operations needed to append a batch and undo a partial one.
trait DurableFile: Write {
    fn end_offset(&self) -> io::Result<u64>;
    fn truncate_to(&self, len: u64) -> io::Result<()>;
    fn sync(&self) -> io::Result<()>;
}

impl DurableFile for File {
    fn end_offset(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Write `buffer` at the end of `file` and sync it. On failure the file is cut
/// back to its previous length so no partial line survives.
fn append_batch<F: DurableFile>(file: &mut F, buffer: &[u8]) -> io::Result<()> {
    let start = file.end_offset()?;
    let written = file
        .write_all(buffer)
        .and_then(|()| file.flush())
        .and_then(|()| file.sync());
    if let Err(e) = written {
        if let Err(truncate_err) = file.truncate_to(start) {
            warn!(offset = start, error = %truncate_err, "Failed to roll back partial dataset write");
        }
        return Err(e);
    }
    Ok(())
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ReviewRecord>>,
    appends: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReviewRecord> {
        self.records.lock().clone()
    }

    pub fn append_count(&self) -> usize {
        *self.appends.lock()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, records: &[ReviewRecord]) -> Result<(), SinkError> {
        self.records.lock().extend_from_slice(records);
        *self.appends.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn record(author: &str) -> ReviewRecord {
        ReviewRecord {
            entity: "shop.test/acme".to_string(),
            author: author.to_string(),
            review_at: None,
            recommendation: "Doporučuje obchod".to_string(),
            rating: Some("5".to_string()),
            pros: vec!["rychlé dodání".to_string()],
            cons: Vec::new(),
            summary: Some("Vše v pořádku".to_string()),
            shop_reply: None,
        }
    }

    #[test]
    fn test_jsonl_sink_appends_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.jsonl");

        {
            let sink = JsonlSink::open(&path).unwrap();
            sink.append(&[record("a"), record("b")]).unwrap();
            sink.append(&[]).unwrap();
        }
        {
            let sink = JsonlSink::open(&path).unwrap();
            sink.append(&[record("c")]).unwrap();
        }

        let records = JsonlSink::read_all(&path).unwrap();
        let authors: Vec<&str> = records.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, vec!["a", "b", "c"]);
        assert_eq!(records[0], record("a"));
    }

    /// Accepts `capacity` bytes in total, then fails every write.
    struct ShortFile {
        data: RefCell<Vec<u8>>,
        capacity: usize,
    }

    impl Write for ShortFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let data = self.data.get_mut();
            let room = self.capacity.saturating_sub(data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            let n = room.min(buf.len());
            data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DurableFile for ShortFile {
        fn end_offset(&self) -> io::Result<u64> {
            Ok(self.data.borrow().len() as u64)
        }

        fn truncate_to(&self, len: u64) -> io::Result<()> {
            self.data.borrow_mut().truncate(len as usize);
            Ok(())
        }

        fn sync(&self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_torn_write_is_rolled_back() {
        let mut file = ShortFile {
            data: RefCell::new(b"{\"author\":\"a\"}\n".to_vec()),
            capacity: 24,
        };

        let err = append_batch(&mut file, b"{\"author\":\"b\"}\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
        assert_eq!(file.data.borrow().as_slice(), b"{\"author\":\"a\"}\n");

        file.capacity = 64;
        append_batch(&mut file, b"{\"author\":\"b\"}\n").unwrap();
        assert_eq!(
            file.data.borrow().as_slice(),
            b"{\"author\":\"a\"}\n{\"author\":\"b\"}\n"
        );
    }

    #[test]
    fn test_file_truncate_restores_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.jsonl");
        let mut file = OpenOptions::new().create(true).append(true).open(&path).unwrap();
        file.write_all(b"kept\n").unwrap();

        let start = file.end_offset().unwrap();
        file.write_all(b"torn").unwrap();
        file.truncate_to(start).unwrap();
        file.write_all(b"next\n").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"kept\nnext\n");
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.append(&[record("a")]).unwrap();
        sink.append(&[record("b"), record("c")]).unwrap();
        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.append_count(), 2);
    }
}
