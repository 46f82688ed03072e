use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::errors::{LinkError, Result};
use crate::types::DiagnosticStream;

/// One line of a diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry<'a> {
    pub label: &'a str,
    /// Identifier of the record holding the offending element.
    pub document_id: &'a str,
    /// The offending element, serialized.
    pub element_xml: &'a str,
}

impl fmt::Display for DiagnosticEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml: String = self
            .element_xml
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        write!(f, "{} in record {}: {}", self.label, self.document_id, xml)
    }
}

/// Named, append-only diagnostic streams.
///
/// Implementations serialize concurrent appends per stream.
pub trait ReportSink: Send + Sync {
    fn append(&self, stream: DiagnosticStream, entry: &DiagnosticEntry<'_>) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes each stream to `<dir>/<stream name>.txt`.
///
/// Files are created on the first entry, so a clean run leaves no reports.
pub struct FileReportSink {
    dir: PathBuf,
    streams: HashMap<DiagnosticStream, Mutex<Option<BufWriter<File>>>>,
}

impl FileReportSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            streams: DiagnosticStream::ALL
                .iter()
                .map(|stream| (*stream, Mutex::new(None)))
                .collect(),
        }
    }

    /// Path of the file receiving `stream`.
    pub fn stream_path(&self, stream: DiagnosticStream) -> PathBuf {
        self.dir.join(format!("{}.txt", stream.as_str()))
    }

    fn open(&self, stream: DiagnosticStream) -> Result<BufWriter<File>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.stream_path(stream);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LinkError::Configuration {
                message: format!("failed to open report '{}': {}", path.display(), e),
            })?;
        Ok(BufWriter::new(file))
    }
}

impl ReportSink for FileReportSink {
    fn append(&self, stream: DiagnosticStream, entry: &DiagnosticEntry<'_>) -> Result<()> {
        let Some(slot) = self.streams.get(&stream) else {
            return Ok(());
        };
        let mut writer = slot.lock();
        if writer.is_none() {
            *writer = Some(self.open(stream)?);
        }
        if let Some(out) = writer.as_mut() {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        for slot in self.streams.values() {
            if let Some(out) = slot.lock().as_mut() {
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Keeps every stream in memory.
#[derive(Default)]
pub struct MemoryReportSink {
    entries: Mutex<HashMap<DiagnosticStream, Vec<String>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines appended to `stream` so far.
    pub fn entries(&self, stream: DiagnosticStream) -> Vec<String> {
        self.entries.lock().get(&stream).cloned().unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }
}

impl ReportSink for MemoryReportSink {
    fn append(&self, stream: DiagnosticStream, entry: &DiagnosticEntry<'_>) -> Result<()> {
        self.entries
            .lock()
            .entry(stream)
            .or_default()
            .push(entry.to_string());
        Ok(())
    }
}
