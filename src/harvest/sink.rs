//! Record sinks
//!
//! Where harvested records go: files on disk, an async stream for a
//! downstream parser, or a plain vector.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use super::state::Record;
use crate::{Error, Result};

/// Consumer of harvested records
#[async_trait]
pub trait RecordSink: Send {
    /// Take ownership of one record
    async fn accept(&mut self, record: Record) -> Result<()>;

    /// Called once after the last record of a run
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl RecordSink for Vec<Record> {
    async fn accept(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Make `identifier` safe to use as a file name
pub fn sanitize_file_name(identifier: &str) -> String {
    let cleaned: String = identifier
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        _ => cleaned,
    }
}

/// Writes each record to `<dir>/<identifier>.html`
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    written: usize,
}

impl FileSink {
    /// Create the sink, creating `dir` if absent
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a record with this identifier is written to
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.html", sanitize_file_name(identifier)))
    }

    /// Records written so far
    pub fn written(&self) -> usize {
        self.written
    }
}

#[async_trait]
impl RecordSink for FileSink {
    async fn accept(&mut self, record: Record) -> Result<()> {
        let path = self.path_for(&record.identifier);
        tokio::fs::write(&path, record.raw_html.as_bytes()).await?;
        self.written += 1;
        debug!("Saved record {} to {}", record.identifier, path.display());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        info!("Wrote {} records to {}", self.written, self.dir.display());
        Ok(())
    }
}

/// Forwards records into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Record>,
}

/// Create a channel sink and the stream its records arrive on
pub fn channel(buffer: usize) -> (ChannelSink, ReceiverStream<Record>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ChannelSink { tx }, ReceiverStream::new(rx))
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn accept(&mut self, record: Record) -> Result<()> {
        self.tx
            .send(record)
            .await
            .map_err(|e| Error::internal(format!("Record stream closed, dropped {}", e.0.identifier)))
    }
}
