//! Exchange logging and deterministic replay of recorded sessions.
//!
//! Each processed frame is written as one JSONL entry holding the raw request
//! bytes and the raw response bytes (if any). Raw bytes are kept rather than
//! decoded floats so NaN payloads replay bit-exactly.

use crate::session::Session;
use anyhow::{bail, Context, Result};
use hbup_net::{ErrorCode, RequestOpcode};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

/// One request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    /// Position of the frame within its connection, starting at 0.
    pub seq: u64,
    /// Decoded opcode name, absent for unknown opcodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<RequestOpcode>,
    /// Error reported for this frame, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    /// Opcode byte followed by the payload.
    pub request: Vec<u8>,
    /// Encoded response, or `None` when the server stayed silent.
    pub response: Option<Vec<u8>>,
}

/// Attempts made by [`ExchangeLogger::create_unique`] before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Exchange logger that writes to JSONL format.
pub struct ExchangeLogger {
    writer: BufWriter<tokio::fs::File>,
    entries_written: u64,
}

impl ExchangeLogger {
    /// Create a new exchange log, truncating any existing file.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create exchange log: {path:?}"))?;
        Ok(Self::from_file(file))
    }

    /// Create `<stem>.jsonl` in `dir` without touching existing logs.
    ///
    /// When the name is taken, `<stem>-1.jsonl`, `<stem>-2.jsonl`, ... are
    /// tried in turn. Returns the logger and the path it writes to.
    pub async fn create_unique(dir: &Path, stem: &str) -> Result<(Self, PathBuf)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = if attempt == 0 {
                dir.join(format!("{stem}.jsonl"))
            } else {
                dir.join(format!("{stem}-{attempt}.jsonl"))
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((Self::from_file(file), path)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to create exchange log: {path:?}"))
                }
            }
        }
        bail!("No free exchange log name for {stem:?} in {}", dir.display())
    }

    fn from_file(file: tokio::fs::File) -> Self {
        Self {
            writer: BufWriter::new(file),
            entries_written: 0,
        }
    }

    /// Log an exchange entry.
    pub async fn log(&mut self, entry: &ExchangeEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .context("Failed to write exchange log entry")?;
        self.entries_written += 1;
        Ok(())
    }

    /// Flush buffered writes.
    pub async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .context("Failed to flush exchange log")?;
        Ok(())
    }

    /// Get number of entries written.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }
}

/// A response that differs between the recording and the replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    /// Sequence number of the offending exchange.
    pub seq: u64,
    /// Response bytes from the log.
    pub expected: Option<Vec<u8>>,
    /// Response bytes produced by the replay.
    pub actual: Option<Vec<u8>>,
}

/// Outcome of [`ExchangeReplay::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of exchanges replayed.
    pub replayed: usize,
    /// Exchanges whose responses differed.
    pub mismatches: Vec<ReplayMismatch>,
}

impl ReplayReport {
    /// True when every replayed response matched the recording.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// A recorded connection loaded back from its exchange log.
pub struct ExchangeReplay {
    entries: Vec<ExchangeEntry>,
}

impl ExchangeReplay {
    /// Load a replay from a JSONL file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open exchange log: {:?}", path.as_ref()))?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ExchangeEntry = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Build a replay from in-memory entries.
    pub fn from_entries(entries: Vec<ExchangeEntry>) -> Self {
        Self { entries }
    }

    /// Recorded exchanges in log order.
    pub fn entries(&self) -> &[ExchangeEntry] {
        &self.entries
    }

    /// Re-drive a fresh session with the recorded requests and compare responses.
    pub fn verify(&self) -> Result<ReplayReport> {
        let mut session = Session::new();
        let mut report = ReplayReport::default();

        for entry in &self.entries {
            let mut out = Vec::new();
            session
                .process(&entry.request, &mut out)
                .with_context(|| format!("Exchange {} has a malformed request", entry.seq))?;
            let actual = (!out.is_empty()).then_some(out);
            if actual != entry.response {
                report.mismatches.push(ReplayMismatch {
                    seq: entry.seq,
                    expected: entry.response.clone(),
                    actual,
                });
            }
            report.replayed += 1;
        }

        Ok(report)
    }
}
