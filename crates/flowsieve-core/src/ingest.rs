use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use sha2::{Digest, Sha256};

use crate::counter::TrafficCounts;
use crate::models::LogRecord;

pub const CANONICAL_FIELDS: [&str; 4] = ["srcip", "dstip", "srcport", "dstport"];
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

// ---------------------------------------------------------------------------
// RowExtractor: the per-source extraction capability
// ---------------------------------------------------------------------------

/// How rows of one source map to `LogRecord`s. Decided once from the first
/// record, never re-checked per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowExtractor {
    /// The header named all four canonical columns; cells are read verbatim
    /// at the recorded indices.
    Direct {
        src_ip: usize,
        dst_ip: usize,
        src_port: usize,
        dst_port: usize,
    },
    /// No canonical header: each cell is treated as a `key=value` token
    /// (value optionally double-quoted) and the canonical keys are picked
    /// out of the row.
    KeyValue,
}

impl RowExtractor {
    /// Direct extraction if `header` names all four canonical columns.
    pub fn from_header(header: &StringRecord) -> Option<Self> {
        let mut idx = [0usize; 4];
        for (slot, name) in idx.iter_mut().zip(CANONICAL_FIELDS) {
            *slot = header.iter().position(|h| h.trim() == name)?;
        }
        let [src_ip, dst_ip, src_port, dst_port] = idx;
        Some(RowExtractor::Direct {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        })
    }

    /// Zero or one record per row. `None` marks a malformed row: in
    /// key=value mode, a row yielding no recognizable pair at all. Empty
    /// cells count as a missing field, not a value.
    pub fn extract(&self, row: &StringRecord) -> Option<LogRecord> {
        match self {
            RowExtractor::Direct {
                src_ip,
                dst_ip,
                src_port,
                dst_port,
            } => Some(LogRecord {
                src_ip: cell(row, *src_ip),
                dst_ip: cell(row, *dst_ip),
                src_port: cell(row, *src_port),
                dst_port: cell(row, *dst_port),
            }),
            RowExtractor::KeyValue => {
                let mut rec = LogRecord::default();
                let mut pairs = 0usize;
                for field in row.iter() {
                    let Some((key, value)) = field.split_once('=') else {
                        continue;
                    };
                    pairs += 1;
                    let value = value.trim_matches(|c| c == '"' || c == ' ');
                    if value.is_empty() {
                        continue;
                    }
                    match key.trim() {
                        "srcip" => rec.src_ip = Some(value.to_string()),
                        "dstip" => rec.dst_ip = Some(value.to_string()),
                        "srcport" => rec.src_port = Some(value.to_string()),
                        "dstport" => rec.dst_port = Some(value.to_string()),
                        _ => {}
                    }
                }
                if pairs == 0 {
                    None
                } else {
                    Some(rec)
                }
            }
        }
    }
}

fn cell(row: &StringRecord, idx: usize) -> Option<String> {
    row.get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// CsvSource: streaming batch reader for one log file
// ---------------------------------------------------------------------------

/// File-level metadata captured at open time.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub filename: String,
    pub file_size: u64,
    pub file_sha256: String,
}

pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    extractor: RowExtractor,
    /// In key=value mode the first record is data, not a header.
    pending: Option<StringRecord>,
    row: StringRecord,
    done: bool,
}

impl<R: Read> CsvSource<R> {
    /// Peek the first record to decide the row shape, then stream.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut first = StringRecord::new();
        let has_first = reader
            .read_record(&mut first)
            .context("failed to read first record")?;

        let (extractor, pending) = if !has_first {
            (RowExtractor::KeyValue, None)
        } else if let Some(direct) = RowExtractor::from_header(&first) {
            (direct, None)
        } else {
            (RowExtractor::KeyValue, Some(first))
        };

        Ok(Self {
            reader,
            extractor,
            pending,
            row: StringRecord::new(),
            done: false,
        })
    }

    pub fn extractor(&self) -> &RowExtractor {
        &self.extractor
    }

    /// Count up to `batch_size` rows into a fresh `TrafficCounts`.
    /// Returns `Ok(None)` once the source is exhausted.
    pub fn next_batch(&mut self, batch_size: usize) -> Result<Option<TrafficCounts>> {
        if self.done {
            return Ok(None);
        }

        let batch_size = batch_size.max(1);
        let mut counts = TrafficCounts::new();
        let mut rows = 0usize;

        if let Some(first) = self.pending.take() {
            match self.extractor.extract(&first) {
                Some(rec) => counts.observe(&rec),
                None => counts.note_bad_row(),
            }
            rows += 1;
        }

        while rows < batch_size {
            let has_row = self
                .reader
                .read_record(&mut self.row)
                .context("failed to read record")?;
            if !has_row {
                self.done = true;
                break;
            }
            match self.extractor.extract(&self.row) {
                Some(rec) => counts.observe(&rec),
                None => counts.note_bad_row(),
            }
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }
        Ok(Some(counts))
    }
}

/// Open a log file, record its size and SHA-256, and wrap it for streaming.
pub fn open_path(path: &Path) -> Result<(CsvSource<File>, SourceInfo)> {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let file_size = std::fs::metadata(path)
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();

    let file_sha256 = compute_file_sha256(path)?;

    tracing::info!(
        file = %filename,
        size = file_size,
        sha256 = %file_sha256,
        "ingesting log"
    );

    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let source = CsvSource::from_reader(file)?;

    Ok((
        source,
        SourceInfo {
            filename,
            file_size,
            file_sha256,
        },
    ))
}

fn compute_file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
