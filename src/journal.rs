// src/journal.rs

//! Install rename journal
//!
//! There is no rollback: once renames start, a crash leaves the system
//! partially installed. The journal makes that state detectable. Each
//! install writes a `Begin` barrier before the first rename, one
//! `Rename` record per committed path, and a `Done` barrier after the
//! sync; a leftover journal without `Done` means the previous install
//! was interrupted and the user must re-run it.
//!
//! Records are single lines of `{crc32_hex}|{json}`; a corrupt tail is
//! tolerated by stopping at the first record that fails its checksum.

use crate::config::UpdaterConfig;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::warn;

/// A record in the install journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JournalRecord {
    /// Install started committing renames
    Begin {
        version: u32,
        bundles: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    /// One path renamed into place
    Rename { path: String },
    /// All renames committed and synced
    Done { renamed: usize },
}

/// Append-only journal for one install's rename phase.
pub struct InstallJournal {
    path: PathBuf,
    file: File,
    renamed: usize,
}

impl InstallJournal {
    /// Open a fresh journal and write the `Begin` barrier.
    pub fn begin(config: &UpdaterConfig, version: u32, bundles: &[String]) -> Result<Self> {
        let path = config.journal_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)?;

        let mut journal = Self {
            path,
            file,
            renamed: 0,
        };
        journal.write_barrier(JournalRecord::Begin {
            version,
            bundles: bundles.to_vec(),
            timestamp: Utc::now(),
        })?;
        Ok(journal)
    }

    /// Record one committed rename (no fsync; the `Done` barrier covers
    /// durability).
    pub fn record_rename(&mut self, path: &str) -> Result<()> {
        self.renamed += 1;
        self.write(JournalRecord::Rename {
            path: path.to_string(),
        })
    }

    /// Write the `Done` barrier and discard the journal.
    pub fn complete(mut self) -> Result<()> {
        let renamed = self.renamed;
        self.write_barrier(JournalRecord::Done { renamed })?;
        fs::remove_file(&self.path)?;
        Ok(())
    }

    fn write(&mut self, record: JournalRecord) -> Result<()> {
        let json = serde_json::to_string(&record).map_err(|e| {
            crate::Error::IoError(format!("failed to serialize journal record: {e}"))
        })?;
        let crc = crc32fast::hash(json.as_bytes());
        writeln!(self.file, "{:08x}|{}", crc, json)?;
        Ok(())
    }

    fn write_barrier(&mut self, record: JournalRecord) -> Result<()> {
        self.write(record)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Read all valid records from a journal file, stopping at the first
/// corrupt line.
fn read_records(path: &PathBuf) -> Result<Vec<JournalRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.is_empty() {
            continue;
        }

        let Some((crc_hex, json)) = line.split_once('|') else {
            warn!("Malformed journal line {}: missing delimiter", line_num + 1);
            break;
        };

        let expected_crc = match u32::from_str_radix(crc_hex, 16) {
            Ok(v) => v,
            Err(_) => {
                warn!("Invalid CRC32 at journal line {}", line_num + 1);
                break;
            }
        };
        if expected_crc != crc32fast::hash(json.as_bytes()) {
            warn!("CRC mismatch at journal line {}", line_num + 1);
            break;
        }

        match serde_json::from_str(json) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Unparsable journal record at line {}: {}", line_num + 1, e);
                break;
            }
        }
    }

    Ok(records)
}

/// If the previous install left an incomplete journal, return the paths
/// it had already committed.
pub fn incomplete_install(config: &UpdaterConfig) -> Result<Option<Vec<String>>> {
    let path = config.journal_path();
    if !path.exists() {
        return Ok(None);
    }

    let records = read_records(&path)?;
    let done = records.iter().any(|r| matches!(r, JournalRecord::Done { .. }));
    if done {
        return Ok(None);
    }

    let paths = records
        .into_iter()
        .filter_map(|r| match r {
            JournalRecord::Rename { path } => Some(path),
            _ => None,
        })
        .collect();
    Ok(Some(paths))
}

/// Drop a leftover journal after its state has been reported.
pub fn clear(config: &UpdaterConfig) -> Result<()> {
    let path = config.journal_path();
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}
