//! rollcall-ledger — durable, day-partitioned attendance records.
//!
//! One text table on disk with header `Name,Time`, rows appended in mark
//! order. The invariant: at most one record per identity per calendar day,
//! preserved across process restarts. Missing or corrupt storage self-heals
//! to an empty, well-formed table instead of failing.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const HEADER: &str = "Name,Time";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger io: {0}")]
    Io(#[from] std::io::Error),
}

/// One attendance event. Written once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub name: String,
    pub time: NaiveDateTime,
}

/// Outcome of a mark attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResult {
    /// A new record was appended for this identity today.
    Marked,
    /// The identity already has a record on this calendar day; nothing changed.
    AlreadyMarked,
}

/// Handle to the attendance table on disk.
///
/// Every mutation is a full read-modify-write; the at-most-one-per-day
/// invariant assumes a single writer per process. Concurrent writers would
/// need an exclusive-access scope around [`Ledger::mark`].
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Open the ledger, creating well-formed empty storage if it is absent
    /// or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Ledger, LedgerError> {
        let ledger = Ledger { path: path.into() };
        ledger.ensure_storage()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_storage(&self) -> Result<(), LedgerError> {
        let needs_init = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if needs_init {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&self.path, format!("{HEADER}\n"))?;
            tracing::info!(path = %self.path.display(), "initialized empty attendance table");
        }
        Ok(())
    }

    /// Load all records in stored order.
    ///
    /// A malformed table is reinitialized to an empty one rather than
    /// propagated as an error.
    pub fn records(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        self.ensure_storage()?;
        let text = fs::read_to_string(&self.path)?;
        match parse_table(&text) {
            Some(records) => Ok(records),
            None => {
                tracing::warn!(
                    path = %self.path.display(),
                    "malformed attendance table, reinitializing empty"
                );
                fs::write(&self.path, format!("{HEADER}\n"))?;
                Ok(Vec::new())
            }
        }
    }

    /// Record attendance for `name` at `now`, at most once per calendar day.
    ///
    /// Safe to call repeatedly: after the first success on a given day every
    /// further call for the same name returns [`MarkResult::AlreadyMarked`]
    /// without touching storage.
    pub fn mark(&self, name: &str, now: NaiveDateTime) -> Result<MarkResult, LedgerError> {
        let mut records = self.records()?;

        let today: NaiveDate = now.date();
        if records
            .iter()
            .any(|r| r.name == name && r.time.date() == today)
        {
            tracing::debug!(name, %today, "already marked today");
            return Ok(MarkResult::AlreadyMarked);
        }

        records.push(AttendanceRecord {
            name: name.to_string(),
            time: now,
        });
        self.persist(&records)?;
        tracing::info!(name, time = %now.format(TIME_FORMAT), "attendance marked");
        Ok(MarkResult::Marked)
    }

    fn persist(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
        let mut out = String::with_capacity(records.len() * 32 + HEADER.len() + 1);
        out.push_str(HEADER);
        out.push('\n');
        for record in records {
            out.push_str(&record.name);
            out.push(',');
            out.push_str(&record.time.format(TIME_FORMAT).to_string());
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Parse the stored table; `None` means it is malformed.
fn parse_table(text: &str) -> Option<Vec<AttendanceRecord>> {
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim().replace(' ', "") == HEADER => {}
        _ => return None,
    }

    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        // The timestamp never contains a comma; split from the right so a
        // comma inside the name cannot shift the time column.
        let (name, time) = line.rsplit_once(',')?;
        let time = NaiveDateTime::parse_from_str(time.trim(), TIME_FORMAT).ok()?;
        records.push(AttendanceRecord {
            name: name.trim().to_string(),
            time,
        });
    }
    Some(records)
}

/// Dashboard read contract: ledger rows as (display name, formatted time).
///
/// Missing or unreadable storage renders as an empty table. Stored names
/// that still carry a file-extension artifact are stripped and capitalized
/// again, matching the registry's name derivation.
pub fn read_for_display(path: &Path) -> Vec<(String, String)> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    let Some(records) = parse_table(&text) else {
        tracing::warn!(path = %path.display(), "unreadable attendance table, rendering empty");
        return Vec::new();
    };
    records
        .into_iter()
        .map(|r| {
            (
                clean_display_name(&r.name),
                r.time.format(TIME_FORMAT).to_string(),
            )
        })
        .collect()
}

/// Strip a trailing extension artifact and capitalize (first char upper,
/// rest lower), mirroring how reference image names become identities.
fn clean_display_name(raw: &str) -> String {
    let stem = raw.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(raw);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
