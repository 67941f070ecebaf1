//! Audit logging for registry operations
//!
//! Every operation attempt is recorded, successful or not. Entries live in
//! memory for the lifetime of the registry handle. An optional sink file
//! receives a JSON line per entry; it is written to but never read back.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The registry operation being audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Store,
    Retrieve,
    Update,
    Delete,
    Rotate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Store => "STORE",
            AuditAction::Retrieve => "RETRIEVE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Rotate => "ROTATE",
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation finished
    pub timestamp: DateTime<Utc>,

    /// The operation
    pub action: AuditAction,

    /// Name the operation was asked about
    pub secret_name: String,

    /// Whether the operation took effect
    pub success: bool,

    /// Correlation token, unique enough to tell entries apart in a listing
    pub session_id: String,
}

impl AuditEntry {
    pub fn new(action: AuditAction, secret_name: &str, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            secret_name: secret_name.to_string(),
            success,
            session_id: session_token(),
        }
    }
}

/// Append-only audit trail
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    sink: Option<PathBuf>,
}

impl AuditLog {
    /// In-memory log
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory log that also appends every entry to `sink`
    pub fn with_sink(sink: PathBuf) -> Self {
        Self {
            entries: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Record an operation attempt
    pub fn append(&mut self, action: AuditAction, secret_name: &str, success: bool) {
        let entry = AuditEntry::new(action, secret_name, success);

        if let Some(sink) = &self.sink {
            if let Err(e) = write_line(sink, &entry) {
                tracing::warn!(sink = %sink.display(), error = %e, "failed to write audit sink");
            }
        }

        self.entries.push(entry);
    }

    /// The most recent `limit` entries, oldest first
    pub fn tail(&self, limit: usize) -> Vec<AuditEntry> {
        let start = self.entries.len().saturating_sub(limit);
        self.entries[start..].to_vec()
    }

    /// Number of entries recorded after `since`
    pub fn count_since(&self, since: DateTime<Utc>) -> usize {
        self.entries.iter().filter(|e| e.timestamp > since).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn write_line(sink: &Path, entry: &AuditEntry) -> std::io::Result<()> {
    if let Some(parent) = sink.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(sink)?;
    let mut writer = BufWriter::new(file);
    let json = serde_json::to_string(entry)?;
    writeln!(writer, "{}", json)?;
    writer.flush()
}

fn session_token() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::{BufRead, BufReader};
    use tempfile::tempdir;

    #[test]
    fn test_tail_is_chronological() {
        let mut log = AuditLog::new();
        for name in ["a", "b", "c", "d"] {
            log.append(AuditAction::Store, name, true);
        }

        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].secret_name, "c");
        assert_eq!(tail[1].secret_name, "d");
    }

    #[test]
    fn test_tail_larger_than_log() {
        let mut log = AuditLog::new();
        log.append(AuditAction::Retrieve, "missing", false);

        assert_eq!(log.tail(100).len(), 1);
        assert!(log.tail(0).is_empty());
        assert!(AuditLog::new().tail(5).is_empty());
    }

    #[test]
    fn test_entry_fields() {
        let mut log = AuditLog::new();
        log.append(AuditAction::Rotate, "db_pw", false);

        let entry = &log.tail(1)[0];
        assert_eq!(entry.action, AuditAction::Rotate);
        assert!(!entry.success);
        assert_eq!(entry.session_id.len(), 8);
        assert!(entry.session_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_count_since() {
        let mut log = AuditLog::new();
        log.append(AuditAction::Store, "a", true);
        log.append(AuditAction::Retrieve, "a", true);

        assert_eq!(log.count_since(Utc::now() - Duration::hours(24)), 2);
        assert_eq!(log.count_since(Utc::now() + Duration::hours(1)), 0);
    }

    #[test]
    fn test_sink_receives_json_lines() {
        let dir = tempdir().unwrap();
        let sink = dir.path().join("audit").join("audit.log");
        let mut log = AuditLog::with_sink(sink.clone());

        log.append(AuditAction::Store, "api_key", true);
        log.append(AuditAction::Delete, "api_key", true);

        let file = std::fs::File::open(&sink).unwrap();
        let entries: Vec<AuditEntry> = BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, AuditAction::Delete);

        let raw = std::fs::read_to_string(&sink).unwrap();
        assert!(raw.contains("\"action\":\"STORE\""));
    }
}
