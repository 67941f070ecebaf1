//! Registry statistics

use crate::audit::AuditLog;
use crate::record::{SecretRecord, SecretSummary};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Window for `recent_activity`
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Aggregate over active records
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecretStats {
    pub total_secrets: usize,
    pub total_accesses: u64,
    pub most_accessed: Option<SecretSummary>,
    pub least_accessed: Option<SecretSummary>,
    /// Audit entries in the last 24 hours
    pub recent_activity: usize,
}

impl SecretStats {
    /// Compute stats as of `now`. Ties for most/least accessed go to the
    /// record created first.
    pub fn compute(records: &[SecretRecord], audit: &AuditLog, now: DateTime<Utc>) -> Self {
        let mut stats = SecretStats::default();
        let mut most: Option<&SecretRecord> = None;
        let mut least: Option<&SecretRecord> = None;

        for record in records.iter().filter(|r| r.is_active()) {
            stats.total_secrets += 1;
            stats.total_accesses += record.access_count;

            if most.map_or(true, |m| record.access_count > m.access_count) {
                most = Some(record);
            }
            if least.map_or(true, |l| record.access_count < l.access_count) {
                least = Some(record);
            }
        }

        stats.most_accessed = most.map(SecretRecord::summary);
        stats.least_accessed = least.map(SecretRecord::summary);
        stats.recent_activity = audit.count_since(now - Duration::hours(RECENT_WINDOW_HOURS));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::record::SecretStatus;

    fn record(name: &str, count: u64) -> SecretRecord {
        let mut r = SecretRecord::new(name, "", vec![]);
        r.access_count = count;
        r
    }

    #[test]
    fn test_empty() {
        let stats = SecretStats::compute(&[], &AuditLog::new(), Utc::now());
        assert_eq!(stats.total_secrets, 0);
        assert_eq!(stats.total_accesses, 0);
        assert!(stats.most_accessed.is_none());
        assert!(stats.least_accessed.is_none());
        assert_eq!(stats.recent_activity, 0);
    }

    #[test]
    fn test_ties_go_to_first_record() {
        let records = vec![record("a", 3), record("b", 1), record("c", 3), record("d", 1)];
        let stats = SecretStats::compute(&records, &AuditLog::new(), Utc::now());

        assert_eq!(stats.total_secrets, 4);
        assert_eq!(stats.total_accesses, 8);
        assert_eq!(stats.most_accessed.unwrap().name, "a");
        assert_eq!(stats.least_accessed.unwrap().name, "b");
    }

    #[test]
    fn test_deleted_records_are_ignored() {
        let mut records = vec![record("busy", 50), record("quiet", 2)];
        records[0].status = SecretStatus::Deleted;

        let stats = SecretStats::compute(&records, &AuditLog::new(), Utc::now());
        assert_eq!(stats.total_secrets, 1);
        assert_eq!(stats.total_accesses, 2);
        assert_eq!(stats.most_accessed.unwrap().name, "quiet");
    }

    #[test]
    fn test_recent_activity_window() {
        let mut audit = AuditLog::new();
        audit.append(AuditAction::Store, "a", true);
        audit.append(AuditAction::Retrieve, "missing", false);

        let now = Utc::now();
        assert_eq!(SecretStats::compute(&[], &audit, now).recent_activity, 2);

        let tomorrow = now + Duration::hours(RECENT_WINDOW_HOURS + 1);
        assert_eq!(SecretStats::compute(&[], &audit, tomorrow).recent_activity, 0);
    }
}
