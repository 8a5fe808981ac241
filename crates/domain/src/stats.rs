use chrono::{DateTime, Local};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Per-server resolution counters.
///
/// Counters are atomic so the concurrent per-server pipelines can update
/// them without a map-wide lock; `last_error` changes rarely and sits
/// behind its own mutex.
#[derive(Debug, Default)]
pub struct ServerStats {
    total: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStatsSnapshot {
    pub total: u64,
    pub failures: u64,
    pub last_error: String,
}

impl ServerStats {
    pub fn record_success(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_error.lock() {
            last.clear();
            last.push_str(error);
        }
    }

    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .map(|e| e.clone())
                .unwrap_or_default(),
        }
    }
}

/// Aggregated resolution statistics, one entry per configured server.
#[derive(Debug)]
pub struct ResolutionStats {
    pub start_time: DateTime<Local>,
    stats: DashMap<String, ServerStats>,
}

impl ResolutionStats {
    pub fn new(servers: &[String]) -> Self {
        let stats = DashMap::new();
        for server in servers {
            stats.insert(server.clone(), ServerStats::default());
        }
        Self {
            start_time: Local::now(),
            stats,
        }
    }

    pub fn record_success(&self, server: &str) {
        if let Some(entry) = self.stats.get(server) {
            entry.record_success();
        }
    }

    pub fn record_failure(&self, server: &str, error: &str) {
        if let Some(entry) = self.stats.get(server) {
            entry.record_failure(error);
        }
    }

    /// Snapshot of every server's counters, sorted by server name.
    pub fn snapshot(&self) -> Vec<(String, ServerStatsSnapshot)> {
        let mut rows: Vec<_> = self
            .stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ResolutionStats::new(&["8.8.8.8:53".to_string()]);
        stats.record_success("8.8.8.8:53");
        stats.record_success("8.8.8.8:53");
        stats.record_failure("8.8.8.8:53", "SERVFAIL");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1.total, 2);
        assert_eq!(snapshot[0].1.failures, 1);
        assert_eq!(snapshot[0].1.last_error, "SERVFAIL");
    }

    #[test]
    fn unknown_server_is_ignored() {
        let stats = ResolutionStats::new(&["8.8.8.8:53".to_string()]);
        stats.record_success("1.1.1.1:53");
        assert_eq!(stats.snapshot()[0].1.total, 0);
    }

    #[test]
    fn snapshot_is_sorted_by_server() {
        let stats = ResolutionStats::new(&[
            "9.9.9.9:53".to_string(),
            "1.1.1.1:53".to_string(),
        ]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot[0].0, "1.1.1.1:53");
        assert_eq!(snapshot[1].0, "9.9.9.9:53");
    }
}
