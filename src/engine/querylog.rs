//! Query Log
//!
//! Collects every statement the store runs, with its duration, so a command
//! can print what it cost once it is done.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One executed statement
#[derive(Debug, Clone, Serialize)]
pub struct LoggedQuery {
    pub sql: String,
    pub duration_ms: f64,
}

/// Totals over the whole log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuerySummary {
    pub count: usize,
    pub total_seconds: f64,
}

#[derive(Debug, Default)]
pub struct QueryLog {
    enabled: AtomicBool,
    entries: Mutex<Vec<LoggedQuery>>,
}

impl QueryLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record a statement; a no-op while the log is disabled
    pub fn record(&self, sql: &str, elapsed: Duration) {
        if !self.is_enabled() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(LoggedQuery {
            sql: sql.trim().to_string(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        });
    }

    pub fn entries(&self) -> Vec<LoggedQuery> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn summary(&self) -> QuerySummary {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        QuerySummary {
            count: entries.len(),
            total_seconds: entries.iter().map(|q| q.duration_ms).sum::<f64>() / 1000.0,
        }
    }

    /// Count of logged statements whose SQL starts with `keyword` (case-insensitive)
    pub fn count_matching(&self, keyword: &str) -> usize {
        let keyword = keyword.to_uppercase();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|q| q.sql.to_uppercase().starts_with(&keyword))
            .count()
    }

    /// Plain-text report: each statement with its time, then the totals
    pub fn render(&self) -> String {
        let mut out = String::new();
        for query in self.entries() {
            out.push_str(&format!("\n{}\n{:.3} ms\n", query.sql, query.duration_ms));
        }
        let summary = self.summary();
        out.push_str(&format!(
            "\n[TOTAL TIME: {:.6} seconds]\n  Ran {} queries\n",
            summary.total_seconds, summary.count
        ));
        out
    }
}
