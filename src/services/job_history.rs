//! Job history service
//!
//! Stores recent admission and notification job completions in memory with
//! file-backed persistence so history survives worker restarts.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_HISTORY_SIZE: usize = 100;
const HISTORY_FILE: &str = "logs/job-history.json";

/// Job entry in history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub details: Option<String>,
}

/// Response for listing job history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryResponse {
    pub jobs: Vec<JobHistoryEntry>,
    pub total: usize,
}

/// Job history storage backed by an in-memory deque + JSON file on disk.
pub struct JobHistoryService {
    history: Arc<RwLock<VecDeque<JobHistoryEntry>>>,
}

impl JobHistoryService {
    pub fn new() -> Self {
        let mut deque = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        if let Some(loaded) = Self::load_from_disk() {
            for entry in loaded {
                deque.push_back(entry);
            }
            info!("Loaded {} job history entries from disk", deque.len());
        }
        Self {
            history: Arc::new(RwLock::new(deque)),
        }
    }

    /// Record a completed job
    pub fn record_completed(
        &self,
        id: Uuid,
        job_type: &str,
        user_id: Uuid,
        started_at: DateTime<Utc>,
        details: Option<String>,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds() as u64;

        self.add_entry(JobHistoryEntry {
            id,
            user_id,
            job_type: job_type.to_string(),
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_ms,
            error: None,
            details,
        });
    }

    /// Record a failed job
    pub fn record_failed(
        &self,
        id: Uuid,
        job_type: &str,
        user_id: Uuid,
        started_at: DateTime<Utc>,
        error: String,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds() as u64;

        self.add_entry(JobHistoryEntry {
            id,
            user_id,
            job_type: job_type.to_string(),
            status: "failed".to_string(),
            started_at,
            completed_at,
            duration_ms,
            error: Some(error),
            details: None,
        });
    }

    fn add_entry(&self, entry: JobHistoryEntry) {
        let mut history = self.history.write();

        if history.len() >= MAX_HISTORY_SIZE {
            history.pop_back();
        }

        history.push_front(entry);

        Self::save_to_disk(&history);
    }

    /// Get recent job history
    pub fn get_recent(&self, limit: usize) -> JobHistoryResponse {
        let history = self.history.read();
        let jobs: Vec<JobHistoryEntry> = history.iter().take(limit).cloned().collect();
        let total = history.len();

        JobHistoryResponse { jobs, total }
    }

    fn load_from_disk() -> Option<Vec<JobHistoryEntry>> {
        let path = Path::new(HISTORY_FILE);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Failed to parse job history file: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read job history file: {}", e);
                None
            }
        }
    }

    fn save_to_disk(history: &VecDeque<JobHistoryEntry>) {
        let entries: Vec<&JobHistoryEntry> = history.iter().collect();
        if let Some(parent) = Path::new(HISTORY_FILE).parent() {
            std::fs::create_dir_all(parent).ok();
        }
        match serde_json::to_string(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(HISTORY_FILE, json) {
                    warn!("Failed to persist job history: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize job history: {}", e),
        }
    }
}

impl Default for JobHistoryService {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    /// Process-wide job history, shared by the admission processor and the
    /// history handler.
    pub static ref JOB_HISTORY: JobHistoryService = JobHistoryService::new();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list() {
        let service = JobHistoryService {
            history: Arc::new(RwLock::new(VecDeque::new())),
        };
        let started = Utc::now();
        service.record_completed(
            Uuid::new_v4(),
            "admission.import",
            Uuid::new_v4(),
            started,
            Some("2/2 rows imported".to_string()),
        );
        service.record_failed(
            Uuid::new_v4(),
            "admission.import",
            Uuid::new_v4(),
            started,
            "decode failed".to_string(),
        );

        let recent = service.get_recent(10);
        assert_eq!(recent.total, 2);
        // Most recent first.
        assert_eq!(recent.jobs[0].status, "failed");
        assert_eq!(recent.jobs[1].status, "completed");
    }

    #[test]
    fn test_limit_is_respected() {
        let service = JobHistoryService {
            history: Arc::new(RwLock::new(VecDeque::new())),
        };
        for _ in 0..5 {
            service.record_completed(
                Uuid::new_v4(),
                "admission.import",
                Uuid::new_v4(),
                Utc::now(),
                None,
            );
        }
        assert_eq!(service.get_recent(3).jobs.len(), 3);
        assert_eq!(service.get_recent(3).total, 5);
    }
}
