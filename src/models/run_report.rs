use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::models::{CategoryId, SourceId};

/// How a single request attempt ended, as judged by the fetch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success,
    Blocked,
    Timeout,
    Status(u16),
    Connection,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success => write!(f, "success"),
            FetchOutcome::Blocked => write!(f, "blocked"),
            FetchOutcome::Timeout => write!(f, "timeout"),
            FetchOutcome::Status(code) => write!(f, "HTTP {}", code),
            FetchOutcome::Connection => write!(f, "connection error"),
        }
    }
}

/// One request attempt. Only lives long enough to be logged and tallied.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub url: String,
    pub attempt: u32,
    pub outcome: FetchOutcome,
    pub delay_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverableErrorKind {
    PageBlocked,
    RetriesExhausted,
}

/// A failure that ended pagination for one (source, category) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverableError {
    pub source: SourceId,
    pub category: CategoryId,
    pub page_url: String,
    pub kind: RecoverableErrorKind,
    pub attempts: u32,
    pub last_outcome: FetchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTally {
    pub pairs_attempted: usize,
    pub pairs_succeeded: usize,
    pub pairs_failed: usize,
    pub pairs_cancelled: usize,
    pub pages_fetched: usize,
    pub fetch_attempts: usize,
    pub records_collected: usize,
    pub corrupt_fragments: usize,
    pub synthetic: bool,
    pub synthetic_records: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

/// Accounting for one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub status: RunStatus,
    pub sources: BTreeMap<SourceId, SourceTally>,
    pub errors: Vec<RecoverableError>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed_ms: 0,
            status: RunStatus::Running,
            sources: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn merge_source(&mut self, source: SourceId, tally: SourceTally, errors: Vec<RecoverableError>) {
        self.sources.insert(source, tally);
        self.errors.extend(errors);
    }

    pub fn finish(&mut self, cancelled: bool) {
        let elapsed = Utc::now() - self.started_at;
        self.elapsed_ms = elapsed.num_milliseconds().max(0) as u64;
        self.status = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
    }

    pub fn total_records(&self) -> usize {
        self.sources
            .values()
            .map(|tally| tally.records_collected + tally.synthetic_records)
            .sum()
    }

    pub fn pairs_failed(&self) -> usize {
        self.sources.values().map(|tally| tally.pairs_failed).sum()
    }

    pub fn synthetic_sources(&self) -> Vec<SourceId> {
        self.sources
            .iter()
            .filter(|(_, tally)| tally.synthetic)
            .map(|(source, _)| *source)
            .collect()
    }
}
