use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a setup may be used to start new runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupStatus {
    Active,
    Inactive,
}

/// Lifecycle state of a run.
///
/// Runs move strictly forward: `Pending` to `Running` to exactly one of
/// the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Declarative description of a load-test target.
#[derive(Debug, Clone, PartialEq)]
pub struct Setup {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// HTTP verb issued against the target.
    pub method: String,
    pub url: String,
    /// Request body, may be empty.
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    /// Target request rate, requests per second.
    pub rps: u32,
    /// How long the attack loop runs.
    pub duration: Duration,
    pub status: SetupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Setup {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        description: String,
        method: String,
        url: String,
        body: Vec<u8>,
        headers: HashMap<String, String>,
        rps: u32,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            method,
            url,
            body,
            headers,
            rps,
            duration,
            status: SetupStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One execution of a setup.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: Uuid,
    pub setup_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the run reaches a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
    /// Populated only when the run failed.
    pub error: Option<String>,
    /// Final measurements, snapshotted at run finalisation.
    pub stats: Option<RunStats>,
}

impl Run {
    pub fn new(setup_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            setup_id,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            stats: None,
        }
    }
}

/// Aggregated measurements of a run. Latencies are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    #[serde(rename = "avg_latency_ms")]
    pub avg_latency: f64,
    #[serde(rename = "min_latency_ms")]
    pub min_latency: f64,
    #[serde(rename = "max_latency_ms")]
    pub max_latency: f64,
    #[serde(rename = "p50_latency_ms")]
    pub p50_latency: f64,
    #[serde(rename = "p90_latency_ms")]
    pub p90_latency: f64,
    #[serde(rename = "p95_latency_ms")]
    pub p95_latency: f64,
    #[serde(rename = "p99_latency_ms")]
    pub p99_latency: f64,
    /// Fraction of successful requests, 0.0 to 1.0.
    pub success_rate: f64,
    /// Measured requests per second over the run's elapsed time.
    pub rps: f64,
    pub bytes_read: u64,
    pub status_codes: HashMap<u16, u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
