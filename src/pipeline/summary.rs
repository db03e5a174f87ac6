use crate::error::PipelineError;
use crate::models::{AnalyticsReport, DataQualityWarning, LowPerformanceProduct};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed { kind: String, message: String },
    /// Not run because an earlier level failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub advisory: bool,
    pub duration_ms: u64,
    pub metrics: BTreeMap<String, Value>,
    pub warnings: Vec<DataQualityWarning>,
}

impl StageReport {
    pub fn succeeded(
        name: &str,
        advisory: bool,
        duration_ms: u64,
        metrics: BTreeMap<String, Value>,
        warnings: Vec<DataQualityWarning>,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Succeeded,
            advisory,
            duration_ms,
            metrics,
            warnings,
        }
    }

    pub fn failed(name: &str, advisory: bool, duration_ms: u64, error: &PipelineError) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Failed {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
            advisory,
            duration_ms,
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn skipped(name: &str, advisory: bool) -> Self {
        Self {
            name: name.to_string(),
            status: StageStatus::Skipped,
            advisory,
            duration_ms: 0,
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == StageStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// Every required stage succeeded but an advisory stage failed.
    SucceededWithErrors,
    Failed,
}

/// Structured record of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub stages: Vec<StageReport>,
    pub warnings: Vec<DataQualityWarning>,
    pub report: Option<AnalyticsReport>,
    pub low_performance: Option<Vec<LowPerformanceProduct>>,
}

impl RunSummary {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A run aborted by a required stage. Carries the partial summary.
#[derive(Debug, thiserror::Error)]
#[error("run {} failed in stage '{stage}': {source}", .summary.run_id)]
pub struct RunFailure {
    pub stage: String,
    #[source]
    pub source: PipelineError,
    pub summary: Box<RunSummary>,
}
