use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::censoring::domain::censor_type::CensorType;
use crate::detection::domain::detection_model::DetectionModel;
use crate::pipeline::domain::censor_mode::CensorMode;
use crate::shared::error::CensorError;

use super::job_request::JobRequest;

/// Highest progress a running job reports; 100 is written only on completion.
pub const MAX_RUNNING_PROGRESS: u8 = 99;

/// Opaque job identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = CensorError;

    /// Strings that are not job ids can't name a job, so they parse to
    /// `NotFound`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CensorError::NotFound(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts frame counts into a running job's percentage, capped below 100.
///
/// Unknown totals (0) report 0.
pub fn progress_percent(frames_done: usize, total_frames: usize) -> u8 {
    if total_frames == 0 {
        return 0;
    }
    let pct = (100.0 * frames_done as f64 / total_frames as f64).round();
    pct.clamp(0.0, MAX_RUNNING_PROGRESS as f64) as u8
}

/// The job record. Transitions only move forward:
/// `queued → processing → {completed, failed}`; refused transitions
/// return `false` and leave the record untouched.
#[derive(Clone, Debug)]
pub struct Job {
    id: JobId,
    request: JobRequest,
    output_target: PathBuf,
    status: JobStatus,
    progress: u8,
    output_path: Option<PathBuf>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, request: JobRequest, output_target: PathBuf) -> Self {
        Self {
            id,
            request,
            output_target,
            status: JobStatus::Queued,
            progress: 0,
            output_path: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    /// Where the worker writes the output; published as `output_path` only
    /// once the job completes.
    pub fn output_target(&self) -> &PathBuf {
        &self.output_target
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        self.output_path.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Processing;
        true
    }

    /// Raises progress to `percent` (capped at 99); never lowers it.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.progress = self.progress.max(percent.min(MAX_RUNNING_PROGRESS));
        true
    }

    pub fn complete(&mut self, output: PathBuf) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.output_path = Some(output);
        true
    }

    /// Progress keeps its last value.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(reason.into());
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            progress: self.progress,
            mode: self.request.settings.mode,
            model: self.request.settings.model,
            censor_type: self.request.censor_type,
            output_path: self.output_path.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }
}

/// Consistent read-only copy of a job for pollers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub mode: CensorMode,
    pub model: DetectionModel,
    pub censor_type: CensorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
