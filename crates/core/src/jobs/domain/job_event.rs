use std::path::PathBuf;

use super::job::JobId;

/// Lifecycle message sent from a job's worker thread to the job store.
#[derive(Clone, Debug, PartialEq)]
pub enum JobEvent {
    Started(JobId),
    Progress { id: JobId, percent: u8 },
    Completed { id: JobId, output: PathBuf },
    Failed { id: JobId, reason: String },
}

impl JobEvent {
    pub fn id(&self) -> JobId {
        match self {
            JobEvent::Started(id) => *id,
            JobEvent::Progress { id, .. }
            | JobEvent::Completed { id, .. }
            | JobEvent::Failed { id, .. } => *id,
        }
    }
}
