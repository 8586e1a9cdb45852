use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::domain::job::{Job, JobId, JobSnapshot};
use super::domain::job_event::JobEvent;

/// Result of applying a [`JobEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// The job exists but the transition was not allowed from its state.
    Rejected,
    /// The job no longer exists (cleaned up while its worker was running).
    Discarded,
}

#[derive(Default)]
struct Table {
    jobs: HashMap<JobId, (u64, Job)>,
    next_sequence: u64,
}

/// In-process job table with interior locking.
///
/// Every mutation happens under the write lock, so readers always see a
/// whole record, never a half-applied event.
#[derive(Default)]
pub struct JobStore {
    table: RwLock<Table>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = table.next_sequence;
        table.next_sequence += 1;
        table.jobs.insert(job.id(), (sequence, job));
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.jobs.get(&id).map(|(_, job)| job.clone())
    }

    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.jobs.get(&id).map(|(_, job)| job.snapshot())
    }

    /// All jobs in submission order.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = table.jobs.values().collect();
        entries.sort_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, job)| job.snapshot()).collect()
    }

    pub fn remove(&self, id: JobId) -> Option<Job> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.jobs.remove(&id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn apply(&self, event: &JobEvent) -> EventOutcome {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let Some((_, job)) = table.jobs.get_mut(&event.id()) else {
            return EventOutcome::Discarded;
        };
        let applied = match event {
            JobEvent::Started(_) => job.start(),
            JobEvent::Progress { percent, .. } => job.record_progress(*percent),
            JobEvent::Completed { output, .. } => job.complete(output.clone()),
            JobEvent::Failed { reason, .. } => job.fail(reason.clone()),
        };
        if applied {
            EventOutcome::Applied
        } else {
            EventOutcome::Rejected
        }
    }
}
