use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::pipeline::pipeline_executor::ProgressFn;
use crate::shared::constants::OUTPUT_EXTENSION;
use crate::shared::error::CensorError;

use super::domain::job::{progress_percent, Job, JobId, JobSnapshot, JobStatus};
use super::domain::job_event::JobEvent;
use super::domain::job_request::JobRequest;
use super::domain::video_processor::VideoProcessor;
use super::job_store::{EventOutcome, JobStore};

#[derive(Clone, Debug)]
pub struct JobManagerConfig {
    /// Finished videos land at `<output_dir>/<job_id>.mp4`.
    pub output_dir: PathBuf,
    /// Remove the input video and reference images once a job finishes.
    pub delete_inputs: bool,
}

/// Owns every submitted job and runs each one on its own worker thread.
///
/// `submit`, `status`, `list` and `cleanup` only touch the job table and
/// never wait on a running pipeline. Cleaning up a running job removes its
/// record; the worker keeps going and its later events are discarded.
pub struct JobManager {
    store: Arc<JobStore>,
    processor: Arc<dyn VideoProcessor>,
    config: JobManagerConfig,
}

impl JobManager {
    pub fn new(
        processor: Arc<dyn VideoProcessor>,
        config: JobManagerConfig,
    ) -> Result<Self, CensorError> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            store: Arc::new(JobStore::new()),
            processor,
            config,
        })
    }

    pub fn submit(&self, request: JobRequest) -> Result<JobId, CensorError> {
        request.validate()?;

        let id = JobId::new();
        let output_target = self
            .config
            .output_dir
            .join(format!("{id}.{OUTPUT_EXTENSION}"));
        self.store
            .insert(Job::new(id, request.clone(), output_target.clone()));
        log::info!(
            "Job {id} queued: {} (mode={}, model={}, censor={})",
            request.input.display(),
            request.settings.mode,
            request.settings.model,
            request.censor_type,
        );

        let worker = Worker {
            id,
            store: self.store.clone(),
            processor: self.processor.clone(),
            request,
            output_target,
            delete_inputs: self.config.delete_inputs,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("job-{id}"))
            .spawn(move || worker.run());

        if let Err(e) = spawned {
            report(
                &self.store,
                JobEvent::Failed {
                    id,
                    reason: format!("could not start worker: {e}"),
                },
            );
            return Err(CensorError::Io(e));
        }
        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Result<JobSnapshot, CensorError> {
        self.store
            .snapshot(id)
            .ok_or_else(|| CensorError::NotFound(id.to_string()))
    }

    /// Location of a completed job's video.
    pub fn result(&self, id: JobId) -> Result<PathBuf, CensorError> {
        let job = self
            .store
            .get(id)
            .ok_or_else(|| CensorError::NotFound(id.to_string()))?;
        if job.status() != JobStatus::Completed {
            return Err(CensorError::NotCompleted {
                id: id.to_string(),
                status: job.status().to_string(),
            });
        }
        match job.output_path() {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => Err(CensorError::NotFound(path.display().to_string())),
            None => Err(CensorError::NotFound(id.to_string())),
        }
    }

    /// Snapshots of all jobs, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.store.list()
    }

    /// Drops the job record and deletes its output video, whatever state the
    /// job is in.
    pub fn cleanup(&self, id: JobId) -> Result<(), CensorError> {
        let job = self
            .store
            .remove(id)
            .ok_or_else(|| CensorError::NotFound(id.to_string()))?;
        remove_if_present(job.output_target());
        log::info!("Job {id} cleaned up ({})", job.status());
        Ok(())
    }
}

struct Worker {
    id: JobId,
    store: Arc<JobStore>,
    processor: Arc<dyn VideoProcessor>,
    request: JobRequest,
    output_target: PathBuf,
    delete_inputs: bool,
}

impl Worker {
    fn run(self) {
        let id = self.id;
        report(&self.store, JobEvent::Started(id));

        let store = self.store.clone();
        let last_percent = AtomicU8::new(0);
        let on_progress: ProgressFn = Box::new(move |done, total| {
            let percent = progress_percent(done, total);
            if last_percent.fetch_max(percent, Ordering::Relaxed) < percent {
                report(&store, JobEvent::Progress { id, percent });
            }
        });

        let event = match self
            .processor
            .process(&self.request, &self.output_target, on_progress)
        {
            Ok(summary) => {
                log::info!(
                    "Job {id}: {} frames in {:.1}s",
                    summary.frames,
                    summary.elapsed.as_secs_f64()
                );
                JobEvent::Completed {
                    id,
                    output: self.output_target.clone(),
                }
            }
            Err(e) => JobEvent::Failed {
                id,
                reason: e.to_string(),
            },
        };
        report(&self.store, event);

        if self.delete_inputs {
            for path in self.request.input_files() {
                remove_if_present(path);
            }
        }
    }
}

/// Applies `event` to the store and logs the transition.
fn report(store: &JobStore, event: JobEvent) {
    let id = event.id();
    match store.apply(&event) {
        EventOutcome::Applied => match &event {
            JobEvent::Started(_) => log::info!("Job {id} processing"),
            JobEvent::Progress { percent, .. } => log::debug!("Job {id} at {percent}%"),
            JobEvent::Completed { output, .. } => {
                log::info!("Job {id} completed: {}", output.display())
            }
            JobEvent::Failed { reason, .. } => log::warn!("Job {id} failed: {reason}"),
        },
        EventOutcome::Rejected => {
            log::warn!("Job {id}: ignored out-of-order event {event:?}");
        }
        EventOutcome::Discarded => {
            log::debug!("Job {id} no longer exists, discarding {event:?}");
            if let JobEvent::Completed { output, .. } = &event {
                remove_if_present(output);
            }
        }
    }
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
    }
}
