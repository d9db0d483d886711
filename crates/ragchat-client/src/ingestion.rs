use ragchat_notify::{NotificationSocket, NotifyError};
use ragchat_types::Notification;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Last known state of one knowledge-base ingestion job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionState {
    pub kb_id: i64,
    pub stage: String,
    /// Percentage in 0..=100
    pub progress: f64,
    pub message: String,
    pub finished: bool,
    pub failed: bool,
    pub error: Option<String>,
}

impl IngestionState {
    fn new(kb_id: i64) -> Self {
        Self {
            kb_id,
            stage: String::new(),
            progress: 0.0,
            message: String::new(),
            finished: false,
            failed: false,
            error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.finished || self.failed
    }
}

pub type IngestionJobs = HashMap<i64, IngestionState>;

/// Tracks ingestion jobs from socket notifications, keyed by `kb_id`
///
/// Jobs for different knowledge bases may interleave freely. Once a job has completed or failed,
/// later notifications for it are ignored.
#[derive(Clone)]
pub struct IngestionTracker {
    jobs: Arc<watch::Sender<IngestionJobs>>,
}

impl Default for IngestionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionTracker {
    pub fn new() -> Self {
        let (jobs, _) = watch::channel(HashMap::new());
        Self {
            jobs: Arc::new(jobs),
        }
    }

    /// Register progress, completion and failure handlers on `socket`
    ///
    /// Replaces whatever handlers the socket had for those types.
    pub fn attach(&self, socket: &NotificationSocket) -> Result<(), NotifyError> {
        for kind in ["progress", "complete", "error"] {
            let tracker = self.clone();
            socket.on(kind, move |notification| tracker.record(notification))?;
        }
        Ok(())
    }

    pub fn record(&self, notification: &Notification) {
        let Some(kb_id) = notification.kb_id() else {
            tracing::debug!(kind = notification.kind(), "Notification without kb_id ignored");
            return;
        };

        self.jobs.send_modify(|jobs| {
            let job = jobs.entry(kb_id).or_insert_with(|| IngestionState::new(kb_id));
            if job.is_done() {
                tracing::debug!(kb_id, kind = notification.kind(), "Ignoring notification for finished job");
                return;
            }

            match notification {
                Notification::Progress(progress) => {
                    job.stage = progress.stage.clone();
                    job.progress = progress.progress.clamp(0.0, 100.0);
                    job.message = progress.message.clone();
                }
                Notification::Complete(complete) => {
                    job.stage = "completed".to_string();
                    job.progress = 100.0;
                    job.message = complete.message.clone();
                    job.finished = true;
                    tracing::info!(kb_id, "Ingestion completed: {}", complete.message);
                }
                Notification::Error(failure) => {
                    let description = failure.describe();
                    job.stage = "failed".to_string();
                    job.message = description.clone();
                    job.error = Some(description);
                    job.failed = true;
                    tracing::warn!(kb_id, "Ingestion failed: {}", failure.describe());
                }
                _ => {}
            }
        });
    }

    pub fn get(&self, kb_id: i64) -> Option<IngestionState> {
        self.jobs.borrow().get(&kb_id).cloned()
    }

    pub fn snapshot(&self) -> IngestionJobs {
        self.jobs.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IngestionJobs> {
        self.jobs.subscribe()
    }

    /// Resolve once the job for `kb_id` has completed or failed
    pub async fn wait_until_done(&self, kb_id: i64) -> IngestionState {
        let mut jobs = self.subscribe();
        loop {
            if let Some(job) = jobs.borrow_and_update().get(&kb_id).filter(|job| job.is_done()) {
                return job.clone();
            }
            // The sender lives in `self`, so this only fails if the tracker is gone
            if jobs.changed().await.is_err() {
                return IngestionState::new(kb_id);
            }
        }
    }
}
