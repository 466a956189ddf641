//! Background Pattern Learning
//!
//! Submissions go onto an unbounded queue and return immediately. A single
//! worker drains it, spawned on the first submission made inside a tokio
//! runtime. Without a runtime there is no worker and jobs are logged and
//! dropped rather than queued. Callers get a job id and nothing else.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Behavioral data queued for learning
#[derive(Debug, Clone)]
pub struct PatternJob {
    /// Id returned to the submitter
    pub job_id: Uuid,
    /// Subject of the behavioral data
    pub user_id: String,
    /// Opaque client payload
    pub data: serde_json::Value,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

/// Fire-and-forget learning queue
pub struct PatternLearner {
    sender: UnboundedSender<PatternJob>,
    receiver: Mutex<Option<UnboundedReceiver<PatternJob>>>,
    processed: Arc<AtomicU64>,
}

impl PatternLearner {
    /// Learner with no worker yet
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a job, starting the worker if needed. Never blocks and never
    /// fails the caller.
    pub fn submit(&self, user_id: &str, data: serde_json::Value) -> Uuid {
        let job = PatternJob {
            job_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            data,
            submitted_at: Utc::now(),
        };
        let job_id = job.job_id;

        if !self.worker_running() {
            tracing::info!(
                user_id = %job.user_id,
                %job_id,
                "no runtime for pattern learning, job dropped"
            );
            return job_id;
        }
        if let Err(e) = self.sender.send(job) {
            tracing::warn!(%job_id, "pattern learning worker is gone, dropping job: {}", e);
        }
        job_id
    }

    /// Spawn the worker on the current tokio runtime.
    ///
    /// Returns `None` if the worker was already started or no runtime is
    /// available.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let handle = Handle::try_current().ok()?;
        let receiver = self.receiver.lock().take()?;
        let processed = self.processed.clone();
        tracing::debug!("pattern learning worker started");
        Some(handle.spawn(async move {
            Self::worker_loop(receiver, processed).await;
        }))
    }

    /// Starts the worker on first use
    fn worker_running(&self) -> bool {
        self.start().is_some() || self.receiver.lock().is_none()
    }

    /// Jobs the worker has finished
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    async fn worker_loop(mut receiver: UnboundedReceiver<PatternJob>, processed: Arc<AtomicU64>) {
        while let Some(job) = receiver.recv().await {
            Self::learn(&job);
            processed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!("pattern learning queue closed");
    }

    // Online learning hook. Currently records the job only.
    fn learn(job: &PatternJob) {
        tracing::info!(user_id = %job.user_id, job_id = %job.job_id, "pattern learning started");
        let fields = job.data.as_object().map(|o| o.len()).unwrap_or(0);
        tracing::info!(
            user_id = %job.user_id,
            job_id = %job.job_id,
            fields,
            queued_ms = (Utc::now() - job.submitted_at).num_milliseconds(),
            "pattern learning complete"
        );
    }
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new()
    }
}
