// Job sources: where the worker gets its next job from. A source only ever
// yields jobs that passed validation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use runner_common::JobSpec;
use runner_sdk::YamlUtil;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Supplies validated jobs, one at a time.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// The next job, or `None` once the source is exhausted.
    ///
    /// An error rejects one job; the source may still have more.
    async fn next_job(&self) -> Result<Option<JobSpec>>;
}

// ---------------------------------------------------------------------------
// FileJobSource
// ---------------------------------------------------------------------------

/// Reads job documents (YAML or JSON) from a fixed list of files, in order.
pub struct FileJobSource {
    paths: Mutex<VecDeque<PathBuf>>,
}

impl FileJobSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: Mutex::new(paths.into_iter().collect()),
        }
    }

    /// Files not yet handed out.
    pub fn remaining(&self) -> usize {
        self.paths.lock().len()
    }
}

#[async_trait]
impl JobSource for FileJobSource {
    async fn next_job(&self) -> Result<Option<JobSpec>> {
        let Some(path) = self.paths.lock().pop_front() else {
            return Ok(None);
        };

        let job: JobSpec = tokio::task::spawn_blocking({
            let path = path.clone();
            move || YamlUtil::load_file(&path)
        })
        .await
        .context("job loader task failed")?
        .with_context(|| format!("Failed to load job file {:?}", path))?;

        job.validate()
            .with_context(|| format!("Invalid job in {:?}", path))?;
        Ok(Some(job))
    }
}

// ---------------------------------------------------------------------------
// QueueJobSource
// ---------------------------------------------------------------------------

/// In-process queue fed by [`JobSubmitter`]s. Exhausted once every
/// submitter has been dropped and the queue is drained.
pub struct QueueJobSource {
    receiver: tokio::sync::Mutex<mpsc::Receiver<JobSpec>>,
}

/// Sending half of a [`QueueJobSource`].
#[derive(Clone)]
pub struct JobSubmitter {
    sender: mpsc::Sender<JobSpec>,
}

impl QueueJobSource {
    /// Create a queue holding up to `capacity` pending jobs.
    pub fn channel(capacity: usize) -> (JobSubmitter, QueueJobSource) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            JobSubmitter { sender },
            QueueJobSource {
                receiver: tokio::sync::Mutex::new(receiver),
            },
        )
    }
}

impl JobSubmitter {
    /// Validate `job` and enqueue it, waiting for room if the queue is full.
    pub async fn submit(&self, job: JobSpec) -> Result<()> {
        job.validate()
            .with_context(|| format!("Rejected job {:?}", job.job_id))?;
        self.sender
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("job queue is closed"))
    }
}

#[async_trait]
impl JobSource for QueueJobSource {
    async fn next_job(&self) -> Result<Option<JobSpec>> {
        Ok(self.receiver.lock().await.recv().await)
    }
}
