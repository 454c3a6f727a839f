use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::local::{run_job, JobTable};
use super::transport::Transport;
use super::{CloudKind, ConnectionInfo, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::Result;

type TaskMap = Arc<Mutex<HashMap<JobId, AbortHandle>>>;

/// Runs jobs as local OS processes, at most `workers` at a time.
pub struct MpTransport {
    jobs: JobTable,
    workers: usize,
    slots: Arc<Semaphore>,
    tasks: TaskMap,
    open: AtomicBool,
}

impl MpTransport {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        info!("Starting multiprocessing cloud with {} workers", workers);
        Self {
            jobs: JobTable::new(),
            workers,
            slots: Arc::new(Semaphore::new(workers)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            open: AtomicBool::new(true),
        }
    }

    pub fn with_default_workers() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    async fn submit(&self, job: JobSpec) -> JobId {
        let jid = self.jobs.insert(job.clone(), JobStatus::Queued).await;
        let jobs = self.jobs.clone();
        let slots = self.slots.clone();
        let tasks = self.tasks.clone();

        let mut running = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let handle = tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    jobs.set_status(jid, JobStatus::Killed).await;
                    return;
                }
            };
            if jobs.set_status(jid, JobStatus::Processing).await {
                debug!("Worker picked up job {}: {}", jid, job.command);
                jobs.finish(jid, run_job(&job).await).await;
            }
            tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&jid);
        });
        running.insert(jid, handle.abort_handle());
        jid
    }
}

#[async_trait]
impl Transport for MpTransport {
    fn kind(&self) -> CloudKind {
        CloudKind::Mp
    }

    fn capabilities(&self) -> &'static [Operation] {
        Operation::ALL
    }

    fn needs_restart(&self, _credentials: &Credentials) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Stops accepting work and kills outstanding worker processes.
    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.slots.close();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            warn!("Closing multiprocessing cloud with {} outstanding job(s)", tasks.len());
        }
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            kind: CloudKind::Mp,
            open: self.is_open(),
            server_url: None,
            api_key: None,
            workers: Some(self.workers),
        }
    }

    async fn call(&self, job: JobSpec) -> Result<JobId> {
        Ok(self.submit(job).await)
    }

    async fn map(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        let mut jids = Vec::with_capacity(jobs.len());
        for job in jobs {
            jids.push(self.submit(job).await);
        }
        Ok(jids)
    }

    async fn status(&self, jids: &[JobId]) -> Result<Vec<JobStatus>> {
        self.jobs.statuses(jids).await
    }

    async fn join(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<()> {
        self.jobs.wait(jids, timeout).await.map(|_| ())
    }

    async fn result(&self, jids: &[JobId]) -> Result<Vec<JobOutput>> {
        self.jobs.wait(jids, None).await?;
        self.jobs.outputs(jids).await
    }

    async fn info(&self, jids: &[JobId]) -> Result<Vec<JobInfo>> {
        self.jobs.infos(jids).await
    }

    async fn kill(&self, jids: &[JobId]) -> Result<()> {
        let targets = if jids.is_empty() {
            self.jobs.unfinished().await
        } else {
            self.jobs.statuses(jids).await?;
            jids.to_vec()
        };

        for jid in targets {
            if self.jobs.set_status(jid, JobStatus::Killed).await {
                info!("Killed job {}", jid);
                let handle = self.tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&jid);
                if let Some(handle) = handle {
                    handle.abort();
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, jids: &[JobId]) -> Result<()> {
        self.jobs.delete(jids).await
    }
}

impl Drop for MpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
