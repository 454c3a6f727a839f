use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::local::{run_job, JobTable};
use super::transport::Transport;
use super::{CloudKind, ConnectionInfo, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::Result;

/// Jobs finish before `call` returns, so there is nothing to kill.
const CAPABILITIES: &[Operation] = &[
    Operation::Call,
    Operation::Map,
    Operation::Status,
    Operation::Join,
    Operation::Result,
    Operation::Iresult,
    Operation::Info,
    Operation::Delete,
    Operation::ConnectionInfo,
    Operation::Close,
];

/// Runs every job on this machine, one at a time, as it is submitted.
pub struct SimulatedTransport {
    jobs: JobTable,
    open: AtomicBool,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        info!("Starting simulated cloud");
        Self {
            jobs: JobTable::new(),
            open: AtomicBool::new(true),
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn kind(&self) -> CloudKind {
        CloudKind::Simulated
    }

    fn capabilities(&self) -> &'static [Operation] {
        CAPABILITIES
    }

    fn needs_restart(&self, _credentials: &Credentials) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Simulated cloud closed");
        }
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            kind: CloudKind::Simulated,
            open: self.is_open(),
            server_url: None,
            api_key: None,
            workers: Some(1),
        }
    }

    async fn call(&self, job: JobSpec) -> Result<JobId> {
        let jid = self.jobs.insert(job.clone(), JobStatus::Processing).await;
        debug!("Simulating job {}: {}", jid, job.command);
        self.jobs.finish(jid, run_job(&job).await).await;
        Ok(jid)
    }

    async fn map(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        let mut jids = Vec::with_capacity(jobs.len());
        for job in jobs {
            jids.push(self.call(job).await?);
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

    async fn delete(&self, jids: &[JobId]) -> Result<()> {
        self.jobs.delete(jids).await
    }
}
