//! Job bookkeeping shared by the simulated and multiprocessing transports.

use std::collections::HashMap;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use super::{JobId, JobInfo, JobOutput, JobSpec, JobStatus};
use crate::error::{CloudError, Result};

pub const SHELL: &str = "/bin/sh";

#[derive(Debug, Clone)]
struct LocalJob {
    spec: JobSpec,
    status: JobStatus,
    created: DateTime<Utc>,
    finished: Option<DateTime<Utc>>,
    output: Option<JobOutput>,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct TableInner {
    next_id: u64,
    jobs: HashMap<JobId, LocalJob>,
}

/// In-memory job table. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    inner: Arc<Mutex<TableInner>>,
    changed: Arc<Notify>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, spec: JobSpec, status: JobStatus) -> JobId {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let jid = JobId(inner.next_id);
        inner.jobs.insert(jid, LocalJob {
            spec,
            status,
            created: Utc::now(),
            finished: None,
            output: None,
            error: None,
        });
        jid
    }

    /// Moves a job to `status` unless it already finished.
    pub async fn set_status(&self, jid: JobId, status: JobStatus) -> bool {
        let mut inner = self.inner.lock().await;
        let updated = match inner.jobs.get_mut(&jid) {
            Some(job) if !job.status.is_finished() => {
                job.status = status;
                if status.is_finished() {
                    job.finished = Some(Utc::now());
                }
                true
            }
            _ => false,
        };
        drop(inner);
        if updated {
            self.changed.notify_waiters();
        }
        updated
    }

    /// Records the outcome of a process run. Jobs killed meanwhile stay killed.
    pub async fn finish(&self, jid: JobId, outcome: Result<Output>) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&jid) {
            if job.status.is_finished() {
                debug!("Job {} already {}, dropping its outcome", jid, job.status);
            } else {
                match outcome {
                    Ok(output) => {
                        let exit_code = output.status.code();
                        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                        if output.status.success() {
                            job.status = JobStatus::Done;
                        } else {
                            job.status = JobStatus::Error;
                            job.error = Some(match exit_code {
                                Some(code) => format!("exit code {}: {}", code, stderr.trim()),
                                None => "terminated by signal".to_string(),
                            });
                        }
                        job.output = Some(JobOutput { jid, exit_code, stdout, stderr });
                    }
                    Err(e) => {
                        warn!("Job {} could not run: {}", jid, e);
                        job.status = JobStatus::Error;
                        job.error = Some(e.to_string());
                    }
                }
                job.finished = Some(Utc::now());
            }
        }
        drop(inner);
        self.changed.notify_waiters();
    }

    pub async fn statuses(&self, jids: &[JobId]) -> Result<Vec<JobStatus>> {
        let inner = self.inner.lock().await;
        jids.iter()
            .map(|jid| {
                inner.jobs.get(jid)
                    .map(|job| job.status)
                    .ok_or(CloudError::JobNotFound(jid.0))
            })
            .collect()
    }

    pub async fn unfinished(&self) -> Vec<JobId> {
        let inner = self.inner.lock().await;
        let mut jids: Vec<JobId> = inner.jobs.iter()
            .filter(|(_, job)| !job.status.is_finished())
            .map(|(jid, _)| *jid)
            .collect();
        jids.sort();
        jids
    }

    /// Waits until every job is finished and returns the final statuses.
    pub async fn wait(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<Vec<JobStatus>> {
        let waiting = async {
            loop {
                // Created before the check so a notification in between is not lost.
                let notified = self.changed.notified();
                let statuses = self.statuses(jids).await?;
                if statuses.iter().all(|s| s.is_finished()) {
                    return Ok::<_, CloudError>(statuses);
                }
                notified.await;
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, waiting).await.map_err(|_| {
                CloudError::Timeout(format!("jobs still running after {:?}", limit))
            })?,
            None => waiting.await,
        }
    }

    /// Outputs of finished jobs; a job that did not finish cleanly is an error.
    pub async fn outputs(&self, jids: &[JobId]) -> Result<Vec<JobOutput>> {
        let inner = self.inner.lock().await;
        let mut outputs = Vec::with_capacity(jids.len());
        for jid in jids {
            let job = inner.jobs.get(jid).ok_or(CloudError::JobNotFound(jid.0))?;
            match (job.status, &job.output) {
                (JobStatus::Done, Some(output)) => outputs.push(output.clone()),
                (status, _) => {
                    return Err(CloudError::JobFailed {
                        jid: jid.0,
                        message: job.error.clone().unwrap_or_else(|| format!("job is {}", status)),
                    });
                }
            }
        }
        Ok(outputs)
    }

    pub async fn infos(&self, jids: &[JobId]) -> Result<Vec<JobInfo>> {
        let inner = self.inner.lock().await;
        jids.iter()
            .map(|jid| {
                let job = inner.jobs.get(jid).ok_or(CloudError::JobNotFound(jid.0))?;
                Ok(JobInfo {
                    jid: *jid,
                    command: job.spec.command.clone(),
                    status: job.status,
                    created: job.created,
                    finished: job.finished,
                    runtime_secs: job.finished
                        .map(|f| (f - job.created).num_milliseconds() as f64 / 1000.0),
                })
            })
            .collect()
    }

    /// Removes finished jobs. Fails without removing anything if one is still running.
    pub async fn delete(&self, jids: &[JobId]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for jid in jids {
            let job = inner.jobs.get(jid).ok_or(CloudError::JobNotFound(jid.0))?;
            if !job.status.is_finished() {
                return Err(CloudError::SystemError(format!(
                    "cannot delete job {} while it is {}",
                    jid, job.status
                )));
            }
        }
        for jid in jids {
            inner.jobs.remove(jid);
        }
        Ok(())
    }
}

/// Runs a job through the shell and collects its output.
pub async fn run_job(spec: &JobSpec) -> Result<Output> {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c")
        .arg(&spec.command)
        .envs(&spec.env)
        .kill_on_drop(true);
    if let Some(ref dir) = spec.workdir {
        cmd.current_dir(dir);
    }

    cmd.output()
        .await
        .map_err(|e| CloudError::SystemError(format!("Failed to run '{}': {}", spec.command, e)))
}
