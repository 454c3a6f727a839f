use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{ConnectionInfo, CloudKind, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::{CloudError, Result};

/// Backend that actually runs jobs.
///
/// Every operation other than the lifecycle ones is optional: a transport
/// declares what it implements through [`Transport::capabilities`] and the
/// remaining methods fall back to a `NotSupported` error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> CloudKind;

    /// Operations this transport implements.
    fn capabilities(&self) -> &'static [Operation];

    /// True when any of the supplied, non-empty parameters differ from the
    /// ones this transport was built with.
    fn needs_restart(&self, credentials: &Credentials) -> bool;

    fn is_open(&self) -> bool;

    /// Releases the transport. Calling it again is a no-op.
    fn close(&self);

    fn connection_info(&self) -> ConnectionInfo;

    async fn call(&self, _job: JobSpec) -> Result<JobId> {
        Err(unsupported(self.kind(), Operation::Call))
    }

    async fn map(&self, _jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        Err(unsupported(self.kind(), Operation::Map))
    }

    async fn status(&self, _jids: &[JobId]) -> Result<Vec<JobStatus>> {
        Err(unsupported(self.kind(), Operation::Status))
    }

    async fn join(&self, _jids: &[JobId], _timeout: Option<Duration>) -> Result<()> {
        Err(unsupported(self.kind(), Operation::Join))
    }

    async fn result(&self, _jids: &[JobId]) -> Result<Vec<JobOutput>> {
        Err(unsupported(self.kind(), Operation::Result))
    }

    async fn info(&self, _jids: &[JobId]) -> Result<Vec<JobInfo>> {
        Err(unsupported(self.kind(), Operation::Info))
    }

    /// Kills the given jobs, or every job of this connection when `jids` is empty.
    async fn kill(&self, _jids: &[JobId]) -> Result<()> {
        Err(unsupported(self.kind(), Operation::Kill))
    }

    async fn delete(&self, _jids: &[JobId]) -> Result<()> {
        Err(unsupported(self.kind(), Operation::Delete))
    }
}

pub fn unsupported(kind: CloudKind, op: Operation) -> CloudError {
    CloudError::NotSupported(format!("{} is not available on the {} cloud", op, kind))
}
