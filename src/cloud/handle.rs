use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::transport::{unsupported, Transport};
use super::{CloudKind, ConnectionInfo, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::{CloudError, Result};

/// A configured cloud: exactly one transport plus its lifecycle flags.
pub struct Cloud {
    id: Uuid,
    transport: Box<dyn Transport>,
    immutable: AtomicBool,
    /// Name of the namespace this cloud is bound to (diagnostics only)
    parent: RwLock<Option<String>>,
}

impl Cloud {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let id = Uuid::new_v4();
        debug!("Created {} cloud {}", transport.kind(), id);
        Self {
            id,
            transport,
            immutable: AtomicBool::new(false),
            parent: RwLock::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> CloudKind {
        self.transport.kind()
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.transport.capabilities().contains(&op)
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Closes the underlying transport. Safe to call more than once.
    pub fn close(&self) {
        if self.transport.is_open() {
            info!("Closing {} cloud {}", self.kind(), self.id);
            self.transport.close();
        }
    }

    pub fn needs_restart(&self, credentials: &Credentials) -> bool {
        self.transport.needs_restart(credentials)
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::SeqCst)
    }

    pub fn mark_immutable(&self) {
        self.immutable.store(true, Ordering::SeqCst);
    }

    pub fn parent_namespace(&self) -> Option<String> {
        self.parent.read().ok().and_then(|p| p.clone())
    }

    pub fn set_parent_namespace(&self, name: &str) {
        if let Ok(mut parent) = self.parent.write() {
            *parent = Some(name.to_string());
        }
    }

    fn ensure_open(&self, op: Operation) -> Result<()> {
        if self.transport.is_open() {
            Ok(())
        } else {
            Err(CloudError::CloudClosed(format!(
                "cannot {} on closed {} cloud {}",
                op,
                self.kind(),
                self.id
            )))
        }
    }

    pub async fn call(&self, job: JobSpec) -> Result<JobId> {
        self.ensure_open(Operation::Call)?;
        self.transport.call(job).await
    }

    pub async fn map(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        self.ensure_open(Operation::Map)?;
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        self.transport.map(jobs).await
    }

    pub async fn status(&self, jids: &[JobId]) -> Result<Vec<JobStatus>> {
        self.ensure_open(Operation::Status)?;
        self.transport.status(jids).await
    }

    pub async fn join(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<()> {
        self.ensure_open(Operation::Join)?;
        self.transport.join(jids, timeout).await
    }

    pub async fn result(&self, jids: &[JobId]) -> Result<Vec<JobOutput>> {
        self.ensure_open(Operation::Result)?;
        self.transport.result(jids).await
    }

    /// Streams outputs in `jids` order, each one as soon as its job is done.
    /// The stream ends after the first error.
    pub async fn iresult(self: &Arc<Self>, jids: &[JobId]) -> Result<mpsc::Receiver<Result<JobOutput>>> {
        self.ensure_open(Operation::Iresult)?;
        if !self.supports(Operation::Iresult) {
            return Err(unsupported(self.kind(), Operation::Iresult));
        }

        let (tx, rx) = mpsc::channel(jids.len().max(1));
        let cloud = Arc::clone(self);
        let jids = jids.to_vec();
        tokio::spawn(async move {
            for jid in jids {
                let item = match cloud.result(&[jid]).await {
                    Ok(mut outputs) => outputs.pop().ok_or(CloudError::JobNotFound(jid.0)),
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        Ok(rx)
    }

    pub async fn info(&self, jids: &[JobId]) -> Result<Vec<JobInfo>> {
        self.ensure_open(Operation::Info)?;
        self.transport.info(jids).await
    }

    pub async fn kill(&self, jids: &[JobId]) -> Result<()> {
        self.ensure_open(Operation::Kill)?;
        self.transport.kill(jids).await
    }

    pub async fn delete(&self, jids: &[JobId]) -> Result<()> {
        self.ensure_open(Operation::Delete)?;
        self.transport.delete(jids).await
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.transport.connection_info()
    }
}

impl std::fmt::Debug for Cloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloud")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("open", &self.is_open())
            .field("immutable", &self.is_immutable())
            .field("parent", &self.parent_namespace())
            .finish()
    }
}

impl Drop for Cloud {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::transport::MockTransport;

    fn open_mock(open: Arc<AtomicBool>) -> MockTransport {
        let mut mock = MockTransport::new();
        let flag = open.clone();
        mock.expect_is_open().returning(move || flag.load(Ordering::SeqCst));
        mock.expect_kind().return_const(CloudKind::Network);
        mock
    }

    #[test]
    fn test_close_is_idempotent() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        let flag = open.clone();
        mock.expect_close()
            .times(1)
            .returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Cloud::new(Box::new(mock));
        cloud.close();
        cloud.close();
        assert!(!cloud.is_open());
    }

    #[tokio::test]
    async fn test_operations_fail_once_closed() {
        let open = Arc::new(AtomicBool::new(false));
        let mock = open_mock(open);
        let cloud = Cloud::new(Box::new(mock));

        let err = cloud.call(JobSpec::new("true")).await.unwrap_err();
        assert!(matches!(err, CloudError::CloudClosed(_)));
    }

    #[tokio::test]
    async fn test_call_delegates_to_transport() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        mock.expect_call()
            .withf(|job| job.command == "echo hi")
            .times(1)
            .returning(|_| Ok(JobId(42)));
        let flag = open.clone();
        mock.expect_close().returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Cloud::new(Box::new(mock));
        let jid = cloud.call(JobSpec::new("echo hi")).await.unwrap();
        assert_eq!(jid, JobId(42));
    }

    #[tokio::test]
    async fn test_empty_map_skips_transport() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        mock.expect_map().never();
        let flag = open.clone();
        mock.expect_close().returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Cloud::new(Box::new(mock));
        assert!(cloud.map(Vec::new()).await.unwrap().is_empty());
    }

    #[test]
    fn test_immutable_and_parent_flags() {
        let open = Arc::new(AtomicBool::new(false));
        let cloud = Cloud::new(Box::new(open_mock(open)));
        assert!(!cloud.is_immutable());
        cloud.mark_immutable();
        assert!(cloud.is_immutable());

        assert_eq!(cloud.parent_namespace(), None);
        cloud.set_parent_namespace("scicloud");
        assert_eq!(cloud.parent_namespace(), Some("scicloud".to_string()));
    }

    #[test]
    fn test_needs_restart_delegates() {
        let open = Arc::new(AtomicBool::new(false));
        let mut mock = open_mock(open);
        mock.expect_needs_restart()
            .withf(|c| c.api_key.as_deref() == Some("other"))
            .return_const(true);
        let cloud = Cloud::new(Box::new(mock));
        assert!(cloud.needs_restart(&Credentials::default().with_api_key("other")));
    }

    #[tokio::test]
    async fn test_iresult_streams_in_order() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        mock.expect_capabilities().return_const(Operation::ALL);
        mock.expect_result().times(2).returning(|jids| {
            Ok(vec![JobOutput {
                jid: jids[0],
                exit_code: Some(0),
                stdout: format!("out {}\n", jids[0]),
                stderr: String::new(),
            }])
        });
        let flag = open.clone();
        mock.expect_close().returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Arc::new(Cloud::new(Box::new(mock)));
        let mut rx = cloud.iresult(&[JobId(2), JobId(1)]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().jid, JobId(2));
        assert_eq!(rx.recv().await.unwrap().unwrap().stdout, "out 1\n");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_iresult_stops_after_failure() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        mock.expect_capabilities().return_const(Operation::ALL);
        mock.expect_result()
            .times(1)
            .returning(|jids| Err(CloudError::JobFailed { jid: jids[0].0, message: "exit code 1".to_string() }));
        let flag = open.clone();
        mock.expect_close().returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Arc::new(Cloud::new(Box::new(mock)));
        let mut rx = cloud.iresult(&[JobId(1), JobId(2)]).await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), Err(CloudError::JobFailed { jid: 1, .. })));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_iresult_needs_capability() {
        let open = Arc::new(AtomicBool::new(true));
        let mut mock = open_mock(open.clone());
        const ONLY_RESULT: &[Operation] = &[Operation::Result];
        mock.expect_capabilities().return_const(ONLY_RESULT);
        let flag = open.clone();
        mock.expect_close().returning(move || flag.store(false, Ordering::SeqCst));

        let cloud = Arc::new(Cloud::new(Box::new(mock)));
        let err = cloud.iresult(&[JobId(1)]).await.unwrap_err();
        assert!(matches!(err, CloudError::NotSupported(_)));
    }
}
