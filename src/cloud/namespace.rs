//! Binding of a cloud's operations onto a named call surface.
//!
//! A [`Namespace`] exports a fixed list of [`Operation`]s. Rebinding swaps the
//! cloud behind those operations following these rules:
//!
//! * an immutable binding is never replaced, further rebinds are ignored;
//! * a new cloud is only built when the kind changes, a restart is requested,
//!   nothing usable is bound (no cloud, or a closed one), or the bound cloud
//!   needs a restart for the given credentials;
//! * the previous cloud is closed before its replacement is bound.
//!
//! Operations the new cloud does not support keep pointing at the previous
//! cloud. Since that cloud is closed by then, calling them fails with
//! `CloudClosed`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::handle::Cloud;
use super::selector::TransportSelector;
use super::{CloudKind, ConnectionInfo, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::{CloudError, Result};

pub const PRIMARY_NAMESPACE: &str = "scicloud";
pub const MP_NAMESPACE: &str = "scicloud.mp";

#[derive(Debug, Clone, Default)]
pub struct RebindOptions {
    pub credentials: Credentials,
    /// Rebuild the cloud even if nothing changed
    pub restart: bool,
    /// Lock the new binding against later rebinds
    pub immutable: bool,
}

impl RebindOptions {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    pub fn restart(mut self) -> Self {
        self.restart = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

pub struct Namespace {
    name: String,
    exports: &'static [Operation],
    selector: Arc<TransportSelector>,
    cloud: Option<Arc<Cloud>>,
    kind: Option<CloudKind>,
    bindings: HashMap<Operation, Arc<Cloud>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>, exports: &'static [Operation], selector: Arc<TransportSelector>) -> Self {
        Self {
            name: name.into(),
            exports,
            selector,
            cloud: None,
            kind: None,
            bindings: HashMap::new(),
        }
    }

    /// The main namespace. Nothing is bound until the first rebind.
    pub fn primary(selector: Arc<TransportSelector>) -> Self {
        Self::new(PRIMARY_NAMESPACE, Operation::ALL, selector)
    }

    /// A namespace bound to the multiprocessing cloud from the start.
    pub fn mp(selector: Arc<TransportSelector>) -> Result<Self> {
        if !selector.capabilities().multiprocessing {
            return Err(CloudError::MissingLocalCapability(
                "local worker processes are unavailable on this host".to_string(),
            ));
        }
        let mut namespace = Self::new(MP_NAMESPACE, Operation::ALL, selector);
        namespace.rebind(Some(CloudKind::Mp), RebindOptions::default())?;
        Ok(namespace)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<CloudKind> {
        self.kind
    }

    /// The currently bound cloud, if any.
    pub fn cloud(&self) -> Option<Arc<Cloud>> {
        self.cloud.clone()
    }

    pub fn is_immutable(&self) -> bool {
        self.cloud.as_ref().map(|c| c.is_immutable()).unwrap_or(false)
    }

    /// The cloud an exported operation currently dispatches to.
    pub fn binding(&self, op: Operation) -> Option<Arc<Cloud>> {
        self.bindings.get(&op).cloned()
    }

    pub fn rebind(&mut self, kind: Option<CloudKind>, options: RebindOptions) -> Result<()> {
        if self.is_immutable() {
            debug!("Namespace {} is immutable, ignoring rebind to {:?}", self.name, kind);
            return Ok(());
        }

        let needed = kind != self.kind
            || options.restart
            || match self.cloud {
                None => true,
                Some(ref cloud) => !cloud.is_open() || cloud.needs_restart(&options.credentials),
            };
        if !needed {
            debug!("Namespace {} already bound to {:?}", self.name, kind);
            return Ok(());
        }

        if let Some(ref cloud) = self.cloud {
            if cloud.is_open() {
                cloud.close();
            }
        }

        match kind {
            None => {
                info!("Clearing cloud binding of {}", self.name);
                self.cloud = None;
                self.kind = None;
                self.bindings.clear();
            }
            Some(kind) => {
                let transport = self.selector.construct(kind, &options.credentials)?;
                let cloud = Arc::new(Cloud::new(transport));
                self.bind(cloud, kind, options.immutable);
            }
        }
        Ok(())
    }

    /// Installs every exported operation `cloud` supports.
    pub fn bind(&mut self, cloud: Arc<Cloud>, kind: CloudKind, immutable: bool) {
        info!("Binding {} cloud {} to {}", cloud.kind(), cloud.id(), self.name);

        for op in self.exports {
            if cloud.supports(*op) {
                self.bindings.insert(*op, cloud.clone());
            } else if self.bindings.contains_key(op) {
                debug!("{} cloud lacks {}, keeping the previous binding", kind, op);
            }
        }

        cloud.set_parent_namespace(&self.name);
        if immutable {
            cloud.mark_immutable();
        }
        self.cloud = Some(cloud);
        self.kind = Some(kind);
    }

    fn bound(&self, op: Operation) -> Result<Arc<Cloud>> {
        if !self.exports.contains(&op) {
            return Err(CloudError::NotSupported(format!("{} does not export {}", self.name, op)));
        }
        self.bindings
            .get(&op)
            .cloned()
            .ok_or_else(|| CloudError::NoCloudBound(format!("{}.{}", self.name, op)))
    }

    pub async fn call(&self, job: JobSpec) -> Result<JobId> {
        self.bound(Operation::Call)?.call(job).await
    }

    pub async fn map(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        self.bound(Operation::Map)?.map(jobs).await
    }

    pub async fn status(&self, jids: &[JobId]) -> Result<Vec<JobStatus>> {
        self.bound(Operation::Status)?.status(jids).await
    }

    pub async fn join(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<()> {
        self.bound(Operation::Join)?.join(jids, timeout).await
    }

    pub async fn result(&self, jids: &[JobId]) -> Result<Vec<JobOutput>> {
        self.bound(Operation::Result)?.result(jids).await
    }

    pub async fn iresult(&self, jids: &[JobId]) -> Result<mpsc::Receiver<Result<JobOutput>>> {
        self.bound(Operation::Iresult)?.iresult(jids).await
    }

    pub async fn info(&self, jids: &[JobId]) -> Result<Vec<JobInfo>> {
        self.bound(Operation::Info)?.info(jids).await
    }

    pub async fn kill(&self, jids: &[JobId]) -> Result<()> {
        self.bound(Operation::Kill)?.kill(jids).await
    }

    pub async fn delete(&self, jids: &[JobId]) -> Result<()> {
        self.bound(Operation::Delete)?.delete(jids).await
    }

    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        Ok(self.bound(Operation::ConnectionInfo)?.connection_info())
    }

    /// Closes the cloud behind `close`. Closing twice, or with nothing bound, is a no-op.
    pub fn close(&self) -> Result<()> {
        match self.bound(Operation::Close) {
            Ok(cloud) => {
                cloud.close();
                Ok(())
            }
            Err(CloudError::NoCloudBound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cloud", &self.cloud)
            .finish()
    }
}
