use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error};

use super::local::SHELL;
use super::mp::MpTransport;
use super::network::NetworkTransport;
use super::simulated::SimulatedTransport;
use super::transport::Transport;
use super::{CloudKind, Credentials};
use crate::error::{CloudError, Result};

/// What this host can do locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Can spawn and run worker processes
    pub multiprocessing: bool,
}

impl HostCapabilities {
    pub fn detect() -> Self {
        let cpus = num_cpus::get();
        let multiprocessing = Path::new(SHELL).exists() && cpus > 0;
        debug!("Host multiprocessing support: {} ({} cpus)", multiprocessing, cpus);
        Self { multiprocessing }
    }

    pub fn full() -> Self {
        Self { multiprocessing: true }
    }

    pub fn network_only() -> Self {
        Self { multiprocessing: false }
    }
}

/// Builds transports and remembers the last network credentials it used.
#[derive(Debug)]
pub struct TransportSelector {
    capabilities: HostCapabilities,
    mp_workers: Option<usize>,
    poll_interval: Option<Duration>,
    last_credentials: Mutex<(Option<String>, Option<String>)>,
}

impl TransportSelector {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            mp_workers: None,
            poll_interval: None,
            last_credentials: Mutex::new((None, None)),
        }
    }

    pub fn detect() -> Self {
        Self::new(HostCapabilities::detect())
    }

    pub fn with_mp_workers(mut self, workers: usize) -> Self {
        self.mp_workers = Some(workers);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// The (api_key, api_secretkey) pair of the last network transport built.
    pub fn last_credentials(&self) -> (Option<String>, Option<String>) {
        self.last_credentials
            .lock()
            .map(|last| last.clone())
            .unwrap_or((None, None))
    }

    /// Like [`construct`](Self::construct) but takes the kind by name.
    pub fn construct_named(&self, kind: &str, credentials: &Credentials) -> Result<Box<dyn Transport>> {
        self.construct(kind.parse()?, credentials)
    }

    pub fn construct(&self, kind: CloudKind, credentials: &Credentials) -> Result<Box<dyn Transport>> {
        match kind {
            CloudKind::Network => self.construct_network(credentials),
            CloudKind::Simulated => {
                if !self.capabilities.multiprocessing {
                    error!("Local worker processes are unavailable. Simulator cannot be started. Falling back to the network cloud");
                    return self.construct_network(credentials);
                }
                Ok(Box::new(SimulatedTransport::new()))
            }
            CloudKind::Mp => {
                if !self.capabilities.multiprocessing {
                    return Err(CloudError::MissingLocalCapability(
                        "the mp cloud needs local worker processes".to_string(),
                    ));
                }
                let transport = match self.mp_workers {
                    Some(workers) => MpTransport::new(workers),
                    None => MpTransport::with_default_workers(),
                };
                Ok(Box::new(transport))
            }
        }
    }

    fn construct_network(&self, credentials: &Credentials) -> Result<Box<dyn Transport>> {
        let (last_key, last_secret) = self.last_credentials();
        let effective = Credentials {
            api_key: credentials.api_key.clone().or(last_key),
            api_secretkey: credentials.api_secretkey.clone().or(last_secret),
            server_url: credentials.server_url.clone(),
        };

        let mut transport = NetworkTransport::new(&effective)?;
        if let Some(interval) = self.poll_interval {
            transport = transport.with_poll_interval(interval);
        }

        if let Ok(mut last) = self.last_credentials.lock() {
            *last = (effective.api_key, effective.api_secretkey);
        }
        Ok(Box::new(transport))
    }
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self::detect()
    }
}
