pub mod transport;
pub mod handle;
pub mod namespace;
pub mod selector;
pub mod network;
pub mod local;
pub mod simulated;
pub mod mp;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CloudError;

pub use handle::Cloud;
pub use namespace::{Namespace, RebindOptions};
pub use selector::{HostCapabilities, TransportSelector};
pub use transport::Transport;

/// Which backend a cloud handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudKind {
    /// Remote service over HTTP
    Network,
    /// In-process, one job at a time
    Simulated,
    /// Local worker processes
    Mp,
}

impl CloudKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudKind::Network => "network",
            CloudKind::Simulated => "simulated",
            CloudKind::Mp => "mp",
        }
    }

    /// Parses a kind where the empty string means "no cloud".
    pub fn parse_optional(s: &str) -> Result<Option<Self>, CloudError> {
        if s.trim().is_empty() {
            return Ok(None);
        }
        s.parse().map(Some)
    }
}

impl fmt::Display for CloudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "network" => Ok(CloudKind::Network),
            "simulated" | "local" => Ok(CloudKind::Simulated),
            "mp" => Ok(CloudKind::Mp),
            other => Err(CloudError::InvalidConfiguration(format!(
                "cloud type must be one of network, simulated or mp, not '{}'",
                other
            ))),
        }
    }
}

/// Connection parameters. Empty strings are treated as omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_secretkey: Option<String>,
    pub server_url: Option<String>,
}

impl Credentials {
    pub fn new(
        api_key: Option<String>,
        api_secretkey: Option<String>,
        server_url: Option<String>,
    ) -> Self {
        Self {
            api_key: non_empty(api_key),
            api_secretkey: non_empty(api_secretkey),
            server_url: non_empty(server_url),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = non_empty(Some(key.into()));
        self
    }

    pub fn with_api_secretkey(mut self, secret: impl Into<String>) -> Self {
        self.api_secretkey = non_empty(Some(secret.into()));
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = non_empty(Some(url.into()));
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// The fixed vocabulary of operations a namespace may export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Call,
    Map,
    Status,
    Join,
    Result,
    /// Results streamed one by one as jobs finish
    Iresult,
    Info,
    Kill,
    Delete,
    ConnectionInfo,
    Close,
}

impl Operation {
    pub const ALL: &'static [Operation] = &[
        Operation::Call,
        Operation::Map,
        Operation::Status,
        Operation::Join,
        Operation::Result,
        Operation::Iresult,
        Operation::Info,
        Operation::Kill,
        Operation::Delete,
        Operation::ConnectionInfo,
        Operation::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Call => "call",
            Operation::Map => "map",
            Operation::Status => "status",
            Operation::Join => "join",
            Operation::Result => "result",
            Operation::Iresult => "iresult",
            Operation::Info => "info",
            Operation::Kill => "kill",
            Operation::Delete => "delete",
            Operation::ConnectionInfo => "connection_info",
            Operation::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shell command to run on the cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Command line, run through `sh -c`
    pub command: String,
    /// Extra environment variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl JobSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: HashMap::new(),
            workdir: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Queued,
    Processing,
    Done,
    Error,
    Killed,
    Stalled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Error | JobStatus::Killed | JobStatus::Stalled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Killed => "killed",
            JobStatus::Stalled => "stalled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub jid: JobId,
    pub exit_code: Option<i32>,
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub jid: JobId,
    pub command: String,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub runtime_secs: Option<f64>,
}

/// Metadata about the active connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub kind: CloudKind,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_kind_parse() {
        assert_eq!("network".parse::<CloudKind>().unwrap(), CloudKind::Network);
        assert_eq!("simulated".parse::<CloudKind>().unwrap(), CloudKind::Simulated);
        assert_eq!("local".parse::<CloudKind>().unwrap(), CloudKind::Simulated);
        assert_eq!("mp".parse::<CloudKind>().unwrap(), CloudKind::Mp);
    }

    #[test]
    fn test_cloud_kind_parse_rejects_unknown() {
        let err = "cluster".parse::<CloudKind>().unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("cluster"));
    }

    #[test]
    fn test_cloud_kind_parse_optional_empty() {
        assert_eq!(CloudKind::parse_optional("").unwrap(), None);
        assert_eq!(CloudKind::parse_optional("mp").unwrap(), Some(CloudKind::Mp));
    }

    #[test]
    fn test_credentials_drop_empty_values() {
        let creds = Credentials::new(Some(String::new()), Some("s".into()), None);
        assert_eq!(creds.api_key, None);
        assert_eq!(creds.api_secretkey, Some("s".to_string()));
    }

    #[test]
    fn test_job_status_finished() {
        assert!(JobStatus::Done.is_finished());
        assert!(JobStatus::Killed.is_finished());
        assert!(JobStatus::Stalled.is_finished());
        assert!(!JobStatus::Queued.is_finished());
        assert!(!JobStatus::Processing.is_finished());
    }

    #[test]
    fn test_job_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_job_spec_omits_empty_fields() {
        let json = serde_json::to_string(&JobSpec::new("echo hi")).unwrap();
        assert_eq!(json, r#"{"command":"echo hi"}"#);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::ConnectionInfo.as_str(), "connection_info");
        assert_eq!(Operation::Iresult.as_str(), "iresult");
        assert_eq!(Operation::ALL.len(), 11);
    }
}
