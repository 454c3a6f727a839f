use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::transport::Transport;
use super::{CloudKind, ConnectionInfo, Credentials, JobId, JobInfo, JobOutput, JobSpec, JobStatus, Operation};
use crate::error::{CloudError, Result};

pub const DEFAULT_SERVER_URL: &str = "https://api.scivm.com/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct SubmitRequest<'a> {
    jobs: &'a [JobSpec],
}

#[derive(Deserialize)]
struct SubmitResponse {
    jids: Vec<JobId>,
}

#[derive(Serialize)]
struct JidsRequest<'a> {
    jids: &'a [JobId],
}

#[derive(Deserialize)]
struct StatusEntry {
    status: JobStatus,
}

#[derive(Deserialize)]
struct StatusResponse {
    info: HashMap<String, StatusEntry>,
}

#[derive(Deserialize)]
struct ResultResponse {
    results: Vec<JobOutput>,
}

#[derive(Deserialize)]
struct InfoResponse {
    info: Vec<JobInfo>,
}

#[derive(Deserialize)]
struct ServerError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    msg: String,
}

/// Talks to the remote compute service over HTTP.
pub struct NetworkTransport {
    client: reqwest::Client,
    api_key: Option<String>,
    api_secretkey: Option<String>,
    server_url: String,
    poll_interval: Duration,
    open: AtomicBool,
}

impl NetworkTransport {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scicloud/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CloudError::NetworkError(format!("Failed to create http client: {}", e)))?;

        let server_url = credentials
            .server_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        info!("Opening network connection to {}", server_url);

        Ok(Self {
            client,
            api_key: credentials.api_key.clone(),
            api_secretkey: credentials.api_secretkey.clone(),
            server_url,
            poll_interval: DEFAULT_POLL_INTERVAL,
            open: AtomicBool::new(true),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn auth(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secretkey.as_deref()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(CloudError::InvalidConfiguration(
                "api key and secret key must be set to use the network cloud".to_string(),
            )),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}/", self.server_url.trim_end_matches('/'), endpoint.trim_matches('/'))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<T> {
        let (key, secret) = self.auth()?;
        let url = self.endpoint_url(endpoint);
        debug!("POST {}", url);

        let response = self.client
            .post(&url)
            .basic_auth(key, Some(secret))
            .json(body)
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CloudError::Unauthorized);
        }

        let text = response.text().await
            .map_err(|e| CloudError::NetworkError(format!("Failed to read response from {}: {}", url, e)))?;

        let value: serde_json::Value = if text.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) if !status.is_success() => {
                    return Err(CloudError::Server { code: status.as_u16(), message: text });
                }
                Err(e) => {
                    return Err(CloudError::SystemError(format!(
                        "Failed to parse response from {}: {}",
                        url, e
                    )));
                }
            }
        };

        if let Some(err) = value.get("error") {
            let err: ServerError = serde_json::from_value(err.clone())?;
            return Err(CloudError::Server {
                code: err.code.unwrap_or_else(|| status.as_u16()),
                message: err.msg,
            });
        }

        if !status.is_success() {
            return Err(CloudError::Server { code: status.as_u16(), message: text });
        }

        serde_json::from_value(value)
            .map_err(|e| CloudError::SystemError(format!("Unexpected response from {}: {}", url, e)))
    }

    /// Polls until every job is finished and returns the final statuses.
    async fn wait_for(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<Vec<JobStatus>> {
        let started = Instant::now();
        loop {
            let statuses = self.status(jids).await?;
            if statuses.iter().all(|s| s.is_finished()) {
                return Ok(statuses);
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(CloudError::Timeout(format!(
                        "jobs still running after {:?}",
                        limit
                    )));
                }
            }
            sleep(self.poll_interval).await;
        }
    }
}

fn differs(supplied: &Option<String>, current: Option<&str>) -> bool {
    match supplied {
        Some(value) => current != Some(value.as_str()),
        None => false,
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> CloudKind {
        CloudKind::Network
    }

    fn capabilities(&self) -> &'static [Operation] {
        Operation::ALL
    }

    fn needs_restart(&self, credentials: &Credentials) -> bool {
        differs(&credentials.api_key, self.api_key.as_deref())
            || differs(&credentials.api_secretkey, self.api_secretkey.as_deref())
            || credentials.server_url.as_deref()
                .map_or(false, |url| url.trim_end_matches('/') != self.server_url.trim_end_matches('/'))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Closed network connection to {}", self.server_url);
        }
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            kind: CloudKind::Network,
            open: self.is_open(),
            server_url: Some(self.server_url.clone()),
            api_key: self.api_key.clone(),
            workers: None,
        }
    }

    async fn call(&self, job: JobSpec) -> Result<JobId> {
        let jids = self.map(vec![job]).await?;
        jids.into_iter()
            .next()
            .ok_or_else(|| CloudError::SystemError("Server returned no job id".to_string()))
    }

    async fn map(&self, jobs: Vec<JobSpec>) -> Result<Vec<JobId>> {
        let response: SubmitResponse = self.post("job", &SubmitRequest { jobs: &jobs }).await?;
        if response.jids.len() != jobs.len() {
            return Err(CloudError::SystemError(format!(
                "Submitted {} jobs but server returned {} job ids",
                jobs.len(),
                response.jids.len()
            )));
        }
        info!("Submitted {} job(s)", jobs.len());
        Ok(response.jids)
    }

    async fn status(&self, jids: &[JobId]) -> Result<Vec<JobStatus>> {
        let response: StatusResponse = self.post("job/status", &JidsRequest { jids }).await?;
        jids.iter()
            .map(|jid| {
                response.info
                    .get(&jid.to_string())
                    .map(|entry| entry.status)
                    .ok_or(CloudError::JobNotFound(jid.0))
            })
            .collect()
    }

    async fn join(&self, jids: &[JobId], timeout: Option<Duration>) -> Result<()> {
        self.wait_for(jids, timeout).await.map(|_| ())
    }

    async fn result(&self, jids: &[JobId]) -> Result<Vec<JobOutput>> {
        let statuses = self.wait_for(jids, None).await?;
        for (jid, status) in jids.iter().zip(&statuses) {
            if *status != JobStatus::Done {
                return Err(CloudError::JobFailed {
                    jid: jid.0,
                    message: format!("job finished with status {}", status),
                });
            }
        }
        let response: ResultResponse = self.post("job/result", &JidsRequest { jids }).await?;
        Ok(response.results)
    }

    async fn info(&self, jids: &[JobId]) -> Result<Vec<JobInfo>> {
        let response: InfoResponse = self.post("job/info", &JidsRequest { jids }).await?;
        Ok(response.info)
    }

    async fn kill(&self, jids: &[JobId]) -> Result<()> {
        let _: serde_json::Value = self.post("job/kill", &JidsRequest { jids }).await?;
        Ok(())
    }

    async fn delete(&self, jids: &[JobId]) -> Result<()> {
        let _: serde_json::Value = self.post("job/delete", &JidsRequest { jids }).await?;
        Ok(())
    }
}
