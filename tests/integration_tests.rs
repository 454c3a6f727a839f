use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scicloud::cloud::{
    CloudKind, Credentials, HostCapabilities, JobSpec, JobStatus, Namespace, Operation, RebindOptions,
    TransportSelector,
};
use scicloud::CloudError;

const ENV_VARS: &[&str] = &[
    "SCICLOUD_API_KEY",
    "SCICLOUD_API_SECRETKEY",
    "SCICLOUD_SERVER_URL",
    "SCICLOUD_CLOUD_TYPE",
    "SCICLOUD_USE_SIMULATOR",
    "SCICLOUD_MP_WORKERS",
    "RUST_LOG",
];

/// The binary with a private config file and none of the caller's settings.
fn scicloud(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("scicloud").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("SCICLOUD_CONFIG", config_dir.path().join("config.toml"));
    cmd
}

fn selector() -> Arc<TransportSelector> {
    Arc::new(TransportSelector::new(HostCapabilities::full()).with_mp_workers(2))
}

// Binary tests
#[test]
fn test_version() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scicloud"));
}

#[test]
fn test_simulated_exec_prints_output() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .args(["--simulate", "exec", "echo", "hello"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn test_mp_mapexec() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .args(["--mp", "-o", "no-header", "mapexec", "echo value-{}", "-a", "a", "-a", "b"])
        .assert()
        .success()
        .stdout("value-a\nvalue-b\n");
}

#[test]
fn test_simulator_from_config_file() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "use_simulator = true\n").unwrap();
    scicloud(&tmp)
        .args(["-o", "json", "connection-info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"simulated\""));
}

#[test]
fn test_unknown_cloud_type_exits_with_cloud_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "cloud_type = \"cluster\"\n").unwrap();
    scicloud(&tmp)
        .arg("connection-info")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cluster"));
}

#[test]
fn test_empty_cloud_type_binds_nothing() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "cloud_type = \"\"\n").unwrap();
    scicloud(&tmp)
        .arg("connection-info")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No cloud bound"));
}

#[test]
fn test_failed_job_reports_json_error() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .args(["--simulate", "-o", "json", "exec", "exit", "7"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("\"error\""));
}

#[test]
fn test_kill_not_available_on_simulator() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .args(["--simulate", "kill"])
        .assert()
        .code(3);
}

#[test]
fn test_network_without_credentials() {
    let tmp = TempDir::new().unwrap();
    scicloud(&tmp)
        .args(["--server-url", "http://127.0.0.1:9", "status", "1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("api key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_network_status_through_binary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/job/status/"))
        .and(basic_auth("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": { "5": { "status": "processing" } }
        })))
        .mount(&server)
        .await;

    let url = server.uri();
    let tmp = TempDir::new().unwrap();
    let assert = tokio::task::spawn_blocking(move || {
        scicloud(&tmp)
            .args(["-k", "key", "-s", "secret", "--server-url", &url, "-o", "json", "status", "5"])
            .assert()
    })
    .await
    .unwrap();

    assert.success().stdout(predicate::str::contains("\"5\":\"processing\""));
}

// Namespace scenarios
#[tokio::test]
async fn test_switching_clouds_closes_the_previous_one() {
    let mut ns = Namespace::primary(selector());
    ns.rebind(Some(CloudKind::Mp), RebindOptions::default()).unwrap();
    let mp_cloud = ns.cloud().unwrap();

    let jid = ns.call(JobSpec::new("echo first")).await.unwrap();
    ns.join(&[jid], None).await.unwrap();

    ns.rebind(Some(CloudKind::Simulated), RebindOptions::default()).unwrap();
    assert!(!mp_cloud.is_open());
    assert_eq!(ns.kind(), Some(CloudKind::Simulated));

    let jid = ns.call(JobSpec::new("echo second")).await.unwrap();
    assert_eq!(ns.status(&[jid]).await.unwrap(), vec![JobStatus::Done]);

    // kill still points at the closed mp cloud
    let err = ns.kill(&[]).await.unwrap_err();
    assert!(matches!(err, CloudError::CloudClosed(_)));
}

#[tokio::test]
async fn test_immutable_binding_survives_rebind() {
    let mut ns = Namespace::primary(selector());
    ns.rebind(Some(CloudKind::Simulated), RebindOptions::default().immutable()).unwrap();
    let cloud = ns.cloud().unwrap();

    ns.rebind(Some(CloudKind::Mp), RebindOptions::default().restart()).unwrap();
    ns.rebind(None, RebindOptions::default()).unwrap();

    assert!(ns.is_immutable());
    assert_eq!(ns.cloud().unwrap().id(), cloud.id());
    assert!(cloud.is_open());
}

#[test]
fn test_credential_change_rebuilds_network_cloud() {
    let creds = Credentials::default()
        .with_api_key("key")
        .with_api_secretkey("secret")
        .with_server_url("http://127.0.0.1:9/");
    let mut ns = Namespace::primary(selector());
    ns.rebind(Some(CloudKind::Network), RebindOptions::new(creds.clone())).unwrap();
    let first = ns.cloud().unwrap();

    ns.rebind(Some(CloudKind::Network), RebindOptions::new(creds.clone())).unwrap();
    assert_eq!(ns.cloud().unwrap().id(), first.id());

    ns.rebind(Some(CloudKind::Network), RebindOptions::new(creds.with_api_secretkey("rotated"))).unwrap();
    assert_ne!(ns.cloud().unwrap().id(), first.id());
    assert!(!first.is_open());
}

#[test]
fn test_clearing_unbinds_every_export() {
    let mut ns = Namespace::primary(selector());
    ns.rebind(Some(CloudKind::Mp), RebindOptions::default()).unwrap();
    let cloud = ns.cloud().unwrap();

    ns.rebind(None, RebindOptions::default()).unwrap();
    assert!(ns.kind().is_none());
    assert!(!cloud.is_open());
    for op in Operation::ALL {
        assert!(ns.binding(*op).is_none());
    }
}

#[test]
fn test_mp_namespace_needs_multiprocessing() {
    let selector = Arc::new(TransportSelector::new(HostCapabilities::network_only()));
    let err = Namespace::mp(selector).err().unwrap();
    assert!(matches!(err, CloudError::MissingLocalCapability(_)));
}
