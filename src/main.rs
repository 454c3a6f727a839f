use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use scicloud::cli::{self, Cli, OutputFormat};
use scicloud::cloud::{CloudKind, Credentials, Namespace, RebindOptions, TransportSelector};
use scicloud::commands;
use scicloud::config::CloudConfig;
use scicloud::error::{CloudError, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let cli: Cli = Cli::parse();

    // Logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let format = cli.output;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, format);
            exit_code(&err)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(ref path) = cli.config {
        std::env::set_var("SCICLOUD_CONFIG", path);
    }

    let config = CloudConfig::from_env()?;
    let kind = if cli.simulate {
        Some(CloudKind::Simulated)
    } else if cli.mp {
        Some(CloudKind::Mp)
    } else {
        config.cloud_kind()?
    };

    let mut credentials = config.credentials();
    if let Some(key) = cli.api_key.filter(|k| !k.is_empty()) {
        credentials = credentials.with_api_key(key);
    }
    if let Some(secret) = cli.api_secretkey.filter(|s| !s.is_empty()) {
        credentials = credentials.with_api_secretkey(secret);
    }
    if let Some(url) = cli.server_url.filter(|u| !u.is_empty()) {
        credentials = credentials.with_server_url(url);
    }

    let mut selector = TransportSelector::detect();
    if let Some(workers) = config.mp_workers {
        selector = selector.with_mp_workers(workers);
    }
    if let Some(interval) = config.poll_interval() {
        selector = selector.with_poll_interval(interval);
    }

    let cloud = bind_namespace(Arc::new(selector), kind, credentials)?;
    debug!("Bound {:?} cloud", kind);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let format = cli.output;

    match cli.command {
        cli::Commands::Exec(args) => commands::exec::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Mapexec(args) => commands::mapexec::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Status(args) => commands::status::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Join(args) => commands::join::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Result(args) => commands::result::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Info(args) => commands::info::execute(args, &cloud, format, &mut out).await?,
        cli::Commands::Kill(args) => commands::kill::execute(args, &cloud).await?,
        cli::Commands::Delete(args) => commands::delete::execute(args, &cloud).await?,
        cli::Commands::ConnectionInfo => commands::connection_info::execute(&cloud, format, &mut out)?,
    }

    out.flush()?;
    cloud.close()
}

fn bind_namespace(selector: Arc<TransportSelector>, kind: Option<CloudKind>, credentials: Credentials) -> Result<Namespace> {
    if kind == Some(CloudKind::Mp) {
        return Namespace::mp(selector);
    }
    let mut cloud = Namespace::primary(selector);
    cloud.rebind(kind, RebindOptions::new(credentials))?;
    Ok(cloud)
}

/// Cloud failures exit with 3, local IO failures (e.g. a closed stdout) with 1.
fn exit_code(err: &CloudError) -> ExitCode {
    match err {
        CloudError::IoError(_) => ExitCode::FAILURE,
        _ => ExitCode::from(3),
    }
}

fn report(err: &CloudError, format: OutputFormat) {
    if format == OutputFormat::Json {
        eprintln!("{}", json!({ "error": err.to_string() }));
    } else {
        eprintln!("Error: {}", err);
    }
}
