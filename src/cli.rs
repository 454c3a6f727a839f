use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};


#[derive(Parser)]
#[command(name = "scicloud", about = "Command-line client for the scicloud compute service.")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API key
    #[arg(short = 'k', long, global = true, env = "SCICLOUD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API secret key
    #[arg(short = 's', long, global = true, env = "SCICLOUD_API_SECRETKEY", hide_env_values = true)]
    pub api_secretkey: Option<String>,

    /// Server URL
    #[arg(long, global = true, env = "SCICLOUD_SERVER_URL", value_name = "URL")]
    pub server_url: Option<String>,

    /// Run jobs locally, one at a time
    #[arg(long, global = true, conflicts_with = "mp")]
    pub simulate: bool,

    /// Run jobs locally on worker processes
    #[arg(long, global = true)]
    pub mp: bool,

    /// Config file
    #[arg(long, global = true, env = "SCICLOUD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Show log messages
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    NoHeader,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a shell command on the cloud and print its job id
    Exec(ExecArgs),
    /// Run a command template once per argument
    Mapexec(MapexecArgs),
    /// Show the status of jobs
    Status(JobsArgs),
    /// Wait for jobs to finish
    Join(JoinArgs),
    /// Print the output of finished jobs
    Result(JobsArgs),
    /// Show details about jobs
    Info(JobsArgs),
    /// Kill jobs (all jobs when none are given)
    Kill(KillArgs),
    /// Delete finished jobs
    Delete(JobsArgs),
    /// Show connection details
    ConnectionInfo,
}

#[derive(Debug, Parser)]
pub struct ExecArgs {
    /// Command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
    /// Environment variables (KEY=VALUE)
    #[arg(short, long)]
    pub env: Vec<String>,
    /// Working directory
    #[arg(short = 'd', long)]
    pub workdir: Option<String>,
    /// Wait for the job and print its output
    #[arg(short, long)]
    pub wait: bool,
}

#[derive(Debug, Parser)]
pub struct MapexecArgs {
    /// Command template, `{}` is replaced by each argument
    pub template: String,
    /// Arguments, one job each
    #[arg(short, long = "arg", required = true)]
    pub args: Vec<String>,
    /// Environment variables (KEY=VALUE)
    #[arg(short, long)]
    pub env: Vec<String>,
    /// Wait for the jobs and print their output
    #[arg(short, long)]
    pub wait: bool,
}

#[derive(Debug, Parser)]
pub struct JobsArgs {
    /// Job ids
    #[arg(required = true)]
    pub jids: Vec<u64>,
}

#[derive(Debug, Parser)]
pub struct JoinArgs {
    /// Job ids
    #[arg(required = true)]
    pub jids: Vec<u64>,
    /// Give up after this many seconds
    #[arg(short, long)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Parser)]
pub struct KillArgs {
    /// Job ids
    pub jids: Vec<u64>,
}
