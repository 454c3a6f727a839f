use std::io::Write;

use tracing::info;

use crate::cli::{ExecArgs, OutputFormat};
use crate::cloud::{JobSpec, Namespace};
use crate::error::{CloudError, Result};
use crate::output;
use super::{must_wait, parse_env};

pub async fn execute<W: Write>(args: ExecArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let command = args.command.join(" ");
    if command.trim().is_empty() {
        return Err(CloudError::InvalidConfiguration("a command is required".to_string()));
    }

    let mut job = JobSpec::new(command);
    job.env = parse_env(&args.env)?;
    job.workdir = args.workdir;

    let jid = cloud.call(job).await?;
    info!("Submitted job {}", jid);

    if must_wait(cloud, args.wait) {
        let results = cloud.result(&[jid]).await?;
        output::print_results(out, &results, format)
    } else {
        output::print_jids(out, &[jid], format)
    }
}
