use std::io::Write;
use std::time::Duration;

use crate::cli::{JoinArgs, OutputFormat};
use crate::cloud::Namespace;
use crate::error::{CloudError, Result};
use crate::output;
use super::to_jids;

pub async fn execute<W: Write>(args: JoinArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let timeout = args.timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|_| {
                CloudError::InvalidConfiguration(format!(
                    "timeout must be a non-negative number of seconds, got {}",
                    secs
                ))
            })
        })
        .transpose()?;

    let jids = to_jids(&args.jids);
    cloud.join(&jids, timeout).await?;
    let statuses = cloud.status(&jids).await?;
    output::print_status(out, &jids, &statuses, format)
}
