use std::io::Write;

use crate::cli::{JobsArgs, OutputFormat};
use crate::cloud::Namespace;
use crate::error::Result;
use crate::output;
use super::to_jids;

pub async fn execute<W: Write>(args: JobsArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let jids = to_jids(&args.jids);
    let statuses = cloud.status(&jids).await?;
    output::print_status(out, &jids, &statuses, format)
}
