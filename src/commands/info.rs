use std::io::Write;

use crate::cli::{JobsArgs, OutputFormat};
use crate::cloud::Namespace;
use crate::error::Result;
use crate::output;
use super::to_jids;

pub async fn execute<W: Write>(args: JobsArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let infos = cloud.info(&to_jids(&args.jids)).await?;
    output::print_info(out, &infos, format)
}
