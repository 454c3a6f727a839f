use std::io::Write;

use crate::cli::{JobsArgs, OutputFormat};
use crate::cloud::Namespace;
use crate::error::Result;
use crate::output;
use super::to_jids;

/// JSON output is printed once all jobs are done. Tables print each job as it finishes.
pub async fn execute<W: Write>(args: JobsArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let jids = to_jids(&args.jids);
    if format == OutputFormat::Json {
        let results = cloud.result(&jids).await?;
        return output::print_results(out, &results, format);
    }

    let with_header = format == OutputFormat::Table && jids.len() > 1;
    let mut results = cloud.iresult(&jids).await?;
    while let Some(result) = results.recv().await {
        output::print_result(out, &result?, with_header)?;
        out.flush()?;
    }
    Ok(())
}
