use std::io::Write;

use tracing::info;

use crate::cli::{MapexecArgs, OutputFormat};
use crate::cloud::{JobSpec, Namespace};
use crate::error::Result;
use crate::output;
use super::{must_wait, parse_env};

pub const PLACEHOLDER: &str = "{}";

/// Substitutes `arg` for every placeholder, or appends it when there is none.
pub fn expand(template: &str, arg: &str) -> String {
    if template.contains(PLACEHOLDER) {
        template.replace(PLACEHOLDER, arg)
    } else {
        format!("{} {}", template, arg)
    }
}

pub async fn execute<W: Write>(args: MapexecArgs, cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let env = parse_env(&args.env)?;
    let jobs: Vec<JobSpec> = args.args.iter()
        .map(|arg| {
            let mut job = JobSpec::new(expand(&args.template, arg));
            job.env = env.clone();
            job
        })
        .collect();

    let jids = cloud.map(jobs).await?;
    info!("Submitted {} job(s)", jids.len());

    if must_wait(cloud, args.wait) {
        let results = cloud.result(&jids).await?;
        output::print_results(out, &results, format)
    } else {
        output::print_jids(out, &jids, format)
    }
}
