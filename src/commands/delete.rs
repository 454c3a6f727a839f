use tracing::info;

use crate::cli::JobsArgs;
use crate::cloud::Namespace;
use crate::error::Result;
use super::to_jids;

pub async fn execute(args: JobsArgs, cloud: &Namespace) -> Result<()> {
    let jids = to_jids(&args.jids);
    cloud.delete(&jids).await?;
    info!("Deleted {} job(s)", jids.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::JobSpec;
    use crate::commands::testing::simulated_namespace;

    #[tokio::test]
    async fn test_delete_finished_job() {
        let ns = simulated_namespace();
        let jid = ns.call(JobSpec::new("true")).await.unwrap();
        execute(JobsArgs { jids: vec![jid.0] }, &ns).await.unwrap();
        assert!(ns.status(&[jid]).await.is_err());
    }
}
