use tracing::info;

use crate::cli::KillArgs;
use crate::cloud::Namespace;
use crate::error::Result;
use super::to_jids;

pub async fn execute(args: KillArgs, cloud: &Namespace) -> Result<()> {
    let jids = to_jids(&args.jids);
    cloud.kill(&jids).await?;
    if jids.is_empty() {
        info!("Killed all jobs");
    } else {
        info!("Killed {} job(s)", jids.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{JobSpec, JobStatus};
    use crate::commands::testing::{mp_namespace, simulated_namespace};
    use crate::error::CloudError;

    #[tokio::test]
    async fn test_kill_on_mp_cloud() {
        let ns = mp_namespace();
        let jid = ns.call(JobSpec::new("sleep 10")).await.unwrap();
        execute(KillArgs { jids: vec![jid.0] }, &ns).await.unwrap();
        assert_eq!(ns.status(&[jid]).await.unwrap(), vec![JobStatus::Killed]);
    }

    #[tokio::test]
    async fn test_kill_unavailable_on_simulated_cloud() {
        let ns = simulated_namespace();
        let err = execute(KillArgs { jids: vec![] }, &ns).await.unwrap_err();
        assert!(matches!(err, CloudError::NoCloudBound(_)));
    }
}
