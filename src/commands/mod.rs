pub mod exec;
pub mod mapexec;
pub mod status;
pub mod join;
pub mod result;
pub mod info;
pub mod kill;
pub mod delete;
pub mod connection_info;

use std::collections::HashMap;

use crate::cloud::{CloudKind, JobId, Namespace};
use crate::error::{CloudError, Result};

pub fn to_jids(ids: &[u64]) -> Vec<JobId> {
    ids.iter().copied().map(JobId).collect()
}

/// Parses `KEY=VALUE` pairs.
pub fn parse_env(vars: &[String]) -> Result<HashMap<String, String>> {
    vars.iter()
        .map(|var| match var.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CloudError::InvalidConfiguration(format!(
                "environment variable must look like KEY=VALUE, got '{}'",
                var
            ))),
        })
        .collect()
}

/// Local clouds lose their jobs when the process exits, so submissions wait.
/// Decided on the cloud actually bound, which differs from the requested
/// kind after a simulator fallback.
pub fn must_wait(cloud: &Namespace, requested: bool) -> bool {
    requested
        || matches!(
            cloud.cloud().map(|c| c.kind()),
            Some(CloudKind::Simulated) | Some(CloudKind::Mp)
        )
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::cloud::{CloudKind, HostCapabilities, Namespace, RebindOptions, TransportSelector};

    pub fn simulated_namespace() -> Namespace {
        let selector = Arc::new(TransportSelector::new(HostCapabilities::full()).with_mp_workers(2));
        let mut ns = Namespace::primary(selector);
        ns.rebind(Some(CloudKind::Simulated), RebindOptions::default()).unwrap();
        ns
    }

    pub fn mp_namespace() -> Namespace {
        let selector = Arc::new(TransportSelector::new(HostCapabilities::full()).with_mp_workers(2));
        Namespace::mp(selector).unwrap()
    }

    pub fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }
}
