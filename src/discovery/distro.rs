use crate::keyspace::{KeyspaceWalker, WalkError};
use crate::types::{KubernetesDistro, OPENSHIFT_PREFIX};
use tracing::debug;

/// OpenShift when anything lives under its root, vanilla Kubernetes otherwise.
pub async fn detect_distro(walker: &dyn KeyspaceWalker) -> Result<KubernetesDistro, WalkError> {
    let distro = if walker.exists(OPENSHIFT_PREFIX).await? {
        KubernetesDistro::OpenShift
    } else {
        KubernetesDistro::Vanilla
    };
    debug!(distro = %distro, "Detected distro");
    Ok(distro)
}
