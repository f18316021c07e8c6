use crate::{
    collector::ReportCollector,
    scope::{self, PolicyScope},
};
use ahash::AHashMap as HashMap;
use cloud_operator_core::{
    policy::{ExternalNetwork, ImportBatch},
    report::{KubernetesReport, KubernetesReports},
    AgentInstaller, AgentTarget, Error, IpNet, Op, OpStatus, Ops, PolicyBackend, TagMatcher,
};
use cloud_operator_inventory::{ClusterCredentials, ClusterId, Inventory};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info_span, Instrument};

pub const KUBE_LABEL: &str = "Cloud-Operator-KUBE";

const API_NETWORK: &str = "kubernetes-api";
const DNS_NETWORK: &str = "kubernetes-dns";
const NODES_NETWORK: &str = "kubernetes-nodes";

/// Reconciles every in-scope cluster concurrently, one task per cluster.
pub struct ClusterReconciler {
    pub(crate) inventory: Arc<Inventory>,
    pub(crate) scope: Arc<PolicyScope>,
    /// The policy backend API handed to installed agents.
    pub(crate) api: String,
    pub(crate) ops: Ops,
    pub(crate) backend: Arc<dyn PolicyBackend>,
    pub(crate) credentials: Arc<dyn ClusterCredentials>,
    pub(crate) installer: Arc<dyn AgentInstaller>,
}

impl ClusterReconciler {
    /// Spawns a task for each cluster admitted by `matcher` and waits for all
    /// of them. Clusters that are not admitted produce no report.
    pub async fn reconcile_all(self: Arc<Self>, matcher: &TagMatcher) -> KubernetesReports {
        let collector = ReportCollector::default();
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();

        for id in self.inventory.cluster_ids() {
            let cluster = self.inventory.cluster(id);
            if !matcher.matches(&cluster.name, &cluster.tags) {
                tracing::debug!(cluster = %cluster.name, "Cluster is not a match");
                continue;
            }
            tracing::debug!(cluster = %cluster.name, "Cluster is a match");

            let reconciler = self.clone();
            let collector = collector.clone();
            let task = tasks.spawn(
                async move {
                    let report = reconciler.reconcile(id).await;
                    collector.add(report);
                }
                .instrument(info_span!("cluster", name = %cluster.name)),
            );
            names.insert(task.id(), cluster.name.clone());
        }

        while let Some(res) = tasks.join_next_with_id().await {
            if let Err(error) = res {
                let name = names.remove(&error.id()).unwrap_or_default();
                tracing::error!(cluster = %name, %error, "Cluster task failed");
                collector.add(KubernetesReport::failed(
                    name,
                    Error::Worker(error.to_string()),
                ));
            }
        }

        collector.build()
    }

    /// Reconciles a single cluster.
    pub async fn reconcile(&self, id: ClusterId) -> KubernetesReport {
        let cluster = self.inventory.cluster(id);
        if !cluster.status.is_ready() {
            tracing::info!(status = %cluster.status, "Cluster is not ready");
            return KubernetesReport::new(&cluster.name, OpStatus::NotReady);
        }

        match self.process(id).await {
            Ok(()) => {
                tracing::info!("Reconciled cluster");
                KubernetesReport::new(&cluster.name, OpStatus::Completed)
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to reconcile cluster");
                KubernetesReport::failed(&cluster.name, error)
            }
        }
    }

    async fn process(&self, id: ClusterId) -> Result<(), Error> {
        let cluster = self.inventory.cluster(id);
        let endpoint = cluster.api_url().ok_or(Error::MissingEndpoint)?;
        tracing::debug!(%endpoint);

        let client = self.inventory.kube_client(id, &*self.credentials).await?;
        let backend = self.backend.scoped(&cluster.name);
        let cidrs = self.inventory.cluster_cidrs(id)?;

        let batch = self.network_batch(&endpoint, client.clone(), &cidrs).await?;
        if !batch.is_empty() {
            scope::import(&*backend, batch).await?;
        }

        if self.ops.contains(Op::KubeEnforcer) {
            let namespace_path = self.scope.child_namespace(&cluster.name);
            self.installer
                .install(AgentTarget {
                    cluster: &cluster.name,
                    namespace_path: &namespace_path,
                    api: &self.api,
                    endpoint: &endpoint,
                    kube: client,
                    backend,
                    cidrs: &cidrs,
                })
                .await?;
        }

        Ok(())
    }

    /// External networks describing the cluster's API server, DNS service and
    /// nodes, as enabled.
    async fn network_batch(
        &self,
        endpoint: &str,
        client: kube::Client,
        cidrs: &[IpNet],
    ) -> Result<ImportBatch, Error> {
        let protect = self.scope.protect;
        let mut batch = ImportBatch::new(KUBE_LABEL);

        if self.ops.contains(Op::KubeApiNet) {
            let host = endpoint_host(endpoint);
            batch.external_networks.push(ExternalNetwork::new(
                API_NETWORK,
                vec![host.to_string()],
                protect,
            ));
        }

        if self.ops.contains(Op::KubeDnsNet) {
            match cloud_operator_k8s::kube_dns_address(client).await? {
                Some(ip) => batch.external_networks.push(ExternalNetwork::new(
                    DNS_NETWORK,
                    vec![ip.to_string()],
                    protect,
                )),
                None => tracing::warn!("kube-dns has no cluster IP"),
            }
        }

        if self.ops.contains(Op::KubeNodesNet) {
            if cidrs.is_empty() {
                tracing::warn!("Cluster has no node address ranges");
            } else {
                batch.external_networks.push(ExternalNetwork::new(
                    NODES_NETWORK,
                    cidrs.iter().map(ToString::to_string).collect(),
                    protect,
                ));
            }
        }

        Ok(batch)
    }
}

/// Extracts the host from an API server URL.
fn endpoint_host(endpoint: &str) -> &str {
    let rest = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let authority = rest.split('/').next().unwrap_or(rest);
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next().unwrap_or(v6);
    }
    authority.split(':').next().unwrap_or(authority)
}

#[cfg(test)]
mod tests {
    use super::endpoint_host;

    #[test]
    fn endpoint_hosts() {
        assert_eq!(
            endpoint_host("https://ABC.gr7.us-east-1.eks.amazonaws.com"),
            "ABC.gr7.us-east-1.eks.amazonaws.com"
        );
        assert_eq!(endpoint_host("https://34.1.2.3:443/"), "34.1.2.3");
        assert_eq!(endpoint_host("https://[2001:db8::1]:6443"), "2001:db8::1");
        assert_eq!(endpoint_host("10.0.0.1"), "10.0.0.1");
    }
}
