use crate::discovery::{
    ClusterRecord, Discovery, DiscoveryError, InstanceRecord, NetworkRecord, NodeGroupRecord,
    SubnetRecord,
};
use cloud_operator_core::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recorded discovery pass, replayed as a [`Discovery`].
///
/// Snapshots are JSON documents:
///
/// ```json
/// {
///   "clusterLinkKey": "eks:cluster-name",
///   "networks": [{ "id": "vpc-1" }],
///   "subnets": [{ "id": "subnet-1", "networkId": "vpc-1", "cidr": "10.0.0.0/24" }],
///   "clusters": [{ "name": "c1", "status": "ACTIVE", "networkId": "vpc-1" }],
///   "nodeGroups": { "c1": [{ "name": "ng-1", "role": "arn:aws:iam::1:role/R1" }] },
///   "instances": [{ "id": "i-1", "networkId": "vpc-1", "tags": { "eks:cluster-name": "c1" } }]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub cluster_link_key: Option<String>,
    pub networks: Vec<NetworkRecord>,
    pub subnets: Vec<SubnetRecord>,
    pub clusters: Vec<ClusterRecord>,
    /// Node groups keyed by cluster name.
    pub node_groups: BTreeMap<String, Vec<NodeGroupRecord>>,
    pub instances: Vec<InstanceRecord>,
}

// === impl Snapshot ===

impl Snapshot {
    /// Uses the provider's cluster link key unless the snapshot names one.
    pub fn with_provider_defaults(mut self, provider: Provider) -> Self {
        if self.cluster_link_key.is_none() {
            self.cluster_link_key = Some(provider.cluster_link_key().to_string());
        }
        self
    }
}

#[async_trait::async_trait]
impl Discovery for Snapshot {
    fn cluster_link_key(&self) -> &str {
        self.cluster_link_key
            .as_deref()
            .unwrap_or_else(|| Provider::Aws.cluster_link_key())
    }

    async fn networks(&self) -> Result<Vec<NetworkRecord>, DiscoveryError> {
        Ok(self.networks.clone())
    }

    async fn subnets(&self) -> Result<Vec<SubnetRecord>, DiscoveryError> {
        Ok(self.subnets.clone())
    }

    async fn clusters(&self) -> Result<Vec<ClusterRecord>, DiscoveryError> {
        Ok(self.clusters.clone())
    }

    async fn node_groups(&self, cluster: &str) -> Result<Vec<NodeGroupRecord>, DiscoveryError> {
        Ok(self.node_groups.get(cluster).cloned().unwrap_or_default())
    }

    async fn instances(&self) -> Result<Vec<InstanceRecord>, DiscoveryError> {
        Ok(self.instances.clone())
    }
}
