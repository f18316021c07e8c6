//! The provider-facing side of the inventory: raw records returned by a
//! provider's discovery APIs.

use crate::Cluster;
use cloud_operator_core::Tags;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetRecord {
    pub id: String,
    pub network_id: String,
    pub cidr: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub name: String,
    pub status: String,
    pub network_id: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Base64-encoded PEM bundle of the cluster's certificate authority.
    #[serde(default)]
    pub ca_data: Option<String>,
    /// The cluster's own address range, for providers that allocate one
    /// independently of the network's subnets.
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupRecord {
    pub name: String,
    /// A reference to the identity role attached to the group's nodes.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

/// A failed call against a provider API.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{operation}: {message}")]
pub struct DiscoveryError {
    pub operation: &'static str,
    pub message: String,
    /// Whether retrying the call may succeed.
    pub transient: bool,
}

/// Lists the resources of a cloud account.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    /// The instance tag whose value names the cluster an instance belongs to.
    fn cluster_link_key(&self) -> &str;

    async fn networks(&self) -> Result<Vec<NetworkRecord>, DiscoveryError>;

    async fn subnets(&self) -> Result<Vec<SubnetRecord>, DiscoveryError>;

    async fn clusters(&self) -> Result<Vec<ClusterRecord>, DiscoveryError>;

    async fn node_groups(&self, cluster: &str) -> Result<Vec<NodeGroupRecord>, DiscoveryError>;

    async fn instances(&self) -> Result<Vec<InstanceRecord>, DiscoveryError>;
}

/// Issues short-lived bearer tokens for a cluster's API server.
#[async_trait::async_trait]
pub trait ClusterCredentials: Send + Sync {
    async fn token(&self, cluster: &Cluster) -> Result<String, DiscoveryError>;
}

/// Every record returned by a discovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Records {
    pub networks: Vec<NetworkRecord>,
    pub subnets: Vec<SubnetRecord>,
    /// Each cluster with the node groups discovered for it.
    pub clusters: Vec<(ClusterRecord, Vec<NodeGroupRecord>)>,
    pub instances: Vec<InstanceRecord>,
}

// === impl DiscoveryError ===

impl DiscoveryError {
    pub fn new(operation: &'static str, message: impl ToString) -> Self {
        Self {
            operation,
            message: message.to_string(),
            transient: false,
        }
    }

    pub fn transient(operation: &'static str, message: impl ToString) -> Self {
        Self {
            transient: true,
            ..Self::new(operation, message)
        }
    }
}

// === impl Records ===

impl Records {
    /// Queries `discovery` for networks and subnets before clusters and
    /// instances. Node groups are listed once per cluster.
    pub async fn discover(discovery: &dyn Discovery) -> Result<Self, DiscoveryError> {
        let networks = discovery.networks().await?;
        let subnets = discovery.subnets().await?;

        let mut clusters = Vec::new();
        for cluster in discovery.clusters().await? {
            let groups = discovery.node_groups(&cluster.name).await?;
            tracing::debug!(cluster = %cluster.name, groups = groups.len(), "Discovered node groups");
            clusters.push((cluster, groups));
        }

        let instances = discovery.instances().await?;

        tracing::debug!(
            networks = networks.len(),
            subnets = subnets.len(),
            clusters = clusters.len(),
            instances = instances.len(),
            "Discovered resources"
        );
        Ok(Self {
            networks,
            subnets,
            clusters,
            instances,
        })
    }
}
