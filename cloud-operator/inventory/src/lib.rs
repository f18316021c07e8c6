//! Cloud inventory graph
//!
//! The inventory correlates the resources of a cloud account. It is built
//! once per run from a [`Discovery`] and is immutable afterwards, so it may be
//! shared freely between concurrent readers.
//!
//! ```text
//! [ Network ] -> [ Subnet ] -> [ Instance ] <- [ Cluster ]
//!      |                           |               ^
//!      +-> [ Cluster ]             +-> [ IdentityRole ]
//! ```
//!
//! Entities are stored in per-kind arenas and refer to each other by typed
//! index. Every instance, subnet and cluster belongs to exactly one network.
//! Instances link to a cluster through a provider-specific tag, and each
//! instance that references an identity role is recorded in exactly one of the
//! role's compute or cluster instance sets.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod builder;
mod describe;
pub mod discovery;
mod snapshot;

#[cfg(test)]
mod tests;

pub use self::{
    discovery::{ClusterCredentials, Discovery, DiscoveryError, Records},
    snapshot::Snapshot,
};
use cloud_operator_core::{IpNet, Tags};

/// Errors that abort building the inventory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{kind} {id} references unknown network {network}")]
    MissingNetwork {
        kind: &'static str,
        id: String,
        network: String,
    },
}

macro_rules! arena_id {
    ($($name:ident),+) => {
        $(
            #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(usize);
        )+
    };
}

arena_id!(NetworkId, SubnetId, InstanceId, ClusterId, RoleId);

#[derive(Clone, Debug, Default)]
pub struct Inventory {
    networks: Vec<Network>,
    subnets: Vec<Subnet>,
    instances: Vec<Instance>,
    clusters: Vec<Cluster>,
    roles: Vec<IdentityRole>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub subnets: Vec<SubnetId>,
    pub clusters: Vec<ClusterId>,
    pub instances: Vec<InstanceId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    /// The address range as reported by the provider. It is only parsed by
    /// the operations that need it, so a malformed range fails those units
    /// alone.
    pub cidr: String,
    pub network: NetworkId,
    pub instances: Vec<InstanceId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub tags: Tags,
    pub network: NetworkId,
    pub subnet: Option<SubnetId>,
    pub cluster: Option<ClusterId>,
    pub role: Option<RoleId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub status: ClusterStatus,
    pub endpoint: Option<String>,
    pub ca_data: Option<String>,
    pub cidr: Option<IpNet>,
    pub tags: Tags,
    pub network: NetworkId,
    /// Worker nodes.
    pub instances: Vec<InstanceId>,
    pub roles: Vec<RoleId>,
}

/// The provider-reported lifecycle state of a cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterStatus(String);

/// An identity attachable to instances and node groups: an IAM role or a
/// service account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityRole {
    pub name: String,
    /// Instances that are not members of any cluster.
    pub compute_instances: Vec<InstanceId>,
    /// Instances that are cluster members.
    pub cluster_instances: Vec<InstanceId>,
    pub clusters: Vec<ClusterId>,
}

// === impl Inventory ===

impl Inventory {
    /// Discovers the account's resources and builds the graph.
    pub async fn discover(discovery: &dyn Discovery) -> Result<Self, Error> {
        let records = Records::discover(discovery).await?;
        Self::build(records, discovery.cluster_link_key())
    }

    /// Builds the graph from previously discovered records.
    pub fn build(records: Records, cluster_link_key: &str) -> Result<Self, Error> {
        builder::Builder::new(cluster_link_key).build(records)
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn roles(&self) -> &[IdentityRole] {
        &self.roles
    }

    pub fn network(&self, NetworkId(idx): NetworkId) -> &Network {
        &self.networks[idx]
    }

    pub fn subnet(&self, SubnetId(idx): SubnetId) -> &Subnet {
        &self.subnets[idx]
    }

    pub fn instance(&self, InstanceId(idx): InstanceId) -> &Instance {
        &self.instances[idx]
    }

    pub fn cluster(&self, ClusterId(idx): ClusterId) -> &Cluster {
        &self.clusters[idx]
    }

    pub fn role(&self, RoleId(idx): RoleId) -> &IdentityRole {
        &self.roles[idx]
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> {
        (0..self.clusters.len()).map(ClusterId)
    }

    pub fn cluster_by_name(&self, name: &str) -> Option<ClusterId> {
        self.clusters
            .iter()
            .position(|c| c.name == name)
            .map(ClusterId)
    }

    pub fn role_by_name(&self, name: &str) -> Option<RoleId> {
        self.roles.iter().position(|r| r.name == name).map(RoleId)
    }

    /// The address ranges of a cluster's nodes: the cluster's own range when
    /// it declares one, otherwise every subnet of its network.
    pub fn cluster_cidrs(
        &self,
        id: ClusterId,
    ) -> Result<Vec<IpNet>, cloud_operator_core::Error> {
        let cluster = self.cluster(id);
        if let Some(cidr) = cluster.cidr {
            return Ok(vec![cidr]);
        }
        self.network(cluster.network)
            .subnets
            .iter()
            .map(|s| self.subnet(*s).parse_cidr())
            .collect()
    }

    /// Builds a client for the cluster's API server, authenticating with a
    /// token obtained from `credentials`.
    pub async fn kube_client(
        &self,
        id: ClusterId,
        credentials: &dyn ClusterCredentials,
    ) -> Result<kube::Client, cloud_operator_core::Error> {
        let cluster = self.cluster(id);
        let endpoint = cluster
            .api_url()
            .ok_or(cloud_operator_core::Error::MissingEndpoint)?;
        let token = credentials.token(cluster).await.map_err(|e| {
            cloud_operator_core::Error::Credentials {
                cluster: cluster.name.clone(),
                message: e.to_string(),
            }
        })?;
        cloud_operator_k8s::cluster_client(
            &cluster.name,
            &endpoint,
            cluster.ca_data.as_deref(),
            &token,
        )
        .await
    }
}

// === impl Subnet ===

impl Subnet {
    pub fn parse_cidr(&self) -> Result<IpNet, cloud_operator_core::Error> {
        self.cidr
            .trim()
            .parse()
            .map_err(|source| cloud_operator_core::Error::InvalidCidr {
                value: self.cidr.clone(),
                source,
            })
    }
}

// === impl Cluster ===

impl Cluster {
    /// The cluster's API server URL. Bare host names are assumed to serve
    /// HTTPS.
    pub fn api_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
            return Some(endpoint.to_string());
        }
        Some(format!("https://{}", endpoint))
    }
}

// === impl ClusterStatus ===

impl ClusterStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    /// True if the cluster is serving its API.
    pub fn is_ready(&self) -> bool {
        self.0.eq_ignore_ascii_case("running") || self.0.eq_ignore_ascii_case("active")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// === impl IdentityRole ===

impl IdentityRole {
    /// Normalizes a provider role reference (e.g. an ARN or a resource path)
    /// to its final path segment.
    pub fn name_from_ref(reference: &str) -> &str {
        reference.rsplit('/').next().unwrap_or(reference)
    }
}
