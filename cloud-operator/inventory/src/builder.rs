use crate::{
    discovery::{ClusterRecord, InstanceRecord, NodeGroupRecord, Records},
    Cluster, ClusterId, ClusterStatus, Error, IdentityRole, Instance, InstanceId, Inventory,
    Network, NetworkId, RoleId, Subnet, SubnetId,
};
use ahash::AHashMap as HashMap;
use cloud_operator_core::IpNet;

/// Assembles an [`Inventory`] from discovery records.
///
/// The lookup tables only live as long as the builder. Once every record is
/// linked the arenas are moved into the inventory and the tables are dropped.
pub(crate) struct Builder<'k> {
    cluster_link_key: &'k str,
    inventory: Inventory,
    networks_by_id: HashMap<String, NetworkId>,
    subnets_by_id: HashMap<String, SubnetId>,
    clusters_by_name: HashMap<String, ClusterId>,
    roles_by_name: HashMap<String, RoleId>,
}

impl<'k> Builder<'k> {
    pub(crate) fn new(cluster_link_key: &'k str) -> Self {
        Self {
            cluster_link_key,
            inventory: Inventory::default(),
            networks_by_id: HashMap::new(),
            subnets_by_id: HashMap::new(),
            clusters_by_name: HashMap::new(),
            roles_by_name: HashMap::new(),
        }
    }

    pub(crate) fn build(mut self, records: Records) -> Result<Inventory, Error> {
        let Records {
            networks,
            subnets,
            clusters,
            instances,
        } = records;

        // Networks must be indexed before anything can reference them.
        for network in networks {
            if self.networks_by_id.contains_key(&network.id) {
                tracing::debug!(network = %network.id, "Ignoring duplicate network");
                continue;
            }
            let id = NetworkId(self.inventory.networks.len());
            self.networks_by_id.insert(network.id.clone(), id);
            self.inventory.networks.push(Network {
                id: network.id,
                subnets: Vec::new(),
                clusters: Vec::new(),
                instances: Vec::new(),
            });
        }

        for subnet in subnets {
            let network = self.network_id("subnet", &subnet.id, &subnet.network_id)?;

            let id = SubnetId(self.inventory.subnets.len());
            self.subnets_by_id.insert(subnet.id.clone(), id);
            self.inventory.networks[network.0].subnets.push(id);
            self.inventory.subnets.push(Subnet {
                id: subnet.id,
                cidr: subnet.cidr,
                network,
                instances: Vec::new(),
            });
        }

        for (cluster, groups) in clusters {
            self.add_cluster(cluster, groups)?;
        }

        for instance in instances {
            self.add_instance(instance)?;
        }

        tracing::debug!(
            networks = self.inventory.networks.len(),
            subnets = self.inventory.subnets.len(),
            clusters = self.inventory.clusters.len(),
            instances = self.inventory.instances.len(),
            roles = self.inventory.roles.len(),
            "Built inventory"
        );
        Ok(self.inventory)
    }

    fn add_cluster(
        &mut self,
        cluster: ClusterRecord,
        groups: Vec<NodeGroupRecord>,
    ) -> Result<(), Error> {
        let network = self.network_id("cluster", &cluster.name, &cluster.network_id)?;
        let cidr = match cluster.cidr.as_deref() {
            None | Some("") => None,
            Some(cidr) => match cidr.parse::<IpNet>() {
                Ok(cidr) => Some(cidr),
                Err(error) => {
                    tracing::warn!(cluster = %cluster.name, %cidr, %error, "Ignoring invalid cluster CIDR");
                    None
                }
            },
        };

        let id = ClusterId(self.inventory.clusters.len());
        // Instances link to the first cluster of a name, as lookups do.
        if self.clusters_by_name.contains_key(&cluster.name) {
            tracing::warn!(cluster = %cluster.name, "Duplicate cluster name");
        } else {
            self.clusters_by_name.insert(cluster.name.clone(), id);
        }
        self.inventory.networks[network.0].clusters.push(id);
        self.inventory.clusters.push(Cluster {
            name: cluster.name,
            status: ClusterStatus::new(cluster.status),
            endpoint: cluster.endpoint,
            ca_data: cluster.ca_data,
            cidr,
            tags: cluster.tags,
            network,
            instances: Vec::new(),
            roles: Vec::new(),
        });

        for group in groups {
            match group.role.as_deref() {
                Some(reference) => {
                    let role = self.role_id(reference);
                    self.link_cluster_role(id, role);
                }
                None => {
                    tracing::debug!(cluster = %self.inventory.clusters[id.0].name, group = %group.name, "Node group has no role");
                }
            }
        }

        Ok(())
    }

    fn add_instance(&mut self, instance: InstanceRecord) -> Result<(), Error> {
        let network = self.network_id("instance", &instance.id, &instance.network_id)?;
        let id = InstanceId(self.inventory.instances.len());

        let subnet = instance.subnet_id.as_deref().and_then(|subnet| {
            let found = self.subnets_by_id.get(subnet).copied();
            if found.is_none() {
                tracing::warn!(instance = %instance.id, %subnet, "Instance references an unknown subnet");
            }
            found
        });
        if let Some(subnet) = subnet {
            self.inventory.subnets[subnet.0].instances.push(id);
        }

        let cluster = instance
            .tags
            .get(self.cluster_link_key)
            .and_then(|name| {
                let found = self.clusters_by_name.get(name).copied();
                if found.is_none() {
                    tracing::warn!(instance = %instance.id, cluster = %name, "Instance references an unknown cluster");
                }
                found
            });
        if let Some(cluster) = cluster {
            self.inventory.clusters[cluster.0].instances.push(id);
        }

        let role = instance.role.as_deref().map(|reference| self.role_id(reference));
        if let Some(role) = role {
            // An instance lands in exactly one of the role's instance sets.
            match cluster {
                Some(cluster) => {
                    self.inventory.roles[role.0].cluster_instances.push(id);
                    self.link_cluster_role(cluster, role);
                }
                None => self.inventory.roles[role.0].compute_instances.push(id),
            }
        }

        self.inventory.networks[network.0].instances.push(id);
        self.inventory.instances.push(Instance {
            id: instance.id,
            tags: instance.tags,
            network,
            subnet,
            cluster,
            role,
        });
        Ok(())
    }

    fn network_id(&self, kind: &'static str, id: &str, network: &str) -> Result<NetworkId, Error> {
        self.networks_by_id
            .get(network)
            .copied()
            .ok_or_else(|| Error::MissingNetwork {
                kind,
                id: id.to_string(),
                network: network.to_string(),
            })
    }

    /// Resolves a role reference, creating the role on first sight.
    fn role_id(&mut self, reference: &str) -> RoleId {
        let name = IdentityRole::name_from_ref(reference);
        if let Some(id) = self.roles_by_name.get(name) {
            return *id;
        }

        let id = RoleId(self.inventory.roles.len());
        self.roles_by_name.insert(name.to_string(), id);
        self.inventory.roles.push(IdentityRole {
            name: name.to_string(),
            compute_instances: Vec::new(),
            cluster_instances: Vec::new(),
            clusters: Vec::new(),
        });
        id
    }

    fn link_cluster_role(&mut self, cluster: ClusterId, role: RoleId) {
        let roles = &mut self.inventory.clusters[cluster.0].roles;
        if !roles.contains(&role) {
            roles.push(role);
        }

        let clusters = &mut self.inventory.roles[role.0].clusters;
        if !clusters.contains(&cluster) {
            clusters.push(cluster);
        }
    }
}
