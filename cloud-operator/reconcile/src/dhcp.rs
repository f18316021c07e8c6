use crate::scope::{self, PolicyScope};
use cloud_operator_core::{
    policy::{ExternalNetwork, ImportBatch, NetworkRuleSetPolicy, Rule, RuleAction},
    report::DhcpReport,
    DhcpMode, Error, PolicyBackend, GENERATED_DESCRIPTION,
};
use cloud_operator_inventory::Inventory;

pub const DHCP_LABEL: &str = "Cloud-Operator-DHCP";

const METADATA_NETWORK: &str = "GCP DHCP";
const HOST_OSES: [(&str, &str); 2] = [("Linux", "linux"), ("Windows", "windows")];

/// Derives the egress policies that let instances reach their DHCP server.
#[derive(Clone, Debug)]
pub struct DhcpPolicyBuilder<'s> {
    scope: &'s PolicyScope,
}

impl<'s> DhcpPolicyBuilder<'s> {
    pub fn new(scope: &'s PolicyScope) -> Self {
        Self { scope }
    }

    /// Fails if a subnet's address range cannot be parsed.
    pub fn build(&self, inventory: &Inventory) -> Result<ImportBatch, Error> {
        let mut batch = ImportBatch::new(DHCP_LABEL);

        match self.scope.provider.dhcp() {
            DhcpMode::PerSubnet { subnet_tag_key } => {
                for subnet in inventory.subnets() {
                    let cidr = subnet.parse_cidr()?;
                    let server = match cidr.hosts().next() {
                        Some(ip) => ip,
                        None => {
                            tracing::warn!(subnet = %subnet.id, %cidr, "Subnet has no host addresses");
                            continue;
                        }
                    };

                    let name = format!("dhcp-server-{}", subnet.id);
                    let network =
                        ExternalNetwork::new(&name, vec![server.to_string()], self.scope.protect);
                    batch.network_rule_set_policies.push(self.rule_set(
                        name,
                        &network,
                        format!("{}={}", subnet_tag_key, subnet.id),
                    ));
                    batch.external_networks.push(network);
                }
            }

            DhcpMode::Metadata { address } => {
                let network = ExternalNetwork::new(
                    METADATA_NETWORK,
                    vec![address.to_string()],
                    self.scope.protect,
                );
                for (os, tag) in HOST_OSES {
                    batch.network_rule_set_policies.push(self.rule_set(
                        format!("{} {}", METADATA_NETWORK, os),
                        &network,
                        format!("@os:host={}", tag),
                    ));
                }
                batch.external_networks.push(network);
            }
        }

        Ok(batch)
    }

    pub async fn reconcile(&self, backend: &dyn PolicyBackend, inventory: &Inventory) -> DhcpReport {
        let batch = match self.build(inventory) {
            Ok(batch) => batch,
            Err(error) => {
                tracing::warn!(%error, "Failed to build DHCP policies");
                return DhcpReport::failed(error);
            }
        };
        match scope::import(backend, batch).await {
            Ok(()) => DhcpReport::completed(),
            Err(error) => {
                tracing::warn!(%error, "Failed to import DHCP policies");
                DhcpReport::failed(error.into())
            }
        }
    }

    /// Allows instances selected by `selector` to exchange DHCP messages with
    /// `server`.
    fn rule_set(
        &self,
        name: String,
        server: &ExternalNetwork,
        selector: String,
    ) -> NetworkRuleSetPolicy {
        NetworkRuleSetPolicy {
            name,
            description: GENERATED_DESCRIPTION.to_string(),
            protected: self.scope.protect,
            propagate: true,
            subject: vec![self.scope.org_tags_with(selector)],
            incoming_rules: vec![],
            outgoing_rules: vec![Rule {
                action: RuleAction::Allow,
                protocol_ports: vec!["udp/67".to_string(), "udp/68".to_string()],
                object: vec![self.scope.org_tags_with(server.selector())],
            }],
        }
    }
}
