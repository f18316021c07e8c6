//! Policy objects submitted to the backend in batch imports.

use serde::Serialize;

/// A set of objects imported atomically under a label. Re-importing a label
/// replaces the objects previously imported under it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_networks: Vec<ExternalNetwork>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_rule_set_policies: Vec<NetworkRuleSetPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_authorization_policies: Vec<ApiAuthorizationPolicy>,
}

/// A set of addresses outside of the monitored workloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalNetwork {
    pub name: String,
    pub description: String,
    pub protected: bool,
    pub propagate: bool,
    pub entries: Vec<String>,
    pub associated_tags: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub action: RuleAction,
    /// e.g. `udp/67`.
    pub protocol_ports: Vec<String>,
    /// An OR of AND-ed tag expressions selecting the peer.
    pub object: Vec<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRuleSetPolicy {
    pub name: String,
    pub description: String,
    pub protected: bool,
    pub propagate: bool,
    pub subject: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incoming_rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outgoing_rules: Vec<Rule>,
}

/// Grants identities matching `subject` the roles in `authorized_identities`
/// within `authorized_namespace`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAuthorizationPolicy {
    pub name: String,
    pub description: String,
    pub protected: bool,
    pub authorized_namespace: String,
    pub authorized_identities: Vec<String>,
    pub subject: Vec<Vec<String>>,
}

// === impl ImportBatch ===

impl ImportBatch {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.external_networks.len()
            + self.network_rule_set_policies.len()
            + self.api_authorization_policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === impl ExternalNetwork ===

impl ExternalNetwork {
    pub fn new(name: impl Into<String>, entries: Vec<String>, protected: bool) -> Self {
        let name = name.into();
        Self {
            associated_tags: vec![format!("externalnetwork:name={}", name)],
            name,
            description: crate::GENERATED_DESCRIPTION.to_string(),
            protected,
            propagate: true,
            entries,
        }
    }

    /// The tag expression selecting this network as a rule object.
    pub fn selector(&self) -> String {
        format!("externalnetwork:name={}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let mut batch = ImportBatch::new("Cloud-Operator-DHCP");
        batch.external_networks.push(ExternalNetwork::new(
            "dhcp-server-s1",
            vec!["10.0.0.1".to_string()],
            true,
        ));
        assert_eq!(batch.len(), 1);

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["label"], "Cloud-Operator-DHCP");
        assert_eq!(json["externalNetworks"][0]["name"], "dhcp-server-s1");
        assert_eq!(
            json["externalNetworks"][0]["associatedTags"][0],
            "externalnetwork:name=dhcp-server-s1"
        );
        assert!(json.get("apiAuthorizationPolicies").is_none());
    }
}
