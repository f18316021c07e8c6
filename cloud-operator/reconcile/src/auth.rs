use crate::scope::{self, PolicyScope};
use cloud_operator_core::{
    policy::{ApiAuthorizationPolicy, ImportBatch},
    report::AuthReport,
    Op, Ops, PolicyBackend, GENERATED_DESCRIPTION,
};
use cloud_operator_inventory::{IdentityRole, Inventory};

pub const AUTH_LABEL: &str = "Cloud-Operator-AUTH";

/// The identity that may act on the authorized namespaces.
const ENFORCER_IDENTITY: &str = "@auth:role=enforcer";

/// Derives API authorization policies that let workloads assuming an identity
/// role enforce the namespaces generated for them.
#[derive(Clone, Debug)]
pub struct AuthPolicyBuilder<'s> {
    scope: &'s PolicyScope,
}

impl<'s> AuthPolicyBuilder<'s> {
    pub fn new(scope: &'s PolicyScope) -> Self {
        Self { scope }
    }

    pub fn build(&self, inventory: &Inventory, ops: &Ops) -> ImportBatch {
        let mut batch = ImportBatch::new(AUTH_LABEL);

        if ops.contains(Op::ComputeAuth) {
            for role in inventory.roles() {
                if !Self::compute_scoped(role) {
                    tracing::debug!(role = %role.name, "Role is only used by clusters");
                    continue;
                }
                tracing::debug!(role = %role.name, "Authorizing compute role");
                batch.api_authorization_policies.push(self.policy(
                    format!("instances:{}", role.name),
                    &role.name,
                    &role.name,
                ));
            }
        }

        if ops.contains(Op::KubeAuth) {
            for cluster in inventory.clusters() {
                for role in &cluster.roles {
                    let role = inventory.role(*role);
                    tracing::debug!(cluster = %cluster.name, role = %role.name, "Authorizing cluster role");
                    batch.api_authorization_policies.push(self.policy(
                        format!("{}:{}", cluster.name, role.name),
                        &cluster.name,
                        &role.name,
                    ));
                }
            }
        }

        batch
    }

    /// Builds and imports the policies as a single batch.
    pub async fn reconcile(
        &self,
        backend: &dyn PolicyBackend,
        inventory: &Inventory,
        ops: &Ops,
    ) -> AuthReport {
        let batch = self.build(inventory, ops);
        match scope::import(backend, batch).await {
            Ok(()) => AuthReport::completed(),
            Err(error) => {
                tracing::warn!(%error, "Failed to import authorization policies");
                AuthReport::failed(error.into())
            }
        }
    }

    /// Roles with compute instances are always authorized. Roles with no
    /// cluster use at all are authorized too, so that instances launched
    /// later with the role are already covered.
    fn compute_scoped(role: &IdentityRole) -> bool {
        !role.compute_instances.is_empty()
            || (role.clusters.is_empty() && role.cluster_instances.is_empty())
    }

    fn policy(&self, name: String, namespace: &str, role: &str) -> ApiAuthorizationPolicy {
        ApiAuthorizationPolicy {
            name,
            description: GENERATED_DESCRIPTION.to_string(),
            protected: self.scope.protect,
            authorized_namespace: self.scope.child_namespace(namespace),
            authorized_identities: vec![ENFORCER_IDENTITY.to_string()],
            subject: vec![self
                .scope
                .provider
                .subject(&self.scope.account_id, role)],
        }
    }
}
