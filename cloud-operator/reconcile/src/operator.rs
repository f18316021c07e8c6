use crate::{
    auth::AuthPolicyBuilder, cluster::ClusterReconciler, dhcp::DhcpPolicyBuilder,
    namespace::NamespaceReconciler, scope::PolicyScope,
};
use cloud_operator_core::{
    AgentInstaller, BackendError, Filter, Op, OperatorConfig, PolicyBackend, Report, TagMatcher,
};
use cloud_operator_inventory::{ClusterCredentials, Discovery, Inventory};
use std::sync::Arc;

/// Errors that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to determine the cloud account id: {0}")]
    AccountId(#[source] BackendError),

    #[error("failed to build the inventory: {0}")]
    Inventory(#[from] cloud_operator_inventory::Error),
}

/// Runs the enabled operations against one cloud account.
pub struct Operator {
    config: OperatorConfig,
    scope: Arc<PolicyScope>,
    inventory: Arc<Inventory>,
    backend: Arc<dyn PolicyBackend>,
    credentials: Arc<dyn ClusterCredentials>,
    installer: Arc<dyn AgentInstaller>,
}

impl Operator {
    /// Resolves the account identifier and discovers the inventory.
    pub async fn new(
        config: OperatorConfig,
        discovery: &dyn Discovery,
        backend: Arc<dyn PolicyBackend>,
        credentials: Arc<dyn ClusterCredentials>,
        installer: Arc<dyn AgentInstaller>,
    ) -> Result<Self, Error> {
        let account_id = backend.account_id().await.map_err(Error::AccountId)?;
        tracing::debug!(%account_id);

        let inventory = Inventory::discover(discovery).await?;
        tracing::info!(
            networks = inventory.networks().len(),
            subnets = inventory.subnets().len(),
            instances = inventory.instances().len(),
            clusters = inventory.clusters().len(),
            roles = inventory.roles().len(),
            "Discovered inventory",
        );

        Ok(Self {
            scope: Arc::new(PolicyScope::new(&config, account_id)),
            config,
            inventory: Arc::new(inventory),
            backend,
            credentials,
            installer,
        })
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn scope(&self) -> &PolicyScope {
        &self.scope
    }

    /// Runs DHCP, namespace, authorization and Kubernetes operations in that
    /// order, as enabled. `filter` further narrows the clusters selected by
    /// the configured filter.
    pub async fn run(&self, filter: Option<Filter>) -> Report {
        let ops = &self.config.ops;
        let mut report = Report::new(self.config.provider.label());

        if ops.contains(Op::Dhcp) {
            let dhcp = DhcpPolicyBuilder::new(&self.scope)
                .reconcile(&*self.backend, &self.inventory)
                .await;
            report.dhcp = Some(dhcp);
        }

        if ops.namespace_enabled() {
            let compute = self.compute_namespaces();
            let kube = self.kube_namespaces();
            let reports = NamespaceReconciler::new(self.backend.clone())
                .process(&compute, &kube, ops)
                .await;
            report.add_namespace_reports(reports);
        }

        if ops.auth_enabled() {
            let auth = AuthPolicyBuilder::new(&self.scope)
                .reconcile(&*self.backend, &self.inventory, ops)
                .await;
            report.auth = Some(auth);
        }

        if ops.kubernetes_enabled() {
            let matcher = TagMatcher::new(self.config.filter.clone(), filter);
            let reconciler = Arc::new(ClusterReconciler {
                inventory: self.inventory.clone(),
                scope: self.scope.clone(),
                api: self.config.api.clone(),
                ops: ops.clone(),
                backend: self.backend.clone(),
                credentials: self.credentials.clone(),
                installer: self.installer.clone(),
            });
            report.kubernetes = Some(reconciler.reconcile_all(&matcher).await);
        }

        report.build();
        report
    }

    /// Roles used by at least one instance outside of a cluster.
    fn compute_namespaces(&self) -> Vec<String> {
        self.inventory
            .roles()
            .iter()
            .filter(|r| !r.compute_instances.is_empty())
            .map(|r| r.name.clone())
            .collect()
    }

    fn kube_namespaces(&self) -> Vec<String> {
        self.inventory
            .clusters()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}
