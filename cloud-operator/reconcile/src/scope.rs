use cloud_operator_core::{
    policy::ImportBatch, BackendError, OperatorConfig, PolicyBackend, Provider,
};

/// Values shared by every generated policy object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyScope {
    pub provider: Provider,
    /// The operator's policy namespace, `/<tenant>/<account>`.
    pub namespace: String,
    pub tenant: String,
    pub cloud_account: String,
    /// The provider account identifier reported by the policy backend.
    pub account_id: String,
    pub protect: bool,
}

// === impl PolicyScope ===

impl PolicyScope {
    pub fn new(config: &OperatorConfig, account_id: impl Into<String>) -> Self {
        Self {
            provider: config.provider,
            namespace: config.namespace(),
            tenant: config.tenant.clone(),
            cloud_account: config.cloud_account.clone(),
            account_id: account_id.into(),
            protect: config.protect_config,
        }
    }

    /// The tags selecting everything the operator manages.
    pub fn org_tags(&self) -> Vec<String> {
        vec![
            format!("@org:cloudaccount={}", self.cloud_account),
            format!("@org:tenant={}", self.tenant),
        ]
    }

    /// `org_tags` followed by `extra`.
    pub fn org_tags_with(&self, extra: impl Into<String>) -> Vec<String> {
        let mut tags = self.org_tags();
        tags.push(extra.into());
        tags
    }

    pub fn child_namespace(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }
}

/// Submits a batch, logging its size.
pub(crate) async fn import(
    backend: &dyn PolicyBackend,
    batch: ImportBatch,
) -> Result<(), BackendError> {
    let label = batch.label.clone();
    let objects = batch.len();
    tracing::debug!(namespace = %backend.namespace_path(), %label, objects, "Importing policies");
    backend.import_config(batch).await?;
    tracing::info!(namespace = %backend.namespace_path(), %label, objects, "Imported policies");
    Ok(())
}
