//! An in-process policy backend and agent installer.
//!
//! These record the changes a run would make instead of applying them, which
//! backs the operator's dry-run mode and the reconcilers' tests.

use cloud_operator_core::{
    backend::{Namespace, NamespaceSpec},
    policy::ImportBatch,
    AgentInstaller, AgentTarget, BackendError, Error, IpNet, PolicyBackend,
};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

/// A policy backend holding its namespaces in memory. Clones and scoped
/// clients share state.
#[derive(Clone, Debug)]
pub struct MemoryBackend {
    path: String,
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    account_id: String,
    /// Namespaces keyed by full path.
    namespaces: BTreeMap<String, Namespace>,
    imports: Vec<(String, ImportBatch)>,
    fail_list: Option<BackendError>,
    fail_import: Option<BackendError>,
}

/// An installer that records the agent installations it is asked for.
#[derive(Clone, Debug, Default)]
pub struct PlanInstaller {
    installs: Arc<Mutex<Vec<PlannedInstall>>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedInstall {
    pub cluster: String,
    pub namespace_path: String,
    pub endpoint: String,
    pub cidrs: Vec<IpNet>,
}

// === impl MemoryBackend ===

impl MemoryBackend {
    pub fn new(path: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            inner: Arc::new(Mutex::new(State {
                account_id: account_id.into(),
                ..State::default()
            })),
        }
    }

    /// Adds a child namespace.
    pub fn with_namespace(self, ns: Namespace) -> Self {
        let key = self.child_path(&ns.name);
        self.inner.lock().namespaces.insert(key, ns);
        self
    }

    /// The sorted names of the child namespaces.
    pub fn namespace_names(&self) -> Vec<String> {
        self.children().into_iter().map(|ns| ns.name).collect()
    }

    pub fn namespace(&self, name: &str) -> Option<Namespace> {
        self.inner.lock().namespaces.get(&self.child_path(name)).cloned()
    }

    /// Causes the next namespace listing to fail with `error`.
    pub fn fail_next_list(&self, error: BackendError) {
        self.inner.lock().fail_list = Some(error);
    }

    /// Causes the next import, through any client sharing this state, to fail
    /// with `error`.
    pub fn fail_next_import(&self, error: BackendError) {
        self.inner.lock().fail_import = Some(error);
    }

    /// Every imported batch with the namespace it was imported into, in
    /// import order.
    pub fn imports(&self) -> Vec<(String, ImportBatch)> {
        self.inner.lock().imports.clone()
    }

    fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }

    fn children(&self) -> Vec<Namespace> {
        let prefix = format!("{}/", self.path);
        self.inner
            .lock()
            .namespaces
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .map_or(false, |name| !name.is_empty() && !name.contains('/'))
            })
            .map(|(_, ns)| ns.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl PolicyBackend for MemoryBackend {
    fn namespace_path(&self) -> &str {
        &self.path
    }

    async fn account_id(&self) -> Result<String, BackendError> {
        Ok(self.inner.lock().account_id.clone())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, BackendError> {
        if let Some(error) = self.inner.lock().fail_list.take() {
            return Err(error);
        }
        Ok(self.children())
    }

    async fn has_namespace(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self
            .inner
            .lock()
            .namespaces
            .contains_key(&self.child_path(name)))
    }

    async fn create_namespace(&self, spec: NamespaceSpec) -> Result<(), BackendError> {
        let key = self.child_path(&spec.name);
        let mut state = self.inner.lock();
        if state.namespaces.contains_key(&key) {
            return Err(BackendError::AlreadyExists(key));
        }
        tracing::info!(namespace = %key, "Would create namespace");
        state.namespaces.insert(
            key,
            Namespace {
                name: spec.name,
                annotations: spec.annotations,
            },
        );
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), BackendError> {
        let key = self.child_path(name);
        let mut state = self.inner.lock();
        if state.namespaces.remove(&key).is_none() {
            return Err(BackendError::NotFound(key));
        }
        // Nested namespaces go with their parent.
        let prefix = format!("{}/", key);
        state.namespaces.retain(|path, _| !path.starts_with(&prefix));
        tracing::info!(namespace = %key, "Would delete namespace");
        Ok(())
    }

    async fn import_config(&self, batch: ImportBatch) -> Result<(), BackendError> {
        let mut state = self.inner.lock();
        if let Some(error) = state.fail_import.take() {
            return Err(error);
        }
        tracing::info!(
            namespace = %self.path,
            label = %batch.label,
            objects = batch.len(),
            "Would import policies",
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(&batch) {
                Ok(json) => tracing::debug!(%json),
                Err(error) => tracing::debug!(%error, "Failed to serialize batch"),
            }
        }
        state.imports.push((self.path.clone(), batch));
        Ok(())
    }

    fn scoped(&self, name: &str) -> Arc<dyn PolicyBackend> {
        Arc::new(Self {
            path: self.child_path(name),
            inner: self.inner.clone(),
        })
    }
}

// === impl PlanInstaller ===

impl PlanInstaller {
    pub fn installs(&self) -> Vec<PlannedInstall> {
        self.installs.lock().clone()
    }
}

#[async_trait::async_trait]
impl AgentInstaller for PlanInstaller {
    async fn install(&self, target: AgentTarget<'_>) -> Result<(), Error> {
        tracing::info!(
            cluster = %target.cluster,
            namespace = %target.namespace_path,
            endpoint = %target.endpoint,
            cidrs = ?target.cidrs,
            "Would install enforcer",
        );
        self.installs.lock().push(PlannedInstall {
            cluster: target.cluster.to_string(),
            namespace_path: target.namespace_path.to_string(),
            endpoint: target.endpoint.to_string(),
            cidrs: target.cidrs.to_vec(),
        });
        Ok(())
    }
}
