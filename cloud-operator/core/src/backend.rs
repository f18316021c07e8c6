//! The collaborators driven by the reconcilers: the policy backend, which
//! stores namespaces and policy objects, and the installer that deploys the
//! enforcement agent into a cluster.

use crate::{policy::ImportBatch, Error, IpNet};
use std::{collections::BTreeMap, sync::Arc};

/// The annotation recording which kind of cloud entity a namespace was
/// created for.
pub const NAMESPACE_TYPE_ANNOTATION: &str = "cloud-operator/type";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub annotations: BTreeMap<String, Vec<String>>,
}

/// How traffic not matched by any policy is handled in a namespace.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrafficAction {
    Allow,
    Reject,
    #[default]
    Inherit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceSpec {
    pub name: String,
    pub annotations: BTreeMap<String, Vec<String>>,
    pub default_incoming: TrafficAction,
    pub default_outgoing: TrafficAction,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// A policy backend rooted at a namespace path.
#[async_trait::async_trait]
pub trait PolicyBackend: Send + Sync {
    /// The namespace this client operates in, e.g. `/tenant/account`.
    fn namespace_path(&self) -> &str;

    async fn account_id(&self) -> Result<String, BackendError>;

    /// Lists the immediate child namespaces.
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, BackendError>;

    async fn has_namespace(&self, name: &str) -> Result<bool, BackendError>;

    async fn create_namespace(&self, spec: NamespaceSpec) -> Result<(), BackendError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), BackendError>;

    async fn import_config(&self, batch: ImportBatch) -> Result<(), BackendError>;

    /// Returns a client rooted at the child namespace `name`.
    fn scoped(&self, name: &str) -> Arc<dyn PolicyBackend>;
}

/// Everything the installer needs to deploy the agent into one cluster.
#[derive(Clone)]
pub struct AgentTarget<'a> {
    pub cluster: &'a str,
    /// The policy namespace the agent enforces.
    pub namespace_path: &'a str,
    /// The policy backend API the agent connects to.
    pub api: &'a str,
    /// The cluster's API server URL.
    pub endpoint: &'a str,
    pub kube: kube::Client,
    pub backend: Arc<dyn PolicyBackend>,
    pub cidrs: &'a [IpNet],
}

/// Installs or updates the enforcement agent in a cluster.
#[async_trait::async_trait]
pub trait AgentInstaller: Send + Sync {
    async fn install(&self, target: AgentTarget<'_>) -> Result<(), Error>;
}

// === impl Namespace ===

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// The first value of the namespace type annotation, if any.
    pub fn type_annotation(&self) -> Option<&str> {
        self.annotations
            .get(NAMESPACE_TYPE_ANNOTATION)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

// === impl NamespaceSpec ===

impl NamespaceSpec {
    /// A namespace annotated with `kind` that inherits its parent's traffic
    /// actions.
    pub fn annotated(name: impl Into<String>, kind: impl Into<String>) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(NAMESPACE_TYPE_ANNOTATION.to_string(), vec![kind.into()]);
        Self {
            name: name.into(),
            annotations,
            default_incoming: TrafficAction::Inherit,
            default_outgoing: TrafficAction::Inherit,
        }
    }
}

// === impl BackendError ===

impl BackendError {
    pub fn is_forbidden_or_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == 401 || *status == 403)
    }
}
