//! The outcome of a reconciliation run.
//!
//! Each phase contributes a sub-report. [`Report::build`] computes totals over
//! all of them and [`Report::errors`] combines their unit errors.

use crate::{Error, Errors};
use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr, sync::Arc};

const NOTES: &str = "Reports will only be shown if operation is enabled";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OpStatus {
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "NOT_READY")]
    NotReady,
    #[serde(rename = "ALREADY_EXIST/NOTHING_TO_DO")]
    NothingToDo,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NamespaceOperation {
    Create,
    Delete,
}

/// The kind of cloud entity a namespace was created for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudEntityType {
    Compute,
    Kubernetes,
    /// Namespaces without a type annotation.
    Default,
    /// Namespaces whose type annotation could not be parsed.
    Invalid,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub cloud_provider: String,
    pub run_time: i64,
    pub notes: String,
    pub total_count: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceReports>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<DhcpReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesReports>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceReports {
    pub total_count: usize,
    pub error_count: usize,
    pub namespaces: Vec<NamespaceReport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NamespaceReport {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CloudEntityType,
    pub status: OpStatus,
    pub operation: NamespaceOperation,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Arc<Error>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DhcpReport {
    pub status: OpStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Arc<Error>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthReport {
    pub status: OpStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Arc<Error>>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesReports {
    pub total_count: usize,
    pub error_count: usize,
    pub reports: Vec<KubernetesReport>,
}

/// The outcome of reconciling one cluster.
#[derive(Clone, Debug, Serialize)]
pub struct KubernetesReport {
    pub name: String,
    pub status: OpStatus,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Arc<Error>>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid cloud entity type: {0:?}")]
pub struct InvalidEntityType(String);

fn serialize_error<S: Serializer>(error: &Option<Arc<Error>>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.collect_str(e),
        None => s.serialize_none(),
    }
}

/// Records `error` with its authorization hint, if any.
fn unit_error(error: Error) -> Option<Arc<Error>> {
    Some(Arc::new(error.with_authorization_hint()))
}

// === impl OpStatus ===

impl OpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::NotReady => "NOT_READY",
            Self::NothingToDo => "ALREADY_EXIST/NOTHING_TO_DO",
        }
    }
}

impl fmt::Display for OpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl NamespaceOperation ===

impl fmt::Display for NamespaceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("CREATE"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

// === impl CloudEntityType ===

impl CloudEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "COMPUTE",
            Self::Kubernetes => "KUBERNETES",
            Self::Default => "DEFAULT",
            Self::Invalid => "INVALID",
        }
    }
}

impl FromStr for CloudEntityType {
    type Err = InvalidEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Compute, Self::Kubernetes, Self::Default]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidEntityType(s.to_string()))
    }
}

impl fmt::Display for CloudEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Report ===

impl Report {
    pub fn new(cloud_provider: impl Into<String>) -> Self {
        Self {
            cloud_provider: cloud_provider.into(),
            run_time: chrono::Utc::now().timestamp(),
            notes: NOTES.to_string(),
            total_count: 0,
            error_count: 0,
            namespace: None,
            dhcp: None,
            auth: None,
            kubernetes: None,
        }
    }

    pub fn add_namespace_reports(&mut self, reports: impl IntoIterator<Item = NamespaceReport>) {
        self.namespace
            .get_or_insert_with(Default::default)
            .namespaces
            .extend(reports);
    }

    pub fn add_kubernetes_report(&mut self, report: KubernetesReport) {
        self.kubernetes
            .get_or_insert_with(Default::default)
            .reports
            .push(report);
    }

    /// Computes the totals of the report and its sub-reports. Building is
    /// idempotent.
    pub fn build(&mut self) -> &mut Self {
        self.total_count = 0;
        self.error_count = 0;

        if let Some(ns) = self.namespace.as_mut() {
            ns.total_count = ns.namespaces.len();
            ns.error_count = ns.namespaces.iter().filter(|r| r.error.is_some()).count();
            self.total_count += ns.total_count;
            self.error_count += ns.error_count;
        }

        if let Some(dhcp) = self.dhcp.as_ref() {
            self.total_count += 1;
            self.error_count += dhcp.error.is_some() as usize;
        }

        if let Some(auth) = self.auth.as_ref() {
            self.total_count += 1;
            self.error_count += auth.error.is_some() as usize;
        }

        if let Some(kube) = self.kubernetes.as_mut() {
            kube.total_count = kube.reports.len();
            kube.error_count = kube.reports.iter().filter(|r| r.error.is_some()).count();
            self.total_count += kube.total_count;
            self.error_count += kube.error_count;
        }

        self
    }

    /// Combines every unit error in namespace, DHCP, Auth, Kubernetes order.
    pub fn errors(&self) -> Option<Errors> {
        let namespace = self
            .namespace
            .iter()
            .flat_map(|ns| ns.namespaces.iter().map(|r| &r.error));
        let dhcp = self.dhcp.iter().map(|r| &r.error);
        let auth = self.auth.iter().map(|r| &r.error);
        let kube = self
            .kubernetes
            .iter()
            .flat_map(|k| k.reports.iter().map(|r| &r.error));

        Errors::from_errors(
            namespace
                .chain(dhcp)
                .chain(auth)
                .chain(kube)
                .flatten()
                .cloned(),
        )
    }
}

// === impl NamespaceReport ===

impl NamespaceReport {
    pub fn new(
        name: impl Into<String>,
        kind: CloudEntityType,
        operation: NamespaceOperation,
        status: OpStatus,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            status,
            operation,
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        kind: CloudEntityType,
        operation: NamespaceOperation,
        error: Error,
    ) -> Self {
        Self {
            error: unit_error(error),
            ..Self::new(name, kind, operation, OpStatus::Failed)
        }
    }
}

// === impl DhcpReport ===

impl DhcpReport {
    pub fn completed() -> Self {
        Self {
            status: OpStatus::Completed,
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            status: OpStatus::Failed,
            error: unit_error(error),
        }
    }
}

// === impl AuthReport ===

impl AuthReport {
    pub fn completed() -> Self {
        Self {
            status: OpStatus::Completed,
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            status: OpStatus::Failed,
            error: unit_error(error),
        }
    }
}

// === impl KubernetesReport ===

impl KubernetesReport {
    pub fn new(name: impl Into<String>, status: OpStatus) -> Self {
        Self {
            name: name.into(),
            status,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: Error) -> Self {
        Self {
            error: unit_error(error),
            ..Self::new(name, OpStatus::Failed)
        }
    }
}
