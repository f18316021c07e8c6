use cloud_operator_core::{
    backend::{Namespace, NamespaceSpec},
    report::{CloudEntityType, NamespaceOperation, NamespaceReport},
    Error, Op, OpStatus, Ops, PolicyBackend,
};
use std::sync::Arc;

/// Creates namespaces for in-use compute roles and clusters, and deletes the
/// namespaces nothing uses anymore.
pub struct NamespaceReconciler {
    backend: Arc<dyn PolicyBackend>,
}

impl NamespaceReconciler {
    pub fn new(backend: Arc<dyn PolicyBackend>) -> Self {
        Self { backend }
    }

    /// Deletes unused namespaces, then creates the in-use ones. Every attempted
    /// action yields one report.
    pub async fn process(&self, compute: &[String], kube: &[String], ops: &Ops) -> Vec<NamespaceReport> {
        let mut reports = Vec::new();

        let delete_rogue = ops.contains(Op::NamespaceRogueDelete);
        let delete_compute = ops.contains(Op::NamespaceComputeDelete);
        let delete_kube = ops.contains(Op::NamespaceKubeDelete);
        if delete_rogue || delete_compute || delete_kube {
            let in_use = |name: &str| compute.iter().chain(kube).any(|n| n == name);

            match self.backend.list_namespaces().await {
                Ok(namespaces) => {
                    for ns in namespaces {
                        let kind = match namespace_type(&ns) {
                            Ok(kind) => kind,
                            Err(error) => {
                                tracing::warn!(namespace = %ns.name, %error, "Skipping namespace");
                                reports.push(NamespaceReport::failed(
                                    ns.name,
                                    CloudEntityType::Invalid,
                                    NamespaceOperation::Delete,
                                    error,
                                ));
                                continue;
                            }
                        };

                        if in_use(&ns.name) {
                            tracing::debug!(namespace = %ns.name, %kind, "Namespace is in use");
                            continue;
                        }

                        let enabled = match kind {
                            CloudEntityType::Compute => delete_compute,
                            CloudEntityType::Kubernetes => delete_kube,
                            CloudEntityType::Default => delete_rogue,
                            CloudEntityType::Invalid => false,
                        };
                        if enabled {
                            reports.push(self.delete(ns.name, kind).await);
                        } else {
                            tracing::debug!(namespace = %ns.name, %kind, "Namespace is unused");
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(namespace = %self.backend.namespace_path(), %error, "Failed to list namespaces");
                    reports.push(NamespaceReport::failed(
                        self.backend.namespace_path(),
                        CloudEntityType::Default,
                        NamespaceOperation::Delete,
                        error.into(),
                    ));
                }
            }
        }

        if ops.contains(Op::NamespaceComputeCreate) {
            for name in compute {
                reports.push(self.create(name, CloudEntityType::Compute).await);
            }
        }

        if ops.contains(Op::NamespaceKubeCreate) {
            for name in kube {
                reports.push(self.create(name, CloudEntityType::Kubernetes).await);
            }
        }

        reports
    }

    async fn create(&self, name: &str, kind: CloudEntityType) -> NamespaceReport {
        let op = NamespaceOperation::Create;
        match self.backend.has_namespace(name).await {
            Ok(true) => {
                tracing::debug!(namespace = %name, "Namespace already exists");
                return NamespaceReport::new(name, kind, op, OpStatus::NothingToDo);
            }
            Ok(false) => {}
            Err(error) => return NamespaceReport::failed(name, kind, op, error.into()),
        }

        let spec = NamespaceSpec::annotated(name, kind.as_str());
        match self.backend.create_namespace(spec).await {
            Ok(()) => {
                tracing::info!(namespace = %name, %kind, "Created namespace");
                NamespaceReport::new(name, kind, op, OpStatus::Completed)
            }
            Err(error) => NamespaceReport::failed(name, kind, op, error.into()),
        }
    }

    async fn delete(&self, name: String, kind: CloudEntityType) -> NamespaceReport {
        let op = NamespaceOperation::Delete;
        match self.backend.delete_namespace(&name).await {
            Ok(()) => {
                tracing::info!(namespace = %name, %kind, "Deleted namespace");
                NamespaceReport::new(name, kind, op, OpStatus::Completed)
            }
            Err(error) => NamespaceReport::failed(name, kind, op, error.into()),
        }
    }
}

fn namespace_type(ns: &Namespace) -> Result<CloudEntityType, Error> {
    match ns.type_annotation() {
        None => Ok(CloudEntityType::Default),
        Some(value) => value.parse().map_err(|_| Error::InvalidAnnotation {
            namespace: ns.name.clone(),
            value: value.to_string(),
        }),
    }
}
