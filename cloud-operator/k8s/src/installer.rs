use crate::FIELD_MANAGER;
use cloud_operator_core::{AgentInstaller, AgentTarget, Error, IpNet};
use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, DaemonSetSpec},
        core::v1::{
            Capabilities, ConfigMap, ConfigMapEnvSource, Container, EnvFromSource, Namespace,
            PodSpec, PodTemplateSpec, SecurityContext,
        },
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use kube::{
    api::{Api, Patch, PatchParams},
    Resource,
};
use std::{collections::BTreeMap, time::Duration};
use tokio::time;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const APP_LABEL: &str = "app.kubernetes.io/name";
const NAME: &str = "enforcer";
const CONFIG_NAME: &str = "enforcer-config";

/// Installs the enforcement agent as a `DaemonSet`, along with its namespace
/// and a `ConfigMap` describing the policy namespace it enforces.
///
/// Every object is server-side applied so repeated installs converge.
#[derive(Clone, Debug)]
pub struct DaemonSetInstaller {
    namespace: String,
    image: String,
}

impl DaemonSetInstaller {
    pub fn new(namespace: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            image: image.into(),
        }
    }

    fn labels() -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL.to_string(), NAME.to_string())])
    }

    fn namespace(&self) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(Self::labels()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn config_map(
        &self,
        cluster: &str,
        namespace_path: &str,
        api: &str,
        endpoint: &str,
        cidrs: &[IpNet],
    ) -> ConfigMap {
        let cidrs = cidrs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let data = [
            ("CLOUD_OPERATOR_CLUSTER", cluster.to_string()),
            ("CLOUD_OPERATOR_NAMESPACE", namespace_path.to_string()),
            ("CLOUD_OPERATOR_API", api.to_string()),
            ("CLOUD_OPERATOR_CLUSTER_ENDPOINT", endpoint.to_string()),
            ("CLOUD_OPERATOR_CIDRS", cidrs),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIG_NAME.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(Self::labels()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    fn daemon_set(&self) -> DaemonSet {
        let container = Container {
            name: NAME.to_string(),
            image: Some(self.image.clone()),
            env_from: Some(vec![EnvFromSource {
                config_map_ref: Some(ConfigMapEnvSource {
                    name: CONFIG_NAME.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            security_context: Some(SecurityContext {
                capabilities: Some(Capabilities {
                    add: Some(vec!["NET_ADMIN".to_string(), "NET_RAW".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        DaemonSet {
            metadata: ObjectMeta {
                name: Some(NAME.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(Self::labels()),
                ..Default::default()
            },
            spec: Some(DaemonSetSpec {
                selector: LabelSelector {
                    match_labels: Some(Self::labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(Self::labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        host_network: Some(true),
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl AgentInstaller for DaemonSetInstaller {
    async fn install(&self, target: AgentTarget<'_>) -> Result<(), Error> {
        let client = target.kube.clone();
        apply(Api::<Namespace>::all(client.clone()), self.namespace()).await?;
        apply(
            Api::<ConfigMap>::namespaced(client.clone(), &self.namespace),
            self.config_map(
                target.cluster,
                target.namespace_path,
                target.api,
                target.endpoint,
                target.cidrs,
            ),
        )
        .await?;
        apply(
            Api::<DaemonSet>::namespaced(client, &self.namespace),
            self.daemon_set(),
        )
        .await?;

        tracing::info!(cluster = %target.cluster, namespace = %self.namespace, "Installed enforcer");
        Ok(())
    }
}

async fn apply<K>(api: Api<K>, obj: K) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
    K: serde::Serialize,
{
    let name = obj.meta().name.clone().unwrap_or_default();
    let kind = K::kind(&());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    time::timeout(WRITE_TIMEOUT, api.patch(&name, &params, &Patch::Apply(&obj)))
        .await
        .map_err(|_| Error::Timeout(format!("applying {} {}", kind, name)))??;
    tracing::debug!(%kind, %name, "Applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn installer() -> DaemonSetInstaller {
        DaemonSetInstaller::new("cloud-operator", "example.com/enforcer:v1")
    }

    #[test]
    fn config_map_describes_target() {
        let cm = installer().config_map(
            "c1",
            "/acme/1234/c1",
            "https://api.example.com",
            "https://c1.example.com",
            &["10.0.0.0/24".parse().unwrap(), "10.0.1.0/24".parse().unwrap()],
        );
        assert_eq!(cm.metadata.namespace.as_deref(), Some("cloud-operator"));
        assert_eq!(
            cm.data.unwrap(),
            btreemap! {
                "CLOUD_OPERATOR_CLUSTER".to_string() => "c1".to_string(),
                "CLOUD_OPERATOR_NAMESPACE".to_string() => "/acme/1234/c1".to_string(),
                "CLOUD_OPERATOR_API".to_string() => "https://api.example.com".to_string(),
                "CLOUD_OPERATOR_CLUSTER_ENDPOINT".to_string() => "https://c1.example.com".to_string(),
                "CLOUD_OPERATOR_CIDRS".to_string() => "10.0.0.0/24,10.0.1.0/24".to_string(),
            }
        );
    }

    #[test]
    fn daemon_set_selects_its_pods() {
        let ds = installer().daemon_set();
        let spec = ds.spec.unwrap();
        assert_eq!(
            spec.selector.match_labels,
            Some(btreemap! {
                "app.kubernetes.io/name".to_string() => NAME.to_string(),
            })
        );
        assert_eq!(
            spec.selector.match_labels,
            spec.template.metadata.unwrap().labels
        );

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.host_network, Some(true));
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("example.com/enforcer:v1")
        );
        let env = pod.containers[0].env_from.as_ref().unwrap();
        assert_eq!(env[0].config_map_ref.as_ref().unwrap().name, CONFIG_NAME);
    }

    #[test]
    fn manifests_carry_type_metadata() {
        let ns = serde_json::to_value(installer().namespace()).unwrap();
        assert_eq!(ns["apiVersion"], "v1");
        assert_eq!(ns["kind"], "Namespace");

        let ds = serde_json::to_value(installer().daemon_set()).unwrap();
        assert_eq!(ds["apiVersion"], "apps/v1");
        assert_eq!(ds["kind"], "DaemonSet");
    }
}
