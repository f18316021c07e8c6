use cloud_operator_core::Error;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::Api,
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use std::net::IpAddr;

/// Builds a client for a cluster's API server from its endpoint, its
/// certificate authority (base64-encoded PEM) and a bearer token.
///
/// No request is issued; connection problems surface on first use.
pub async fn cluster_client(
    name: &str,
    server: &str,
    ca_data: Option<&str>,
    token: &str,
) -> Result<Client, Error> {
    let kubeconfig = kubeconfig(name, server, ca_data, token)?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::ClientConfig(e.to_string()))?;
    let client = Client::try_from(config)?;
    tracing::debug!(cluster = %name, %server, "Built cluster client");
    Ok(client)
}

fn kubeconfig(
    name: &str,
    server: &str,
    ca_data: Option<&str>,
    token: &str,
) -> Result<Kubeconfig, Error> {
    let mut cluster = serde_json::json!({ "server": server });
    if let Some(ca) = ca_data {
        cluster["certificate-authority-data"] = ca.into();
    }

    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": name, "cluster": cluster }],
        "users": [{ "name": name, "user": { "token": token } }],
        "contexts": [{ "name": name, "context": { "cluster": name, "user": name } }],
        "current-context": name,
    }))
    .map_err(|e| Error::ClientConfig(e.to_string()))
}

/// Looks up the cluster IP of the `kube-system/kube-dns` service.
pub async fn kube_dns_address(client: Client) -> Result<Option<IpAddr>, Error> {
    let svc = Api::<Service>::namespaced(client, "kube-system")
        .get("kube-dns")
        .await?;
    let ip = svc
        .spec
        .and_then(|spec| spec.cluster_ip)
        .filter(|ip| ip != "None")
        .and_then(|ip| match ip.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(error) => {
                tracing::warn!(%ip, %error, "Invalid kube-dns cluster IP");
                None
            }
        });
    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_kubeconfig() {
        let kc = kubeconfig("c1", "https://c1.example.com", Some("Y2E="), "t0k3n").unwrap();
        assert_eq!(kc.current_context.as_deref(), Some("c1"));

        let cluster = kc.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://c1.example.com"));
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Y2E="));

        assert_eq!(kc.contexts[0].name, "c1");
        assert!(kc.auth_infos[0].auth_info.as_ref().unwrap().token.is_some());
    }

    #[test]
    fn builds_kubeconfig_without_ca() {
        let kc = kubeconfig("c1", "https://c1.example.com", None, "t0k3n").unwrap();
        let cluster = kc.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.certificate_authority_data, None);
    }
}
