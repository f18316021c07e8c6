//! Kubernetes plumbing: per-cluster API clients and the enforcement agent
//! installer.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod installer;

pub use self::{
    client::{cluster_client, kube_dns_address},
    installer::DaemonSetInstaller,
};
pub use k8s_openapi::{
    api::{
        apps::v1::DaemonSet,
        core::v1::{ConfigMap, Namespace},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
pub use kube::Client;

/// The field manager used for server-side apply.
pub const FIELD_MANAGER: &str = "cloud-operator";
