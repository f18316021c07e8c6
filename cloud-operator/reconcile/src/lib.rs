//! Reconciles a policy backend against a cloud inventory.
//!
//! A run executes the enabled phases in a fixed order:
//!
//! 1. DHCP egress policies ([`DhcpPolicyBuilder`]).
//! 2. Namespace creation and cleanup ([`NamespaceReconciler`]).
//! 3. API authorization policies ([`AuthPolicyBuilder`]).
//! 4. Per-cluster network policies and agent installation
//!    ([`ClusterReconciler`]), one task per cluster.
//!
//! Every unit of work records its outcome in the run's [`Report`]; a failure
//! in one unit never stops the others.
//!
//! [`Report`]: cloud_operator_core::Report

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod auth;
mod cluster;
mod collector;
mod dhcp;
pub mod memory;
mod namespace;
mod operator;
mod scope;


pub use self::{
    auth::{AuthPolicyBuilder, AUTH_LABEL},
    cluster::{ClusterReconciler, KUBE_LABEL},
    collector::ReportCollector,
    dhcp::{DhcpPolicyBuilder, DHCP_LABEL},
    memory::{MemoryBackend, PlanInstaller},
    namespace::NamespaceReconciler,
    operator::{Error, Operator},
    scope::PolicyScope,
};
