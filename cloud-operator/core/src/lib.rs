//! Shared types for the cloud operator.
//!
//! The operator discovers a cloud account's networks, instances, managed
//! Kubernetes clusters and identity roles, and reconciles a policy backend
//! against that inventory. This crate holds the vocabulary every other crate
//! speaks:
//!
//! - [`Op`]/[`Ops`] select which reconciliation phases run.
//! - [`Filter`]/[`TagMatcher`] decide which clusters are in scope.
//! - [`Report`] and its sub-reports record the outcome of every unit of work.
//! - [`PolicyBackend`] and [`AgentInstaller`] are the external collaborators
//!   the reconcilers drive.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
mod error;
pub mod filter;
pub mod ops;
pub mod policy;
pub mod provider;
pub mod report;

pub use self::{
    backend::{AgentInstaller, AgentTarget, BackendError, PolicyBackend},
    config::{ConfigError, OperatorConfig, Settings},
    error::{Error, Errors},
    filter::{Filter, TagMatcher},
    ops::{Op, Ops, ParseError},
    provider::{DhcpMode, Provider},
    report::{
        AuthReport, CloudEntityType, DhcpReport, KubernetesReport, NamespaceOperation,
        NamespaceReport, OpStatus, Report,
    },
};
pub use ipnet::{AddrParseError, IpNet, Ipv4Net, Ipv6Net};

use std::collections::BTreeMap;

/// Key/value tags (AWS tags, GCP labels) attached to a cloud resource.
pub type Tags = BTreeMap<String, String>;

/// The description attached to every generated policy object.
pub const GENERATED_DESCRIPTION: &str = "auto-generated by cloud operator";
