use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// A named reconciliation operation. Each phase of a run is gated on one or
/// more operations being enabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    Dhcp,
    #[serde(rename = "NS_ROGUE_DELETE")]
    NamespaceRogueDelete,
    #[serde(rename = "NS_COMPUTE_CREATE")]
    NamespaceComputeCreate,
    #[serde(rename = "NS_COMPUTE_DELETE")]
    NamespaceComputeDelete,
    #[serde(rename = "NS_KUBE_CREATE")]
    NamespaceKubeCreate,
    #[serde(rename = "NS_KUBE_DELETE")]
    NamespaceKubeDelete,
    ComputeAuth,
    KubeAuth,
    KubeApiNet,
    KubeDnsNet,
    KubeNodesNet,
    KubeEnforcer,
}

/// The ordered set of enabled operations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ops(Vec<Op>);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

// === impl Op ===

impl Op {
    pub const ALL: [Op; 12] = [
        Op::Dhcp,
        Op::NamespaceRogueDelete,
        Op::NamespaceComputeCreate,
        Op::NamespaceComputeDelete,
        Op::NamespaceKubeCreate,
        Op::NamespaceKubeDelete,
        Op::ComputeAuth,
        Op::KubeAuth,
        Op::KubeApiNet,
        Op::KubeDnsNet,
        Op::KubeNodesNet,
        Op::KubeEnforcer,
    ];

    const NAMESPACE: [Op; 5] = [
        Op::NamespaceRogueDelete,
        Op::NamespaceComputeCreate,
        Op::NamespaceComputeDelete,
        Op::NamespaceKubeCreate,
        Op::NamespaceKubeDelete,
    ];

    const KUBERNETES: [Op; 5] = [
        Op::KubeAuth,
        Op::KubeApiNet,
        Op::KubeDnsNet,
        Op::KubeNodesNet,
        Op::KubeEnforcer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dhcp => "DHCP",
            Self::NamespaceRogueDelete => "NS_ROGUE_DELETE",
            Self::NamespaceComputeCreate => "NS_COMPUTE_CREATE",
            Self::NamespaceComputeDelete => "NS_COMPUTE_DELETE",
            Self::NamespaceKubeCreate => "NS_KUBE_CREATE",
            Self::NamespaceKubeDelete => "NS_KUBE_DELETE",
            Self::ComputeAuth => "COMPUTE_AUTH",
            Self::KubeAuth => "KUBE_AUTH",
            Self::KubeApiNet => "KUBE_API_NET",
            Self::KubeDnsNet => "KUBE_DNS_NET",
            Self::KubeNodesNet => "KUBE_NODES_NET",
            Self::KubeEnforcer => "KUBE_ENFORCER",
        }
    }
}

impl FromStr for Op {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::new("operation", s))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Ops ===

impl Ops {
    /// Adds an operation, ignoring duplicates so that the first occurrence
    /// determines the order.
    pub fn insert(&mut self, op: Op) {
        if !self.contains(op) {
            self.0.push(op);
        }
    }

    pub fn contains(&self, op: Op) -> bool {
        self.0.contains(&op)
    }

    pub fn contains_any(&self, ops: &[Op]) -> bool {
        ops.iter().any(|op| self.contains(*op))
    }

    pub fn iter(&self) -> impl Iterator<Item = Op> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any namespace create or delete operation is enabled.
    pub fn namespace_enabled(&self) -> bool {
        self.contains_any(&Op::NAMESPACE)
    }

    /// True if the authorization phase has anything to do.
    pub fn auth_enabled(&self) -> bool {
        self.contains_any(&[Op::ComputeAuth, Op::KubeAuth])
    }

    /// True if any per-cluster Kubernetes operation is enabled.
    pub fn kubernetes_enabled(&self) -> bool {
        self.contains_any(&Op::KUBERNETES)
    }
}

impl FromIterator<Op> for Ops {
    fn from_iter<T: IntoIterator<Item = Op>>(iter: T) -> Self {
        let mut ops = Self::default();
        for op in iter {
            ops.insert(op);
        }
        ops
    }
}

/// Parses a comma-separated list, e.g. `DHCP, NS_KUBE_CREATE,KUBE_AUTH`.
/// Empty entries are skipped.
impl FromStr for Ops {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Op::from_str)
            .collect()
    }
}

impl fmt::Display for Ops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops = self.iter();
        if let Some(op) = ops.next() {
            f.write_str(op.as_str())?;
        }
        for op in ops {
            write!(f, ",{}", op)?;
        }
        Ok(())
    }
}

// === impl ParseError ===

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
