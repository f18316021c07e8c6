//! Per-provider constants.

use crate::ops::ParseError;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr},
    str::FromStr,
};

/// The cloud provider whose inventory is being reconciled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
}

/// How instances in the account obtain their addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DhcpMode {
    /// Each subnet's first host address serves DHCP. Instances are selected
    /// by their subnet tag.
    PerSubnet { subnet_tag_key: &'static str },

    /// A single well-known metadata server serves every instance.
    Metadata { address: IpAddr },
}

// === impl Provider ===

impl Provider {
    /// The human-readable label reported as the run's cloud provider.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Aws => "Amazon Web Services",
            Self::Gcp => "Google Cloud Platform",
        }
    }

    /// The identity realm claim of workloads authenticating from this
    /// provider.
    pub fn realm(&self) -> &'static str {
        match self {
            Self::Aws => "@auth:realm=awssecuritytoken",
            Self::Gcp => "@auth:realm=gcpidentitytoken",
        }
    }

    pub fn account_claim(&self) -> &'static str {
        match self {
            Self::Aws => "@auth:organization",
            Self::Gcp => "@auth:projectnumber",
        }
    }

    pub fn role_claim(&self) -> &'static str {
        match self {
            Self::Aws => "@auth:rolename",
            Self::Gcp => "@auth:email",
        }
    }

    /// The instance tag (or label) naming the cluster an instance belongs to.
    pub fn cluster_link_key(&self) -> &'static str {
        match self {
            Self::Aws => "eks:cluster-name",
            Self::Gcp => "goog-gke-node",
        }
    }

    pub fn dhcp(&self) -> DhcpMode {
        match self {
            Self::Aws => DhcpMode::PerSubnet {
                subnet_tag_key: "cloud:aws:subnet-id",
            },
            Self::Gcp => DhcpMode::Metadata {
                address: IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)),
            },
        }
    }

    /// The authorization subject for workloads assuming `role` in `account`.
    pub fn subject(&self, account: &str, role: &str) -> Vec<String> {
        vec![
            self.realm().to_string(),
            format!("{}={}", self.account_claim(), account),
            format!("{}={}", self.role_claim(), role),
        ]
    }
}

impl FromStr for Provider {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            _ => Err(ParseError::new("provider", s)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => f.write_str("aws"),
            Self::Gcp => f.write_str("gcp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject() {
        assert_eq!(
            Provider::Aws.subject("1234", "R1"),
            vec![
                "@auth:realm=awssecuritytoken",
                "@auth:organization=1234",
                "@auth:rolename=R1",
            ]
        );
        assert_eq!(
            Provider::Gcp.subject("42", "sa@p.iam.gserviceaccount.com"),
            vec![
                "@auth:realm=gcpidentitytoken",
                "@auth:projectnumber=42",
                "@auth:email=sa@p.iam.gserviceaccount.com",
            ]
        );
    }

    #[test]
    fn parse() {
        assert_eq!("AWS".parse::<Provider>().unwrap(), Provider::Aws);
        assert_eq!("gcp".parse::<Provider>().unwrap(), Provider::Gcp);
        assert!("azure".parse::<Provider>().is_err());
    }
}
