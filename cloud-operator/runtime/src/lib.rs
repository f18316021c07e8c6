//! The cloud operator's command-line entry point.
//!
//! A run initializes logging, validates its configuration, discovers the
//! inventory from a JSON snapshot, reconciles it once and prints the JSON
//! report. The process fails when any unit of work failed.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;

pub use self::args::Args;

use cloud_operator_inventory::{Cluster, ClusterCredentials, DiscoveryError};

/// Presents the same configured bearer token to every cluster.
#[derive(Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait::async_trait]
impl ClusterCredentials for StaticToken {
    async fn token(&self, cluster: &Cluster) -> Result<String, DiscoveryError> {
        self.0.clone().ok_or_else(|| {
            DiscoveryError::new(
                "token",
                format!("no token configured for cluster {}", cluster.name),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_redacted() {
        let token = StaticToken::new(Some("secret".to_string()));
        assert_eq!(format!("{token:?}"), "StaticToken(Some(\"<redacted>\"))");
    }
}
