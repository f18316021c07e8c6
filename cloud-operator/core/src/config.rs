//! Validated operator configuration.

use crate::{Filter, Ops, Provider};

/// Raw, possibly incomplete settings as collected from flags and the
/// environment.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub provider: Option<Provider>,
    pub api: Option<String>,
    pub tenant: Option<String>,
    pub cloud_account: Option<String>,
    pub ops: Ops,
    pub filter: Filter,
    pub disable_protect_config: bool,
}

/// The immutable configuration of an operator run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub provider: Provider,
    pub api: String,
    pub tenant: String,
    pub cloud_account: String,
    pub ops: Ops,
    pub filter: Filter,
    /// Whether generated objects are protected from modification.
    pub protect_config: bool,
}

/// Every problem found while validating [`Settings`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigError(Vec<String>);

// === impl OperatorConfig ===

impl OperatorConfig {
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let Settings {
            provider,
            api,
            tenant,
            cloud_account,
            ops,
            filter,
            disable_protect_config,
        } = settings;

        let mut errors = Vec::new();
        let mut require = |name: &str, value: Option<String>| match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                errors.push(format!("{} is required", name));
                None
            }
        };
        let api = require("api", api);
        let tenant = require("tenant", tenant);
        let cloud_account = require("cloud account", cloud_account);

        if provider.is_none() {
            errors.push("provider is required".to_string());
        }
        if ops.is_empty() {
            errors.push("at least one operation must be enabled".to_string());
        }
        if ops.kubernetes_enabled() && filter.is_empty() {
            errors.push(
                "a cluster filter is required when kubernetes operations are enabled".to_string(),
            );
        }
        for name in [&tenant, &cloud_account].into_iter().flatten() {
            if name.contains('/') {
                errors.push(format!("{:?} must not contain '/'", name));
            }
        }

        match (provider, api, tenant, cloud_account) {
            (Some(provider), Some(api), Some(tenant), Some(cloud_account))
                if errors.is_empty() =>
            {
                Ok(Self {
                    provider,
                    api,
                    tenant,
                    cloud_account,
                    ops,
                    filter,
                    protect_config: !disable_protect_config,
                })
            }
            _ => Err(ConfigError(errors)),
        }
    }

    /// The policy namespace owned by the operator, `/<tenant>/<account>`.
    pub fn namespace(&self) -> String {
        format!("/{}/{}", self.tenant, self.cloud_account)
    }
}

// === impl ConfigError ===

impl ConfigError {
    pub fn errors(&self) -> &[String] {
        &self.0
    }
}
