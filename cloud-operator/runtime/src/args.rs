use crate::StaticToken;
use anyhow::{Context, Result};
use clap::Parser;
use cloud_operator_core::{AgentInstaller, Filter, OperatorConfig, Ops, Provider, Settings};
use cloud_operator_inventory::Snapshot;
use cloud_operator_k8s::DaemonSetInstaller;
use cloud_operator_reconcile::{MemoryBackend, Operator, PlanInstaller};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

const FILTER_EXAMPLES: &str = "\
Cluster filters (required with any KUBE_* operation):
  --kube-match-any
  --kube-match-names cluster-1,cluster-2
  --kube-match-tags environment:production,cloud-operator:enabled";

#[derive(Debug, Parser)]
#[clap(
    name = "cloud-operator",
    version,
    about = "Reconciles a policy backend against a cloud account",
    after_help = FILTER_EXAMPLES
)]
pub struct Args {
    #[clap(
        long,
        default_value = "cloud_operator=info,warn",
        env = "CLOUD_OPERATOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "CLOUD_OPERATOR_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    /// Cloud provider (aws or gcp)
    #[clap(long, env = "CLOUD_OPERATOR_PROVIDER")]
    provider: Option<Provider>,

    /// Policy backend API URL
    #[clap(long, env = "CLOUD_OPERATOR_API")]
    api: Option<String>,

    #[clap(long, env = "CLOUD_OPERATOR_TENANT")]
    tenant: Option<String>,

    #[clap(long, env = "CLOUD_OPERATOR_CLOUD_ACCOUNT")]
    cloud_account: Option<String>,

    /// Comma-separated operations to run, e.g. DHCP,NS_COMPUTE_CREATE,KUBE_AUTH
    #[clap(long, env = "CLOUD_OPERATOR_OPS")]
    ops: Option<Ops>,

    /// Comma-separated `key:value` cluster tags to match
    #[clap(long, env = "CLOUD_OPERATOR_KUBE_MATCH_TAGS")]
    kube_match_tags: Option<MatchTags>,

    /// Comma-separated cluster names to match
    #[clap(long, env = "CLOUD_OPERATOR_KUBE_MATCH_NAMES", value_delimiter = ',')]
    kube_match_names: Vec<String>,

    /// Matches every cluster
    #[clap(long, env = "CLOUD_OPERATOR_KUBE_MATCH_ANY")]
    kube_match_any: bool,

    /// Leaves generated policy objects unprotected
    #[clap(long, env = "CLOUD_OPERATOR_DISABLE_PROTECT_CONFIG")]
    disable_protect_config: bool,

    /// A JSON inventory snapshot of the cloud account
    #[clap(long, env = "CLOUD_OPERATOR_INVENTORY")]
    inventory: PathBuf,

    /// Bearer token presented to cluster API servers
    #[clap(long, env = "CLOUD_OPERATOR_CLUSTER_TOKEN", hide_env_values = true)]
    cluster_token: Option<String>,

    /// Logs enforcer installations instead of applying them
    #[clap(long)]
    dry_run: bool,

    #[clap(long, default_value = "cloud-operator")]
    enforcer_namespace: String,

    #[clap(long, default_value = "ghcr.io/cloud-operator/enforcer:latest")]
    enforcer_image: String,

    /// Prints the discovered inventory to stderr before reconciling
    #[clap(long)]
    describe_inventory: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct MatchTags(BTreeMap<String, String>);

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings();
        let Self {
            log_level,
            log_format,
            inventory,
            cluster_token,
            dry_run,
            enforcer_namespace,
            enforcer_image,
            describe_inventory,
            ..
        } = self;

        log_format
            .try_init(log_level)
            .map_err(|error| anyhow::anyhow!("failed to initialize logging: {error}"))?;

        let config = OperatorConfig::from_settings(settings)?;
        info!(
            provider = %config.provider,
            namespace = %config.namespace(),
            ops = %config.ops,
            dry_run,
            "Starting",
        );

        let snapshot = load_snapshot(&inventory)
            .await?
            .with_provider_defaults(config.provider);
        let backend = MemoryBackend::new(config.namespace(), config.cloud_account.clone());
        let installer: Arc<dyn AgentInstaller> = if dry_run {
            Arc::new(PlanInstaller::default())
        } else {
            Arc::new(DaemonSetInstaller::new(enforcer_namespace, enforcer_image))
        };

        let operator = Operator::new(
            config,
            &snapshot,
            Arc::new(backend),
            Arc::new(StaticToken::new(cluster_token)),
            installer,
        )
        .await?;
        if describe_inventory {
            eprint!("{}", operator.inventory().describe());
        }

        let report = operator.run(None).await;
        println!("{}", serde_json::to_string_pretty(&report)?);

        info!(
            total = report.total_count,
            errors = report.error_count,
            "Finished"
        );
        match report.errors() {
            Some(errors) => Err(errors.into()),
            None => Ok(()),
        }
    }

    fn settings(&self) -> Settings {
        let mut filter = Filter::default();
        if let Some(MatchTags(tags)) = self.kube_match_tags.clone() {
            filter.kube_match_tags = tags;
        }
        filter.kube_match_names = self
            .kube_match_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect();
        filter.kube_match_any = self.kube_match_any;

        Settings {
            provider: self.provider,
            api: self.api.clone(),
            tenant: self.tenant.clone(),
            cloud_account: self.cloud_account.clone(),
            ops: self.ops.clone().unwrap_or_default(),
            filter,
            disable_protect_config: self.disable_protect_config,
        }
    }
}

async fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse inventory {}", path.display()))
}

impl std::str::FromStr for MatchTags {
    type Err = cloud_operator_core::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse_tags(s).map(Self)
    }
}
