use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use etcd_snapshot::backup;
use etcd_snapshot::config::Config;
use etcd_snapshot::discovery::{self, probe};
use etcd_snapshot::keyspace::{self, WalkerOptions};
use etcd_snapshot::types::{KubernetesDistro, DEFAULT_WORK_DIR};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Snapshots of the etcd keyspace behind Kubernetes and OpenShift
#[derive(Parser, Debug)]
#[command(name = "etcd-snapshot", version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Back up all Kubernetes related keys of an etcd endpoint
    Backup {
        /// URL of the etcd to back up
        #[arg(short, long, default_value = "http://127.0.0.1:2379")]
        endpoint: String,
        /// Directory the archive is written to
        #[arg(short = 'w', long, default_value = DEFAULT_WORK_DIR)]
        work_dir: PathBuf,
        /// Object storage host:port; the archive stays local when omitted
        #[arg(short = 'r', long)]
        remote: Option<String>,
        /// Bucket the archive is uploaded to
        #[arg(short, long, default_value = "etcd-snapshots")]
        bucket: String,
        /// Keep the materialized tree next to the archive
        #[arg(long)]
        keep_staging: bool,
    },
    /// Count Kubernetes related keys of an etcd endpoint
    Stats {
        /// URL of the etcd to collect stats from
        #[arg(short, long, default_value = "http://127.0.0.1:2379")]
        endpoint: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("etcd_snapshot=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration in environment")?;

    match cli.cmd {
        Cmd::Backup {
            endpoint,
            work_dir,
            remote,
            bucket,
            keep_staging,
        } => {
            let config = config.with_retain_staging(keep_staging);
            let target = remote
                .map(|remote| config.object_store_target(remote, bucket))
                .transpose()?;

            let backup_id = backup::backup(&endpoint, &work_dir, target, &config)
                .await
                .with_context(|| format!("backup of {} failed", endpoint))?;
            info!(backup_id = %backup_id, "Backup done");
            println!("{}", backup_id);
        }
        Cmd::Stats { endpoint } => {
            println!("Collecting stats from etcd endpoint {}", endpoint);
            let endpoint = probe(&endpoint, config.etcd_tls.as_ref(), config.request_timeout).await?;
            let walker = keyspace::connect(&endpoint, &WalkerOptions::from_config(&config)).await?;

            let vanilla = discovery::count(walker.as_ref(), KubernetesDistro::Vanilla)
                .await
                .context("failed to count Kubernetes keys")?;
            println!(
                "{} [keys:{}, size:{}]",
                KubernetesDistro::Vanilla,
                vanilla.key_count,
                vanilla.total_bytes
            );

            let openshift = discovery::count(walker.as_ref(), KubernetesDistro::OpenShift).await?;
            if !openshift.is_empty() {
                println!(
                    "{} [keys:{}, size:{}]",
                    KubernetesDistro::OpenShift,
                    openshift.key_count,
                    openshift.total_bytes
                );
            }
        }
    }

    Ok(())
}
