use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alert_responder::{
    actions::ActionRegistry,
    config::Config,
    executor::{AnsibleExecutor, PlaybookRunner},
    metrics,
    processor::AlertProcessor,
    server::Server,
};

#[derive(Parser, Debug)]
#[command(name = "alert-responder", version, about = "Runs Ansible recovery playbooks for firing alerts")]
struct Cli {
    /// Address to listen on (overrides SERVER_ADDR)
    #[arg(long)]
    addr: Option<String>,

    /// Directory for webhook.log (overrides LOG_DIR)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Playbook time budget in seconds (overrides EXECUTION_TIMEOUT_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }
    if let Some(dir) = cli.log_dir {
        config.logging.dir = Some(dir);
    }
    if let Some(secs) = cli.timeout_secs {
        config.ansible.timeout_secs = secs;
    }

    // Initialize logging
    let _log_guard = init_tracing(config.logging.dir.as_deref())?;
    metrics::register_metrics();
    info!("Loaded configuration: {:?}", config);

    if !config.ansible.playbook_dir.is_dir() {
        warn!(
            "Playbook directory {} does not exist. Recovery runs will fail until it is mounted.",
            config.ansible.playbook_dir.display()
        );
    }

    let registry = Arc::new(ActionRegistry::builtin());
    info!("Registered recovery actions: {}", registry.action_ids().join(", "));

    let executor: Arc<dyn PlaybookRunner> = Arc::new(AnsibleExecutor::new(config.ansible.clone()));
    let processor = Arc::new(AlertProcessor::new(registry, executor));

    // Initialize server
    let server = Server::new(&config, processor);

    // Start server
    info!("Starting server on {}", config.server.addr);
    server.start().await?;

    Ok(())
}

/// Console output always; a daily `webhook.log` as well when a log directory
/// is configured.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(dir, "webhook.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
