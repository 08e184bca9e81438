//! SDK Forge - Main Entry Point
//! HTTP API + job orchestrator over ephemeral workspaces

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use forge_api_http::{ApiServer, AppState};
use forge_core::application::orchestrator::constants::FATAL_EXIT_GRACE;
use forge_core::application::{in_job_task, JobOrchestrator, OrchestratorConfig, RecoveryService};
use forge_core::port::id_provider::UuidProvider;
use forge_core::port::time_provider::SystemTimeProvider;
use forge_infra_system::{
    FsProjectMaterializer, FsWorkspaceManager, SubprocessToolInvoker, TarGzPackager,
};

use crate::config::ForgeConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status after an unhandled fault (EX_SOFTWARE)
const FATAL_EXIT_CODE: i32 = 70;

#[derive(Parser)]
#[command(name = "sdk-forge")]
#[command(about = "Generate and validate SDKs from API specifications", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Skip the startup sweep of leftover workspaces
    #[arg(long)]
    no_sweep: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Logging (and optional OpenTelemetry)
    let _telemetry = telemetry::init()?;
    install_panic_hook();

    info!("SDK Forge v{} starting...", VERSION);

    // 2. Configuration
    let mut config = ForgeConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_sweep {
        config.workspace.sweep_on_startup = false;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        workspace_root = %config.workspace.root.display(),
        tool = %config.tool.program,
        cli_version = %config.tool.cli_version,
        verbose = config.tool.verbose,
        "Configuration loaded"
    );

    // 3. Adapters (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let workspaces = Arc::new(FsWorkspaceManager::with_prefix(
        config.workspace.root.clone(),
        config.workspace.prefix.clone(),
        time_provider.clone(),
    ));
    let materializer = Arc::new(FsProjectMaterializer::new(config.project_identity()));
    let invoker = Arc::new(SubprocessToolInvoker::new(
        config.tool_settings(),
        time_provider.clone(),
    ));
    let packager = Arc::new(TarGzPackager::new());

    // 4. Crash recovery: workspaces a previous process never released
    if config.workspace.sweep_on_startup {
        let recovery = RecoveryService::new(
            workspaces.clone(),
            time_provider.clone(),
            config.orphan_age(),
        );
        match recovery.sweep_orphaned_workspaces() {
            Ok(count) => info!(removed = count, "Workspace sweep completed"),
            Err(e) => error!(error = %e, "Workspace sweep failed"),
        }
    }

    // 5. Orchestrator
    let orchestrator = Arc::new(JobOrchestrator::new(
        workspaces,
        materializer,
        invoker,
        packager,
        Arc::new(UuidProvider),
        time_provider,
        OrchestratorConfig {
            verbose: config.tool.verbose,
        },
    ));

    // 6. HTTP API
    let state = AppState {
        orchestrator,
        workspace_root: config.workspace.root.clone(),
        tool_program: config.tool.program.clone(),
        api_key: config.server.api_key.as_deref().map(Arc::from),
    };
    if state.api_key.is_none() {
        warn!("No API key configured; job endpoints are unauthenticated");
    }

    ApiServer::new(config.server_config(), state)
        .serve(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutdown complete.");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Draining in-flight jobs...");
}

/// Job panics are contained by their task, including work handed off via
/// `spawn_job_blocking`/`spawn_job_task`; anything else ends the process once
/// the log line has had a chance to flush.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        if in_job_task() {
            error!(panic = %panic, "Job task panicked");
            return;
        }

        error!(panic = %panic, "Unhandled fault, terminating");
        default_hook(panic);
        std::thread::spawn(|| {
            std::thread::sleep(FATAL_EXIT_GRACE);
            std::process::exit(FATAL_EXIT_CODE);
        });
    }));
}
