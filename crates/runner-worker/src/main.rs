// Entry point for the cheeky-runner binary.
//
//   cheeky-runner run --job job.yaml [--job other.yaml ...]
//   cheeky-runner configure --token <token> [--orchestrator-host <url>]
//   cheeky-runner capabilities
//
// The first Ctrl-C stops the runner from taking new jobs; a second one
// cancels the job in flight.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use runner_common::constants::return_code;
use runner_common::{ConfigurationStore, HostContext, ShutdownReason};
use runner_sdk::RunnerPackage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runner_worker::container::{DockerEngine, DockerExecutor};
use runner_worker::executor::Executor;
use runner_worker::job_runner::JobRunner;
use runner_worker::job_source::FileJobSource;
use runner_worker::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "cheeky-runner", version, about = "Container-backed CI job runner")]
struct Args {
    /// Directory holding the runner settings (defaults to $RUNNER_CONFIG_DIR).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run job files to completion, in order.
    Run {
        /// Job document (YAML or JSON). May be repeated.
        #[arg(long = "job", required = true)]
        jobs: Vec<PathBuf>,
    },
    /// Store the registration token and orchestrator host.
    Configure {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        orchestrator_host: Option<String>,
    },
    /// Print this runner's capabilities as JSON.
    Capabilities,
}

fn main() {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build Tokio runtime: {e}");
            std::process::exit(return_code::TERMINATED_ERROR);
        }
    };

    let exit_code = runtime.block_on(async move { run(args).await });

    std::process::exit(exit_code);
}

async fn run(args: Args) -> i32 {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    tracing::info!(
        "cheeky-runner {} ({})",
        RunnerPackage::VERSION,
        RunnerPackage::COMMIT_HASH
    );

    let config_dir = args
        .config_dir
        .unwrap_or_else(ConfigurationStore::default_config_dir);
    let host_context = HostContext::new(config_dir);

    let result = match args.command {
        Command::Run { jobs } => run_jobs(&host_context, jobs).await,
        Command::Configure {
            token,
            orchestrator_host,
        } => configure(&host_context, token, orchestrator_host),
        Command::Capabilities => print_capabilities(&host_context),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            return_code::TERMINATED_ERROR
        }
    }
}

fn connect_executor(host_context: &HostContext) -> Result<DockerExecutor<DockerEngine>> {
    let settings = host_context.config_store().load_effective_settings()?;
    let engine = DockerEngine::connect(settings.docker_host.as_deref())
        .context("Failed to connect to the Docker daemon")?;
    Ok(DockerExecutor::new(engine)
        .with_stop_timeout(Duration::from_secs(settings.container_stop_timeout_secs))
        .with_trace(host_context.get_trace("DockerExecutor")))
}

async fn run_jobs(host_context: &Arc<HostContext>, jobs: Vec<PathBuf>) -> Result<i32> {
    let executor = connect_executor(host_context)?;
    executor
        .engine()
        .ping()
        .await
        .context("Docker daemon is not reachable")?;

    install_signal_handler(host_context)?;

    let runner = JobRunner::new(Arc::new(executor)).with_trace(host_context.get_trace("JobRunner"));
    let worker = Worker::new(runner, Arc::new(FileJobSource::new(jobs)))
        .with_trace(host_context.get_trace("Worker"));

    let summary = worker
        .run(
            host_context.runner_shutdown_token(),
            host_context.job_cancel_token(),
        )
        .await;

    Ok(if summary.all_succeeded() {
        return_code::SUCCESS
    } else {
        return_code::JOB_FAILED
    })
}

fn install_signal_handler(host_context: &Arc<HostContext>) -> Result<()> {
    let host = Arc::clone(host_context);
    let presses = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            host.shutdown_runner(ShutdownReason::UserCancelled);
        } else {
            host.cancel_jobs(ShutdownReason::UserCancelled);
        }
    })
    .context("Failed to install Ctrl-C handler")
}

fn configure(
    host_context: &HostContext,
    token: Option<String>,
    orchestrator_host: Option<String>,
) -> Result<i32> {
    let mut overrides = runner_common::RunnerSettings::default();
    overrides.apply_env_overrides();

    let token = token
        .or(Some(overrides.token).filter(|t| !t.is_empty()))
        .context("A registration token is required (--token or REGISTRATION_TOKEN)")?;
    let host = orchestrator_host.or(overrides.orchestrator_host);

    let store = host_context.config_store();
    let settings = store.configure(&token, host)?;
    tracing::info!(
        "Runner configured for {} ({:?})",
        settings.orchestrator_host.as_deref().unwrap_or_default(),
        store.settings_file_path()
    );
    Ok(return_code::SUCCESS)
}

fn print_capabilities(host_context: &HostContext) -> Result<i32> {
    let executor = connect_executor(host_context)?;
    let capabilities = serde_json::to_string_pretty(&executor.capabilities())?;
    println!("{}", capabilities);
    Ok(return_code::SUCCESS)
}
