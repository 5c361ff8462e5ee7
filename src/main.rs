use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossterm::style::Stylize;

use dockstep::config::{CONFIG_FILE_NAME, Config};
use dockstep::docker::{self, CliDockerClient};
use dockstep::execution::{EventBus, StepRunner, TaskExecutor, TaskOutcome, TaskPlan};
use dockstep::ui::{SimpleProgressPrinter, StartupProgressDisplay, show_until};
use dockstep::version::VersionInfo;

/// Run a task inside Docker containers, starting its dependencies first.
#[derive(Debug, Parser)]
#[command(name = "dockstep", version)]
struct Cli {
    /// Config file to use instead of ./dockstep.yml.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to this file. Without it, logs are discarded.
    #[arg(long, value_name = "FILE", env = "DOCKSTEP_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Print plain progress lines instead of the live display.
    #[arg(long)]
    no_progress: bool,

    /// Print version details for dockstep, the OS and Docker, then exit.
    #[arg(long)]
    version_info: bool,

    /// Name of the task to run.
    #[arg(required_unless_present = "version_info")]
    task: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let exit_code = run(&cli)?;
    std::process::exit(exit_code);
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        // The progress display owns the terminal, so there is nowhere to log to.
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<i32> {
    if cli.version_info {
        println!("{}", VersionInfo::gather(docker::engine::docker_version_info));
        return Ok(0);
    }
    let task = cli.task.as_deref().context("no task given")?;

    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => {
            let cwd = std::env::current_dir()?;
            Config::load(&cwd)?
                .with_context(|| format!("no {CONFIG_FILE_NAME} found in {}", cwd.display()))?
        }
    };
    let plan = config.resolve_task(task)?;
    docker::ensure_available()?;

    let bus = Arc::new(EventBus::new());
    let client = CliDockerClient::new(config.health_check_timeout());
    let executor = TaskExecutor::new(StepRunner::new(Arc::new(client)), bus.clone());

    let outcome = if !cli.no_progress && io::stdout().is_terminal() {
        execute_with_display(&executor, &bus, &plan)?
    } else {
        bus.subscribe(Arc::new(SimpleProgressPrinter::new(io::stderr())));
        executor.execute(&plan)
    };

    if let Some(message) = &outcome.failure {
        eprintln!();
        eprintln!("{}", message.as_str().red().bold());
    }
    Ok(outcome.exit_code)
}

/// Run the task on a worker thread while the startup display redraws on this
/// one. The task container waits to run until the display has finished.
fn execute_with_display(
    executor: &TaskExecutor,
    bus: &EventBus,
    plan: &TaskPlan,
) -> Result<TaskOutcome> {
    let display = StartupProgressDisplay::new(plan);
    display.subscribe_to(bus);
    bus.subscribe(display.handoff());

    thread::scope(|scope| {
        let worker = scope.spawn(|| executor.execute(plan));
        show_until(&display, || worker.is_finished())?;
        worker
            .join()
            .map_err(|_| anyhow!("the task executor panicked"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_info_needs_no_task() {
        let cli = Cli::try_parse_from(["dockstep", "--version-info"]).unwrap();
        assert!(cli.version_info);
        assert_eq!(cli.task, None);
    }

    #[test]
    fn task_is_required_otherwise() {
        assert!(Cli::try_parse_from(["dockstep"]).is_err());
        let cli = Cli::try_parse_from(["dockstep", "--no-progress", "test"]).unwrap();
        assert_eq!(cli.task.as_deref(), Some("test"));
    }
}
