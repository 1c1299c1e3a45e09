mod cli;
mod config;
mod config_exec;
mod ops;
mod progress;

use anyhow::{Context, Result};
use cctool_lib::dummy::DummySession;
use cctool_lib::{CcTool, DebugSession};
use clap::Parser;

use crate::cli::{Backend, Cli, CommandSource, Commands};
use crate::config::CcToolConfig;

fn create_session(backend: Backend) -> Box<dyn DebugSession> {
    match backend {
        Backend::Dummy => Box::new(DummySession::default()),
    }
}

fn execute_cli_command(command: Commands, tool: &mut CcTool) -> Result<()> {
    match command {
        Commands::Identify => ops::execute_identify(tool),
        Commands::Status => ops::execute_status(tool),
        Commands::Read(params) => {
            let address = cctool_lib::utils::Utils::str_to_u32(&params.address)
                .with_context(|| format!("Invalid address '{}'", params.address))?;
            let size = params
                .size
                .as_deref()
                .map(cctool_lib::utils::Utils::str_to_usize)
                .transpose()
                .context("Invalid size")?;
            ops::execute_read(tool, &params.file, address, size, params.format)
        }
        Commands::Write(params) => {
            let files = params
                .files
                .iter()
                .map(|f| cli::parse_file_arg(f))
                .collect::<Result<Vec<_>>>()?;
            ops::execute_write(tool, &files, params.format, params.erase)
        }
        Commands::ReadLock => ops::execute_read_lock(tool),
        Commands::WriteLock(params) => {
            let size = cctool_lib::utils::Utils::str_to_usize(&params.size)
                .with_context(|| format!("Invalid lock size '{}'", params.size))?;
            ops::execute_write_lock(tool, params.lock_boot, size, params.lock_debug, params.erase)
        }
        Commands::Erase(params) => {
            let pages = ops::parse_addresses(&params.addresses)?;
            ops::execute_erase(tool, &pages)
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let config = CcToolConfig::from_file(path)?;
            config
                .validate()
                .with_context(|| format!("Invalid config file '{}'", path))?;
            Some(config)
        }
        None => None,
    };

    let (backend, base) = cli::merge_config(&args, config.as_ref())?;
    tracing::debug!("Backend {}, {:?}", backend, base);

    let source = cli::get_command_source(&args, config.filter(CcToolConfig::has_command))?;

    let mut tool = CcTool::new(
        create_session(backend),
        base,
        progress::create_progress_callback(),
    );

    match source {
        CommandSource::Cli(command) => execute_cli_command(command, &mut tool),
        CommandSource::Config(config) => config_exec::execute_config_command(&config, &mut tool),
    }
}

fn main() {
    // Log level can be controlled by setting the RUST_LOG environment variable, e.g.:
    // RUST_LOG=debug, RUST_LOG=cctool_lib=trace, RUST_LOG=info
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Cli::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
