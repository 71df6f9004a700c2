//! Codepad playground server
//!
//! Loads `codepad.yaml` (or built-in defaults), builds the execution engine for the
//! configured isolation backend and serves the HTTP API until Ctrl+C or SIGTERM.

use anyhow::Result;
use clap::{Parser, Subcommand};
use codepad_core::{
    CodeAssistant, CodepadConfig, ConfigLoader, DockerExecutor, ExecutionEngine, IsolationMode,
    NativeExecutor,
};
use codepad_server::{shutdown_signal, PlaygroundServer, ServerConfig};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Codepad Server - sandboxed code execution for the playground")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Configuration file (defaults to ./codepad.yaml when present)")]
    config: Option<PathBuf>,

    #[clap(long, help = "Override server.bind_addr")]
    bind_addr: Option<String>,

    #[clap(long, short, help = "Override logging.level")]
    log_level: Option<String>,

    #[clap(long, help = "Override engine.isolation (native or container)")]
    isolation: Option<IsolationMode>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the playground server (default command)
    Run,
    /// Check that the configured backend can execute submissions
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The logger passes everything; the global max level does the filtering so the
    // configured level can take over once the config file has been read.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .init();
    log::set_max_level(level_filter(cli.log_level.as_deref()));

    let mut config = ConfigLoader::load_or_default(cli.config.as_deref()).await?;
    if let Some(bind_addr) = cli.bind_addr {
        config.server.bind_addr = bind_addr;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(isolation) = cli.isolation {
        config.engine.isolation = isolation;
    }
    config.validate()?;

    log::set_max_level(level_filter(Some(&config.logging.level)));

    match cli.command {
        Some(Commands::Check) => check_environment(&config).await,
        Some(Commands::Run) | None => run_server(config).await,
    }
}

fn level_filter(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|l| l.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

async fn run_server(config: CodepadConfig) -> Result<()> {
    let engine = ExecutionEngine::from_config(&config)?;
    let server_config = ServerConfig::from_settings(&config.server)?;

    let mut server = PlaygroundServer::new(Arc::new(engine)).with_config(server_config);
    match CodeAssistant::from_config(&config.advisor)? {
        Some(assistant) => server = server.with_assistant(Arc::new(assistant)),
        None => log::warn!("Code assistant disabled: /generate will answer 502"),
    }

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn check_environment(config: &CodepadConfig) -> Result<()> {
    println!("Isolation: {}", config.engine.isolation);
    println!("Scratch root: {}", config.engine.scratch_root.display());
    println!(
        "Timeout: {} ms",
        config.engine.timeout().as_millis()
    );

    match config.engine.isolation {
        IsolationMode::Native => {
            let missing = NativeExecutor::missing_toolchains();
            if missing.is_empty() {
                println!("All toolchains found.");
            } else {
                for (language, tool) in &missing {
                    println!("  missing `{}` (needed for {})", tool, language);
                }
                anyhow::bail!("{} toolchain executable(s) missing", missing.len());
            }
        }
        IsolationMode::Container => {
            let executor = DockerExecutor::connect(
                config.engine.limits.clone(),
                config.engine.max_output_bytes,
            )?;
            executor.ping().await?;
            println!("Docker daemon reachable.");
        }
    }

    if config.advisor.is_usable() {
        println!("Advisor: {} at {}", config.advisor.model, config.advisor.api_base);
    } else {
        println!(
            "Advisor: disabled (set {} to enable complexity estimates)",
            config.advisor.api_key_env
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_logging_defaults_to_info() {
        assert_eq!(level_filter(None), LevelFilter::Info);
        assert!(log::Level::Info <= level_filter(None));
    }

    #[test]
    fn level_override_is_parsed() {
        assert_eq!(level_filter(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_filter(Some("WARN")), LevelFilter::Warn);
        assert_eq!(level_filter(Some("loud")), LevelFilter::Info);
    }
}
