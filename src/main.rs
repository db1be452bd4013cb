#![allow(missing_docs)]

//! steamrelay: IRC <-> Steam group chat relay bot.
//!
//! Runtime files live next to the config (`~/.steamrelay/` by default):
//! `config.toml`, `.env` with secrets, `data/` for persisted Steam state and
//! `logs/` for JSON logs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use steamrelay::config::{self, Config, RuntimePaths};
use steamrelay::credentials::load_optional_credentials;
use steamrelay::logging;

/// IRC <-> Steam group chat relay bot.
#[derive(Parser, Debug)]
#[command(name = "steamrelay")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay until Ctrl+C
    Start {
        /// Config file (default: ~/.steamrelay/config.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Load and validate the config, then print a summary
    Check {
        /// Config file (default: ~/.steamrelay/config.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Write an example config
    Init {
        /// Where to write it (default: ~/.steamrelay/config.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Start { config } => cmd_start(config).await,
        Command::Check { config } => {
            logging::init_cli();
            cmd_check(config)
        }
        Command::Init { config } => {
            logging::init_cli();
            cmd_init(config)
        }
    }
}

/// Runtime layout rooted at the config file's directory.
fn resolve_paths(config: Option<PathBuf>) -> Result<(PathBuf, RuntimePaths)> {
    match config {
        Some(path) => {
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            Ok((path, RuntimePaths::under(&root)))
        }
        None => {
            let paths = config::runtime_paths()?;
            Ok((paths.config_toml.clone(), paths))
        }
    }
}

fn load_validated(path: &Path) -> Result<Config> {
    let config = config::load_config(path)?;
    config
        .validate()
        .with_context(|| format!("invalid config at {}", path.display()))?;
    Ok(config)
}

async fn cmd_start(config: Option<PathBuf>) -> Result<()> {
    let (config_path, paths) = resolve_paths(config)?;
    let _guard = logging::init_production(&paths.logs_dir)?;
    let config = load_validated(&config_path)?;
    info!(config = %config_path.display(), "config loaded");
    steamrelay::bot::run(config, &paths).await
}

fn cmd_check(config: Option<PathBuf>) -> Result<()> {
    let (config_path, paths) = resolve_paths(config)?;
    let config = load_validated(&config_path)?;

    let credentials = load_optional_credentials(&paths.env_file)?;
    let status = |var: &str| {
        if credentials.get(var).is_some() {
            "set"
        } else {
            "MISSING"
        }
    };

    println!("config:     {}", config_path.display());
    println!(
        "irc:        {}:{} as {} in {}",
        config.irc.server, config.irc.port, config.irc.nick, config.irc.channel
    );
    println!(
        "steam:      room {} via {}",
        config.steam.chatroom, config.steam.bridge_url
    );
    println!(
        "relay:      verbosity {}, queue {} ({:?}), echo {:?}",
        config.relay.verbosity,
        config.relay.queue_capacity,
        config.relay.overflow,
        config.relay.echo_prefix
    );
    println!(
        "secrets:    {} {}, {} {}, {} {}",
        config.steam.username_env,
        status(&config.steam.username_env),
        config.steam.password_env,
        status(&config.steam.password_env),
        config.commands.weather_api_key_env,
        status(&config.commands.weather_api_key_env)
    );
    println!("config OK");
    Ok(())
}

fn cmd_init(config: Option<PathBuf>) -> Result<()> {
    let (config_path, _) = resolve_paths(config)?;
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists, not overwriting",
            config_path.display()
        );
    }
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&config_path, config::EXAMPLE_CONFIG)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    println!("put STEAM_USERNAME and STEAM_PASSWORD in a 0600 .env next to it");
    Ok(())
}
