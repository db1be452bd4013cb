//! Process wiring: credentials, both transports, the command registry and
//! the dispatcher, run until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::commands::default_registry;
use crate::config::{Config, RuntimePaths};
use crate::credentials::load_optional_credentials;
use crate::irc::IrcTransport;
use crate::relay::{Dispatcher, DispatcherSettings};
use crate::steam::{BridgeClient, SteamState, SteamTransport};
use crate::transport::ChatTransport;

/// Run the relay until interrupted.
///
/// # Errors
///
/// Returns an error if credentials are missing or the command HTTP client
/// cannot be built. Transport failures are retried, never returned.
pub async fn run(config: Config, paths: &RuntimePaths) -> anyhow::Result<()> {
    let credentials = load_optional_credentials(&paths.env_file)?;
    let login = credentials
        .steam_login(&config.steam)
        .context("steam credentials")?;
    let weather_key = credentials.get(&config.commands.weather_api_key_env);
    if weather_key.is_none() {
        warn!(
            var = %config.commands.weather_api_key_env,
            ".weather disabled: no API key"
        );
    }

    let registry = Arc::new(
        default_registry(&config.commands, weather_key).context("failed to build commands")?,
    );

    let (tx, rx) = mpsc::channel(config.relay.channel_buffer_size);

    let (irc, irc_task) = IrcTransport::spawn(config.irc.clone(), tx.clone());
    let state = SteamState::new(paths.servers_file.clone(), paths.sentry_file.clone());
    let (steam, steam_task) = SteamTransport::spawn(
        BridgeClient::new(&config.steam.bridge_url),
        config.steam.chatroom.clone(),
        login,
        state,
        tx.clone(),
    );

    let irc: Arc<dyn ChatTransport> = irc;
    let steam: Arc<dyn ChatTransport> = steam;
    let dispatcher = Dispatcher::new(
        irc,
        steam,
        registry,
        DispatcherSettings::from_config(&config),
        tx,
    );

    info!(
        server = %config.irc.server,
        channel = %config.irc.channel,
        room = %config.steam.chatroom,
        "steamrelay starting"
    );

    tokio::select! {
        () = dispatcher.run(rx) => {
            warn!("dispatcher stopped");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("received shutdown signal");
        }
    }

    irc_task.abort();
    steam_task.abort();
    info!("steamrelay stopped");
    Ok(())
}
