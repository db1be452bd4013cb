//! Configuration loading and validation.
//!
//! A single human-owned `config.toml` describes both transports, relay
//! behaviour, mirror templates and command settings. Secrets never live in
//! it: the config only names the environment variables that hold them
//! (see [`crate::credentials`]).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::relay::queue::OverflowPolicy;

/// Example configuration written by `steamrelay init`.
pub const EXAMPLE_CONFIG: &str = include_str!("../config.example.toml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IRC side.
    pub irc: IrcConfig,

    /// Steam side.
    pub steam: SteamConfig,

    /// Relay behaviour.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Mirror templates.
    #[serde(default)]
    pub format: FormatConfig,

    /// Chat command settings.
    #[serde(default)]
    pub commands: CommandsConfig,
}

/// IRC connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server host name.
    pub server: String,

    /// Server port.
    #[serde(default = "default_irc_port")]
    pub port: u16,

    /// Nick to register with.
    pub nick: String,

    /// Channel to bridge, including the `#` prefix.
    pub channel: String,

    /// Realname sent with `USER`.
    #[serde(default = "default_realname")]
    pub realname: String,
}

/// Steam bridge settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    /// Base URL of the Steam client bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// SteamID64 of the group chat room to bridge.
    pub chatroom: String,

    /// Environment variable holding the Steam account name.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Environment variable holding the Steam password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// One-time Steam Guard code, needed only for the first logon.
    #[serde(default)]
    pub auth_code: Option<String>,
}

/// Relay behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Starting verbosity level (0-3).
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Lines held for Steam until it logs on.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What to do when the pending queue is full.
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Prefix that relays the rest of a line verbatim.
    #[serde(default = "default_echo_prefix")]
    pub echo_prefix: String,

    /// How long an operator check may take before it is abandoned.
    #[serde(default = "default_permission_timeout")]
    pub permission_timeout_secs: u64,

    /// Buffer size of the adapter -> dispatcher channel.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            verbosity: default_verbosity(),
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
            echo_prefix: default_echo_prefix(),
            permission_timeout_secs: default_permission_timeout(),
            channel_buffer_size: default_channel_buffer(),
        }
    }
}

/// Mirror templates for Steam -> IRC lines. `%s` is replaced with the
/// sender name, then the text.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
    /// Chat line.
    #[serde(default = "default_msg_format")]
    pub msg_format: String,

    /// Emote.
    #[serde(default = "default_emote_format")]
    pub emote_format: String,

    /// Chat line from a sender who is in game.
    #[serde(default = "default_msg_format_game")]
    pub msg_format_game: String,

    /// Emote from a sender who is in game.
    #[serde(default = "default_emote_format_game")]
    pub emote_format_game: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            msg_format: default_msg_format(),
            emote_format: default_emote_format(),
            msg_format_game: default_msg_format_game(),
            emote_format_game: default_emote_format_game(),
        }
    }
}

/// Chat command settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    /// OpenWeatherMap current-weather endpoint.
    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    /// Environment variable holding the OpenWeatherMap API key.
    #[serde(default = "default_weather_key_env")]
    pub weather_api_key_env: String,

    /// City used when `.weather` has no argument.
    #[serde(default = "default_weather_city")]
    pub weather_default_city: String,

    /// Command invocations allowed per minute across all users.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// HTTP timeout for command fetches.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            weather_url: default_weather_url(),
            weather_api_key_env: default_weather_key_env(),
            weather_default_city: default_weather_city(),
            rate_limit_per_minute: default_rate_limit(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

// Default value functions for serde

fn default_irc_port() -> u16 {
    6667
}
fn default_realname() -> String {
    "steamrelay".to_owned()
}
fn default_bridge_url() -> String {
    "http://127.0.0.1:3002".to_owned()
}
fn default_username_env() -> String {
    "STEAM_USERNAME".to_owned()
}
fn default_password_env() -> String {
    "STEAM_PASSWORD".to_owned()
}
fn default_verbosity() -> u8 {
    2
}
fn default_queue_capacity() -> usize {
    3
}
fn default_echo_prefix() -> String {
    ".say".to_owned()
}
fn default_permission_timeout() -> u64 {
    5
}
fn default_channel_buffer() -> usize {
    256
}
fn default_msg_format() -> String {
    "\u{3}02%s\u{f}: %s".to_owned()
}
fn default_emote_format() -> String {
    "\u{3}02%s %s".to_owned()
}
fn default_msg_format_game() -> String {
    "\u{3}03%s\u{f}: %s".to_owned()
}
fn default_emote_format_game() -> String {
    "\u{3}03%s %s".to_owned()
}
fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_owned()
}
fn default_weather_key_env() -> String {
    "OPENWEATHER_API_KEY".to_owned()
}
fn default_weather_city() -> String {
    "vancouver".to_owned()
}
fn default_rate_limit() -> u32 {
    20
}
fn default_fetch_timeout() -> u64 {
    10
}

impl Config {
    /// Check values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.irc.server.trim().is_empty() {
            anyhow::bail!("irc.server must not be empty");
        }
        if self.irc.nick.trim().is_empty() || self.irc.nick.contains(char::is_whitespace) {
            anyhow::bail!("irc.nick must be a single non-empty word");
        }
        if !self.irc.channel.starts_with(['#', '&']) || self.irc.channel.len() < 2 {
            anyhow::bail!(
                "irc.channel must start with '#' or '&', got {:?}",
                self.irc.channel
            );
        }
        if self.steam.chatroom.trim().is_empty() {
            anyhow::bail!("steam.chatroom must not be empty");
        }
        if self.relay.verbosity > crate::relay::verbosity::MAX_VERBOSITY {
            anyhow::bail!(
                "relay.verbosity must be between 0 and {}, got {}",
                crate::relay::verbosity::MAX_VERBOSITY,
                self.relay.verbosity
            );
        }
        if self.relay.queue_capacity == 0 {
            anyhow::bail!("relay.queue_capacity must be at least 1");
        }
        if self.relay.channel_buffer_size == 0 {
            anyhow::bail!("relay.channel_buffer_size must be at least 1");
        }
        if self.relay.echo_prefix.trim().is_empty() {
            anyhow::bail!("relay.echo_prefix must not be empty");
        }
        Ok(())
    }
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.steamrelay/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".steamrelay"))
}

/// Filesystem layout under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Root directory (`~/.steamrelay`).
    pub root: PathBuf,
    /// `config.toml`.
    pub config_toml: PathBuf,
    /// `.env` with Steam credentials and API keys.
    pub env_file: PathBuf,
    /// Persisted Steam state.
    pub data_dir: PathBuf,
    /// Cached Steam server list.
    pub servers_file: PathBuf,
    /// Steam Guard sentry blob.
    pub sentry_file: PathBuf,
    /// Rotated JSON logs.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out paths under `root`.
    pub fn under(root: &Path) -> Self {
        let data_dir = root.join("data");
        Self {
            root: root.to_path_buf(),
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            servers_file: data_dir.join("servers"),
            sentry_file: data_dir.join("sentry"),
            data_dir,
            logs_dir: root.join("logs"),
        }
    }
}

/// Resolve runtime paths under the default config directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(&config_dir()?))
}
