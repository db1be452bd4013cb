//! Chat command registry and the handlers shipped with the bot.
//!
//! The dispatcher hands every eligible line to [`CommandRegistry::invoke`],
//! which looks the first word up (exact token, then URL prefix), applies
//! the rate limit and spawns the handler. Handlers answer through a
//! [`Reply`], which routes text back to the dispatcher as
//! [`Inbound::CommandReply`] so relay ordering and queueing stay in one
//! place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod fun;
pub mod guard;
pub mod help;
pub mod search;
pub mod title;
pub mod weather;

use crate::config::CommandsConfig;
use crate::relay::Inbound;
use crate::types::{Identity, Origin};

use self::guard::RateLimiter;

/// Maximum number of arguments passed to a handler.
pub const MAX_ARGS: usize = 19;

/// Rate-limit window for command invocations.
const RATE_WINDOW_SECS: u64 = 60;

/// Errors a handler can return. Converted to a chat line at the registry
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Target refused by the outbound guard.
    #[error("blocked: {0}")]
    Blocked(String),

    /// Bad user input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Too many invocations in the current window.
    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// First word of the line.
    pub token: String,
    /// Remaining words, at most [`MAX_ARGS`].
    pub args: Vec<String>,
}

impl Invocation {
    /// Build an invocation from a token and arguments.
    pub fn new<I, S>(token: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            token: token.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// First argument, if any.
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyScope {
    /// Both sides of the bridge.
    Broadcast,
    /// Only the requester, on the side they asked from.
    Private {
        /// Requester's side.
        origin: Origin,
        /// Requester.
        to: Identity,
    },
}

/// One line of handler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text to send.
    pub text: String,
    /// Destination.
    pub scope: ReplyScope,
}

/// Reply sink handed to a handler.
#[derive(Debug, Clone)]
pub struct Reply {
    tx: mpsc::Sender<Inbound>,
    origin: Origin,
    requester: Identity,
}

impl Reply {
    /// Create a sink that feeds the dispatcher's inbound channel.
    pub fn new(tx: mpsc::Sender<Inbound>, origin: Origin, requester: Identity) -> Self {
        Self {
            tx,
            origin,
            requester,
        }
    }

    /// Send text to both sides.
    pub async fn send(&self, text: impl Into<String>) {
        self.push(CommandOutput {
            text: text.into(),
            scope: ReplyScope::Broadcast,
        })
        .await;
    }

    /// Send text privately to the requester.
    pub async fn send_private(&self, text: impl Into<String>) {
        self.push(CommandOutput {
            text: text.into(),
            scope: ReplyScope::Private {
                origin: self.origin,
                to: self.requester.clone(),
            },
        })
        .await;
    }

    /// Side the request came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Who asked.
    pub fn requester(&self) -> &Identity {
        &self.requester
    }

    async fn push(&self, output: CommandOutput) {
        if self.tx.send(Inbound::CommandReply(output)).await.is_err() {
            debug!("dispatcher gone, reply dropped");
        }
    }
}

/// A chat command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Token the handler answers to (e.g. `.wiki`).
    fn name(&self) -> &'static str;

    /// One-line usage shown by `.halp`.
    fn usage(&self) -> &'static str;

    /// Run the command.
    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError>;

    /// Chat line sent when [`CommandHandler::handle`] fails.
    fn failure_message(&self, _error: &CommandError) -> String {
        format!("Error running {}", self.name())
    }
}

/// Token -> handler lookup plus invocation.
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    prefixes: Vec<(&'static str, Arc<dyn CommandHandler>)>,
    order: Vec<&'static str>,
    limiter: RateLimiter,
}

impl CommandRegistry {
    /// Empty registry allowing `per_minute` invocations per minute.
    pub fn new(per_minute: u32) -> Self {
        Self {
            handlers: HashMap::new(),
            prefixes: Vec::new(),
            order: Vec::new(),
            limiter: RateLimiter::new(RATE_WINDOW_SECS, per_minute),
        }
    }

    /// Register a handler under its own name.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_none() {
            self.order.push(name);
        }
    }

    /// Register a handler for lines whose first word starts with `prefix`.
    pub fn register_prefix(&mut self, prefix: &'static str, handler: Arc<dyn CommandHandler>) {
        self.prefixes.push((prefix, handler));
    }

    /// Find the handler for `token`: exact match first, then prefixes.
    pub fn lookup(&self, token: &str) -> Option<Arc<dyn CommandHandler>> {
        if let Some(handler) = self.handlers.get(token) {
            return Some(Arc::clone(handler));
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| token.len() > prefix.len() && token.starts_with(prefix))
            .map(|(_, handler)| Arc::clone(handler))
    }

    /// Usage lines of the exact-token handlers, in registration order.
    pub fn usage_lines(&self) -> Vec<&'static str> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.usage())
            .collect()
    }

    /// Spawn the handler for `invocation`, if there is one and the rate
    /// limit allows. Returns whether a handler was started.
    pub fn invoke(&self, invocation: Invocation, reply: Reply) -> bool {
        let Some(handler) = self.lookup(&invocation.token) else {
            debug!(token = %invocation.token, "no handler for token");
            return false;
        };
        if let Err(e) = self.limiter.check() {
            debug!(token = %invocation.token, error = %e, "command dropped");
            return false;
        }
        self.limiter.record();

        tokio::spawn(async move {
            if let Err(e) = handler.handle(&invocation, &reply).await {
                warn!(token = %invocation.token, error = %e, "command failed");
                reply.send(handler.failure_message(&e)).await;
            }
        });
        true
    }
}

/// HTTP client shared by the fetching commands.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, CommandError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .user_agent(concat!("steamrelay/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Build the registry with every shipped command.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn default_registry(
    config: &CommandsConfig,
    weather_api_key: Option<String>,
) -> Result<CommandRegistry, CommandError> {
    let client = http_client(Duration::from_secs(config.fetch_timeout_secs))?;
    let mut registry = CommandRegistry::new(config.rate_limit_per_minute);

    for handler in search::all() {
        registry.register(Arc::new(handler));
    }
    registry.register(Arc::new(fun::Dice));
    registry.register(Arc::new(fun::Rng));
    registry.register(Arc::new(fun::Yallah));
    for handler in fun::canned() {
        registry.register(Arc::new(handler));
    }
    registry.register(Arc::new(weather::Weather::new(
        client.clone(),
        config.weather_url.clone(),
        weather_api_key,
        config.weather_default_city.clone(),
    )));

    let title: Arc<dyn CommandHandler> = Arc::new(title::Title::new(client));
    registry.register_prefix("http://", Arc::clone(&title));
    registry.register_prefix("https://", title);

    let mut lines = vec![help::USAGE];
    lines.extend(registry.usage_lines());
    registry.register(Arc::new(help::Halp::new(&lines)));

    Ok(registry)
}
