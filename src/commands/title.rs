//! Page title lookup for lines that start with a URL.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures_util::StreamExt;
use regex::Regex;
use tracing::debug;
use url::Url;

use super::guard::check_public_url;
use super::{CommandError, CommandHandler, Invocation, Reply};

/// Stop reading a page after this many bytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

static TITLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<\s*title[^>]*>(.+?)<\s*/\s*title").ok());

/// Fetches a page and posts `Title: <title>`.
#[derive(Debug, Clone)]
pub struct Title {
    client: reqwest::Client,
    allow_private: bool,
}

impl Title {
    /// Create the handler. Private-address targets are refused.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            allow_private: false,
        }
    }

    /// Allow loopback and private targets (local test servers).
    pub fn allow_private_targets(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    async fn fetch_title(&self, url: &Url) -> Result<Option<String>, CommandError> {
        if !self.allow_private {
            check_public_url(url).await?;
        }
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(CommandError::Status(response.status().as_u16()));
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
            if let Some(title) = extract_title(&String::from_utf8_lossy(&body)) {
                return Ok(Some(title));
            }
            if body.len() >= MAX_BODY_BYTES {
                break;
            }
        }
        Ok(None)
    }
}

/// First `<title>` of an HTML fragment, whitespace collapsed.
pub fn extract_title(html: &str) -> Option<String> {
    let pattern = TITLE.as_ref()?;
    let raw = pattern.captures(html)?.get(1)?.as_str();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[async_trait]
impl CommandHandler for Title {
    fn name(&self) -> &'static str {
        "http"
    }

    fn usage(&self) -> &'static str {
        "<url>: Show the page title"
    }

    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        let url = Url::parse(&invocation.token)
            .map_err(|e| CommandError::InvalidArgument(format!("{}: {e}", invocation.token)))?;
        match self.fetch_title(&url).await? {
            Some(title) => reply.send(format!("Title: {title}")).await,
            None => debug!(%url, "page has no title"),
        }
        Ok(())
    }

    fn failure_message(&self, _error: &CommandError) -> String {
        "Could not fetch title".to_owned()
    }
}
